//! Postgres-backed [`EntityStore`] over sea-orm.

use super::{EntityStore, StoreError};
use async_trait::async_trait;
use geyser_db_entity::db::{
    event_cursor, funding, platform, pool, pool_day_data, position, stake, token, transaction,
    user,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};

pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    pub fn new(db: DatabaseConnection) -> Self {
        DbStore { db }
    }
}

fn pool_active(m: pool::Model) -> pool::ActiveModel {
    pool::ActiveModel {
        id: Set(m.id),
        staking_token: Set(m.staking_token),
        reward_token: Set(m.reward_token),
        reward_module: Set(m.reward_module),
        reward_module_type: Set(m.reward_module_type),
        users: Set(m.users),
        operations: Set(m.operations),
        staked: Set(m.staked),
        rewards: Set(m.rewards),
        funded: Set(m.funded),
        distributed: Set(m.distributed),
        gysr_spent: Set(m.gysr_spent),
        gysr_vested: Set(m.gysr_vested),
        volume: Set(m.volume),
        tvl: Set(m.tvl),
        updated: Set(m.updated),
    }
}

fn platform_active(m: platform::Model) -> platform::ActiveModel {
    platform::ActiveModel {
        id: Set(m.id),
        pools: Set(m.pools),
        volume: Set(m.volume),
        gysr_spent: Set(m.gysr_spent),
        gysr_vested: Set(m.gysr_vested),
        gysr_fees: Set(m.gysr_fees),
        active_pools: Set(m.active_pools),
        updated: Set(m.updated),
    }
}

fn token_active(m: token::Model) -> token::ActiveModel {
    token::ActiveModel {
        id: Set(m.id),
        symbol: Set(m.symbol),
        decimals: Set(m.decimals),
        price: Set(m.price),
        updated: Set(m.updated),
    }
}

fn user_active(m: user::Model) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(m.id),
        operations: Set(m.operations),
        earned: Set(m.earned),
        gysr_spent: Set(m.gysr_spent),
    }
}

fn position_active(m: position::Model) -> position::ActiveModel {
    position::ActiveModel {
        id: Set(m.id),
        user_id: Set(m.user_id),
        pool_id: Set(m.pool_id),
        shares: Set(m.shares),
    }
}

fn stake_active(m: stake::Model) -> stake::ActiveModel {
    stake::ActiveModel {
        id: Set(m.id),
        position_id: Set(m.position_id),
        user_id: Set(m.user_id),
        pool_id: Set(m.pool_id),
        shares: Set(m.shares),
        timestamp: Set(m.timestamp),
    }
}

fn funding_active(m: funding::Model) -> funding::ActiveModel {
    funding::ActiveModel {
        id: Set(m.id),
        pool_id: Set(m.pool_id),
        token_id: Set(m.token_id),
        created: Set(m.created),
        start: Set(m.start),
        end: Set(m.end),
        original_amount: Set(m.original_amount),
        cleaned: Set(m.cleaned),
    }
}

fn transaction_active(m: transaction::Model) -> transaction::ActiveModel {
    transaction::ActiveModel {
        id: Set(m.id),
        pool_id: Set(m.pool_id),
        user_id: Set(m.user_id),
        timestamp: Set(m.timestamp),
        gysr_spent: Set(m.gysr_spent),
        earnings: Set(m.earnings),
    }
}

fn cursor_active(m: event_cursor::Model) -> event_cursor::ActiveModel {
    event_cursor::ActiveModel {
        id: Set(m.id),
        ordinal: Set(m.ordinal),
    }
}

fn day_data_active(m: pool_day_data::Model) -> pool_day_data::ActiveModel {
    pool_day_data::ActiveModel {
        id: Set(m.id),
        pool_id: Set(m.pool_id),
        date: Set(m.date),
        volume: Set(m.volume),
    }
}

#[async_trait]
impl EntityStore for DbStore {
    async fn pool(&self, id: &str) -> Result<Option<pool::Model>, StoreError> {
        Ok(pool::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn save_pool(&self, model: pool::Model) -> Result<(), StoreError> {
        let existing = pool::Entity::find_by_id(&model.id).one(&self.db).await?;
        let active = pool_active(model);
        match existing {
            Some(_) => {
                active.update(&self.db).await?;
            }
            None => {
                pool::Entity::insert(active).exec(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn platform(&self, id: &str) -> Result<Option<platform::Model>, StoreError> {
        Ok(platform::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn save_platform(&self, model: platform::Model) -> Result<(), StoreError> {
        let existing = platform::Entity::find_by_id(&model.id).one(&self.db).await?;
        let active = platform_active(model);
        match existing {
            Some(_) => {
                active.update(&self.db).await?;
            }
            None => {
                platform::Entity::insert(active).exec(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn token(&self, id: &str) -> Result<Option<token::Model>, StoreError> {
        Ok(token::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn save_token(&self, model: token::Model) -> Result<(), StoreError> {
        let existing = token::Entity::find_by_id(&model.id).one(&self.db).await?;
        let active = token_active(model);
        match existing {
            Some(_) => {
                active.update(&self.db).await?;
            }
            None => {
                token::Entity::insert(active).exec(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn user(&self, id: &str) -> Result<Option<user::Model>, StoreError> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn save_user(&self, model: user::Model) -> Result<(), StoreError> {
        let existing = user::Entity::find_by_id(&model.id).one(&self.db).await?;
        let active = user_active(model);
        match existing {
            Some(_) => {
                active.update(&self.db).await?;
            }
            None => {
                user::Entity::insert(active).exec(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn position(&self, id: &str) -> Result<Option<position::Model>, StoreError> {
        Ok(position::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn save_position(&self, model: position::Model) -> Result<(), StoreError> {
        let existing = position::Entity::find_by_id(&model.id).one(&self.db).await?;
        let active = position_active(model);
        match existing {
            Some(_) => {
                active.update(&self.db).await?;
            }
            None => {
                position::Entity::insert(active).exec(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn delete_position(&self, id: &str) -> Result<(), StoreError> {
        position::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    async fn stakes_by_position(
        &self,
        position_id: &str,
    ) -> Result<Vec<stake::Model>, StoreError> {
        Ok(stake::Entity::find()
            .filter(stake::Column::PositionId.eq(position_id))
            .order_by_asc(stake::Column::Timestamp)
            .order_by_asc(stake::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn save_stake(&self, model: stake::Model) -> Result<(), StoreError> {
        let existing = stake::Entity::find_by_id(&model.id).one(&self.db).await?;
        let active = stake_active(model);
        match existing {
            Some(_) => {
                active.update(&self.db).await?;
            }
            None => {
                stake::Entity::insert(active).exec(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn delete_stake(&self, id: &str) -> Result<(), StoreError> {
        stake::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    async fn fundings_by_pool(&self, pool_id: &str) -> Result<Vec<funding::Model>, StoreError> {
        Ok(funding::Entity::find()
            .filter(funding::Column::PoolId.eq(pool_id))
            .order_by_asc(funding::Column::Created)
            .order_by_asc(funding::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn save_funding(&self, model: funding::Model) -> Result<(), StoreError> {
        let existing = funding::Entity::find_by_id(&model.id).one(&self.db).await?;
        let active = funding_active(model);
        match existing {
            Some(_) => {
                active.update(&self.db).await?;
            }
            None => {
                funding::Entity::insert(active).exec(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn transaction(&self, id: &str) -> Result<Option<transaction::Model>, StoreError> {
        Ok(transaction::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn save_transaction(&self, model: transaction::Model) -> Result<(), StoreError> {
        let existing = transaction::Entity::find_by_id(&model.id)
            .one(&self.db)
            .await?;
        let active = transaction_active(model);
        match existing {
            Some(_) => {
                active.update(&self.db).await?;
            }
            None => {
                transaction::Entity::insert(active).exec(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn pool_day_data(&self, id: &str) -> Result<Option<pool_day_data::Model>, StoreError> {
        Ok(pool_day_data::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn save_pool_day_data(&self, model: pool_day_data::Model) -> Result<(), StoreError> {
        let existing = pool_day_data::Entity::find_by_id(&model.id)
            .one(&self.db)
            .await?;
        let active = day_data_active(model);
        match existing {
            Some(_) => {
                active.update(&self.db).await?;
            }
            None => {
                pool_day_data::Entity::insert(active).exec(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn event_cursor(&self, id: &str) -> Result<Option<event_cursor::Model>, StoreError> {
        Ok(event_cursor::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn save_event_cursor(&self, model: event_cursor::Model) -> Result<(), StoreError> {
        let existing = event_cursor::Entity::find_by_id(&model.id)
            .one(&self.db)
            .await?;
        let active = cursor_active(model);
        match existing {
            Some(_) => {
                active.update(&self.db).await?;
            }
            None => {
                event_cursor::Entity::insert(active).exec(&self.db).await?;
            }
        }
        Ok(())
    }
}
