//! Durable entity storage behind a narrow load/save/delete interface.
//!
//! The ledger engine is written against [`EntityStore`] so the reconciliation
//! logic can be exercised on [`MemoryStore`] in tests while the service runs
//! on the Postgres-backed [`db::DbStore`].

pub mod db;

use async_trait::async_trait;
use geyser_db_entity::db::{
    event_cursor, funding, platform, pool, pool_day_data, position, stake, token, transaction,
    user,
};
#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(error: sea_orm::DbErr) -> Self {
        StoreError::Backend(error.to_string())
    }
}

/// Typed load-by-key / upsert / delete operations for every entity kind,
/// plus the two ordered child queries the ledger needs: a position's stakes
/// in append order and a pool's fundings oldest first.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn pool(&self, id: &str) -> Result<Option<pool::Model>, StoreError>;
    async fn save_pool(&self, model: pool::Model) -> Result<(), StoreError>;

    async fn platform(&self, id: &str) -> Result<Option<platform::Model>, StoreError>;
    async fn save_platform(&self, model: platform::Model) -> Result<(), StoreError>;

    async fn token(&self, id: &str) -> Result<Option<token::Model>, StoreError>;
    async fn save_token(&self, model: token::Model) -> Result<(), StoreError>;

    async fn user(&self, id: &str) -> Result<Option<user::Model>, StoreError>;
    async fn save_user(&self, model: user::Model) -> Result<(), StoreError>;

    async fn position(&self, id: &str) -> Result<Option<position::Model>, StoreError>;
    async fn save_position(&self, model: position::Model) -> Result<(), StoreError>;
    async fn delete_position(&self, id: &str) -> Result<(), StoreError>;

    async fn stakes_by_position(
        &self,
        position_id: &str,
    ) -> Result<Vec<stake::Model>, StoreError>;
    async fn save_stake(&self, model: stake::Model) -> Result<(), StoreError>;
    async fn delete_stake(&self, id: &str) -> Result<(), StoreError>;

    async fn fundings_by_pool(&self, pool_id: &str) -> Result<Vec<funding::Model>, StoreError>;
    async fn save_funding(&self, model: funding::Model) -> Result<(), StoreError>;

    async fn transaction(&self, id: &str) -> Result<Option<transaction::Model>, StoreError>;
    async fn save_transaction(&self, model: transaction::Model) -> Result<(), StoreError>;

    async fn pool_day_data(&self, id: &str) -> Result<Option<pool_day_data::Model>, StoreError>;
    async fn save_pool_day_data(&self, model: pool_day_data::Model) -> Result<(), StoreError>;

    async fn event_cursor(&self, id: &str) -> Result<Option<event_cursor::Model>, StoreError>;
    async fn save_event_cursor(&self, model: event_cursor::Model) -> Result<(), StoreError>;
}

#[cfg(test)]
#[derive(Default)]
struct MemoryInner {
    pools: HashMap<String, pool::Model>,
    platforms: HashMap<String, platform::Model>,
    tokens: HashMap<String, token::Model>,
    users: HashMap<String, user::Model>,
    positions: HashMap<String, position::Model>,
    stakes: HashMap<String, stake::Model>,
    fundings: HashMap<String, funding::Model>,
    transactions: HashMap<String, transaction::Model>,
    day_data: HashMap<String, pool_day_data::Model>,
    cursors: HashMap<String, event_cursor::Model>,
}

/// Hash-map backed [`EntityStore`], test use only.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_owned()))
    }
}

#[cfg(test)]
#[async_trait]
impl EntityStore for MemoryStore {
    async fn pool(&self, id: &str) -> Result<Option<pool::Model>, StoreError> {
        Ok(self.lock()?.pools.get(id).cloned())
    }

    async fn save_pool(&self, model: pool::Model) -> Result<(), StoreError> {
        self.lock()?.pools.insert(model.id.clone(), model);
        Ok(())
    }

    async fn platform(&self, id: &str) -> Result<Option<platform::Model>, StoreError> {
        Ok(self.lock()?.platforms.get(id).cloned())
    }

    async fn save_platform(&self, model: platform::Model) -> Result<(), StoreError> {
        self.lock()?.platforms.insert(model.id.clone(), model);
        Ok(())
    }

    async fn token(&self, id: &str) -> Result<Option<token::Model>, StoreError> {
        Ok(self.lock()?.tokens.get(id).cloned())
    }

    async fn save_token(&self, model: token::Model) -> Result<(), StoreError> {
        self.lock()?.tokens.insert(model.id.clone(), model);
        Ok(())
    }

    async fn user(&self, id: &str) -> Result<Option<user::Model>, StoreError> {
        Ok(self.lock()?.users.get(id).cloned())
    }

    async fn save_user(&self, model: user::Model) -> Result<(), StoreError> {
        self.lock()?.users.insert(model.id.clone(), model);
        Ok(())
    }

    async fn position(&self, id: &str) -> Result<Option<position::Model>, StoreError> {
        Ok(self.lock()?.positions.get(id).cloned())
    }

    async fn save_position(&self, model: position::Model) -> Result<(), StoreError> {
        self.lock()?.positions.insert(model.id.clone(), model);
        Ok(())
    }

    async fn delete_position(&self, id: &str) -> Result<(), StoreError> {
        self.lock()?.positions.remove(id);
        Ok(())
    }

    async fn stakes_by_position(
        &self,
        position_id: &str,
    ) -> Result<Vec<stake::Model>, StoreError> {
        let mut stakes: Vec<stake::Model> = self
            .lock()?
            .stakes
            .values()
            .filter(|s| s.position_id == position_id)
            .cloned()
            .collect();
        stakes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(stakes)
    }

    async fn save_stake(&self, model: stake::Model) -> Result<(), StoreError> {
        self.lock()?.stakes.insert(model.id.clone(), model);
        Ok(())
    }

    async fn delete_stake(&self, id: &str) -> Result<(), StoreError> {
        self.lock()?.stakes.remove(id);
        Ok(())
    }

    async fn fundings_by_pool(&self, pool_id: &str) -> Result<Vec<funding::Model>, StoreError> {
        let mut fundings: Vec<funding::Model> = self
            .lock()?
            .fundings
            .values()
            .filter(|f| f.pool_id == pool_id)
            .cloned()
            .collect();
        fundings.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(fundings)
    }

    async fn save_funding(&self, model: funding::Model) -> Result<(), StoreError> {
        self.lock()?.fundings.insert(model.id.clone(), model);
        Ok(())
    }

    async fn transaction(&self, id: &str) -> Result<Option<transaction::Model>, StoreError> {
        Ok(self.lock()?.transactions.get(id).cloned())
    }

    async fn save_transaction(&self, model: transaction::Model) -> Result<(), StoreError> {
        self.lock()?.transactions.insert(model.id.clone(), model);
        Ok(())
    }

    async fn pool_day_data(&self, id: &str) -> Result<Option<pool_day_data::Model>, StoreError> {
        Ok(self.lock()?.day_data.get(id).cloned())
    }

    async fn save_pool_day_data(&self, model: pool_day_data::Model) -> Result<(), StoreError> {
        self.lock()?.day_data.insert(model.id.clone(), model);
        Ok(())
    }

    async fn event_cursor(&self, id: &str) -> Result<Option<event_cursor::Model>, StoreError> {
        Ok(self.lock()?.cursors.get(id).cloned())
    }

    async fn save_event_cursor(&self, model: event_cursor::Model) -> Result<(), StoreError> {
        self.lock()?.cursors.insert(model.id.clone(), model);
        Ok(())
    }
}
