//! Event reconciliation engine.
//!
//! Applies decoded on-chain events, one at a time in ordinal order, to the
//! persisted aggregates. Handlers re-derive authoritative values from chain
//! reads where the event payload alone is not trustworthy, so re-applying a
//! partially processed batch converges to the same state.

pub mod factory;
pub mod geyser;
pub mod reward_module;

use crate::chain::{ChainError, ChainReader};
use crate::common::{day_id, day_start};
use crate::config::{PricingConfig, ZERO_ADDRESS};
use crate::events::{Event, EventEnvelope};
use crate::pricing::PriceOracle;
use crate::store::{EntityStore, StoreError};
use geyser_db_entity::db::{
    event_cursor, platform, pool, pool_day_data, token, transaction, user,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const CURSOR_ID: &str = "events";

#[derive(Debug, Error)]
pub enum HandlerError {
    /// The event references an aggregate that was never created. The event
    /// cannot be applied.
    #[error("unknown {kind} {id}")]
    MissingEntity { kind: &'static str, id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

pub struct Ledger<S: EntityStore, C: ChainReader> {
    store: S,
    chain: Arc<C>,
    oracle: PriceOracle<C>,
    cfg: PricingConfig,
}

impl<S: EntityStore, C: ChainReader> Ledger<S, C> {
    pub fn new(store: S, chain: Arc<C>, cfg: PricingConfig) -> Self {
        let oracle = PriceOracle::new(chain.clone(), cfg.clone());
        Ledger {
            store,
            chain,
            oracle,
            cfg,
        }
    }

    /// Apply one event. Callers must feed events strictly in ordinal order.
    pub async fn process(&mut self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let address = envelope.address.to_lowercase();
        match envelope.event.clone() {
            Event::PoolRegistered {
                staking_token,
                reward_token,
                reward_module,
                reward_module_type,
            } => {
                self.handle_pool_registered(
                    &address,
                    &staking_token.to_lowercase(),
                    &reward_token.to_lowercase(),
                    &reward_module.to_lowercase(),
                    &reward_module_type,
                    envelope.block_timestamp,
                )
                .await
            }
            Event::Staked { user, amount, .. } => {
                self.handle_staked(&address, &user.to_lowercase(), &amount, envelope)
                    .await
            }
            Event::Unstaked { user, amount, .. } => {
                self.handle_unstaked(&address, &user.to_lowercase(), &amount, envelope)
                    .await
            }
            Event::RewardsFunded {
                amount, timestamp, ..
            } => {
                self.handle_rewards_funded(&address, &amount, timestamp, envelope)
                    .await
            }
            Event::RewardsDistributed { user, amount } => {
                self.handle_rewards_distributed(&address, &user.to_lowercase(), &amount, envelope)
                    .await
            }
            Event::RewardsExpired { amount, timestamp } => {
                self.handle_rewards_expired(&address, &amount, timestamp, envelope)
                    .await
            }
            Event::RewardsWithdrawn { .. } => {
                self.handle_rewards_withdrawn(&address, envelope).await
            }
            Event::GysrSpent { user, amount } => {
                self.handle_gysr_spent(&address, &user.to_lowercase(), &amount, envelope)
                    .await
            }
            Event::GysrVested { amount, .. } => {
                self.handle_gysr_vested(&address, &amount, envelope).await
            }
        }
    }

    /// Last durably committed event ordinal, zero on a fresh database.
    pub async fn cursor(&self) -> Result<u64, StoreError> {
        Ok(self
            .store
            .event_cursor(CURSOR_ID)
            .await?
            .map(|c| c.ordinal as u64)
            .unwrap_or(0))
    }

    pub async fn commit(&self, ordinal: u64) -> Result<(), StoreError> {
        self.store
            .save_event_cursor(event_cursor::Model {
                id: CURSOR_ID.to_owned(),
                ordinal: ordinal as i64,
            })
            .await
    }

    async fn load_pool(&self, id: &str) -> Result<pool::Model, HandlerError> {
        self.store
            .pool(id)
            .await?
            .ok_or_else(|| HandlerError::MissingEntity {
                kind: "pool",
                id: id.to_owned(),
            })
    }

    async fn load_token(&self, id: &str) -> Result<token::Model, HandlerError> {
        self.store
            .token(id)
            .await?
            .ok_or_else(|| HandlerError::MissingEntity {
                kind: "token",
                id: id.to_owned(),
            })
    }

    async fn load_user(&self, id: &str) -> Result<user::Model, HandlerError> {
        self.store
            .user(id)
            .await?
            .ok_or_else(|| HandlerError::MissingEntity {
                kind: "user",
                id: id.to_owned(),
            })
    }

    /// Resolves the pool that owns a reward module contract.
    async fn pool_for_module(&self, module: &str) -> Result<pool::Model, HandlerError> {
        let pool_id = self.chain.module_owner(module).await?.to_lowercase();
        self.load_pool(&pool_id).await
    }

    async fn get_or_create_user(&self, address: &str) -> Result<user::Model, HandlerError> {
        match self.store.user(address).await? {
            Some(user) => Ok(user),
            None => Ok(user::Model {
                id: address.to_owned(),
                operations: 0,
                earned: Decimal::ZERO,
                gysr_spent: Decimal::ZERO,
            }),
        }
    }

    async fn get_or_create_platform(&self) -> Result<platform::Model, HandlerError> {
        match self.store.platform(ZERO_ADDRESS).await? {
            Some(platform) => Ok(platform),
            None => Ok(platform::Model {
                id: ZERO_ADDRESS.to_owned(),
                pools: 0,
                volume: Decimal::ZERO,
                gysr_spent: Decimal::ZERO,
                gysr_vested: Decimal::ZERO,
                gysr_fees: Decimal::ZERO,
                active_pools: Vec::new(),
                updated: 0,
            }),
        }
    }

    async fn get_or_create_token(&self, address: &str) -> Result<token::Model, HandlerError> {
        if let Some(token) = self.store.token(address).await? {
            return Ok(token);
        }
        let info = self.chain.token_info(address).await?;
        Ok(token::Model {
            id: address.to_owned(),
            symbol: info.symbol,
            decimals: info.decimals,
            price: Decimal::ZERO,
            updated: 0,
        })
    }

    // GysrSpent and RewardsDistributed in the same transaction share one row
    async fn get_or_create_transaction(
        &self,
        envelope: &EventEnvelope,
        pool_id: &str,
        user_id: &str,
    ) -> Result<transaction::Model, HandlerError> {
        let id = envelope.tx_hash.to_lowercase();
        match self.store.transaction(&id).await? {
            Some(transaction) => Ok(transaction),
            None => Ok(transaction::Model {
                id,
                pool_id: pool_id.to_owned(),
                user_id: user_id.to_owned(),
                timestamp: envelope.block_timestamp,
                gysr_spent: None,
                earnings: None,
            }),
        }
    }

    async fn day_data(
        &self,
        pool_id: &str,
        timestamp: i64,
    ) -> Result<pool_day_data::Model, HandlerError> {
        let id = day_id(pool_id, timestamp);
        match self.store.pool_day_data(&id).await? {
            Some(day) => Ok(day),
            None => Ok(pool_day_data::Model {
                id,
                pool_id: pool_id.to_owned(),
                date: day_start(timestamp),
                volume: Decimal::ZERO,
            }),
        }
    }

    /// Accumulate USD volume on the pool, the platform and the pool's
    /// current day bucket.
    async fn add_volume(
        &self,
        pool: &mut pool::Model,
        platform: &mut platform::Model,
        timestamp: i64,
        dollars: Decimal,
    ) -> Result<(), HandlerError> {
        pool.volume += dollars;
        platform.volume += dollars;
        let mut day = self.day_data(&pool.id, timestamp).await?;
        day.volume += dollars;
        self.store.save_pool_day_data(day).await?;
        Ok(())
    }

    /// Reprice both pool tokens and refresh the pool's TVL. Token rows are
    /// saved here; the pool itself is saved by the caller.
    async fn update_pool(
        &mut self,
        pool: &mut pool::Model,
        timestamp: i64,
    ) -> Result<(), HandlerError> {
        let mut staking = self.get_or_create_token(&pool.staking_token).await?;
        staking.price = self.oracle.price_of(&staking.id, staking.decimals).await?;
        staking.updated = timestamp;
        let mut reward = self.get_or_create_token(&pool.reward_token).await?;
        reward.price = self.oracle.price_of(&reward.id, reward.decimals).await?;
        reward.updated = timestamp;
        pool.tvl = pool.staked * staking.price + pool.rewards * reward.price;
        pool.updated = timestamp;
        self.store.save_token(staking).await?;
        self.store.save_token(reward).await?;
        Ok(())
    }

    /// Active pricing set admission, idempotent.
    fn admit_active_pool(&self, platform: &mut platform::Model, pool: &pool::Model) {
        if pool.tvl > self.cfg.pricing_min_tvl && !platform.active_pools.contains(&pool.id) {
            info!("Adding pool {} to active pricing set", pool.id);
            platform.active_pools.push(pool.id.clone());
        }
    }

    /// Reprice the active pool set and evict pools whose TVL has fallen
    /// below the threshold. Runs at most once per pricing period; `current`
    /// was already repriced by the calling handler and is not reloaded.
    async fn update_platform(
        &mut self,
        platform: &mut platform::Model,
        timestamp: i64,
        current: &pool::Model,
    ) -> Result<(), HandlerError> {
        if timestamp < platform.updated + self.cfg.pricing_period {
            return Ok(());
        }
        let mut retained = Vec::with_capacity(platform.active_pools.len());
        for pool_id in platform.active_pools.clone() {
            let tvl = if pool_id == current.id {
                current.tvl
            } else {
                let mut pool = match self.store.pool(&pool_id).await? {
                    Some(pool) => pool,
                    None => continue,
                };
                self.update_pool(&mut pool, timestamp).await?;
                let tvl = pool.tvl;
                self.store.save_pool(pool).await?;
                tvl
            };
            if tvl > self.cfg.pricing_min_tvl {
                retained.push(pool_id);
            } else {
                info!(
                    "Removing pool {} from active pricing set, tvl {}",
                    pool_id, tvl
                );
            }
        }
        platform.active_pools = retained;
        platform.updated = timestamp;
        Ok(())
    }
}
