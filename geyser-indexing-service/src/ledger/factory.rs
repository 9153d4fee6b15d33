//! Pool registration.

use super::{HandlerError, Ledger};
use crate::chain::ChainReader;
use crate::store::EntityStore;
use geyser_db_entity::db::pool;
use rust_decimal::Decimal;
use tracing::{info, warn};

impl<S: EntityStore, C: ChainReader> Ledger<S, C> {
    pub(crate) async fn handle_pool_registered(
        &mut self,
        pool_id: &str,
        staking_token: &str,
        reward_token: &str,
        reward_module: &str,
        reward_module_type: &str,
        timestamp: i64,
    ) -> Result<(), HandlerError> {
        if self.store.pool(pool_id).await?.is_some() {
            warn!("Pool {} already registered", pool_id);
            return Ok(());
        }
        let mut platform = self.get_or_create_platform().await?;

        let mut staking = self.get_or_create_token(staking_token).await?;
        // pool share staking tokens get a composite symbol
        if let Some(alias) = self.oracle.share_token_alias(staking_token).await? {
            staking.symbol = alias;
        }
        let reward = self.get_or_create_token(reward_token).await?;

        let pool = pool::Model {
            id: pool_id.to_owned(),
            staking_token: staking.id.clone(),
            reward_token: reward.id.clone(),
            reward_module: reward_module.to_owned(),
            reward_module_type: reward_module_type.to_owned(),
            users: 0,
            operations: 0,
            staked: Decimal::ZERO,
            rewards: Decimal::ZERO,
            funded: Decimal::ZERO,
            distributed: Decimal::ZERO,
            gysr_spent: Decimal::ZERO,
            gysr_vested: Decimal::ZERO,
            volume: Decimal::ZERO,
            tvl: Decimal::ZERO,
            updated: timestamp,
        };
        platform.pools += 1;

        info!(
            "Pool registered {} staking {} reward {} module {}",
            pool.id, staking.symbol, reward.symbol, reward_module_type
        );
        self.store.save_token(staking).await?;
        self.store.save_token(reward).await?;
        self.store.save_pool(pool).await?;
        self.store.save_platform(platform).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{envelope, ledger, register_pool, POOL, STAKING};
    use super::*;
    use crate::config::{test_config, ZERO_ADDRESS};
    use crate::events::Event;

    #[tokio::test]
    async fn test_pool_registered_creates_entities() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Competitive").await;

        let pool = ledger.store.pool(POOL).await.unwrap().unwrap();
        assert_eq!(pool.staking_token, STAKING);
        assert_eq!(pool.reward_token, test_config::USDC);
        assert_eq!(pool.reward_module_type, "ERC20Competitive");
        assert_eq!(pool.users, 0);

        let staking = ledger.store.token(STAKING).await.unwrap().unwrap();
        assert_eq!(staking.symbol, "STK");
        assert_eq!(staking.decimals, 18);

        let platform = ledger.store.platform(ZERO_ADDRESS).await.unwrap().unwrap();
        assert_eq!(platform.pools, 1);
        assert!(platform.active_pools.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_ignored() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Competitive").await;
        register_pool(&mut ledger, &chain, "ERC20Competitive").await;

        let platform = ledger.store.platform(ZERO_ADDRESS).await.unwrap().unwrap();
        assert_eq!(platform.pools, 1);
    }

    #[tokio::test]
    async fn test_pool_share_staking_token_gets_alias() {
        let (mut ledger, chain) = ledger();
        chain.set_token("0xlp", "UNI-V2", 18);
        chain.set_token("0xaaa", "AAA", 18);
        chain.set_token("0xbbb", "BBB", 6);
        chain.set_token(test_config::USDC, "USDC", 6);
        chain.set_pair_state("0xlp", "0xaaa", "0xbbb", "1000", "1000");
        chain.set_module_owner("0xmod2", "0xpool2");

        ledger
            .process(&envelope(
                1,
                "0xpool2",
                1000,
                Event::PoolRegistered {
                    staking_token: "0xlp".to_owned(),
                    reward_token: test_config::USDC.to_owned(),
                    reward_module: "0xmod2".to_owned(),
                    reward_module_type: "ERC20Competitive".to_owned(),
                },
            ))
            .await
            .unwrap();

        let staking = ledger.store.token("0xlp").await.unwrap().unwrap();
        assert_eq!(staking.symbol, "AAA-BBB");
    }
}
