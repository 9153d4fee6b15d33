//! Reward module event handling: funding lifecycle, distribution, GYSR
//! fee-token accounting. Module events carry the reward module's address;
//! the owning pool is resolved through the chain's `module_owner` read.

use super::{HandlerError, Ledger};
use crate::chain::{ChainError, ChainReader};
use crate::common::integer_to_decimal;
use crate::events::EventEnvelope;
use crate::store::EntityStore;
use geyser_db_entity::db::{funding, pool, token};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Module variants whose funding schedules live in on-chain funding slots.
const BASE_REWARD_MODULE_TYPES: [&str; 2] = ["ERC20Competitive", "ERC20Friendly"];
const LINEAR_REWARD_MODULE_TYPE: &str = "ERC20Linear";

/// The GYSR fee token always carries 18 decimals; it is the only token whose
/// precision is assumed rather than read from chain.
const GYSR_DECIMALS: i32 = 18;

impl<S: EntityStore, C: ChainReader> Ledger<S, C> {
    pub(crate) async fn handle_rewards_funded(
        &mut self,
        module: &str,
        amount_raw: &str,
        start_timestamp: i64,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let mut pool = self.pool_for_module(module).await?;
        let reward_token = self.load_token(&pool.reward_token).await?;
        let mut platform = self.get_or_create_platform().await?;

        let amount = integer_to_decimal(amount_raw, reward_token.decimals);
        pool.rewards += amount;
        pool.funded += amount;

        if BASE_REWARD_MODULE_TYPES.contains(&pool.reward_module_type.as_str()) {
            self.fund_competitive(module, &pool, &reward_token, amount, envelope)
                .await?;
        } else if pool.reward_module_type == LINEAR_REWARD_MODULE_TYPE {
            self.fund_linear(module, &pool, &reward_token, amount, start_timestamp, envelope)
                .await?;
        } else {
            warn!(
                "Unknown reward module type {} for pool {}, no funding recorded",
                pool.reward_module_type, pool.id
            );
        }

        self.update_pool(&mut pool, envelope.block_timestamp).await?;
        self.admit_active_pool(&mut platform, &pool);
        self.update_platform(&mut platform, envelope.block_timestamp, &pool)
            .await?;

        info!(
            "Rewards funded {} {} {}",
            pool.id, reward_token.symbol, amount
        );
        self.store.save_pool(pool).await?;
        self.store.save_platform(platform).await?;
        Ok(())
    }

    // competitive/friendly modules expose the full schedule in their newest
    // funding slot
    async fn fund_competitive(
        &mut self,
        module: &str,
        pool: &pool::Model,
        reward_token: &token::Model,
        amount: Decimal,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let count = self.chain.funding_count(module).await?;
        if count == 0 {
            return Err(ChainError::Response(format!(
                "no funding slots on chain for module {}",
                module
            ))
            .into());
        }
        let schedule = self.chain.funding_schedule(module, count - 1).await?;
        self.store
            .save_funding(funding::Model {
                id: format!("{}_{}", pool.id, envelope.block_timestamp),
                pool_id: pool.id.clone(),
                token_id: reward_token.id.clone(),
                created: envelope.block_timestamp,
                start: schedule.start,
                end: schedule.end,
                original_amount: amount,
                cleaned: false,
            })
            .await?;
        Ok(())
    }

    // linear modules vest over a fixed period from the funding start
    async fn fund_linear(
        &mut self,
        module: &str,
        pool: &pool::Model,
        reward_token: &token::Model,
        amount: Decimal,
        start_timestamp: i64,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let period = self.chain.module_period(module).await?;
        self.store
            .save_funding(funding::Model {
                id: format!("{}_{}", pool.id, envelope.block_timestamp),
                pool_id: pool.id.clone(),
                token_id: reward_token.id.clone(),
                created: envelope.block_timestamp,
                start: start_timestamp,
                end: start_timestamp + period,
                original_amount: amount,
                cleaned: false,
            })
            .await?;
        Ok(())
    }

    pub(crate) async fn handle_gysr_spent(
        &mut self,
        module: &str,
        user_addr: &str,
        amount_raw: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let mut pool = self.pool_for_module(module).await?;
        let mut platform = self.get_or_create_platform().await?;
        let mut user = self.load_user(user_addr).await?;

        let amount = integer_to_decimal(amount_raw, GYSR_DECIMALS);
        let mut transaction = self
            .get_or_create_transaction(envelope, &pool.id, &user.id)
            .await?;
        transaction.gysr_spent = Some(amount);

        platform.gysr_spent += amount;
        pool.gysr_spent += amount;
        user.gysr_spent += amount;

        let gysr_address = self.cfg.gysr_token.clone();
        let mut gysr = self.get_or_create_token(&gysr_address).await?;
        gysr.price = self.oracle.price_of(&gysr.id, gysr.decimals).await?;
        gysr.updated = envelope.block_timestamp;

        let dollars = amount * gysr.price;
        self.add_volume(&mut pool, &mut platform, envelope.block_timestamp, dollars)
            .await?;

        self.store.save_pool(pool).await?;
        self.store.save_transaction(transaction).await?;
        self.store.save_user(user).await?;
        self.store.save_platform(platform).await?;
        self.store.save_token(gysr).await?;
        Ok(())
    }

    pub(crate) async fn handle_gysr_vested(
        &mut self,
        module: &str,
        amount_raw: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let mut pool = self.pool_for_module(module).await?;
        let mut platform = self.get_or_create_platform().await?;

        let amount = integer_to_decimal(amount_raw, GYSR_DECIMALS);
        platform.gysr_vested += amount;
        // constant fee rate assumption; the on-chain rate is configurable
        platform.gysr_fees += amount * self.cfg.gysr_fee;
        pool.gysr_vested += amount;

        let day = self.day_data(&pool.id, envelope.block_timestamp).await?;
        self.store.save_pool_day_data(day).await?;
        self.store.save_platform(platform).await?;
        self.store.save_pool(pool).await?;
        Ok(())
    }

    pub(crate) async fn handle_rewards_distributed(
        &mut self,
        module: &str,
        user_addr: &str,
        amount_raw: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let mut pool = self.pool_for_module(module).await?;
        let mut reward_token = self.load_token(&pool.reward_token).await?;
        let mut platform = self.get_or_create_platform().await?;
        let mut user = self.load_user(user_addr).await?;

        let amount = integer_to_decimal(amount_raw, reward_token.decimals);
        pool.rewards -= amount;
        pool.distributed += amount;

        reward_token.price = self
            .oracle
            .price_of(&reward_token.id, reward_token.decimals)
            .await?;
        reward_token.updated = envelope.block_timestamp;

        let dollars = amount * reward_token.price;
        self.add_volume(&mut pool, &mut platform, envelope.block_timestamp, dollars)
            .await?;
        user.earned += dollars;

        let mut transaction = self
            .get_or_create_transaction(envelope, &pool.id, &user.id)
            .await?;
        transaction.earnings = Some(amount);

        self.store.save_pool(pool).await?;
        self.store.save_token(reward_token).await?;
        self.store.save_transaction(transaction).await?;
        self.store.save_user(user).await?;
        self.store.save_platform(platform).await?;
        Ok(())
    }

    pub(crate) async fn handle_rewards_expired(
        &mut self,
        module: &str,
        amount_raw: &str,
        start_timestamp: i64,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let pool = self.pool_for_module(module).await?;
        let reward_token = self.load_token(&pool.reward_token).await?;
        let amount = integer_to_decimal(amount_raw, reward_token.decimals);

        // fundings sharing an identical (start, amount) tuple cannot be
        // told apart; the oldest match is taken
        let fundings = self.store.fundings_by_pool(&pool.id).await?;
        let matched = fundings.into_iter().find(|f| {
            f.start == start_timestamp
                && f.original_amount == amount
                && f.end < envelope.block_timestamp
                && !f.cleaned
        });
        match matched {
            Some(mut funding) => {
                funding.cleaned = true;
                self.store.save_funding(funding).await?;
            }
            None => {
                warn!(
                    "No funding matched expiry on pool {}: start {} amount {}",
                    pool.id, start_timestamp, amount
                );
            }
        }
        Ok(())
    }

    pub(crate) async fn handle_rewards_withdrawn(
        &mut self,
        module: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let mut pool = self.pool_for_module(module).await?;
        let mut platform = self.get_or_create_platform().await?;

        self.update_pool(&mut pool, envelope.block_timestamp).await?;
        self.admit_active_pool(&mut platform, &pool);
        self.update_platform(&mut platform, envelope.block_timestamp, &pool)
            .await?;

        self.store.save_pool(pool).await?;
        self.store.save_platform(platform).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{envelope, ledger, register_pool, ALICE, MODULE, POOL};
    use super::*;
    use crate::config::{test_config, ZERO_ADDRESS};
    use crate::events::Event;
    use geyser_db_entity::db::user;

    fn funded(ordinal: u64, block_ts: i64, amount: &str, start: i64) -> EventEnvelope {
        envelope(
            ordinal,
            MODULE,
            block_ts,
            Event::RewardsFunded {
                amount: amount.to_owned(),
                shares: amount.to_owned(),
                timestamp: start,
            },
        )
    }

    async fn seed_user(ledger: &super::super::Ledger<crate::store::MemoryStore, crate::chain::mock::MockChain>) {
        ledger
            .store
            .save_user(user::Model {
                id: ALICE.to_owned(),
                operations: 1,
                earned: Decimal::ZERO,
                gysr_spent: Decimal::ZERO,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rewards_funded_competitive() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Competitive").await;
        chain.push_funding_schedule(MODULE, 5000, 90000);

        // 20000 USDC of rewards
        ledger
            .process(&funded(2, 5000, "20000000000", 5000))
            .await
            .unwrap();

        let pool = ledger.store.pool(POOL).await.unwrap().unwrap();
        assert_eq!(pool.rewards, Decimal::from(20000));
        assert_eq!(pool.funded, Decimal::from(20000));
        // stablecoin reward prices at 1.0, so tvl covers the funded rewards
        assert_eq!(pool.tvl, Decimal::from(20000));

        let fundings = ledger.store.fundings_by_pool(POOL).await.unwrap();
        assert_eq!(fundings.len(), 1);
        assert_eq!(fundings[0].start, 5000);
        assert_eq!(fundings[0].end, 90000);
        assert_eq!(fundings[0].original_amount, Decimal::from(20000));
        assert!(!fundings[0].cleaned);

        // above the 10000 tvl threshold, admitted exactly once
        let platform = ledger.store.platform(ZERO_ADDRESS).await.unwrap().unwrap();
        assert_eq!(platform.active_pools, vec![POOL.to_owned()]);

        chain.push_funding_schedule(MODULE, 6000, 91000);
        ledger
            .process(&funded(3, 6000, "1000000000", 6000))
            .await
            .unwrap();
        let platform = ledger.store.platform(ZERO_ADDRESS).await.unwrap().unwrap();
        assert_eq!(platform.active_pools.len(), 1);
    }

    #[tokio::test]
    async fn test_rewards_funded_linear() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Linear").await;
        chain.set_module_period(MODULE, 86400);

        ledger
            .process(&funded(2, 5000, "1000000000", 5000))
            .await
            .unwrap();

        let fundings = ledger.store.fundings_by_pool(POOL).await.unwrap();
        assert_eq!(fundings.len(), 1);
        assert_eq!(fundings[0].start, 5000);
        assert_eq!(fundings[0].end, 91400);
    }

    #[tokio::test]
    async fn test_unknown_module_type_records_no_funding() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Mystery").await;

        ledger
            .process(&funded(2, 5000, "1000000000", 5000))
            .await
            .unwrap();

        let pool = ledger.store.pool(POOL).await.unwrap().unwrap();
        assert_eq!(pool.rewards, Decimal::from(1000));
        assert!(ledger.store.fundings_by_pool(POOL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gysr_spent_accumulates_usd_volume() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Competitive").await;
        seed_user(&ledger).await;

        // GYSR prices at 0.02 USD: 100000 GYSR against 2000 USDC
        chain.set_token(test_config::GYSR, "GYSR", 18);
        chain.set_pair(
            test_config::FACTORY_A,
            test_config::GYSR,
            test_config::USDC,
            "0xgysrpair",
        );
        chain.set_pair_state(
            "0xgysrpair",
            test_config::GYSR,
            test_config::USDC,
            "100000000000000000000000",
            "2000000000",
        );

        ledger
            .process(&envelope(
                2,
                MODULE,
                2000,
                Event::GysrSpent {
                    user: ALICE.to_owned(),
                    amount: "5000000000000000000".to_owned(),
                },
            ))
            .await
            .unwrap();

        let expected = "0.1".parse::<Decimal>().unwrap();
        let platform = ledger.store.platform(ZERO_ADDRESS).await.unwrap().unwrap();
        assert_eq!(platform.gysr_spent, Decimal::from(5));
        assert_eq!(platform.volume, expected);
        let pool = ledger.store.pool(POOL).await.unwrap().unwrap();
        assert_eq!(pool.gysr_spent, Decimal::from(5));
        assert_eq!(pool.volume, expected);
        let day = ledger
            .store
            .pool_day_data(&crate::common::day_id(POOL, 2000))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(day.volume, expected);
        let user = ledger.store.user(ALICE).await.unwrap().unwrap();
        assert_eq!(user.gysr_spent, Decimal::from(5));
        let transaction = ledger.store.transaction("0xtx2").await.unwrap().unwrap();
        assert_eq!(transaction.gysr_spent, Some(Decimal::from(5)));
    }

    #[tokio::test]
    async fn test_gysr_vested_derives_fees() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Competitive").await;

        ledger
            .process(&envelope(
                2,
                MODULE,
                2000,
                Event::GysrVested {
                    user: ALICE.to_owned(),
                    amount: "10000000000000000000".to_owned(),
                },
            ))
            .await
            .unwrap();

        let platform = ledger.store.platform(ZERO_ADDRESS).await.unwrap().unwrap();
        assert_eq!(platform.gysr_vested, Decimal::from(10));
        assert_eq!(platform.gysr_fees, Decimal::from(2));
        let pool = ledger.store.pool(POOL).await.unwrap().unwrap();
        assert_eq!(pool.gysr_vested, Decimal::from(10));
    }

    #[tokio::test]
    async fn test_rewards_distributed_moves_rewards_and_credits_user() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Competitive").await;
        seed_user(&ledger).await;
        chain.push_funding_schedule(MODULE, 5000, 90000);
        ledger
            .process(&funded(2, 5000, "1000000000", 5000))
            .await
            .unwrap();

        ledger
            .process(&envelope(
                3,
                MODULE,
                6000,
                Event::RewardsDistributed {
                    user: ALICE.to_owned(),
                    amount: "400000000".to_owned(),
                },
            ))
            .await
            .unwrap();

        let pool = ledger.store.pool(POOL).await.unwrap().unwrap();
        assert_eq!(pool.rewards, Decimal::from(600));
        assert_eq!(pool.distributed, Decimal::from(400));
        assert_eq!(pool.rewards, pool.funded - pool.distributed);

        // stablecoin reward at 1.0 USD
        let user = ledger.store.user(ALICE).await.unwrap().unwrap();
        assert_eq!(user.earned, Decimal::from(400));
        let transaction = ledger.store.transaction("0xtx3").await.unwrap().unwrap();
        assert_eq!(transaction.earnings, Some(Decimal::from(400)));
        let platform = ledger.store.platform(ZERO_ADDRESS).await.unwrap().unwrap();
        assert_eq!(platform.volume, Decimal::from(400));
    }

    #[tokio::test]
    async fn test_rewards_expired_marks_first_match_only() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Competitive").await;

        // two fundings with identical start and amount
        chain.push_funding_schedule(MODULE, 5000, 6000);
        ledger
            .process(&funded(2, 5000, "1000000000", 5000))
            .await
            .unwrap();
        chain.push_funding_schedule(MODULE, 5000, 6000);
        ledger
            .process(&funded(3, 5001, "1000000000", 5000))
            .await
            .unwrap();

        ledger
            .process(&envelope(
                4,
                MODULE,
                10000,
                Event::RewardsExpired {
                    amount: "1000000000".to_owned(),
                    timestamp: 5000,
                },
            ))
            .await
            .unwrap();

        let fundings = ledger.store.fundings_by_pool(POOL).await.unwrap();
        assert_eq!(fundings.len(), 2);
        assert!(fundings[0].cleaned);
        assert!(!fundings[1].cleaned);

        // a second identical expiry moves on to the next match
        ledger
            .process(&envelope(
                5,
                MODULE,
                10001,
                Event::RewardsExpired {
                    amount: "1000000000".to_owned(),
                    timestamp: 5000,
                },
            ))
            .await
            .unwrap();
        let fundings = ledger.store.fundings_by_pool(POOL).await.unwrap();
        assert!(fundings[0].cleaned);
        assert!(fundings[1].cleaned);
    }

    #[tokio::test]
    async fn test_platform_sweep_evicts_low_tvl_pool() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Competitive").await;
        seed_user(&ledger).await;

        chain.push_funding_schedule(MODULE, 5000, 90000);
        ledger
            .process(&funded(2, 5000, "20000000000", 5000))
            .await
            .unwrap();
        let platform = ledger.store.platform(ZERO_ADDRESS).await.unwrap().unwrap();
        assert_eq!(platform.active_pools, vec![POOL.to_owned()]);
        // still inside the pricing period, so the sweep has not run
        assert_eq!(platform.updated, 0);

        // drain the rewards backing the pool's value
        ledger
            .process(&envelope(
                3,
                MODULE,
                6000,
                Event::RewardsDistributed {
                    user: ALICE.to_owned(),
                    amount: "19500000000".to_owned(),
                },
            ))
            .await
            .unwrap();

        chain.push_funding_schedule(MODULE, 90000, 180000);
        ledger
            .process(&funded(4, 90000, "500000000", 90000))
            .await
            .unwrap();

        let pool = ledger.store.pool(POOL).await.unwrap().unwrap();
        assert_eq!(pool.tvl, Decimal::from(1000));
        let platform = ledger.store.platform(ZERO_ADDRESS).await.unwrap().unwrap();
        assert!(platform.active_pools.is_empty());
        assert_eq!(platform.updated, 90000);
    }

    #[tokio::test]
    async fn test_rewards_withdrawn_refreshes_pricing_and_active_set() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Competitive").await;
        seed_user(&ledger).await;

        chain.push_funding_schedule(MODULE, 5000, 90000);
        ledger
            .process(&funded(2, 5000, "20000000000", 5000))
            .await
            .unwrap();
        ledger
            .process(&envelope(
                3,
                MODULE,
                6000,
                Event::RewardsDistributed {
                    user: ALICE.to_owned(),
                    amount: "19900000000".to_owned(),
                },
            ))
            .await
            .unwrap();

        // within the pricing period: tvl is refreshed, eviction waits
        ledger
            .process(&envelope(
                4,
                MODULE,
                7000,
                Event::RewardsWithdrawn {
                    amount: "19900000000".to_owned(),
                },
            ))
            .await
            .unwrap();
        let pool = ledger.store.pool(POOL).await.unwrap().unwrap();
        assert_eq!(pool.tvl, Decimal::from(100));
        assert_eq!(pool.updated, 7000);
        let platform = ledger.store.platform(ZERO_ADDRESS).await.unwrap().unwrap();
        assert_eq!(platform.active_pools, vec![POOL.to_owned()]);

        // past the pricing period the sweep drops the drained pool
        ledger
            .process(&envelope(
                5,
                MODULE,
                90000,
                Event::RewardsWithdrawn {
                    amount: "0".to_owned(),
                },
            ))
            .await
            .unwrap();
        let platform = ledger.store.platform(ZERO_ADDRESS).await.unwrap().unwrap();
        assert!(platform.active_pools.is_empty());
        assert_eq!(platform.updated, 90000);
    }

    #[tokio::test]
    async fn test_rewards_expired_ignores_unexpired_fundings() {
        let (mut ledger, chain) = ledger();
        register_pool(&mut ledger, &chain, "ERC20Competitive").await;
        chain.push_funding_schedule(MODULE, 5000, 90000);
        ledger
            .process(&funded(2, 5000, "1000000000", 5000))
            .await
            .unwrap();

        // end is still in the future at block time 6000
        ledger
            .process(&envelope(
                3,
                MODULE,
                6000,
                Event::RewardsExpired {
                    amount: "1000000000".to_owned(),
                    timestamp: 5000,
                },
            ))
            .await
            .unwrap();

        let fundings = ledger.store.fundings_by_pool(POOL).await.unwrap();
        assert!(!fundings[0].cleaned);
    }
}
