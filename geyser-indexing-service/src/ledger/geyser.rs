//! Staking position bookkeeping: stake slot mirroring and the unstake
//! tail-truncation reconciliation.

use super::{HandlerError, Ledger};
use crate::chain::{ChainError, ChainReader};
use crate::common::integer_to_decimal;
use crate::events::EventEnvelope;
use crate::store::EntityStore;
use geyser_db_entity::db::{position, stake};
use rust_decimal::Decimal;
use tracing::error;

/// Splits a position's persisted stakes (oldest first) against the
/// authoritative on-chain slot count. Stakes are consumed oldest first on
/// chain, so any shrinkage shows up as missing slots at the tail.
fn split_surviving(
    stakes: Vec<stake::Model>,
    count: usize,
) -> (Vec<stake::Model>, Vec<stake::Model>) {
    let mut surviving = stakes;
    let truncated = surviving.split_off(count.min(surviving.len()));
    (surviving, truncated)
}

impl<S: EntityStore, C: ChainReader> Ledger<S, C> {
    pub(crate) async fn handle_staked(
        &mut self,
        pool_id: &str,
        user_addr: &str,
        amount: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let mut pool = self.load_pool(pool_id).await?;
        let staking_token = self.load_token(&pool.staking_token).await?;
        let mut user = self.get_or_create_user(user_addr).await?;

        let position_id = format!("{}_{}", pool.id, user.id);
        let mut position = match self.store.position(&position_id).await? {
            Some(position) => position,
            None => {
                pool.users += 1;
                position::Model {
                    id: position_id.clone(),
                    user_id: user.id.clone(),
                    pool_id: pool.id.clone(),
                    shares: Decimal::ZERO,
                }
            }
        };

        // share accounting can apply bonus or decay factors not present in
        // the event payload; the freshly written chain slot is authoritative
        let count = self.chain.stake_count(&pool.id, &user.id).await?;
        if count == 0 {
            return Err(ChainError::Response(format!(
                "no stake slots on chain for {} in {}",
                user.id, pool.id
            ))
            .into());
        }
        let slot = self.chain.user_stake(&pool.id, &user.id, count - 1).await?;
        let shares = integer_to_decimal(&slot.shares, staking_token.decimals);

        let stake = stake::Model {
            id: format!("{}_{}", position_id, envelope.block_timestamp),
            position_id: position_id.clone(),
            user_id: user.id.clone(),
            pool_id: pool.id.clone(),
            shares,
            timestamp: envelope.block_timestamp,
        };

        position.shares += shares;
        pool.staked += integer_to_decimal(amount, staking_token.decimals);
        user.operations += 1;
        pool.operations += 1;
        pool.updated = envelope.block_timestamp;

        self.store.save_stake(stake).await?;
        self.store.save_position(position).await?;
        self.store.save_user(user).await?;
        self.store.save_pool(pool).await?;
        Ok(())
    }

    pub(crate) async fn handle_unstaked(
        &mut self,
        pool_id: &str,
        user_addr: &str,
        amount: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let mut pool = self.load_pool(pool_id).await?;
        let staking_token = self.load_token(&pool.staking_token).await?;
        let mut user = self.load_user(user_addr).await?;

        let position_id = format!("{}_{}", pool.id, user.id);
        let mut position =
            self.store
                .position(&position_id)
                .await?
                .ok_or_else(|| HandlerError::MissingEntity {
                    kind: "position",
                    id: position_id.clone(),
                })?;

        let count = self.chain.stake_count(&pool.id, &user.id).await?;
        let stakes = self.store.stakes_by_position(&position_id).await?;
        let (surviving, truncated) = split_surviving(stakes, count as usize);
        for stake in truncated {
            self.store.delete_stake(&stake.id).await?;
        }

        // the newest surviving slot may have been partially consumed
        if let Some(last) = surviving.last() {
            let index = surviving.len() as u64 - 1;
            let slot = self.chain.user_stake(&pool.id, &user.id, index).await?;
            if slot.timestamp != last.timestamp {
                error!(
                    "Stake timestamps not equal: {} != {}",
                    last.timestamp, slot.timestamp
                );
            }
            let mut refreshed = last.clone();
            refreshed.shares = integer_to_decimal(&slot.shares, staking_token.decimals);
            self.store.save_stake(refreshed).await?;
        }

        // re-derive from the on-chain aggregate rather than summing local
        // stake rows, so any drift self-corrects here
        let totals = self.chain.user_totals(&pool.id, &user.id).await?;
        position.shares = integer_to_decimal(&totals.shares, staking_token.decimals);

        pool.staked -= integer_to_decimal(amount, staking_token.decimals);
        user.operations += 1;
        pool.operations += 1;
        pool.updated = envelope.block_timestamp;

        if position.shares.is_zero() {
            self.store.delete_position(&position_id).await?;
        } else {
            self.store.save_position(position).await?;
        }
        self.store.save_user(user).await?;
        self.store.save_pool(pool).await?;
        Ok(())
    }
}
