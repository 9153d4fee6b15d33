//! Managed vault share valuation.
//!
//! Vault holdings are actively rebalanced and carry no balance invariant,
//! so the share price is the exact sum of both sides. If either constituent
//! cannot be priced the share is unpriced.

use super::PriceOracle;
use crate::chain::{ChainError, ChainReader};
use crate::common::integer_to_decimal;
use rust_decimal::Decimal;

impl<C: ChainReader> PriceOracle<C> {
    pub(crate) async fn vault_share_price(&self, address: &str) -> Result<Decimal, ChainError> {
        let balances = match self.chain.vault_balances(address).await? {
            Some(balances) => balances,
            None => return Ok(Decimal::ZERO),
        };
        let info0 = self.chain.token_info(&balances.token0).await?;
        let info1 = self.chain.token_info(&balances.token1).await?;
        let price0 = self.base_price(&balances.token0, info0.decimals).await?;
        let price1 = self.base_price(&balances.token1, info1.decimals).await?;
        if price0.is_zero() || price1.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let total = price0 * integer_to_decimal(&balances.amount0, info0.decimals)
            + price1 * integer_to_decimal(&balances.amount1, info1.decimals);
        let supply = integer_to_decimal(&self.chain.total_supply(address).await?, 18);
        Ok(total.checked_div(supply).unwrap_or(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::config::test_config::{self, USDC, USD_NATIVE_PAIR, WNATIVE};
    use std::sync::Arc;

    fn oracle(chain: Arc<MockChain>) -> PriceOracle<MockChain> {
        PriceOracle::new(chain, test_config::pricing())
    }

    #[tokio::test]
    async fn test_vault_share_price_sums_both_sides() {
        let chain = Arc::new(MockChain::default());
        // native reference: one native is 2500 USD
        chain.set_pair_state(
            USD_NATIVE_PAIR,
            WNATIVE,
            USDC,
            "1000000000000000000000",
            "2500000000000",
        );
        // 1000 USDC plus 2 native, 10 shares outstanding
        chain.set_vault("0xvault", USDC, WNATIVE, "1000000000", "2000000000000000000");
        chain.set_total_supply("0xvault", "10000000000000000000");
        chain.set_token(USDC, "USDC", 6);
        chain.set_token(WNATIVE, "WNATIVE", 18);
        let oracle = oracle(chain);
        assert_eq!(
            oracle.vault_share_price("0xvault").await.unwrap(),
            Decimal::from(600)
        );
    }

    #[tokio::test]
    async fn test_vault_unpriced_when_either_side_unpriced() {
        let chain = Arc::new(MockChain::default());
        chain.set_vault("0xvault", USDC, "0xmystery", "1000000000", "1000");
        chain.set_total_supply("0xvault", "10000000000000000000");
        chain.set_token(USDC, "USDC", 6);
        chain.set_token("0xmystery", "MYST", 18);
        let oracle = oracle(chain);
        assert_eq!(
            oracle.vault_share_price("0xvault").await.unwrap(),
            Decimal::ZERO
        );
    }
}
