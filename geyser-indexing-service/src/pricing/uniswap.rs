//! Constant-product exchange pricing: reference pair reads, the factory
//! pair search for ordinary tokens, and pair share token valuation.

use super::PriceOracle;
use crate::chain::{ChainError, ChainReader};
use crate::common::integer_to_decimal;
use crate::config::ZERO_ADDRESS;
use rust_decimal::Decimal;
use tracing::warn;

impl<C: ChainReader> PriceOracle<C> {
    /// USD price of the wrapped native token, from the configured
    /// native/USD reference pair.
    pub(crate) async fn native_price(&self) -> Result<Decimal, ChainError> {
        self.reference_pair_price(&self.cfg.usd_native_pair).await
    }

    /// USD price of bridged WETH on non-Ethereum networks. Zero when no
    /// reference pair is configured.
    pub(crate) async fn eth_price(&self) -> Result<Decimal, ChainError> {
        match self.cfg.usd_weth_pair.as_deref() {
            Some(pair) => self.reference_pair_price(pair).await,
            None => Ok(Decimal::ZERO),
        }
    }

    // Reference pairs are configured base-first: token0 is the priced asset
    // at 18 decimals, token1 the USD quote at usd_pair_quote_decimals.
    async fn reference_pair_price(&self, pair: &str) -> Result<Decimal, ChainError> {
        let state = match self.chain.pair_state(pair).await? {
            Some(state) => state,
            None => {
                warn!("Reference pair {} has no reserves", pair);
                return Ok(Decimal::ZERO);
            }
        };
        let base = integer_to_decimal(&state.reserve0, 18);
        let quote = integer_to_decimal(&state.reserve1, self.cfg.usd_pair_quote_decimals);
        Ok(quote.checked_div(base).unwrap_or(Decimal::ZERO))
    }

    fn quote_candidates(&self) -> Vec<(String, i32)> {
        let mut candidates = vec![(self.cfg.wrapped_native.clone(), 18)];
        for (stable, decimals) in self
            .cfg
            .stablecoins
            .iter()
            .zip(&self.cfg.stablecoin_decimals)
        {
            candidates.push((stable.clone(), *decimals));
        }
        if let Some(ref weth) = self.cfg.weth {
            if *weth != self.cfg.wrapped_native {
                candidates.push((weth.clone(), 18));
            }
        }
        candidates
    }

    /// Search the configured factories for a pair against a known quote
    /// token and derive the USD price from its reserves. The first pair
    /// whose quote side clears `min_usd_pricing` wins; deeper pairs behind
    /// it are never consulted.
    pub(crate) async fn exchange_price(
        &self,
        address: &str,
        decimals: i32,
    ) -> Result<Decimal, ChainError> {
        for factory in &self.cfg.factories {
            for (quote, quote_decimals) in self.quote_candidates() {
                if quote == address {
                    continue;
                }
                let pair = match self.chain.get_pair(factory, address, &quote).await? {
                    Some(pair) if pair != ZERO_ADDRESS => pair,
                    _ => continue,
                };
                let state = match self.chain.pair_state(&pair).await? {
                    Some(state) => state,
                    None => continue,
                };
                let (token_raw, quote_raw) = if state.token0 == address {
                    (state.reserve0, state.reserve1)
                } else {
                    (state.reserve1, state.reserve0)
                };
                let mut quote_usd = integer_to_decimal(&quote_raw, quote_decimals);
                if quote == self.cfg.wrapped_native {
                    quote_usd *= self.native_price().await?;
                } else if self.cfg.weth.as_deref() == Some(&quote) {
                    quote_usd *= self.eth_price().await?;
                }
                if quote_usd <= self.cfg.min_usd_pricing {
                    continue;
                }
                let token_amount = integer_to_decimal(&token_raw, decimals);
                return Ok(quote_usd.checked_div(token_amount).unwrap_or(Decimal::ZERO));
            }
        }
        Ok(Decimal::ZERO)
    }

    /// USD price of one pair share token. The share value is twice the
    /// priced side of the reserves; reserves are assumed balanced, so the
    /// unpriced side is taken to hold equal value.
    pub(crate) async fn pair_share_price(&self, address: &str) -> Result<Decimal, ChainError> {
        let state = match self.chain.pair_state(address).await? {
            Some(state) => state,
            None => return Ok(Decimal::ZERO),
        };
        let supply = integer_to_decimal(&self.chain.total_supply(address).await?, 18);
        if supply.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let info0 = self.chain.token_info(&state.token0).await?;
        let price0 = self.base_price(&state.token0, info0.decimals).await?;
        if price0 > Decimal::ZERO {
            let side = price0 * integer_to_decimal(&state.reserve0, info0.decimals);
            return Ok((Decimal::TWO * side)
                .checked_div(supply)
                .unwrap_or(Decimal::ZERO));
        }
        let info1 = self.chain.token_info(&state.token1).await?;
        let price1 = self.base_price(&state.token1, info1.decimals).await?;
        if price1 > Decimal::ZERO {
            let side = price1 * integer_to_decimal(&state.reserve1, info1.decimals);
            return Ok((Decimal::TWO * side)
                .checked_div(supply)
                .unwrap_or(Decimal::ZERO));
        }
        Ok(Decimal::ZERO)
    }
}
