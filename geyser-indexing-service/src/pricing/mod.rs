//! USD price discovery.
//!
//! Resolution order: stablecoin shortcut, wrapped-native / WETH reference
//! pairs, exchange pair search across the configured factories, then
//! pool-share valuation for tokens that turn out to be liquidity tokens.
//! An unpriced token resolves to zero, never to an error; transport failures
//! against the chain API are the only error path.

pub mod uniswap;
pub mod vault;

use crate::chain::{ChainError, ChainReader};
use crate::config::PricingConfig;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Structural classification of a token, detected once by capability
/// probing and cached for the life of the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ordinary,
    /// Constant-product pair share token.
    Pair,
    /// Managed/rebalancing vault share token.
    Vault,
}

pub struct PriceOracle<C: ChainReader> {
    chain: Arc<C>,
    cfg: PricingConfig,
    kinds: HashMap<String, TokenKind>,
}

impl<C: ChainReader> PriceOracle<C> {
    pub fn new(chain: Arc<C>, cfg: PricingConfig) -> Self {
        PriceOracle {
            chain,
            cfg,
            kinds: HashMap::new(),
        }
    }

    /// Current USD price of `address`, zero meaning unpriced. `decimals` is
    /// the token's reported precision, as stored on its Token entity.
    pub async fn price_of(&mut self, address: &str, decimals: i32) -> Result<Decimal, ChainError> {
        if let Some(price) = self.shortcut_price(address).await? {
            return Ok(price);
        }
        match self.classify(address).await? {
            TokenKind::Ordinary => self.exchange_price(address, decimals).await,
            TokenKind::Pair => self.pair_share_price(address).await,
            TokenKind::Vault => self.vault_share_price(address).await,
        }
    }

    /// Price via shortcuts and pair search only, without pool-share
    /// classification. Used for pool-share constituents: a share token's
    /// value derives from its constituents, which are priced as ordinary
    /// tokens.
    pub(crate) async fn base_price(
        &self,
        address: &str,
        decimals: i32,
    ) -> Result<Decimal, ChainError> {
        if let Some(price) = self.shortcut_price(address).await? {
            return Ok(price);
        }
        self.exchange_price(address, decimals).await
    }

    async fn shortcut_price(&self, address: &str) -> Result<Option<Decimal>, ChainError> {
        if self.cfg.stablecoins.iter().any(|s| s == address) {
            return Ok(Some(Decimal::ONE));
        }
        if address == self.cfg.wrapped_native {
            return Ok(Some(self.native_price().await?));
        }
        if self.cfg.weth.as_deref() == Some(address) {
            return Ok(Some(self.eth_price().await?));
        }
        Ok(None)
    }

    pub(crate) async fn classify(&mut self, address: &str) -> Result<TokenKind, ChainError> {
        if let Some(kind) = self.kinds.get(address) {
            return Ok(*kind);
        }
        // probe failures against ordinary tokens are expected negatives
        let kind = if self.chain.pair_state(address).await?.is_some() {
            TokenKind::Pair
        } else if self.chain.vault_balances(address).await?.is_some() {
            TokenKind::Vault
        } else {
            TokenKind::Ordinary
        };
        self.kinds.insert(address.to_owned(), kind);
        Ok(kind)
    }

    /// `SYM0-SYM1` alias for a pool-share token, `None` for ordinary tokens.
    pub(crate) async fn share_token_alias(
        &mut self,
        address: &str,
    ) -> Result<Option<String>, ChainError> {
        let (token0, token1) = match self.classify(address).await? {
            TokenKind::Pair => match self.chain.pair_state(address).await? {
                Some(state) => (state.token0, state.token1),
                None => return Ok(None),
            },
            TokenKind::Vault => match self.chain.vault_balances(address).await? {
                Some(balances) => (balances.token0, balances.token1),
                None => return Ok(None),
            },
            TokenKind::Ordinary => return Ok(None),
        };
        let info0 = self.chain.token_info(&token0).await?;
        let info1 = self.chain.token_info(&token1).await?;
        Ok(Some(format!("{}-{}", info0.symbol, info1.symbol)))
    }
}
