//! Read-only chain state access.
//!
//! The core never decodes contract calls itself; it queries the companion
//! chain web API for current on-chain values. All queries are synchronous
//! reads with no side effects. Probe-style lookups (pair state, vault
//! balances) report "not implemented by this contract" as `Ok(None)` rather
//! than an error, since probing ordinary tokens is expected to fail.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chain response invalid: {0}")]
    Response(String),
}

/// One stake slot in a user's on-chain stake list.
#[derive(Debug, Clone, Deserialize)]
pub struct StakeSlot {
    pub shares: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserTotals {
    pub shares: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundingSchedule {
    pub start: i64,
    pub end: i64,
}

/// Constant-product pair state: token ordering plus raw reserves.
#[derive(Debug, Clone, Deserialize)]
pub struct PairState {
    pub token0: String,
    pub token1: String,
    pub reserve0: String,
    pub reserve1: String,
}

/// Managed vault underlying balances, reported per constituent token.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultBalances {
    pub token0: String,
    pub token1: String,
    pub amount0: String,
    pub amount1: String,
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn stake_count(&self, pool: &str, user: &str) -> Result<u64, ChainError>;
    async fn user_stake(&self, pool: &str, user: &str, index: u64)
        -> Result<StakeSlot, ChainError>;
    async fn user_totals(&self, pool: &str, user: &str) -> Result<UserTotals, ChainError>;
    async fn token_info(&self, address: &str) -> Result<TokenInfo, ChainError>;
    /// Owning pool address for a reward module contract.
    async fn module_owner(&self, module: &str) -> Result<String, ChainError>;
    async fn funding_count(&self, module: &str) -> Result<u64, ChainError>;
    async fn funding_schedule(
        &self,
        module: &str,
        index: u64,
    ) -> Result<FundingSchedule, ChainError>;
    /// Fixed vesting period of a linear reward module, in seconds.
    async fn module_period(&self, module: &str) -> Result<i64, ChainError>;
    /// Pair contract registered on `factory` for the token pair, if any.
    async fn get_pair(
        &self,
        factory: &str,
        token0: &str,
        token1: &str,
    ) -> Result<Option<String>, ChainError>;
    async fn pair_state(&self, address: &str) -> Result<Option<PairState>, ChainError>;
    async fn total_supply(&self, address: &str) -> Result<String, ChainError>;
    async fn vault_balances(&self, address: &str) -> Result<Option<VaultBalances>, ChainError>;
}

/// [`ChainReader`] backed by the chain web API.
pub struct HttpChainClient {
    node: String,
    client: reqwest::Client,
}

impl HttpChainClient {
    pub fn new(node: String, client: reqwest::Client) -> Self {
        HttpChainClient { node, client }
    }

    async fn get_json<T: DeserializeOwned>(&self, path_query: &str) -> Result<T, ChainError> {
        let url = format!("{}{}", self.node, path_query);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ChainReader for HttpChainClient {
    async fn stake_count(&self, pool: &str, user: &str) -> Result<u64, ChainError> {
        self.get_json(&format!("/stake_count?pool={}&user={}", pool, user))
            .await
    }

    async fn user_stake(
        &self,
        pool: &str,
        user: &str,
        index: u64,
    ) -> Result<StakeSlot, ChainError> {
        self.get_json(&format!(
            "/user_stake?pool={}&user={}&index={}",
            pool, user, index
        ))
        .await
    }

    async fn user_totals(&self, pool: &str, user: &str) -> Result<UserTotals, ChainError> {
        self.get_json(&format!("/user_totals?pool={}&user={}", pool, user))
            .await
    }

    async fn token_info(&self, address: &str) -> Result<TokenInfo, ChainError> {
        self.get_json(&format!("/token_info?address={}", address))
            .await
    }

    async fn module_owner(&self, module: &str) -> Result<String, ChainError> {
        self.get_json(&format!("/module_owner?address={}", module))
            .await
    }

    async fn funding_count(&self, module: &str) -> Result<u64, ChainError> {
        self.get_json(&format!("/funding_count?module={}", module))
            .await
    }

    async fn funding_schedule(
        &self,
        module: &str,
        index: u64,
    ) -> Result<FundingSchedule, ChainError> {
        self.get_json(&format!("/funding_schedule?module={}&index={}", module, index))
            .await
    }

    async fn module_period(&self, module: &str) -> Result<i64, ChainError> {
        self.get_json(&format!("/module_period?module={}", module))
            .await
    }

    async fn get_pair(
        &self,
        factory: &str,
        token0: &str,
        token1: &str,
    ) -> Result<Option<String>, ChainError> {
        self.get_json(&format!(
            "/pair?factory={}&token0={}&token1={}",
            factory, token0, token1
        ))
        .await
    }

    async fn pair_state(&self, address: &str) -> Result<Option<PairState>, ChainError> {
        self.get_json(&format!("/pair_state?address={}", address))
            .await
    }

    async fn total_supply(&self, address: &str) -> Result<String, ChainError> {
        self.get_json(&format!("/total_supply?address={}", address))
            .await
    }

    async fn vault_balances(&self, address: &str) -> Result<Option<VaultBalances>, ChainError> {
        self.get_json(&format!("/vault_balances?address={}", address))
            .await
    }
}
