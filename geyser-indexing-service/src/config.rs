use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub chain_api_node: String,
    pub rust_log: String,
    pub indexing_service_log: String,
    pub polling_batch_events: Option<u64>,
    pub polling_batch_sleep_millis: Option<u64>,
    pub polling_sleep_secs: Option<u64>,
    sqlx_max_connections: Option<u32>,
    sqlx_min_connections: Option<u32>,
    sqlx_connect_timeout: Option<u64>,
    sqlx_logging: Option<bool>,
    sqlx_logging_level: Option<String>,
    // pricing configuration, per deployment network
    pub wrapped_native_address: String,
    pub weth_address: Option<String>,
    pub usd_native_pair: String,
    pub usd_weth_pair: Option<String>,
    pub usd_pair_quote_decimals: Option<i32>,
    pub stablecoins: Vec<String>,
    pub stablecoin_decimals: Vec<i32>,
    pub factories: Vec<String>,
    pub gysr_token: String,
    pub min_usd_pricing: Option<String>,
    pub pricing_min_tvl: Option<String>,
    pub gysr_fee: Option<String>,
    pub pricing_period_secs: Option<i64>,
}

pub async fn get_db_connection(config: &Config) -> Result<DatabaseConnection, DbErr> {
    let mut options: ConnectOptions = config.database_url.to_owned().into();
    options
        .max_connections(match config.sqlx_max_connections {
            Some(v) => v,
            None => 4,
        })
        .min_connections(match config.sqlx_min_connections {
            Some(v) => v,
            None => 1,
        })
        .connect_timeout(Duration::from_secs(match config.sqlx_connect_timeout {
            Some(v) => v,
            None => 8,
        }))
        .sqlx_logging(match config.sqlx_logging {
            Some(v) => v,
            None => false,
        })
        .sqlx_logging_level(
            match config
                .sqlx_logging_level
                .as_deref()
                .unwrap_or("info")
                .parse::<log::LevelFilter>()
            {
                Ok(level) => level,
                Err(_) => log::LevelFilter::Info,
            },
        );

    Database::connect(options).await
}

/// Immutable pricing configuration derived from [`Config`] at startup.
/// Addresses are normalized to lowercase hex so they can be compared against
/// event payloads and chain responses directly.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub wrapped_native: String,
    pub weth: Option<String>,
    pub usd_native_pair: String,
    pub usd_weth_pair: Option<String>,
    pub usd_pair_quote_decimals: i32,
    pub stablecoins: Vec<String>,
    pub stablecoin_decimals: Vec<i32>,
    pub factories: Vec<String>,
    pub gysr_token: String,
    pub min_usd_pricing: Decimal,
    pub pricing_min_tvl: Decimal,
    pub gysr_fee: Decimal,
    pub pricing_period: i64,
}

fn parse_decimal(value: &Option<String>, default: &str, name: &str) -> Decimal {
    let raw = match value {
        Some(ref v) => v.as_str(),
        None => default,
    };
    match raw.parse::<Decimal>() {
        Ok(d) => d,
        Err(error) => {
            warn!("Invalid decimal for {} ({}): {}", name, raw, error);
            default.parse::<Decimal>().unwrap_or(Decimal::ZERO)
        }
    }
}

impl PricingConfig {
    pub fn from_config(config: &Config) -> Self {
        let weth = config
            .weth_address
            .as_ref()
            .map(|a| a.to_lowercase())
            .filter(|a| a != ZERO_ADDRESS && !a.is_empty());
        if config.stablecoins.len() != config.stablecoin_decimals.len() {
            warn!(
                "stablecoins and stablecoin_decimals length mismatch: {} != {}",
                config.stablecoins.len(),
                config.stablecoin_decimals.len()
            );
        }
        PricingConfig {
            wrapped_native: config.wrapped_native_address.to_lowercase(),
            weth,
            usd_native_pair: config.usd_native_pair.to_lowercase(),
            usd_weth_pair: config.usd_weth_pair.as_ref().map(|a| a.to_lowercase()),
            usd_pair_quote_decimals: match config.usd_pair_quote_decimals {
                Some(v) => v,
                None => 6,
            },
            stablecoins: config
                .stablecoins
                .iter()
                .map(|a| a.to_lowercase())
                .collect(),
            stablecoin_decimals: config.stablecoin_decimals.clone(),
            factories: config.factories.iter().map(|a| a.to_lowercase()).collect(),
            gysr_token: config.gysr_token.to_lowercase(),
            min_usd_pricing: parse_decimal(&config.min_usd_pricing, "1000.0", "min_usd_pricing"),
            pricing_min_tvl: parse_decimal(&config.pricing_min_tvl, "10000.0", "pricing_min_tvl"),
            gysr_fee: parse_decimal(&config.gysr_fee, "0.20", "gysr_fee"),
            pricing_period: match config.pricing_period_secs {
                Some(v) => v,
                None => 21600,
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod test_config {
    use super::PricingConfig;
    use rust_decimal::Decimal;

    pub const WNATIVE: &str = "0xwnative";
    pub const WETH: &str = "0xweth";
    pub const USDC: &str = "0xusdc";
    pub const USDT: &str = "0xusdt";
    pub const DAI: &str = "0xdai";
    pub const GYSR: &str = "0xgysr";
    pub const FACTORY_A: &str = "0xfactorya";
    pub const FACTORY_B: &str = "0xfactoryb";
    pub const USD_NATIVE_PAIR: &str = "0xusdnativepair";
    pub const USD_WETH_PAIR: &str = "0xusdwethpair";

    pub fn pricing() -> PricingConfig {
        PricingConfig {
            wrapped_native: WNATIVE.to_owned(),
            weth: Some(WETH.to_owned()),
            usd_native_pair: USD_NATIVE_PAIR.to_owned(),
            usd_weth_pair: Some(USD_WETH_PAIR.to_owned()),
            usd_pair_quote_decimals: 6,
            stablecoins: vec![USDC.to_owned(), USDT.to_owned(), DAI.to_owned()],
            stablecoin_decimals: vec![6, 6, 18],
            factories: vec![FACTORY_A.to_owned(), FACTORY_B.to_owned()],
            gysr_token: GYSR.to_owned(),
            min_usd_pricing: Decimal::from(1000),
            pricing_min_tvl: Decimal::from(10000),
            gysr_fee: "0.20".parse().unwrap(),
            pricing_period: 21600,
        }
    }
}
