mod chain;
mod common;
mod config;
mod events;
mod ledger;
mod pricing;
mod store;

use chain::HttpChainClient;
use config::{Config, PricingConfig};
use events::EventEnvelope;
use figment::{
    providers::{Format, Toml},
    Figment,
};
use ledger::{HandlerError, Ledger};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use store::db::DbStore;
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config: Config = Figment::new().merge(Toml::file("App.toml")).extract()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", &config.rust_log);
    }
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                format!("geyser_indexing_service={}", &config.indexing_service_log)
                    .parse()
                    .expect("Error parsing directive"),
            ),
        )
        .init();

    let db = config::get_db_connection(&config).await?;
    let store = DbStore::new(db);
    let client = reqwest::Client::builder()
        .build()
        .expect("Reqwest client failed to initialize!");
    let chain = Arc::new(HttpChainClient::new(
        config.chain_api_node.clone(),
        client.clone(),
    ));
    let pricing = PricingConfig::from_config(&config);
    let ledger = Ledger::new(store, chain, pricing);

    tokio::select! {
        result = poll_events(ledger, &client, &config) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

async fn poll_events(
    mut ledger: Ledger<DbStore, HttpChainClient>,
    client: &reqwest::Client,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let polling_batch_events = match config.polling_batch_events {
        Some(v) => v,
        None => 1_000,
    };
    let polling_batch_sleep_millis = match config.polling_batch_sleep_millis {
        Some(v) => v,
        None => 100,
    };
    let polling_sleep_secs = match config.polling_sleep_secs {
        Some(v) => v,
        None => 10,
    };

    let mut after = ledger.cursor().await?;
    info!("Starting event polling from ordinal {}", after);

    loop {
        let events = match fetch_events(client, &config.chain_api_node, after, polling_batch_events)
            .await
        {
            Ok(events) => events,
            Err(error) => {
                warn!("Failed to fetch events after {}: {}", after, error);
                sleep(Duration::from_secs(polling_sleep_secs)).await;
                continue;
            }
        };
        let batch_len = events.len() as u64;

        for envelope in &events {
            match ledger.process(envelope).await {
                Ok(()) => {}
                Err(HandlerError::MissingEntity { kind, id }) => {
                    // nothing to apply the event to; skipping keeps the feed moving
                    error!(
                        "Skipping event {}: unknown {} {}",
                        envelope.ordinal, kind, id
                    );
                }
                Err(error) => {
                    // transient failure; leave the cursor behind this event
                    // and replay the batch from here on the next poll
                    warn!("Event {} failed: {}", envelope.ordinal, error);
                    break;
                }
            }
            after = envelope.ordinal;
            if let Err(error) = ledger.commit(after).await {
                warn!("Failed to commit cursor {}: {}", after, error);
            }
        }

        if batch_len >= polling_batch_events {
            sleep(Duration::from_millis(polling_batch_sleep_millis)).await;
        } else {
            sleep(Duration::from_secs(polling_sleep_secs)).await;
        }
    }
}

async fn fetch_events(
    client: &reqwest::Client,
    node: &str,
    after: u64,
    limit: u64,
) -> Result<Vec<EventEnvelope>, reqwest::Error> {
    let url = format!("{}/events?after={}&limit={}", node, after, limit);
    client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json::<Vec<EventEnvelope>>()
        .await
}
