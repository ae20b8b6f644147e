use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use notify_service::{
    api::{AppState, run_api_server},
    clients::{
        postgres::{PgDirectory, PgNotificationStore, connect},
        whatsapp::WhatsappClient,
    },
    config::Config,
    policies::NotificationPolicies,
    scan::DeadlineScanner,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::load()?;

    let client = connect(&config.database_url)
        .await
        .map_err(|e| anyhow!("{}", e))?;

    let store = Arc::new(PgNotificationStore::new(Arc::clone(&client)));
    let directory = Arc::new(PgDirectory::new(client));
    let transport = Arc::new(WhatsappClient::new(&config).map_err(|e| anyhow!("{}", e))?);

    let policies = Arc::new(NotificationPolicies::new(
        store.clone(),
        directory.clone(),
        directory.clone(),
        transport,
        config.templates(),
    ));

    let state = Arc::new(AppState {
        store,
        tickets: directory.clone(),
        scanner: DeadlineScanner::new(directory, policies),
        scheduler_secret: config.scheduler_secret.clone(),
    });

    run_api_server(config, state)
        .await
        .map_err(|e| anyhow!("API server failed: {}", e))
}
