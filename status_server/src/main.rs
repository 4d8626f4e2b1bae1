//! Main entry point for the status server binary

use anyhow::Result;
use healthcheck::{create_app, get_database_pool, run_server, AppConfig, AppState, SqliteDatabase};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());

    let addr: SocketAddr = config.bind_address().parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let mut state = AppState::new(config.clone());

    if config.status.check_databases && !config.database.url.is_empty() {
        match get_database_pool(&config.database.url).await {
            Ok(pool) => {
                info!("Database '{}' initialized", config.database.alias);
                state = state.with_database(SqliteDatabase::new(config.database.alias.clone(), pool));
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize database '{}', it will be absent from status checks: {}",
                    config.database.alias,
                    e
                );
            }
        }
    }

    info!("App: {} v{}", state.app_name, state.version);
    info!(
        "Status checks: databases={}, quiesce files={}",
        config.status.check_databases,
        config.status.quiesce_files.len()
    );

    let app = create_app(state);

    run_server(app, addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let default_level = if cfg!(debug_assertions) {
                "debug"
            } else {
                "info"
            };

            format!(
                "{}={},tower_http=debug,axum=debug",
                env!("CARGO_CRATE_NAME").replace('-', "_"),
                default_level
            ).into()
        });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
