//! metrika-export daemon: periodically exports Yandex Metrika hit logs into
//! the configured database.
//!
//! Usage: `metrika-export [CONFIG]`. The config path falls back to
//! `$METRIKA_EXPORT_CONFIG`, then `config.yaml`.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use metrika_export::config::{LogFormat, LoggingConfig};
use metrika_export::db::init_database;
use metrika_export::{
    load_config, Config, ConfigError, EventStore, ExportError, Exporter, MetrikaClient,
    Scheduler, TsvParser,
};

const CONFIG_ENV_VAR: &str = "METRIKA_EXPORT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("metrika-export: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging);
    info!(config = %config_path, counter = config.metrika.counter, "Starting metrika-export");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "metrika-export failed");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over the configured filter.
fn init_logging(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    match logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .init(),
    }
}

async fn run(config: Config) -> Result<(), ExportError> {
    let db_url = config.database.connection_url()?;
    let db = init_database(&db_url, config.database.max_connections).await?;
    let store = EventStore::new(db);

    let token = config
        .metrika
        .token
        .resolve()
        .map_err(|source| ConfigError::Secret {
            name: "metrika.token",
            source,
        })?;
    let client = MetrikaClient::new(
        &config.metrika.base_url,
        config.metrika.counter,
        token,
        config.metrika.request_timeout(),
    )?;
    let parser = TsvParser::new(config.metrika.utc_offset()?);

    let exporter = Arc::new(Exporter::new(Arc::new(client), store, parser));

    // The routines recover on their own, so a failed reconcile only delays
    // discovery of remote requests.
    if let Err(e) = exporter.reconcile().await {
        warn!(error = %e, "Startup reconcile failed");
    }

    let scheduler = Scheduler::new(Arc::clone(&exporter), config.schedule.clone());
    let handles = scheduler.start();
    info!("Scheduler started");

    shutdown_signal().await;
    info!("Shutting down");

    scheduler.stop();
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Routine task panicked");
        }
    }

    info!("Stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
