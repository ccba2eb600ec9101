//! slumlinkd: REST service for aid distribution sessions and reporting.

use clap::Parser;
use slumlink_core::StoreConfig;
use slumlink_service::server::Server;
use slumlink_service::ServiceConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "slumlinkd", version, about = "SlumLink distribution service")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SLUMLINK_CONFIG")]
    config: Option<String>,

    /// Listen address, e.g. 127.0.0.1:8092
    #[arg(short, long, env = "SLUMLINK_LISTEN_ADDR")]
    listen: Option<SocketAddr>,

    /// PostgreSQL url; selects the postgres backend.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Max PostgreSQL pool connections.
    #[arg(long, default_value_t = 10, env = "SLUMLINK_PG_MAX_CONNECTIONS")]
    pg_max_connections: u32,

    /// Seed file for the in-memory backend.
    #[arg(long, env = "SLUMLINK_SEED")]
    seed: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "SLUMLINK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "SLUMLINK_LOG_JSON")]
    json: bool,
}

fn apply_overrides(cli: &Cli, config: &mut ServiceConfig) -> anyhow::Result<()> {
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json {
        config.logging.json = true;
    }

    match (&cli.database_url, &cli.seed) {
        (Some(_), Some(_)) => {
            anyhow::bail!("--seed only applies to the in-memory backend; drop --database-url")
        }
        (Some(url), None) => {
            config.storage = StoreConfig::postgres(url.clone(), cli.pg_max_connections);
        }
        (None, Some(seed)) => {
            config.storage = StoreConfig::Memory {
                seed_path: Some(seed.clone()),
            };
        }
        (None, None) => {}
    }
    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("slumlink_service={level},slumlink_core={level},{level}").into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    apply_overrides(&cli, &mut config)?;
    init_tracing(&config.logging.level, config.logging.json);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = config.storage.label(),
        "starting slumlinkd"
    );

    Server::new(config).await?.run().await
}
