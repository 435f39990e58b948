//! `ws-broker` binary: command line, logging, signal handling.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use ws_broker::{BrokerServer, RegistryConfig, ServerConfig};

/// Simple WebSocket broker.
#[derive(Parser, Debug)]
#[command(name = "ws-broker", about = "Simple WebSocket broker")]
struct Cli {
    /// Port number.
    #[arg(short = 'p', long, default_value_t = 8025)]
    port: u16,

    /// Logging level; `RUST_LOG` takes precedence when set.
    #[arg(short = 'l', long, value_enum, default_value_t = LogLevel::Info)]
    loglevel: LogLevel,

    /// Maximal number of attached clients.
    #[arg(short = 'm', long, default_value_t = 1000)]
    maxclients: usize,

    /// Status report period in seconds.
    #[arg(short = 's', long, default_value_t = 3600)]
    statusperiod: u64,

    /// Empty channel cleanup period in seconds.
    #[arg(short = 'c', long, default_value_t = 3600)]
    cleanupperiod: u64,

    /// Accept cross-origin traffic from this domain (`*` for any).
    #[arg(short = 'a', long, default_value = "*")]
    alloworigin: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Info,
    Debug,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "ws_broker=error",
            LogLevel::Info => "ws_broker=info",
            LogLevel::Debug => "ws_broker=debug",
        }
    }
}

#[tokio::main]
async fn main() -> ws_broker::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.loglevel.directive())),
        )
        .init();

    let server_config = ServerConfig::default()
        .bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, cli.port)))
        .allow_origin(cli.alloworigin);
    let registry_config = RegistryConfig::default()
        .max_clients(cli.maxclients)
        .status_interval(Duration::from_secs(cli.statusperiod))
        .sweep_interval(Duration::from_secs(cli.cleanupperiod));

    let server = BrokerServer::with_registry_config(server_config, registry_config);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
}
