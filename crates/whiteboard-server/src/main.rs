//! Whiteboard Session Server - Entry Point

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use whiteboard_server::config::Config;
use whiteboard_server::server::WhiteboardServer;

#[derive(Parser, Debug)]
#[command(name = "whiteboard-server")]
#[command(about = "Collaborative whiteboard session server")]
#[command(version)]
struct Cli {
    /// Listen port for HTTP and WebSocket upgrades
    #[arg(long, default_value_t = 3000, env = "PORT")]
    port: u16,

    /// Data directory backing the element store
    #[arg(long, default_value = "./data", env = "DATA_DIR")]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cli.port,
        data_dir = %cli.data_dir.display(),
        "Starting whiteboard session server"
    );

    let config = Config::new(cli.port, cli.data_dir);
    WhiteboardServer::new(config)?.run().await
}
