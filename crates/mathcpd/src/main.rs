//! mathcpd — the math solver daemon.
//!
//! # Usage
//!
//! ```text
//! mathcpd [HOST] [PORT] [-v] [-c mathcp.toml]
//! ```

use std::path::PathBuf;

use clap::Parser;
use mathcp_core::MathcpConfig;
use mathcpd::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mathcpd", about = "Line-oriented TCP arithmetic solver")]
struct Cli {
    /// Address to listen on [default: 0.0.0.0].
    host: Option<String>,

    /// Port to listen on [default: 8000].
    port: Option<u16>,

    /// Enable debug output.
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => MathcpConfig::from_file(path)?,
        None => MathcpConfig::default(),
    }
    .with_overrides(cli.host, cli.port);

    let server = Server::bind(&config)?;

    let stop = server.stop_token();
    server.pool().runtime_handle().spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            stop.stop();
        }
    });

    server.run()
}
