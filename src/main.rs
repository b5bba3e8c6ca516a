//! unimock — programmable HTTP mock server.
//!
//! Serves registered scenarios first, then a generic CRUD mock store.
//! Configured by a YAML file at startup and the /_uni management API at
//! runtime. Env overrides: UNIMOCK_PORT, UNIMOCK_LOG_LEVEL,
//! UNIMOCK_CONFIG_PATH.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use unimock::config::{self, Config};
use unimock::dispatch;

#[derive(Parser)]
#[command(name = "unimock")]
#[command(author, version, about = "Programmable HTTP mock server")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server (default)
    Run {
        /// Config file path (sections and pre-registered scenarios).
        /// Falls back to UNIMOCK_CONFIG_PATH; absent means an empty config.
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Listen port. Falls back to UNIMOCK_PORT, then 8080.
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        address: String,
    },

    /// Validate a configuration file
    Validate {
        #[arg(short, long, value_name = "PATH")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match &cli.command {
        Some(Commands::Validate { config }) => run_validate(config),
        Some(Commands::Run {
            config,
            port,
            address,
        }) => run_server(config.clone(), *port, address).await,
        None => run_server(None, None, "0.0.0.0").await,
    }
}

/// Init tracing from flags or UNIMOCK_LOG_LEVEL (default info); RUST_LOG
/// overrides when set.
fn init_logging(cli: &Cli) {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("unimock=debug")
    } else {
        let level = std::env::var("UNIMOCK_LOG_LEVEL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "info".to_string());
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("unimock={level}")))
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(filter)
        .init();
}

fn run_validate(config_path: &Path) -> anyhow::Result<()> {
    match Config::load(config_path) {
        Ok(_) => {
            tracing::info!("config valid");
            std::process::exit(0);
        }
        Err(e) => {
            tracing::error!("config invalid: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_server(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    address: &str,
) -> anyhow::Result<()> {
    let config_path = effective_config_path(config_path);
    let (config, config_dir) = match &config_path {
        Some(path) => {
            let config = Config::load(path)?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (config, dir)
        }
        None => {
            tracing::info!("no config file given, starting empty (management API only)");
            (Config::default(), PathBuf::from("."))
        }
    };
    let state = config::build_state(&config, &config_dir).await?;
    let app = dispatch::router(state);

    let port = effective_port(port)?;
    let addr: SocketAddr = format!("{address}:{port}")
        .parse()
        .map_err(|e| anyhow::anyhow!("bind address invalid: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "unimock listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("graceful shutdown complete");
    Ok(())
}

fn effective_config_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| {
        std::env::var("UNIMOCK_CONFIG_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    })
}

fn effective_port(flag: Option<u16>) -> anyhow::Result<u16> {
    if let Some(p) = flag {
        return Ok(p);
    }
    match std::env::var("UNIMOCK_PORT") {
        Ok(s) if !s.trim().is_empty() => s
            .trim()
            .parse()
            .with_context(|| format!("UNIMOCK_PORT {s:?} is not a port number")),
        _ => Ok(8080),
    }
}

/// Future that completes when SIGINT (Ctrl+C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
