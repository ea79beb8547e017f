//! CLI entry point (spec §6). Grounded on the Go original's `cmd/server/main.go`
//! and the teacher's `services/server` binary shape.

use clap::{Parser, Subcommand};
use mos_server::config::Config;
use mos_server::events::EventBus;
use mos_server::repository::memory::InMemoryRepository;
use mos_server::server::Server;
use mos_server::service::MosService;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "mos-server", version, about = "MOS Protocol v4.0 server")]
struct Cli {
    /// Load a TOML configuration file before applying environment overrides.
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the server (default if no subcommand is given).
    Serve,
    /// Write a default configuration file to the given path.
    GenerateConfig { path: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match Config::from_file(std::path::Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("failed to load config file '{path}': {e}");
                std::process::exit(2);
            }
        },
        None => Config::default(),
    };
    config.apply_env_overrides();

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&log_level))
        .init();

    let exit_code = match cli.command.unwrap_or(Command::Serve) {
        Command::GenerateConfig { path } => match config
            .to_toml()
            .map_err(|e| e.to_string())
            .and_then(|rendered| std::fs::write(&path, rendered).map_err(|e| e.to_string()))
        {
            Ok(()) => {
                info!(path = %path, "wrote default configuration");
                0
            }
            Err(e) => {
                error!(error = %e, "failed to write configuration");
                1
            }
        },
        Command::Serve => run_serve(config).await,
    };

    std::process::exit(exit_code);
}

async fn run_serve(config: Config) -> i32 {
    let events = EventBus::new();
    let repo = Arc::new(InMemoryRepository::new());
    let service = MosService::new(repo, events.clone(), config.mos.id.clone());
    let server = Server::new(config, service, events);

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            shutdown_signal.cancel();
        }
    });

    match server.run(shutdown).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "server exited with error");
            2
        }
    }
}
