use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agentdeck::agents::AgentRegistry;
use agentdeck::monitor::{Aggregator, SnapshotHub};
use agentdeck::server::{self, AppState};
use agentdeck::{Config, TmuxClient};

#[derive(Parser)]
#[command(name = "agentdeck")]
#[command(author, version, about, long_about = None)]
#[command(about = "Remote dashboard and control plane for CLI AI agents running in tmux")]
struct Cli {
    /// Address to listen on, host:port
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Path to config file
    #[arg(short = 'f', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level: debug|info|warn|error
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Dashboard aggregation interval in milliseconds
    #[arg(long, value_name = "MS")]
    tick_sessions_ms: Option<u64>,

    /// Pane stream capture interval in milliseconds
    #[arg(long, value_name = "MS")]
    tick_pane_ms: Option<u64>,

    /// Show config file path
    #[arg(long)]
    show_config_path: bool,

    /// Generate default config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config_path {
        match Config::default_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("Config directory not found"),
        }
        return Ok(());
    }

    if cli.init_config {
        let config = Config::default();
        config.save().context("failed to create config file")?;
        if let Some(path) = Config::default_path() {
            println!("Config file created: {}", path.display());
        }
        return Ok(());
    }

    let mut config = if let Some(path) = &cli.config {
        Config::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?
    } else {
        Config::load()
    };

    // CLI args override the config file.
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(ms) = cli.tick_sessions_ms {
        config.tick_sessions_ms = ms;
    }
    if let Some(ms) = cli.tick_pane_ms {
        config.tick_pane_ms = ms;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("agentdeck={}", config.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Arc::new(config);
    let tmux = Arc::new(TmuxClient::new());
    let registry = Arc::new(AgentRegistry::new(
        Duration::from_millis(config.cache_agent_ttl_ms),
        &config.agent_log_roots(),
    ));
    let hub = Arc::new(SnapshotHub::new());

    let aggregator = Aggregator::new(tmux.clone(), registry.clone(), hub.clone(), &config);
    tokio::spawn(aggregator.run());

    let state = AppState {
        tmux,
        registry,
        hub,
        config: config.clone(),
    };
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}
