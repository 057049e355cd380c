//! duskd — the dusk daemon.
//!
//! Shuts down opted-in instances at their scheduled time of day. Owners get
//! a notice shortly before with a one-time link that pushes the deadline
//! back.
//!
//! # Usage
//!
//! ```text
//! duskd --config /etc/dusk/dusk.toml serve
//! duskd --config /etc/dusk/dusk.toml evaluate
//! duskd --config /etc/dusk/dusk.toml purge-tokens
//! ```

mod assembly;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dusk_core::{DuskConfig, Moment};

use crate::assembly::Components;

#[derive(Parser)]
#[command(name = "duskd", about = "dusk daemon: scheduled instance shutdown")]
struct Cli {
    /// Path to dusk.toml; environment variables override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the periodic evaluator and the HTTP server.
    Serve,
    /// Run a single evaluation pass and print the result.
    Evaluate,
    /// Drop expired postponement tokens.
    PurgeTokens,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,duskd=debug,dusk_scheduler=debug"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = DuskConfig::load(cli.config.as_deref())?;
    let components = Components::assemble(config)?;

    match cli.command {
        Command::Serve => serve(components).await,
        Command::Evaluate => evaluate_once(&components).await,
        Command::PurgeTokens => purge_tokens(&components).await,
    }
}

async fn serve(components: Components) -> anyhow::Result<()> {
    let daemon = &components.config.daemon;
    let addr: SocketAddr = daemon.listen.parse()?;
    let interval = Duration::from_secs(daemon.evaluate_interval_secs.max(1));
    info!(%addr, interval_secs = interval.as_secs(), "dusk daemon starting");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Evaluator loop ─────────────────────────────────────────

    let evaluator = components.evaluator.clone();
    let evaluator_handle = tokio::spawn(async move {
        evaluator.run(interval, shutdown_rx).await;
    });

    // ── API server ─────────────────────────────────────────────

    let router = dusk_api::build_router(components.api_state());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c; shutting down");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = evaluator_handle.await;
    info!("dusk daemon stopped");
    Ok(())
}

async fn evaluate_once(components: &Components) -> anyhow::Result<()> {
    let response = components.evaluator.trigger(&Moment::now()).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if response.status_code != 200 {
        anyhow::bail!("evaluation pass failed: {}", response.message);
    }
    Ok(())
}

async fn purge_tokens(components: &Components) -> anyhow::Result<()> {
    let purged = components.evaluator.purge_tokens(&Moment::now()).await?;
    info!(purged, "expired tokens purged");
    println!("{purged}");
    Ok(())
}
