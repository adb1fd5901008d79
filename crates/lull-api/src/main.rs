//! Lull CLI and HTTP entry point.
//!
//! Binary name: `lull`
//!
//! Parses CLI arguments and loads configuration, then either runs the HTTP
//! server (Slack events + webhook trigger) or a one-off CLI command.

mod cli;
mod http;
mod state;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use lull_core::workflow::WorkflowEngine;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Commands::Workflows => {
            let engine = WorkflowEngine::new(state::build_registry());
            cli::workflow::list_workflows(&engine, cli.json)?;
        }

        Commands::Run { name, state: pairs } => {
            let engine = WorkflowEngine::new(state::build_registry());
            cli::workflow::run_workflow(&engine, &name, &pairs).await?;
        }

        Commands::Serve { port, host } => {
            let config = lull_infra::config::load_config(&cli.config).await?;
            let missing = config.slack.missing_credentials();
            if !missing.is_empty() {
                tracing::warn!(
                    missing = %missing.join(", "),
                    "Slack credentials not configured; events will be rejected with 422"
                );
            }
            if config.slack.signing_secret.is_none() {
                tracing::warn!("no signing secret configured; Slack requests are not verified");
            }

            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let cooldown = config.debounce.cooldown();

            let (state, fired) = AppState::init(config)?;
            let shutdown = CancellationToken::new();
            let dispatcher = tokio::spawn(
                Arc::clone(&state.controller).run_dispatcher(fired, shutdown.clone()),
            );

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!();
                println!(
                    "  {} Lull listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!(
                    "  {}",
                    console::style(format!(
                        "Cooldown {:.1}s · workflows: {}",
                        cooldown.as_secs_f64(),
                        state.engine.registry().names().join(", ")
                    ))
                    .dim()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let router = http::router::build_router(state);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            shutdown.cancel();
            if let Err(e) = dispatcher.await {
                tracing::error!(error = %e, "dispatcher task failed");
            }

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flags.
fn init_tracing(cli: &Cli) {
    let default_filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "info,lull_api=debug,lull_core=debug,lull_infra=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
