use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use pushrelay_core::RelayConfig;
use pushrelay_pipeline::PipelineCommand;
use pushrelay_scheduler::TickScheduler;

mod app;

/// Relay push requests from chats into a target conversation.
#[derive(Parser, Debug)]
#[command(name = "pushrelay", version, about, long_about = None)]
struct Cli {
    /// Config file (default: $PUSHRELAY_CONFIG, then ./pushrelay.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll on the configured interval until interrupted (default).
    Run,
    /// Run a single tick and print its summary.
    Once,
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pushrelay_daemon=info,pushrelay_pipeline=info,pushrelay_scheduler=info,\
                 pushrelay_state=info,pushrelay_channels=info,pushrelay_detector=info"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();

    let config = RelayConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::CheckConfig => check_config(&config),
        Commands::Once => {
            let pipeline = app::build_pipeline(&config)?;
            let summary = pipeline.run_tick().await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Run => run(config).await,
    }
}

fn check_config(config: &RelayConfig) -> anyhow::Result<()> {
    let report = app::pattern_report(&config.patterns);
    for pattern in &report.dropped {
        warn!(%pattern, "pattern does not compile and will be ignored");
    }
    println!(
        "config ok: target={} interval={}s detector={:?} patterns={}/{}",
        config.target_conversation_id,
        config.poll_interval_secs,
        config.detector.mode,
        report.active.len(),
        config.patterns.len()
    );
    Ok(())
}

async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let pipeline = app::build_pipeline(&config)?;

    // Capacity 1: at most one tick waits while another runs; extra ticks are skipped.
    let (commands_tx, commands_rx) = tokio::sync::mpsc::channel::<PipelineCommand>(1);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let scheduler = TickScheduler::new(Duration::from_secs(config.poll_interval_secs), commands_tx);
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx.clone()));
    let pipeline_task = tokio::spawn(pipeline.run(commands_rx, shutdown_rx));

    info!(
        target = %config.target_conversation_id,
        interval_secs = config.poll_interval_secs,
        "pushrelay running"
    );

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");

    // signal scheduler and pipeline to stop; a tick in progress finishes first
    let _ = shutdown_tx.send(true);
    scheduler_task.await?;
    pipeline_task.await?;
    Ok(())
}
