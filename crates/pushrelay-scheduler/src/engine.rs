use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use pushrelay_pipeline::PipelineCommand;

/// Sends a [`PipelineCommand::Tick`] every `interval`, starting immediately.
pub struct TickScheduler {
    interval: Duration,
    commands: mpsc::Sender<PipelineCommand>,
}

impl TickScheduler {
    /// `commands` should have capacity 1 so a pending tick blocks the next.
    pub fn new(interval: Duration, commands: mpsc::Sender<PipelineCommand>) -> Self {
        Self { interval, commands }
    }

    /// Main loop. Runs until `shutdown` broadcasts `true`, its sender is
    /// dropped, or the pipeline side of the channel closes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "tick scheduler started");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.commands.try_send(PipelineCommand::Tick { reply: None }) {
                        Ok(()) => debug!("tick queued"),
                        Err(TrySendError::Full(_)) => {
                            warn!("previous tick still pending, skipping this one");
                        }
                        Err(TrySendError::Closed(_)) => {
                            info!("pipeline gone, tick scheduler stopping");
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("tick scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }
}
