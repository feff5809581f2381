use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use pushrelay_channels::{with_timeout, ChatClient, ForwardRequest};
use pushrelay_core::config::ForwardConfig;
use pushrelay_core::{NewMessage, RelayConfig};
use pushrelay_detector::Detector;

use crate::duplicate::DuplicateChecker;
use crate::monitor::{MessageMonitor, MonitorOptions, PollOutcome};
use crate::{SharedForwardedStore, SharedPollStore};

/// The slice of [`RelayConfig`] the pipeline runs on.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub target_conversation_id: String,
    pub display_name: String,
    pub include_self: bool,
    pub add_reaction: bool,
    pub forward: ForwardConfig,
    /// Upper bound for each remote call.
    pub timeout_ms: u64,
}

impl PipelineSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            target_conversation_id: config.target_conversation_id.clone(),
            display_name: config.display_name.clone(),
            include_self: config.include_self,
            add_reaction: config.add_reaction_after_forward,
            forward: config.forward.clone(),
            timeout_ms: config.graph.timeout_ms,
        }
    }
}

/// Counters for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub conversations: usize,
    pub failed_conversations: usize,
    pub messages_scanned: usize,
    pub push_requests: usize,
    pub duplicates: usize,
    pub forwarded: usize,
    pub forward_failures: usize,
    pub detector_failures: usize,
    /// Messages taken from the retry queue at the start of the tick.
    pub retried: usize,
}

/// What became of one message.
enum Handled {
    Done,
    /// The forward call failed; the message goes back on the retry queue.
    ForwardFailed,
}

/// Commands accepted by [`Pipeline::run`].
#[derive(Debug)]
pub enum PipelineCommand {
    /// Run one tick. The summary is sent back when `reply` is set.
    Tick {
        reply: Option<oneshot::Sender<TickSummary>>,
    },
}

/// Ties monitor, detector chain, duplicate checker and forwarding together.
///
/// Has no timer of its own: ticks arrive as [`PipelineCommand`]s, or are
/// driven directly through [`Pipeline::run_tick`].
///
/// The poll cursor has already moved past a message by the time its forward
/// is attempted, so failed forwards are held in memory and offered again at
/// the start of the next tick. The queue does not survive a restart.
pub struct Pipeline {
    client: Arc<dyn ChatClient>,
    detector: Arc<dyn Detector>,
    monitor: MessageMonitor,
    duplicates: DuplicateChecker,
    forwarded: SharedForwardedStore,
    settings: PipelineSettings,
    retry: Mutex<Vec<NewMessage>>,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn ChatClient>,
        detector: Arc<dyn Detector>,
        poll_state: SharedPollStore,
        forwarded: SharedForwardedStore,
        settings: PipelineSettings,
    ) -> Self {
        let monitor = MessageMonitor::new(
            client.clone(),
            poll_state,
            MonitorOptions {
                display_name: settings.display_name.clone(),
                include_self: settings.include_self,
                timeout_ms: settings.timeout_ms,
            },
        );
        let duplicates = DuplicateChecker::new(
            client.clone(),
            settings.target_conversation_id.clone(),
            forwarded.clone(),
            settings.timeout_ms,
        );
        Self {
            client,
            detector,
            monitor,
            duplicates,
            forwarded,
            settings,
            retry: Mutex::new(Vec::new()),
        }
    }

    /// Messages waiting for another forward attempt.
    pub async fn pending_retries(&self) -> usize {
        self.retry.lock().await.len()
    }

    /// Process every conversation once. Never fails: per-conversation and
    /// per-message faults are logged and counted in the summary.
    pub async fn run_tick(&self) -> TickSummary {
        let tick_id = Uuid::now_v7();
        let span = tracing::info_span!("tick", tick_id = %tick_id);
        self.tick_inner().instrument(span).await
    }

    async fn tick_inner(&self) -> TickSummary {
        let mut summary = TickSummary::default();

        let pending = std::mem::take(&mut *self.retry.lock().await);
        if !pending.is_empty() {
            info!(count = pending.len(), "retrying failed forwards");
        }
        for new in pending {
            summary.retried += 1;
            self.handle(new, &mut summary).await;
        }

        let conversations = match with_timeout(
            self.settings.timeout_ms,
            self.client.list_conversations(),
        )
        .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    client = %self.client.name(),
                    error = %e,
                    transient = e.is_transient(),
                    "failed to list conversations"
                );
                info!(?summary, "tick finished");
                return summary;
            }
        };

        for conversation in conversations
            .iter()
            .filter(|c| c.id != self.settings.target_conversation_id)
        {
            summary.conversations += 1;
            let messages = match self.monitor.get_new_messages(conversation).await {
                PollOutcome::Polled(messages) => messages,
                PollOutcome::Failed(_) => {
                    summary.failed_conversations += 1;
                    continue;
                }
            };
            for new in messages {
                summary.messages_scanned += 1;
                self.handle(new, &mut summary).await;
            }
        }

        info!(
            conversations = summary.conversations,
            failed_conversations = summary.failed_conversations,
            scanned = summary.messages_scanned,
            push_requests = summary.push_requests,
            duplicates = summary.duplicates,
            forwarded = summary.forwarded,
            forward_failures = summary.forward_failures,
            detector_failures = summary.detector_failures,
            retried = summary.retried,
            "tick finished"
        );
        summary
    }

    async fn handle(&self, new: NewMessage, summary: &mut TickSummary) {
        if let Handled::ForwardFailed = self.process_message(&new, summary).await {
            let mut retry = self.retry.lock().await;
            // Timestamp-less messages are re-read every poll; keep one entry each.
            if !retry.iter().any(|r| r.message.id == new.message.id) {
                retry.push(new);
            }
        }
    }

    async fn process_message(&self, new: &NewMessage, summary: &mut TickSummary) -> Handled {
        let message = &new.message;
        let outcome = match self
            .detector
            .detect(message.text(), &message.attachments)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    conversation_id = %new.conversation_id,
                    message_id = %message.id,
                    detector = %self.detector.name(),
                    error = %e,
                    "detector failed"
                );
                summary.detector_failures += 1;
                return Handled::Done;
            }
        };
        if !outcome.is_push_request {
            debug!(message_id = %message.id, "not a push request");
            return Handled::Done;
        }
        summary.push_requests += 1;
        let job_id = outcome.job_id.as_deref();

        if let Some(reason) = self.duplicates.check(&message.id, job_id).await {
            info!(
                conversation_id = %new.conversation_id,
                message_id = %message.id,
                job_id = ?job_id,
                %reason,
                "push request already relayed"
            );
            summary.duplicates += 1;
            return Handled::Done;
        }

        let request = ForwardRequest {
            source_conversation_id: new.conversation_id.clone(),
            message_id: message.id.clone(),
            target_conversation_id: self.settings.target_conversation_id.clone(),
            annotation: self.settings.forward.render(job_id),
        };
        let forwarded_id =
            match with_timeout(self.settings.timeout_ms, self.client.forward(&request)).await {
                Ok(id) => id,
                Err(e) => {
                    error!(
                        conversation_id = %new.conversation_id,
                        message_id = %message.id,
                        job_id = ?job_id,
                        error = %e,
                        "forward failed, will retry next tick"
                    );
                    summary.forward_failures += 1;
                    return Handled::ForwardFailed;
                }
            };
        summary.forwarded += 1;
        info!(
            conversation_id = %new.conversation_id,
            message_id = %message.id,
            job_id = ?job_id,
            forwarded_message_id = %forwarded_id,
            "push request forwarded"
        );

        if let Err(e) = self
            .forwarded
            .lock()
            .await
            .record(&message.id, job_id, &forwarded_id)
        {
            error!(message_id = %message.id, error = %e, "failed to persist forwarded record");
        }

        if self.settings.add_reaction {
            self.react(new).await;
        }
        Handled::Done
    }

    async fn react(&self, new: &NewMessage) {
        match with_timeout(
            self.settings.timeout_ms,
            self.client.react(&new.conversation_id, &new.message.id),
        )
        .await
        {
            Ok(true) => debug!(message_id = %new.message.id, "reaction added"),
            Ok(false) => warn!(message_id = %new.message.id, "reaction declined"),
            Err(e) => warn!(message_id = %new.message.id, error = %e, "reaction failed"),
        }
    }

    /// Serve tick commands one at a time until shutdown is signalled or the
    /// command channel closes.
    pub async fn run(
        self,
        mut commands: mpsc::Receiver<PipelineCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(target = %self.settings.target_conversation_id, "pipeline started");
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(PipelineCommand::Tick { reply }) => {
                        let summary = self.run_tick().await;
                        if let Some(reply) = reply {
                            let _ = reply.send(summary);
                        }
                    }
                    None => {
                        info!("command channel closed, pipeline stopping");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("pipeline shutting down");
                        break;
                    }
                }
            }
        }
    }
}
