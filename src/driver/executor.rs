//! Respondent driver runtime

use super::{Command, DriverError, DriverHandle, DriverUpdate};
use crate::channel::{publish_json, ChannelError, MessageChannel, Subscription, Topic};
use crate::config::ReflectionConfig;
use crate::protocol::{decode, PromptEvent, RespondentEvent};
use crate::response_log::{ExchangeRecord, ResponseLog};
use crate::session::{transition, Effect, Event, RespondentState, SessionPhase, TransitionError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A published respondent event still owed a prompt
#[derive(Debug)]
struct PendingReply {
    event: RespondentEvent,
    deadline: Instant,
    retries_left: u32,
}

/// Single-task owner of one respondent's state
pub struct RespondentDriver<C>
where
    C: MessageChannel + 'static,
{
    state: RespondentState,
    channel: Arc<C>,
    response_log: Arc<dyn ResponseLog>,
    reply_timeout: Duration,
    reply_retries: u32,
    command_rx: mpsc::Receiver<Command>,
    updates_tx: broadcast::Sender<DriverUpdate>,
    pending_reply: Option<PendingReply>,
}

impl<C> RespondentDriver<C>
where
    C: MessageChannel + 'static,
{
    pub fn new(
        channel: Arc<C>,
        response_log: Arc<dyn ResponseLog>,
        config: &ReflectionConfig,
        command_rx: mpsc::Receiver<Command>,
        updates_tx: broadcast::Sender<DriverUpdate>,
    ) -> Self {
        Self {
            state: RespondentState::new(),
            channel,
            response_log,
            reply_timeout: config.reply_timeout,
            reply_retries: config.reply_retries,
            command_rx,
            updates_tx,
            pending_reply: None,
        }
    }

    /// Subscribe to prompt events, then run the driver in the background.
    ///
    /// The subscription is in place before any command can be sent, so the
    /// first reply cannot be missed.
    pub async fn spawn(
        channel: Arc<C>,
        response_log: Arc<dyn ResponseLog>,
        config: &ReflectionConfig,
        shutdown: CancellationToken,
    ) -> Result<DriverHandle, ChannelError> {
        let inbound = channel.subscribe(Topic::PromptEvents).await?;
        let (command_tx, command_rx) = mpsc::channel(config.channel_capacity);
        let (updates_tx, updates_rx) = broadcast::channel(config.channel_capacity);

        let driver = Self::new(channel, response_log, config, command_rx, updates_tx);
        let task = tokio::spawn(driver.run(inbound, shutdown));

        Ok(DriverHandle {
            commands: command_tx,
            updates: updates_rx,
            task,
        })
    }

    pub async fn run(
        mut self,
        mut inbound: Subscription,
        shutdown: CancellationToken,
    ) -> Result<RespondentState, DriverError> {
        tracing::info!(topic = %inbound.topic(), "Respondent driver started");

        while !self.state.is_finished() {
            let deadline = self.pending_reply.as_ref().map(|p| p.deadline);

            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    self.process_event(Event::Finish).await?;
                }

                command = self.command_rx.recv() => {
                    // Front end gone counts as finishing
                    let event = command.map_or(Event::Finish, Self::command_event);
                    self.process_event(event).await?;
                }

                payload = inbound.recv() => {
                    let Some(payload) = payload else {
                        tracing::error!("Prompt event stream closed");
                        return Err(ChannelError::Closed.into());
                    };
                    self.handle_payload(&payload).await?;
                }

                () = sleep_until_deadline(deadline) => {
                    self.handle_reply_timeout().await?;
                }
            }
        }

        tracing::info!(completed = self.state.ledger.len(), "Respondent driver stopped");
        Ok(self.state)
    }

    fn command_event(command: Command) -> Event {
        match command {
            Command::Select(emotion) => Event::SelectEmotion {
                emotion,
                session_id: Uuid::new_v4(),
            },
            Command::Answer(text) => Event::AnswerSubmitted { text },
            Command::Finish => Event::Finish,
        }
    }

    async fn handle_payload(&mut self, payload: &str) -> Result<(), DriverError> {
        match decode::<PromptEvent>(payload) {
            Ok(prompt) => self.process_event(Event::PromptReceived(prompt)).await,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed prompt event");
                Ok(())
            }
        }
    }

    async fn handle_reply_timeout(&mut self) -> Result<(), DriverError> {
        let Some(mut pending) = self.pending_reply.take() else {
            return Ok(());
        };

        if pending.retries_left > 0 {
            pending.retries_left -= 1;
            tracing::warn!(
                emotion = %pending.event.emotion,
                depth = %pending.event.probe_depth,
                "No prompt received in time, republishing"
            );
            publish_json(&*self.channel, Topic::RespondentEvents, &pending.event).await?;
            pending.deadline = Instant::now() + self.reply_timeout;
            self.pending_reply = Some(pending);
            return Ok(());
        }

        tracing::error!(
            emotion = %pending.event.emotion,
            depth = %pending.event.probe_depth,
            "Prompt engine unavailable"
        );
        self.process_event(Event::ReplyTimedOut {
            emotion: pending.event.emotion,
            depth: pending.event.probe_depth,
        })
        .await
    }

    async fn process_event(&mut self, event: Event) -> Result<(), DriverError> {
        let result = match transition(&self.state, event) {
            Ok(r) => r,
            Err(e) => {
                self.report_rejection(&e);
                return Ok(());
            }
        };

        self.state = result.new_state;
        if !matches!(self.state.phase, SessionPhase::AwaitingPrompt { .. }) {
            self.pending_reply = None;
        }
        tracing::debug!(
            phase = self.state.phase_name(),
            depth = ?self.state.active_session().map(|s| s.depth.get()),
            "State updated"
        );

        for effect in result.effects {
            self.execute_effect(effect).await?;
        }
        Ok(())
    }

    fn report_rejection(&self, error: &TransitionError) {
        match error {
            TransitionError::ProtocolViolation(_) => {
                tracing::warn!(error = %error, phase = self.state.phase_name(), "Prompt event rejected");
            }
            TransitionError::Finished => {
                tracing::debug!("Event after finish ignored");
            }
            TransitionError::AlreadyCompleted(_)
            | TransitionError::SessionActive(_)
            | TransitionError::AnswerNotExpected
            | TransitionError::EmptyAnswer => {
                tracing::info!(error = %error, "Request rejected");
                let _ = self.updates_tx.send(DriverUpdate::Rejected {
                    message: error.to_string(),
                    invalid_selection: error.is_invalid_selection(),
                });
            }
        }
    }

    async fn execute_effect(&mut self, effect: Effect) -> Result<(), DriverError> {
        match effect {
            Effect::Publish(event) => {
                publish_json(&*self.channel, Topic::RespondentEvents, &event).await?;
                tracing::info!(
                    emotion = %event.emotion,
                    depth = %event.probe_depth,
                    "Respondent event published"
                );
                self.pending_reply = Some(PendingReply {
                    event,
                    deadline: Instant::now() + self.reply_timeout,
                    retries_left: self.reply_retries,
                });
            }

            Effect::SurfacePrompt {
                emotion,
                depth,
                prompt_text,
            } => {
                let _ = self.updates_tx.send(DriverUpdate::Prompt {
                    emotion,
                    depth,
                    text: prompt_text,
                });
            }

            Effect::RecordExchange {
                session_id,
                emotion,
                depth,
                answer_text,
                prompt_text,
            } => {
                let record = ExchangeRecord {
                    timestamp: Utc::now(),
                    session_id,
                    emotion,
                    answer_text,
                    prompt_text,
                    probe_depth: depth,
                };
                // Losing a log row must not stall the interview
                if let Err(e) = self.response_log.record(&record).await {
                    tracing::warn!(error = %e, "Failed to record exchange");
                }
            }

            Effect::SessionCompleted {
                emotion,
                closing_text,
                remaining,
            } => {
                tracing::info!(%emotion, remaining = remaining.len(), "Reflection completed");
                let _ = self.updates_tx.send(DriverUpdate::Completed {
                    emotion,
                    closing_text,
                    completed: self.state.ledger.len(),
                    remaining,
                });
            }

            Effect::SessionAbandoned { emotion, depth } => {
                tracing::warn!(%emotion, %depth, "Session abandoned");
                let _ = self
                    .updates_tx
                    .send(DriverUpdate::EngineUnavailable { emotion, depth });
            }

            Effect::Stop => {
                tracing::info!("Reflection run finished");
                let _ = self.updates_tx.send(DriverUpdate::Finished);
            }
        }
        Ok(())
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
