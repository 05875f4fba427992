//! Prompt engine role
//!
//! Consumes respondent events, derives the next prompt, and publishes it as a
//! prompt event one depth further on.

mod sequence;
pub mod templates;

pub use sequence::{Admission, SequenceGuard};

use crate::channel::{publish_json, ChannelError, MessageChannel, Subscription, Topic};
use crate::emotion::Emotion;
use crate::protocol::{decode, DecodeError, ProbeDepth, PromptEvent, RespondentEvent};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("No prompt is defined for respondent depth {0}")]
    UnsupportedDepth(ProbeDepth),
}

/// Source of prompt text for a given point in a session
#[async_trait]
pub trait PromptGenerator: Send + Sync {
    /// Prompt for the respondent event at `depth`, given answers so far
    /// (latest answer included)
    async fn generate(
        &self,
        emotion: Emotion,
        history: &[String],
        depth: ProbeDepth,
    ) -> Result<String, GenerateError>;
}

#[async_trait]
impl<T: PromptGenerator + ?Sized> PromptGenerator for Arc<T> {
    async fn generate(
        &self,
        emotion: Emotion,
        history: &[String],
        depth: ProbeDepth,
    ) -> Result<String, GenerateError> {
        (**self).generate(emotion, history, depth).await
    }
}

/// Fixed-template generator
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

#[async_trait]
impl PromptGenerator for TemplateGenerator {
    async fn generate(
        &self,
        emotion: Emotion,
        history: &[String],
        depth: ProbeDepth,
    ) -> Result<String, GenerateError> {
        templates::generate(emotion.label(), history, depth)
    }
}

/// Why an inbound respondent event got no reply
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Malformed(#[from] DecodeError),
    #[error("Respondent event for {0} has no answer text")]
    EmptyAnswer(Emotion),
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// What happened to one inbound payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    Replied(PromptEvent),
    /// Redelivery of the latest event; the earlier reply was sent again
    Resent(PromptEvent),
    Discarded,
}

/// The engine actor. Owns its sequence guard exclusively.
pub struct PromptEngine<G, C>
where
    G: PromptGenerator,
    C: MessageChannel,
{
    generator: G,
    channel: Arc<C>,
    guard: SequenceGuard,
}

impl<G, C> PromptEngine<G, C>
where
    G: PromptGenerator + 'static,
    C: MessageChannel + 'static,
{
    pub fn new(generator: G, channel: Arc<C>) -> Self {
        Self {
            generator,
            channel,
            guard: SequenceGuard::new(),
        }
    }

    /// Subscribe, then run the engine loop in the background until `shutdown`
    pub async fn spawn(
        self,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>, ChannelError> {
        let inbound = self.channel.subscribe(Topic::RespondentEvents).await?;
        Ok(tokio::spawn(self.run(inbound, shutdown)))
    }

    pub async fn run(mut self, mut inbound: Subscription, shutdown: CancellationToken) {
        tracing::info!(topic = %inbound.topic(), "Prompt engine started");

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                payload = inbound.recv() => {
                    let Some(payload) = payload else {
                        tracing::warn!("Respondent event stream closed");
                        break;
                    };
                    match self.handle_payload(&payload).await {
                        Ok(_) => {}
                        Err(EngineError::Channel(e)) => {
                            tracing::error!(error = %e, "Failed to publish prompt event");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Respondent event rejected");
                        }
                    }
                }
            }
        }

        tracing::info!("Prompt engine stopped");
    }

    /// Decode, check ordering, generate, and publish the reply
    pub async fn handle_payload(&mut self, payload: &str) -> Result<Handled, EngineError> {
        let event: RespondentEvent = decode(payload)?;

        if event.answer_text.trim().is_empty() {
            return Err(EngineError::EmptyAnswer(event.emotion));
        }

        match self
            .guard
            .check(&event)
            .map_err(EngineError::ProtocolViolation)?
        {
            Admission::Stale => {
                tracing::debug!(
                    emotion = %event.emotion,
                    depth = %event.probe_depth,
                    "Discarding stale respondent event"
                );
                Ok(Handled::Discarded)
            }
            Admission::Repeat(reply) => {
                tracing::debug!(
                    emotion = %event.emotion,
                    depth = %event.probe_depth,
                    "Duplicate respondent event, re-sending earlier reply"
                );
                publish_json(&*self.channel, Topic::PromptEvents, &reply).await?;
                Ok(Handled::Resent(reply))
            }
            Admission::Fresh => {
                let history = event.history_with_answer();
                let prompt_text = self
                    .generator
                    .generate(event.emotion, &history, event.probe_depth)
                    .await?;
                let reply = PromptEvent::reply_to(&event, prompt_text)
                    .ok_or(GenerateError::UnsupportedDepth(event.probe_depth))?;

                publish_json(&*self.channel, Topic::PromptEvents, &reply).await?;
                self.guard.commit(&event, &reply);

                tracing::info!(
                    emotion = %reply.emotion,
                    depth = %reply.probe_depth,
                    "Prompt published"
                );
                Ok(Handled::Replied(reply))
            }
        }
    }
}
