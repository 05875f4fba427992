//! Publish/subscribe transport seam
//!
//! The core only needs `publish(topic, payload)` and ordered delivery to every
//! subscriber of a topic. `MemoryChannel` provides that in-process.

#[cfg(test)]
pub mod testing;

use crate::protocol::{encode, DecodeError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

/// The two one-way topics between the roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Respondent driver -> prompt engine
    RespondentEvents,
    /// Prompt engine -> respondent driver
    PromptEvents,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::RespondentEvents => "respondent-events",
            Topic::PromptEvents => "prompt-events",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,
    #[error("Encoding failed: {0}")]
    Encode(#[from] DecodeError),
}

/// Inbound payloads for one topic, in publish order
pub struct Subscription {
    topic: Topic,
    rx: mpsc::Receiver<String>,
}

impl Subscription {
    pub fn new(topic: Topic, rx: mpsc::Receiver<String>) -> Self {
        Self { topic, rx }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Wait for the next payload. None once the channel is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Transport used by both roles
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Deliver `payload` to every current subscriber of `topic`
    async fn publish(&self, topic: Topic, payload: String) -> Result<(), ChannelError>;

    /// Start receiving payloads published on `topic` from now on
    async fn subscribe(&self, topic: Topic) -> Result<Subscription, ChannelError>;
}

#[async_trait]
impl<T: MessageChannel + ?Sized> MessageChannel for Arc<T> {
    async fn publish(&self, topic: Topic, payload: String) -> Result<(), ChannelError> {
        (**self).publish(topic, payload).await
    }

    async fn subscribe(&self, topic: Topic) -> Result<Subscription, ChannelError> {
        (**self).subscribe(topic).await
    }
}

/// Encode `message` as JSON and publish it
pub async fn publish_json<C, T>(channel: &C, topic: Topic, message: &T) -> Result<(), ChannelError>
where
    C: MessageChannel + ?Sized,
    T: Serialize + Sync,
{
    let payload = encode(message)?;
    channel.publish(topic, payload).await
}

// ============================================================================
// In-process implementation
// ============================================================================

/// Fan-out channel living in this process.
///
/// Each subscriber gets a bounded queue; publishing waits for room, so a slow
/// consumer applies backpressure instead of losing messages.
pub struct MemoryChannel {
    capacity: usize,
    subscribers: Mutex<HashMap<Topic, Vec<mpsc::Sender<String>>>>,
}

impl MemoryChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    fn senders(&self, topic: Topic) -> Vec<mpsc::Sender<String>> {
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        subscribers.get(&topic).cloned().unwrap_or_default()
    }

    fn prune(&self, topic: Topic) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(list) = subscribers.get_mut(&topic) {
            list.retain(|tx| !tx.is_closed());
        }
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn publish(&self, topic: Topic, payload: String) -> Result<(), ChannelError> {
        let senders = self.senders(topic);
        if senders.is_empty() {
            tracing::debug!(%topic, "No subscribers, message dropped");
            return Ok(());
        }

        let mut saw_closed = false;
        for tx in &senders {
            if tx.send(payload.clone()).await.is_err() {
                saw_closed = true;
            }
        }
        if saw_closed {
            self.prune(topic);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: Topic) -> Result<Subscription, ChannelError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(topic)
            .or_default()
            .push(tx);
        Ok(Subscription::new(topic, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out_in_order() {
        let channel = MemoryChannel::new(8);
        let mut a = channel.subscribe(Topic::PromptEvents).await.unwrap();
        let mut b = channel.subscribe(Topic::PromptEvents).await.unwrap();

        for i in 0..3 {
            channel
                .publish(Topic::PromptEvents, format!("msg-{i}"))
                .await
                .unwrap();
        }

        for sub in [&mut a, &mut b] {
            for i in 0..3 {
                assert_eq!(sub.recv().await.unwrap(), format!("msg-{i}"));
            }
        }
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let channel = MemoryChannel::default();
        let mut prompts = channel.subscribe(Topic::PromptEvents).await.unwrap();
        channel
            .publish(Topic::RespondentEvents, "hello".to_string())
            .await
            .unwrap();
        channel
            .publish(Topic::PromptEvents, "world".to_string())
            .await
            .unwrap();
        assert_eq!(prompts.topic(), Topic::PromptEvents);
        assert_eq!(prompts.recv().await.unwrap(), "world");
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let channel = MemoryChannel::default();
        let dropped = channel.subscribe(Topic::RespondentEvents).await.unwrap();
        let mut live = channel.subscribe(Topic::RespondentEvents).await.unwrap();
        drop(dropped);

        channel
            .publish(Topic::RespondentEvents, "one".to_string())
            .await
            .unwrap();
        assert_eq!(live.recv().await.unwrap(), "one");
        assert_eq!(channel.senders(Topic::RespondentEvents).len(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let channel = MemoryChannel::default();
        assert!(channel
            .publish(Topic::PromptEvents, "nobody".to_string())
            .await
            .is_ok());
    }

    #[test]
    fn test_topic_names() {
        assert_eq!(Topic::RespondentEvents.to_string(), "respondent-events");
        assert_eq!(Topic::PromptEvents.as_str(), "prompt-events");
    }
}
