//! Channel doubles for testing
//!
//! Wrap a `MemoryChannel` and misbehave on purpose: drop publishes, deliver
//! them twice, or record everything that went through.

use super::*;
use std::collections::VecDeque;

/// What to do with the next publish on a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Drop,
    Duplicate,
}

/// Memory channel with scripted faults and a publish log
pub struct FaultyChannel {
    inner: MemoryChannel,
    faults: Mutex<HashMap<Topic, VecDeque<Fault>>>,
    /// Every payload handed to `publish`, faults included
    pub published: Mutex<Vec<(Topic, String)>>,
}

impl FaultyChannel {
    pub fn new() -> Self {
        Self {
            inner: MemoryChannel::new(64),
            faults: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Apply `fault` to the next not-yet-faulted publish on `topic`
    pub fn queue_fault(&self, topic: Topic, fault: Fault) {
        self.faults
            .lock()
            .unwrap()
            .entry(topic)
            .or_default()
            .push_back(fault);
    }

    /// Payloads published on `topic`, in order
    pub fn published_on(&self, topic: Topic) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Inject a raw payload as if some other publisher sent it
    pub async fn inject(&self, topic: Topic, payload: impl Into<String>) {
        self.inner.publish(topic, payload.into()).await.unwrap();
    }
}

impl Default for FaultyChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageChannel for FaultyChannel {
    async fn publish(&self, topic: Topic, payload: String) -> Result<(), ChannelError> {
        self.published
            .lock()
            .unwrap()
            .push((topic, payload.clone()));
        let fault = self
            .faults
            .lock()
            .unwrap()
            .get_mut(&topic)
            .and_then(VecDeque::pop_front);
        match fault {
            Some(Fault::Drop) => Ok(()),
            Some(Fault::Duplicate) => {
                self.inner.publish(topic, payload.clone()).await?;
                self.inner.publish(topic, payload).await
            }
            None => self.inner.publish(topic, payload).await,
        }
    }

    async fn subscribe(&self, topic: Topic) -> Result<Subscription, ChannelError> {
        self.inner.subscribe(topic).await
    }
}
