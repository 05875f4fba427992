//! Wire messages exchanged between the respondent driver and the prompt engine
//!
//! Payloads are JSON objects with camelCase field names. Unknown or missing
//! fields make a payload malformed; receivers drop it and keep listening.
//! `sessionId` is the one optional field: peers that omit it still interoperate,
//! but cannot tell a redelivered selection from a new one.

use crate::emotion::Emotion;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Round-trip counter for one emotion's session, always within `0..=7`.
///
/// Even depths are produced by the respondent, odd depths by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ProbeDepth(u8);

impl ProbeDepth {
    pub const START: ProbeDepth = ProbeDepth(0);
    pub const TERMINAL: ProbeDepth = ProbeDepth(7);

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::TERMINAL.0).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The following depth, or None past the terminal depth
    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::TERMINAL
    }

    /// Odd depths carry engine prompts
    pub fn is_prompt_depth(self) -> bool {
        self.0 % 2 == 1
    }

    /// Number of free-text answers a session holds once it reaches this depth
    pub fn answer_count(self) -> usize {
        usize::from(self.0 / 2)
    }
}

impl fmt::Display for ProbeDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
#[error("probe depth {0} is outside 0..=7")]
pub struct DepthOutOfRange(i64);

impl TryFrom<i64> for ProbeDepth {
    type Error = DepthOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(ProbeDepth::new)
            .ok_or(DepthOutOfRange(value))
    }
}

impl From<ProbeDepth> for u8 {
    fn from(depth: ProbeDepth) -> Self {
        depth.0
    }
}

/// An answer (or the initial emotion selection) published by the respondent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RespondentEvent {
    /// Free-text answer; the emotion's menu token at depth 0
    pub answer_text: String,
    pub emotion: Emotion,
    /// Answers given before this one
    pub history: Vec<String>,
    pub probe_depth: ProbeDepth,
    /// Identifies one selection of the emotion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

impl RespondentEvent {
    /// The depth-0 event announcing a freshly selected emotion
    pub fn selection(emotion: Emotion) -> Self {
        Self {
            answer_text: emotion.token().to_string(),
            emotion,
            history: vec![],
            probe_depth: ProbeDepth::START,
            session_id: None,
        }
    }

    #[must_use]
    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// History as the engine sees it once this event is folded in.
    ///
    /// The selection token at depth 0 is not an answer and is left out.
    pub fn history_with_answer(&self) -> Vec<String> {
        let mut history = self.history.clone();
        if self.probe_depth != ProbeDepth::START {
            history.push(self.answer_text.clone());
        }
        history
    }
}

/// A generated prompt published by the engine in reply to a respondent event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PromptEvent {
    pub emotion: Emotion,
    /// Echo of the answer being replied to
    pub answer_text: String,
    /// Answers including the one being replied to
    pub history: Vec<String>,
    pub probe_depth: ProbeDepth,
    pub prompt_text: String,
    /// Echo of the respondent event's session id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

impl PromptEvent {
    /// Build the reply to `event`, one depth further on.
    ///
    /// Returns None when `event` is already at the terminal depth.
    pub fn reply_to(event: &RespondentEvent, prompt_text: impl Into<String>) -> Option<Self> {
        Some(Self {
            emotion: event.emotion,
            answer_text: event.answer_text.clone(),
            history: event.history_with_answer(),
            probe_depth: event.probe_depth.next()?,
            prompt_text: prompt_text.into(),
            session_id: event.session_id,
        })
    }
}

/// Payload could not be turned into a wire message
#[derive(Debug, Error)]
#[error("Malformed message: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

pub fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, DecodeError> {
    Ok(serde_json::from_str(payload)?)
}

pub fn encode<T: Serialize>(message: &T) -> Result<String, DecodeError> {
    Ok(serde_json::to_string(message)?)
}
