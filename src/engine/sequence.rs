//! Per-session ordering check on the engine side
//!
//! The engine itself is stateless, but the transport is at-least-once. This
//! guard remembers the last admitted respondent depth per emotion so redelivered
//! events are not answered twice and events from the future are refused.

use crate::emotion::Emotion;
use crate::protocol::{ProbeDepth, PromptEvent, RespondentEvent};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Next in sequence; generate and reply
    Fresh,
    /// Same depth as the last one answered; carries the reply already sent
    Repeat(PromptEvent),
    /// From an earlier depth or an earlier selection; drop quietly
    Stale,
}

#[derive(Debug, Clone)]
struct Cursor {
    session_id: Option<Uuid>,
    depth: ProbeDepth,
    reply: PromptEvent,
}

impl Cursor {
    /// Both sides carry an id and the ids differ
    fn is_other_session(&self, event: &RespondentEvent) -> bool {
        matches!((self.session_id, event.session_id), (Some(ours), Some(theirs)) if ours != theirs)
    }
}

#[derive(Debug, Default)]
pub struct SequenceGuard {
    cursors: HashMap<Emotion, Cursor>,
}

impl SequenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `event` without changing anything.
    ///
    /// A selection restarts the sequence only when it carries a session id
    /// different from the current one. Without ids a selection seen after
    /// the cursor moved on is taken for a redelivery.
    ///
    /// Errors describe a protocol violation.
    pub fn check(&self, event: &RespondentEvent) -> Result<Admission, String> {
        let depth = event.probe_depth;
        if depth.is_prompt_depth() || depth.is_terminal() {
            return Err(format!("respondent event carries prompt depth {depth}"));
        }

        let Some(cursor) = self.cursors.get(&event.emotion) else {
            return if depth == ProbeDepth::START {
                Ok(Admission::Fresh)
            } else {
                Err(format!(
                    "expected depth 0 for {}, got depth {depth}",
                    event.emotion
                ))
            };
        };

        if cursor.is_other_session(event) {
            return Ok(if depth == ProbeDepth::START {
                Admission::Fresh
            } else {
                Admission::Stale
            });
        }

        if depth == cursor.depth {
            return Ok(Admission::Repeat(cursor.reply.clone()));
        }
        if depth < cursor.depth {
            return Ok(Admission::Stale);
        }

        let expected = cursor.depth.get() + 2;
        if depth.get() == expected {
            Ok(Admission::Fresh)
        } else {
            Err(format!(
                "expected depth {expected} for {}, got depth {depth}",
                event.emotion
            ))
        }
    }

    /// Record `reply` as the answer to `event`
    pub fn commit(&mut self, event: &RespondentEvent, reply: &PromptEvent) {
        self.cursors.insert(
            event.emotion,
            Cursor {
                session_id: event.session_id,
                depth: event.probe_depth,
                reply: reply.clone(),
            },
        );
    }

    #[cfg(test)]
    pub fn last_depth(&self, emotion: Emotion) -> Option<ProbeDepth> {
        self.cursors.get(&emotion).map(|c| c.depth)
    }
}
