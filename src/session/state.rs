//! Respondent state types

use crate::emotion::{CompletionLedger, Emotion};
use crate::protocol::{ProbeDepth, RespondentEvent};
use uuid::Uuid;

/// Reflection on one emotion.
///
/// `depth` is the depth of the last accepted event. `history` only ever grows
/// and holds `depth.answer_count()` answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub emotion: Emotion,
    pub depth: ProbeDepth,
    pub history: Vec<String>,
}

impl Session {
    pub fn start(id: Uuid, emotion: Emotion) -> Self {
        Self {
            id,
            emotion,
            depth: ProbeDepth::START,
            history: vec![],
        }
    }

    /// Depth of the prompt this session is waiting for, if any
    pub fn expected_prompt_depth(&self) -> Option<ProbeDepth> {
        if self.depth.is_prompt_depth() {
            None
        } else {
            self.depth.next()
        }
    }

    /// Fold an answer into the session and build the event announcing it.
    ///
    /// The event carries the history as it was before the answer.
    pub(crate) fn accept_answer(&mut self, text: String, next: ProbeDepth) -> RespondentEvent {
        let event = RespondentEvent {
            answer_text: text.clone(),
            emotion: self.emotion,
            history: self.history.clone(),
            probe_depth: next,
            session_id: Some(self.id),
        };
        self.history.push(text);
        self.depth = next;
        event
    }
}

/// Where the respondent is in the run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No active session; an emotion may be selected
    #[default]
    Idle,

    /// Respondent event published, waiting for the engine (even depth)
    AwaitingPrompt { session: Session },

    /// Prompt surfaced, waiting for the participant (odd depth below 7)
    AwaitingAnswer { session: Session, prompt_text: String },

    /// The participant ended the run. Terminal.
    Finished,
}

/// Everything the respondent driver owns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RespondentState {
    pub phase: SessionPhase,
    pub ledger: CompletionLedger,
}

impl RespondentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_session(&self) -> Option<&Session> {
        match &self.phase {
            SessionPhase::AwaitingPrompt { session }
            | SessionPhase::AwaitingAnswer { session, .. } => Some(session),
            SessionPhase::Idle | SessionPhase::Finished => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, SessionPhase::Finished)
    }

    /// Short name for logs
    pub fn phase_name(&self) -> &'static str {
        match self.phase {
            SessionPhase::Idle => "idle",
            SessionPhase::AwaitingPrompt { .. } => "awaiting_prompt",
            SessionPhase::AwaitingAnswer { .. } => "awaiting_answer",
            SessionPhase::Finished => "finished",
        }
    }
}
