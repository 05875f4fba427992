//! Effects produced by state transitions

use crate::emotion::Emotion;
use crate::protocol::{ProbeDepth, PromptEvent, RespondentEvent};
use uuid::Uuid;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Publish on the respondent-events topic and wait for the reply
    Publish(RespondentEvent),

    /// Show a prompt to the participant and wait for their answer
    SurfacePrompt {
        emotion: Emotion,
        depth: ProbeDepth,
        prompt_text: String,
    },

    /// Hand one answer/prompt exchange to the response log
    RecordExchange {
        session_id: Uuid,
        emotion: Emotion,
        depth: ProbeDepth,
        answer_text: String,
        prompt_text: String,
    },

    /// The closing prompt arrived and the emotion is in the ledger
    SessionCompleted {
        emotion: Emotion,
        closing_text: String,
        remaining: Vec<Emotion>,
    },

    /// The engine never replied; the emotion stays selectable
    SessionAbandoned { emotion: Emotion, depth: ProbeDepth },

    /// Stop the driver
    Stop,
}

impl Effect {
    pub fn record_exchange(session_id: Uuid, prompt: &PromptEvent) -> Self {
        Effect::RecordExchange {
            session_id,
            emotion: prompt.emotion,
            depth: prompt.probe_depth,
            answer_text: prompt.answer_text.clone(),
            prompt_text: prompt.prompt_text.clone(),
        }
    }
}
