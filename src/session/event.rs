//! Events that can occur during a reflection run

use crate::emotion::Emotion;
use crate::protocol::{ProbeDepth, PromptEvent};
use uuid::Uuid;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Respondent events
    SelectEmotion {
        emotion: Emotion,
        /// Minted by the runtime so the transition stays pure
        session_id: Uuid,
    },
    AnswerSubmitted {
        text: String,
    },
    Finish,

    // Engine events
    PromptReceived(PromptEvent),

    // Runtime events
    /// No reply arrived for the respondent event at `depth`, retries included
    ReplyTimedOut {
        emotion: Emotion,
        depth: ProbeDepth,
    },
}
