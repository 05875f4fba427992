//! Respondent driver role
//!
//! Owns the session state machine. Front-end commands and inbound prompt
//! events are fed through `transition`; effects are executed here.

mod executor;

pub use executor::RespondentDriver;

use crate::channel::ChannelError;
use crate::emotion::Emotion;
use crate::protocol::ProbeDepth;
use crate::session::RespondentState;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Requests from whoever is collecting the participant's input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select(Emotion),
    Answer(String),
    Finish,
}

/// Notifications for the front end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverUpdate {
    /// A prompt is waiting for an answer
    Prompt {
        emotion: Emotion,
        depth: ProbeDepth,
        text: String,
    },
    /// The closing prompt arrived
    Completed {
        emotion: Emotion,
        closing_text: String,
        completed: usize,
        remaining: Vec<Emotion>,
    },
    /// A selection or answer was refused; ask again
    Rejected {
        message: String,
        invalid_selection: bool,
    },
    /// The engine never replied and the session was dropped
    EngineUnavailable { emotion: Emotion, depth: ProbeDepth },
    Finished,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Running driver plus the ends the front end talks to
pub struct DriverHandle {
    pub commands: mpsc::Sender<Command>,
    pub updates: broadcast::Receiver<DriverUpdate>,
    pub task: JoinHandle<Result<RespondentState, DriverError>>,
}
