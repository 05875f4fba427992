//! Pure state transition function
//!
//! Depth advances by exactly one per accepted event: selection (0), prompt (1),
//! answer (2), prompt (3), answer (4), prompt (5), answer (6), closing (7).

use super::{Effect, Event, RespondentState, Session, SessionPhase};
use crate::emotion::Emotion;
use crate::protocol::{PromptEvent, RespondentEvent};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: RespondentState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: RespondentState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// State unchanged, nothing to do
    fn ignored(state: &RespondentState) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid selection: {0} has already been reflected on")]
    AlreadyCompleted(Emotion),
    #[error("Invalid selection: the reflection on {0} is still in progress")]
    SessionActive(Emotion),
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("No answer is expected right now")]
    AnswerNotExpected,
    #[error("Answer must not be empty")]
    EmptyAnswer,
    #[error("Session has finished")]
    Finished,
}

impl TransitionError {
    /// Selection errors are reported back to the participant for a new choice
    pub fn is_invalid_selection(&self) -> bool {
        matches!(
            self,
            TransitionError::AlreadyCompleted(_) | TransitionError::SessionActive(_)
        )
    }
}

/// Pure transition function.
///
/// Replaying an event that was already applied returns the state unchanged
/// with no effects.
pub fn transition(
    state: &RespondentState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (&state.phase, event) {
        // ============================================================
        // Finishing
        // ============================================================
        (SessionPhase::Finished, Event::Finish) => Ok(TransitionResult::ignored(state)),

        (SessionPhase::Finished, _) => Err(TransitionError::Finished),

        (_, Event::Finish) => Ok(TransitionResult::new(RespondentState {
            phase: SessionPhase::Finished,
            ledger: state.ledger.clone(),
        })
        .with_effect(Effect::Stop)),

        // ============================================================
        // Emotion selection
        // ============================================================
        (SessionPhase::Idle, Event::SelectEmotion { emotion, .. })
            if state.ledger.contains(emotion) =>
        {
            Err(TransitionError::AlreadyCompleted(emotion))
        }

        (SessionPhase::Idle, Event::SelectEmotion { emotion, session_id }) => {
            let session = Session::start(session_id, emotion);
            Ok(TransitionResult::new(RespondentState {
                phase: SessionPhase::AwaitingPrompt { session },
                ledger: state.ledger.clone(),
            })
            .with_effect(Effect::Publish(
                RespondentEvent::selection(emotion).with_session(session_id),
            )))
        }

        (
            SessionPhase::AwaitingPrompt { session } | SessionPhase::AwaitingAnswer { session, .. },
            Event::SelectEmotion { emotion, .. },
        ) => {
            if state.ledger.contains(emotion) {
                Err(TransitionError::AlreadyCompleted(emotion))
            } else {
                Err(TransitionError::SessionActive(session.emotion))
            }
        }

        // ============================================================
        // Prompts from the engine
        // ============================================================
        (SessionPhase::AwaitingPrompt { session }, Event::PromptReceived(prompt)) => {
            match check_prompt(state, session, &prompt)? {
                PromptCheck::Stale => Ok(TransitionResult::ignored(state)),
                PromptCheck::Expected => Ok(accept_prompt(state, session, prompt)),
            }
        }

        (SessionPhase::AwaitingAnswer { session, .. }, Event::PromptReceived(prompt)) => {
            match check_prompt(state, session, &prompt)? {
                PromptCheck::Stale => Ok(TransitionResult::ignored(state)),
                // A prompt is already surfaced; the engine cannot be ahead of us
                PromptCheck::Expected => Err(TransitionError::ProtocolViolation(format!(
                    "prompt at depth {} while awaiting an answer at depth {}",
                    prompt.probe_depth, session.depth
                ))),
            }
        }

        (SessionPhase::Idle, Event::PromptReceived(prompt)) => {
            if state.ledger.contains(prompt.emotion) {
                Ok(TransitionResult::ignored(state))
            } else {
                Err(TransitionError::ProtocolViolation(format!(
                    "prompt for {} at depth {} with no active session",
                    prompt.emotion, prompt.probe_depth
                )))
            }
        }

        // ============================================================
        // Answers from the participant
        // ============================================================
        (SessionPhase::AwaitingAnswer { .. }, Event::AnswerSubmitted { text })
            if text.trim().is_empty() =>
        {
            Err(TransitionError::EmptyAnswer)
        }

        (SessionPhase::AwaitingAnswer { session, .. }, Event::AnswerSubmitted { text }) => {
            let next = session
                .depth
                .next()
                .ok_or(TransitionError::AnswerNotExpected)?;
            let mut session = session.clone();
            let published = session.accept_answer(text, next);
            Ok(TransitionResult::new(RespondentState {
                phase: SessionPhase::AwaitingPrompt { session },
                ledger: state.ledger.clone(),
            })
            .with_effect(Effect::Publish(published)))
        }

        (SessionPhase::Idle | SessionPhase::AwaitingPrompt { .. }, Event::AnswerSubmitted { .. }) => {
            Err(TransitionError::AnswerNotExpected)
        }

        // ============================================================
        // Engine unavailable
        // ============================================================
        (SessionPhase::AwaitingPrompt { session }, Event::ReplyTimedOut { emotion, depth })
            if session.emotion == emotion && session.depth == depth =>
        {
            Ok(TransitionResult::new(RespondentState {
                phase: SessionPhase::Idle,
                ledger: state.ledger.clone(),
            })
            .with_effect(Effect::SessionAbandoned { emotion, depth }))
        }

        // Timer raced with a reply that already moved us on
        (_, Event::ReplyTimedOut { .. }) => Ok(TransitionResult::ignored(state)),
    }
}

enum PromptCheck {
    /// Already applied, or left over from an earlier depth
    Stale,
    /// Exactly the next depth for the active session
    Expected,
}

fn check_prompt(
    state: &RespondentState,
    session: &Session,
    prompt: &PromptEvent,
) -> Result<PromptCheck, TransitionError> {
    if prompt.emotion != session.emotion {
        if state.ledger.contains(prompt.emotion) {
            return Ok(PromptCheck::Stale);
        }
        return Err(TransitionError::ProtocolViolation(format!(
            "prompt for {} while reflecting on {}",
            prompt.emotion, session.emotion
        )));
    }
    // Reply addressed to an earlier selection of the same emotion
    if prompt.session_id.is_some_and(|id| id != session.id) {
        return Ok(PromptCheck::Stale);
    }
    if !prompt.probe_depth.is_prompt_depth() {
        return Err(TransitionError::ProtocolViolation(format!(
            "prompt carries respondent depth {}",
            prompt.probe_depth
        )));
    }
    if prompt.probe_depth <= session.depth {
        return Ok(PromptCheck::Stale);
    }
    match session.expected_prompt_depth() {
        Some(expected) if expected == prompt.probe_depth => Ok(PromptCheck::Expected),
        Some(expected) => Err(TransitionError::ProtocolViolation(format!(
            "expected prompt at depth {expected}, got depth {}",
            prompt.probe_depth
        ))),
        None => Ok(PromptCheck::Expected),
    }
}

fn accept_prompt(state: &RespondentState, session: &Session, prompt: PromptEvent) -> TransitionResult {
    let record = Effect::record_exchange(session.id, &prompt);
    let mut session = session.clone();
    session.depth = prompt.probe_depth;

    if prompt.probe_depth.is_terminal() {
        let mut ledger = state.ledger.clone();
        ledger.record(session.emotion);
        let remaining = ledger.remaining();
        return TransitionResult::new(RespondentState {
            phase: SessionPhase::Idle,
            ledger,
        })
        .with_effect(record)
        .with_effect(Effect::SessionCompleted {
            emotion: session.emotion,
            closing_text: prompt.prompt_text,
            remaining,
        });
    }

    TransitionResult::new(RespondentState {
        phase: SessionPhase::AwaitingAnswer {
            prompt_text: prompt.prompt_text.clone(),
            session,
        },
        ledger: state.ledger.clone(),
    })
    .with_effect(record)
    .with_effect(Effect::SurfacePrompt {
        emotion: prompt.emotion,
        depth: prompt.probe_depth,
        prompt_text: prompt.prompt_text,
    })
}
