//! Property-based tests for the session state machine
//!
//! A well-behaved engine is simulated alongside arbitrary participant input,
//! replays, forged prompts, and timeouts.

use super::*;
use crate::emotion::Emotion;
use crate::protocol::{ProbeDepth, PromptEvent, RespondentEvent};
use proptest::prelude::*;
use uuid::Uuid;

// ============================================================================
// Arbitrary Generators
// ============================================================================

#[derive(Debug, Clone)]
enum Action {
    Select(Emotion),
    Answer(String),
    /// Engine replies to the last published respondent event
    Deliver,
    /// Last delivered prompt arrives again
    Replay,
    Forge { emotion: Emotion, depth: u8 },
    Timeout,
    Finish,
}

fn arb_emotion() -> impl Strategy<Value = Emotion> {
    prop_oneof![
        Just(Emotion::Excitement),
        Just(Emotion::Uncertainty),
        Just(Emotion::Frustration),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => arb_emotion().prop_map(Action::Select),
        4 => "[a-z ]{0,12}".prop_map(Action::Answer),
        6 => Just(Action::Deliver),
        2 => Just(Action::Replay),
        2 => (arb_emotion(), 0u8..=7).prop_map(|(emotion, depth)| Action::Forge { emotion, depth }),
        1 => Just(Action::Timeout),
        1 => Just(Action::Finish),
    ]
}

// ============================================================================
// Simulation
// ============================================================================

#[derive(Default)]
struct Harness {
    state: RespondentState,
    pending: Option<RespondentEvent>,
    last_prompt: Option<PromptEvent>,
}

impl Harness {
    fn event_for(&mut self, action: Action) -> Option<Event> {
        match action {
            Action::Select(emotion) => Some(Event::SelectEmotion {
                emotion,
                session_id: Uuid::new_v4(),
            }),
            Action::Answer(text) => Some(Event::AnswerSubmitted { text }),
            Action::Deliver => {
                let pending = self.pending.take()?;
                let depth = pending.probe_depth.get() + 1;
                let prompt = PromptEvent::reply_to(&pending, format!("prompt {depth}"))?;
                self.last_prompt = Some(prompt.clone());
                Some(Event::PromptReceived(prompt))
            }
            Action::Replay => self.last_prompt.clone().map(Event::PromptReceived),
            Action::Forge { emotion, depth } => Some(Event::PromptReceived(PromptEvent {
                emotion,
                answer_text: "forged".to_string(),
                history: vec![],
                probe_depth: ProbeDepth::new(depth)?,
                prompt_text: "forged".to_string(),
                session_id: None,
            })),
            Action::Timeout => {
                let session = self.state.active_session()?;
                Some(Event::ReplyTimedOut {
                    emotion: session.emotion,
                    depth: session.depth,
                })
            }
            Action::Finish => Some(Event::Finish),
        }
    }
}

fn history_matches_depth(state: &RespondentState) -> bool {
    state
        .active_session()
        .is_none_or(|s| s.history.len() == s.depth.answer_count())
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: depth moves by exactly one per accepted event within a session
    #[test]
    fn prop_depth_advances_by_one(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let mut h = Harness::default();
        for action in actions {
            let Some(event) = h.event_for(action) else { continue };
            let before = h.state.clone();
            let Ok(result) = transition(&before, event) else { continue };

            for effect in &result.effects {
                if let Effect::Publish(published) = effect {
                    h.pending = Some(published.clone());
                }
            }

            let after = &result.new_state;
            match (before.active_session(), after.active_session()) {
                (Some(b), Some(a)) if a.id == b.id && a != b => {
                    prop_assert_eq!(a.depth.get(), b.depth.get() + 1);
                }
                (None, Some(a)) => prop_assert_eq!(a.depth, ProbeDepth::START),
                (Some(b), None) if after.ledger.len() > before.ledger.len() => {
                    // Completed: the closing prompt lands on 6 -> 7
                    prop_assert_eq!(b.depth.get(), 6);
                }
                _ => {}
            }
            h.state = result.new_state;
        }
    }

    // Invariant 2: history length tracks depth
    #[test]
    fn prop_history_tracks_depth(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let mut h = Harness::default();
        for action in actions {
            let Some(event) = h.event_for(action) else { continue };
            if let Ok(result) = transition(&h.state, event) {
                for effect in &result.effects {
                    if let Effect::Publish(published) = effect {
                        // History sent along excludes the answer being published
                        prop_assert_eq!(
                            published.history.len(),
                            published.probe_depth.answer_count().saturating_sub(1)
                        );
                        h.pending = Some(published.clone());
                    }
                }
                h.state = result.new_state;
                prop_assert!(history_matches_depth(&h.state), "history out of step: {:?}", h.state);
            }
        }
    }

    // Invariant 3: the ledger only grows, and ledgered emotions are never selectable
    #[test]
    fn prop_ledger_is_final(actions in proptest::collection::vec(arb_action(), 0..60)) {
        let mut h = Harness::default();
        for action in actions {
            let Some(event) = h.event_for(action) else { continue };
            if let Ok(result) = transition(&h.state, event) {
                for e in Emotion::ALL {
                    if h.state.ledger.contains(e) {
                        prop_assert!(result.new_state.ledger.contains(e));
                    }
                }
                for effect in &result.effects {
                    if let Effect::Publish(published) = effect {
                        h.pending = Some(published.clone());
                    }
                }
                h.state = result.new_state;
            }
            for e in Emotion::ALL {
                if h.state.ledger.contains(e) {
                    let select = Event::SelectEmotion { emotion: e, session_id: Uuid::new_v4() };
                    prop_assert!(transition(&h.state, select).is_err());
                }
            }
        }
    }

    // Invariant 4: applying the same prompt twice equals applying it once
    #[test]
    fn prop_prompt_replay_is_idempotent(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let mut h = Harness::default();
        for action in actions {
            let Some(event) = h.event_for(action) else { continue };
            let replay = event.clone();
            if let Ok(result) = transition(&h.state, event) {
                for effect in &result.effects {
                    if let Effect::Publish(published) = effect {
                        h.pending = Some(published.clone());
                    }
                }
                if matches!(replay, Event::PromptReceived(_)) {
                    let again = transition(&result.new_state, replay)
                        .expect("replayed prompt must be accepted as a no-op");
                    prop_assert_eq!(&again.new_state, &result.new_state);
                    prop_assert!(again.effects.is_empty());
                }
                h.state = result.new_state;
            }
        }
    }

    // Invariant 5: rejected events never change state
    #[test]
    fn prop_rejection_leaves_state(actions in proptest::collection::vec(arb_action(), 0..40)) {
        let mut h = Harness::default();
        for action in actions {
            let Some(event) = h.event_for(action) else { continue };
            let before = h.state.clone();
            match transition(&before, event) {
                Ok(result) => {
                    for effect in &result.effects {
                        if let Effect::Publish(published) = effect {
                            h.pending = Some(published.clone());
                        }
                    }
                    h.state = result.new_state;
                }
                Err(_) => prop_assert_eq!(&h.state, &before),
            }
        }
    }

    // Invariant 6: a well-behaved exchange always completes in seven accepted events
    #[test]
    fn prop_clean_run_completes(
        emotion in arb_emotion(),
        answers in proptest::collection::vec("[a-z]{1,10}", 3)
    ) {
        let mut h = Harness::default();
        let mut script = vec![Action::Select(emotion), Action::Deliver];
        for answer in answers {
            script.push(Action::Answer(answer));
            script.push(Action::Deliver);
        }
        for action in script {
            let event = h.event_for(action).expect("scripted action yields an event");
            let result = transition(&h.state, event).expect("scripted event is accepted");
            for effect in &result.effects {
                if let Effect::Publish(published) = effect {
                    h.pending = Some(published.clone());
                }
            }
            h.state = result.new_state;
        }
        prop_assert_eq!(&h.state.phase, &SessionPhase::Idle);
        prop_assert!(h.state.ledger.contains(emotion));
        prop_assert_eq!(h.state.ledger.remaining().len(), 2);
    }
}
