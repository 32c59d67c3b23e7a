//! Property-based tests for the voice state machine
//!
//! Random event sequences are fed through `transition`, applying effects to a
//! conversation the way the runtime does, and the invariants are checked after
//! every step.

use super::*;
use crate::avatar::AvatarFrame;
use crate::conversation::{Conversation, Role};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ¿?áéíóú]{1,30}",
        Just(String::new()),
        Just("   ".to_string()),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Activate),
        arb_text().prop_map(|text| Event::Transcript { text }),
        Just(Event::CaptureEnded),
        "[a-z-]{1,15}".prop_map(|message| Event::CaptureError { message }),
        "[a-zA-Z ]{1,40}".prop_map(|reply| Event::ReplyReceived { reply }),
        "[a-zA-Z ]{1,20}".prop_map(|message| Event::RequestFailed { message }),
        Just(Event::AnimationTick),
        (0u8..=9).prop_map(|i| Event::SpeechBoundary {
            frame: AvatarFrame::new(i).unwrap()
        }),
        Just(Event::SpeechEnded),
        "[a-z-]{1,15}".prop_map(|message| Event::SpeechError { message }),
    ]
}

fn apply_effects(conversation: &mut Conversation, effects: &[Effect]) {
    for effect in effects {
        if let Effect::AppendTurn(turn) = effect {
            conversation.push(turn.clone());
        }
    }
}

fn is_error_event(event: &Event) -> bool {
    matches!(
        event,
        Event::CaptureEnded
            | Event::CaptureError { .. }
            | Event::RequestFailed { .. }
            | Event::SpeechError { .. }
    )
}

// ============================================================================
// Invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Existing turns are never changed or reordered; only appends happen
    #[test]
    fn prop_conversation_is_append_only(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = InteractionState::Idle;
        let mut conversation = Conversation::new();

        for event in events {
            let before = conversation.turns().to_vec();
            if let Ok(result) = transition(&state, &conversation, event) {
                apply_effects(&mut conversation, &result.effects);
                state = result.new_state;
            }
            prop_assert!(conversation.len() >= before.len());
            prop_assert_eq!(&conversation.turns()[..before.len()], &before[..]);
        }
    }

    // Turns arrive in user/model pairs
    #[test]
    fn prop_turns_alternate(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = InteractionState::Idle;
        let mut conversation = Conversation::new();

        for event in events {
            if let Ok(result) = transition(&state, &conversation, event) {
                apply_effects(&mut conversation, &result.effects);
                state = result.new_state;
            }
        }

        for (i, turn) in conversation.turns().iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Model };
            prop_assert_eq!(turn.role(), expected);
        }
    }

    // Speaking is entered only from Thinking, and only on a reply
    #[test]
    fn prop_speaking_only_after_reply(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = InteractionState::Idle;
        let conversation = Conversation::new();

        for event in events {
            let was_speaking = matches!(state, InteractionState::Speaking { .. });
            let was_thinking = matches!(state, InteractionState::Thinking { .. });
            let is_reply = matches!(event, Event::ReplyReceived { .. });

            if let Ok(result) = transition(&state, &conversation, event) {
                state = result.new_state;
            }

            if matches!(state, InteractionState::Speaking { .. }) && !was_speaking {
                prop_assert!(was_thinking && is_reply);
            }
        }
    }

    // Listening is entered only from Idle
    #[test]
    fn prop_listening_only_from_idle(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = InteractionState::Idle;
        let conversation = Conversation::new();

        for event in events {
            let previous = state.clone();
            if let Ok(result) = transition(&state, &conversation, event) {
                state = result.new_state;
            }
            if state == InteractionState::Listening && previous != InteractionState::Listening {
                prop_assert!(previous.is_idle());
            }
        }
    }

    // Busy is reported exactly for activations outside Idle
    #[test]
    fn prop_busy_only_for_activation(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = InteractionState::Idle;
        let conversation = Conversation::new();

        for event in events {
            let is_activation = event == Event::Activate;
            match transition(&state, &conversation, event) {
                Ok(result) => state = result.new_state,
                Err(TransitionError::Busy) => {
                    prop_assert!(is_activation && !state.is_idle());
                }
                Err(TransitionError::Stale { .. }) => prop_assert!(!is_activation),
            }
        }
    }

    // Every non-idle state falls back to Idle on its error event
    #[test]
    fn prop_errors_return_to_idle(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = InteractionState::Idle;
        let conversation = Conversation::new();

        for event in events {
            let error = is_error_event(&event);
            if let Ok(result) = transition(&state, &conversation, event) {
                if error {
                    prop_assert!(result.new_state.is_idle());
                }
                state = result.new_state;
            }
        }
    }

    // Effects are consistent with the target state
    #[test]
    fn prop_effects_match_state(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = InteractionState::Idle;
        let conversation = Conversation::new();

        for event in events {
            if let Ok(result) = transition(&state, &conversation, event) {
                let starts_capture = result.effects.contains(&Effect::StartCapture);
                let requests = result
                    .effects
                    .iter()
                    .any(|e| matches!(e, Effect::RequestReply { .. }));
                let speaks = result.effects.iter().any(|e| matches!(e, Effect::Speak { .. }));

                prop_assert_eq!(starts_capture, result.new_state == InteractionState::Listening);
                if requests {
                    let is_thinking = matches!(result.new_state, InteractionState::Thinking { .. });
                    prop_assert!(is_thinking);
                }
                if speaks {
                    let is_speaking = matches!(result.new_state, InteractionState::Speaking { .. });
                    prop_assert!(is_speaking);
                }
                state = result.new_state;
            }
        }
    }
}

// The "at most one request" property relies on Thinking rejecting activation
#[test]
fn test_single_outstanding_request() {
    let conversation = Conversation::new();
    let listening = transition(&InteractionState::Idle, &conversation, Event::Activate)
        .unwrap()
        .new_state;
    let thinking = transition(
        &listening,
        &conversation,
        Event::Transcript {
            text: "Hola".to_string(),
        },
    )
    .unwrap()
    .new_state;

    assert_eq!(
        transition(&thinking, &conversation, Event::Activate).unwrap_err(),
        TransitionError::Busy
    );
    assert!(matches!(
        transition(
            &thinking,
            &conversation,
            Event::Transcript {
                text: "otra vez".to_string()
            }
        ),
        Err(TransitionError::Stale { .. })
    ));
}
