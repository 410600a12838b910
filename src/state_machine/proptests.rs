//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn epoch() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T18:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_state() -> impl Strategy<Value = SessionState> {
    prop_oneof![
        Just(SessionState::Ready),
        Just(SessionState::Out),
        Just(SessionState::Delivered),
        Just(SessionState::Active),
        Just(SessionState::Close),
    ]
}

fn arb_zone() -> impl Strategy<Value = Zone> {
    prop_oneof![
        Just(Zone::A),
        Just(Zone::B),
        Just(Zone::C),
        Just(Zone::D),
        Just(Zone::E),
    ]
}

fn arb_session() -> impl Strategy<Value = FireSession> {
    (
        arb_state(),
        arb_zone(),
        0i64..10,
        0i64..30,
        0i64..10,
        0i64..120,
    )
        .prop_map(|(state, zone, items, buffer_sec, eta_min, duration_min)| {
            let now = epoch();
            FireSession {
                id: "s-prop".to_string(),
                table: "T-7".to_string(),
                customer_label: "customer_100".to_string(),
                duration_min,
                buffer_sec,
                zone,
                items,
                eta_min,
                position: "Bar (3,1)".to_string(),
                state,
                created_at: now,
                updated_at: now,
            }
        })
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::DeliverNow),
        Just(Action::MarkOut),
        Just(Action::MarkDelivered),
        Just(Action::StartActive),
        Just(Action::Close),
        Just(Action::Cancel),
        Just(Action::Undo),
        (-20i64..20).prop_map(Action::SetBuffer),
        arb_zone().prop_map(Action::SetZone),
        "[a-z]{4,8}".prop_map(Action::ReassignRunner),
        (-5i64..5).prop_map(Action::AddItem),
        (-10i64..30).prop_map(Action::ExtendMin),
    ]
}

fn arb_ready_session() -> impl Strategy<Value = FireSession> {
    arb_session().prop_map(|mut session| {
        session.state = SessionState::Ready;
        session
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // MARK_OUT from READY always lands in OUT with a positive ETA
    #[test]
    fn prop_mark_out_from_ready(session in arb_ready_session(), eta in -5i64..5) {
        let mut session = session;
        session.eta_min = eta;
        let result = transition(&session, &Action::MarkOut, epoch()).unwrap();
        prop_assert_eq!(result.new_session.state, SessionState::Out);
        prop_assert!(result.new_session.eta_min >= 1);
    }

    // CANCEL always closes
    #[test]
    fn prop_cancel_always_closes(session in arb_session()) {
        let result = transition(&session, &Action::Cancel, epoch()).unwrap();
        prop_assert_eq!(result.new_session.state, SessionState::Close);
    }

    // Invariants hold after any sequence of actions
    #[test]
    fn prop_invariants_survive_any_sequence(
        session in arb_session(),
        actions in proptest::collection::vec(arb_action(), 0..30),
    ) {
        let mut current = session;
        for (step, action) in actions.iter().enumerate() {
            let now = epoch() + Duration::seconds(i64::try_from(step).unwrap_or(0) + 1);
            if let Ok(result) = transition(&current, action, now) {
                current = result.new_session;
            }
            prop_assert!(current.items >= 0, "items went negative: {:?}", current);
            prop_assert!(current.buffer_sec >= 0, "buffer went negative: {:?}", current);
        }
    }

    // A rejected action reports why, and only table misses or invariant breaks are rejected
    #[test]
    fn prop_rejections_are_explained(session in arb_session(), action in arb_action()) {
        match transition(&session, &action, epoch()) {
            Ok(result) => {
                prop_assert!(
                    session.state.allows(action.kind())
                        || matches!(action, Action::Cancel | Action::Undo)
                );
                prop_assert_eq!(result.new_session.updated_at, epoch());
                prop_assert_eq!(result.new_session.id, session.id);
                prop_assert_eq!(result.new_session.created_at, session.created_at);
            }
            Err(TransitionError::ActionNotAllowed { action: kind, state }) => {
                prop_assert_eq!(kind, action.kind());
                prop_assert_eq!(state, session.state);
                prop_assert!(!state.allows(kind));
            }
            Err(TransitionError::BadItemCount { items }) => {
                prop_assert!(items < 0);
                prop_assert!(matches!(action, Action::AddItem(_)));
            }
            Err(TransitionError::BadBufferValue { buffer_sec }) => {
                prop_assert!(buffer_sec < 0);
                prop_assert!(matches!(action, Action::SetBuffer(_)));
            }
        }
    }

    // Field setters never move the lifecycle
    #[test]
    fn prop_field_actions_keep_state(session in arb_session(), action in arb_action()) {
        let is_field_action = matches!(
            action,
            Action::SetBuffer(_)
                | Action::SetZone(_)
                | Action::ExtendMin(_)
                | Action::AddItem(_)
                | Action::ReassignRunner(_)
        );
        if is_field_action {
            if let Ok(result) = transition(&session, &action, epoch()) {
                prop_assert_eq!(result.new_session.state, session.state);
            }
        }
    }

    // UNDO is always accepted and follows the backward map
    #[test]
    fn prop_undo_follows_backward_map(session in arb_session()) {
        let result = transition(&session, &Action::Undo, epoch()).unwrap();
        prop_assert_eq!(result.new_session.state, session.state.undo_target());
    }

    // Every accepted transition asks the runtime to persist and audit
    #[test]
    fn prop_accepted_transitions_emit_persist_and_audit(
        session in arb_session(),
        action in arb_action(),
    ) {
        if let Ok(result) = transition(&session, &action, epoch()) {
            prop_assert_eq!(result.effects.len(), 2);
            prop_assert_eq!(&result.effects[0], &Effect::PersistSession);
            let records_audit = matches!(result.effects[1], Effect::RecordAudit { .. });
            prop_assert!(records_audit);
        }
    }
}
