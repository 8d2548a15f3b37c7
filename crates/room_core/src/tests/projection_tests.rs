use chrono::{DateTime, TimeZone, Utc};
use shared::{
    domain::{ParticipantId, RosterKey},
    protocol::CallParticipant,
};

use super::*;
use crate::{action::ParticipantAction, reducer::reduce};

fn call(id: &str) -> CallParticipant {
    CallParticipant {
        session_id: Some(id.to_string()),
        user_name: Some(format!("user-{id}")),
        ..Default::default()
    }
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().expect("timestamp")
}

fn pid(id: &str) -> ParticipantId {
    ParticipantId::from(id)
}

fn apply(state: &RoomState, actions: impl IntoIterator<Item = ParticipantAction>) -> RoomState {
    actions
        .into_iter()
        .fold(state.clone(), |state, action| reduce(&state, &action))
}

fn speaker(id: &str, seconds: i64) -> ParticipantAction {
    ParticipantAction::ActiveSpeaker {
        peer_id: Some(pid(id)),
        at: at(seconds),
    }
}

fn human(id: &str) -> RosterKey {
    RosterKey::Human(pid(id))
}

fn ids(participants: &[Participant]) -> Vec<String> {
    participants.iter().map(|p| p.id.to_string()).collect()
}

fn roster_with_owner_and_screen() -> RoomState {
    apply(
        &RoomState::default(),
        [
            ParticipantAction::Joined(CallParticipant {
                local: Some(true),
                ..call("l")
            }),
            ParticipantAction::Joined(CallParticipant {
                owner: Some(true),
                ..call("host")
            }),
            ParticipantAction::Joined(call("guest")),
            ParticipantAction::Joined(CallParticipant {
                screen: Some(true),
                ..call("presenter")
            }),
        ],
    )
}

#[test]
fn all_participants_are_in_position_order() {
    let state = roster_with_owner_and_screen();
    let view = RoomView::derive(&state, false);
    assert_eq!(
        ids(&view.all_participants),
        vec!["l", "host", "guest", "presenter", "screen:presenter"]
    );
    assert_eq!(view.participants, view.all_participants);
}

#[test]
fn broadcast_shows_only_owners_and_screens() {
    let state = roster_with_owner_and_screen();
    let view = RoomView::derive(&state, true);

    assert_eq!(ids(&view.participants), vec!["host", "screen:presenter"]);
    assert!(view
        .participants
        .iter()
        .all(|p| p.is_owner || p.is_screenshare));
    assert_eq!(view.all_participants.len(), 5);
    assert_eq!(view.participant_count, 1);
}

#[test]
fn participant_count_excludes_screens() {
    let state = roster_with_owner_and_screen();
    let view = RoomView::derive(&state, false);
    assert_eq!(view.participant_count, 4);
    assert_eq!(ids(&view.screens), vec!["screen:presenter"]);
}

#[test]
fn local_participant_and_ownership() {
    let state = roster_with_owner_and_screen();
    let view = RoomView::derive(&state, false);
    assert_eq!(view.local_participant.as_ref().map(|p| p.id.to_string()).as_deref(), Some("l"));
    assert!(!view.is_owner);

    let promoted = apply(
        &state,
        [ParticipantAction::Updated(CallParticipant {
            local: Some(true),
            owner: Some(true),
            ..call("l")
        })],
    );
    assert!(RoomView::derive(&promoted, false).is_owner);
    assert!(!RoomView::derive(&RoomState::default(), false).is_owner);
}

#[test]
fn local_screenshare_is_not_the_local_participant() {
    let state = apply(
        &RoomState::default(),
        [ParticipantAction::Joined(CallParticipant {
            local: Some(true),
            screen: Some(true),
            ..call("l")
        })],
    );
    let view = RoomView::derive(&state, false);
    assert_eq!(view.local_participant.as_ref().map(|p| p.id.to_string()).as_deref(), Some("l"));
    assert_eq!(ids(&view.screens), vec!["screen:l"]);
}

#[test]
fn hidden_active_speaker_is_not_surfaced_in_broadcast() {
    let state = apply(&roster_with_owner_and_screen(), [speaker("guest", 3)]);

    let open = RoomView::derive(&state, false);
    assert_eq!(open.active_participant.as_ref().map(|p| p.id.to_string()).as_deref(), Some("guest"));

    let broadcast = RoomView::derive(&state, true);
    assert_eq!(broadcast.active_participant, None);
    assert_ne!(
        broadcast.current_speaker.as_ref().map(|p| p.id.to_string()).as_deref(),
        Some("guest")
    );
}

#[test]
fn current_speaker_falls_back_by_last_active_then_local() {
    let state = apply(
        &RoomState::default(),
        [
            ParticipantAction::Joined(CallParticipant {
                local: Some(true),
                ..call("l")
            }),
            ParticipantAction::Joined(call("a")),
            ParticipantAction::Joined(call("b")),
            ParticipantAction::Joined(call("c")),
            speaker("a", 10),
            speaker("b", 20),
            speaker("c", 5),
            ParticipantAction::Left(call("c")),
        ],
    );

    let view = RoomView::derive(&state, false);
    assert_eq!(view.active_participant, None);
    assert_eq!(view.current_speaker.as_ref().map(|p| p.id.to_string()).as_deref(), Some("b"));

    let state = apply(&state, [ParticipantAction::Left(call("b"))]);
    let view = RoomView::derive(&state, false);
    assert_eq!(view.current_speaker.as_ref().map(|p| p.id.to_string()).as_deref(), Some("a"));

    let state = apply(&state, [ParticipantAction::Left(call("a"))]);
    let view = RoomView::derive(&state, false);
    assert_eq!(view.current_speaker.as_ref().map(|p| p.id.to_string()).as_deref(), Some("l"));
}

#[test]
fn current_speaker_helper_orders_by_timestamp() {
    let make = |id: &str, seconds: Option<i64>, position: u64, local: bool| Participant {
        id: human(id),
        owner_id: pid(id),
        user_name: id.to_string(),
        is_local: local,
        is_owner: false,
        is_screenshare: false,
        is_active_speaker: false,
        has_audio: true,
        has_video: true,
        last_active_date: seconds.map(at),
        position,
    };
    let a = make("a", Some(10), 1, false);
    let b = make("b", Some(20), 2, false);
    let quiet = make("quiet", None, 3, false);
    let l = make("l", Some(99), 0, true);
    let visible = vec![l.clone(), a.clone(), b.clone(), quiet.clone()];

    let pick = current_speaker(None, &visible, Some(&l)).expect("speaker");
    assert_eq!(pick.id, human("b"));

    let stale_active = make("gone", Some(50), 9, false);
    let pick = current_speaker(Some(&stale_active), &visible, Some(&l)).expect("speaker");
    assert_eq!(pick.id, human("b"));

    let pick = current_speaker(None, &[l.clone(), quiet], Some(&l)).expect("speaker");
    assert_eq!(pick.id, human("quiet"));

    let pick = current_speaker(None, &[l.clone()], Some(&l)).expect("speaker");
    assert_eq!(pick.id, human("l"));

    assert_eq!(current_speaker(None, &[], None), None);
}

#[test]
fn active_speaker_then_leave_falls_back_to_local() {
    let state = apply(
        &RoomState::default(),
        [
            ParticipantAction::Joined(CallParticipant {
                local: Some(true),
                ..call("1")
            }),
            ParticipantAction::Joined(call("2")),
            speaker("2", 1),
            ParticipantAction::Left(call("2")),
        ],
    );

    let view = RoomView::derive(&state, false);
    assert_eq!(ids(&view.all_participants), vec!["1"]);
    assert_eq!(view.active_participant, None);
    assert_eq!(view.current_speaker.as_ref().map(|p| p.id.to_string()).as_deref(), Some("1"));
}

#[test]
fn cache_reuses_view_for_deeply_equal_inputs() {
    let mut cache = ProjectionCache::default();
    let state = roster_with_owner_and_screen();

    let first = cache.view(&state, false);
    let rebuilt = roster_with_owner_and_screen();
    let second = cache.view(&rebuilt, false);

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.recomputations(), 1);

    let third = cache.view(&rebuilt, true);
    assert!(!Arc::ptr_eq(&second, &third));
    assert_eq!(cache.recomputations(), 2);

    let changed = apply(&rebuilt, [ParticipantAction::Left(call("guest"))]);
    cache.view(&changed, true);
    assert_eq!(cache.recomputations(), 3);
}

#[test]
fn view_serializes_for_consumers() {
    let state = apply(&roster_with_owner_and_screen(), [speaker("host", 42)]);
    let json = serde_json::to_value(RoomView::derive(&state, false)).expect("serialize");

    assert_eq!(json["participant_count"], 4);
    assert_eq!(json["active_participant"]["id"]["human"], "host");
    assert_eq!(json["current_speaker"]["id"]["human"], "host");
    assert_eq!(json["screens"][0]["id"]["screen"], "presenter");
    assert_eq!(json["screens"][0]["owner_id"], "presenter");
    assert_eq!(json["local_participant"]["is_local"], true);
    assert_eq!(json["is_owner"], false);
}
