use call_object::InMemoryCallObject;
use chrono::{TimeZone, Utc};
use shared::{
    domain::RosterKey,
    protocol::{ActiveSpeaker, CallParticipant, CallParticipants},
};

use super::*;

fn participant(id: &str) -> CallParticipant {
    CallParticipant {
        session_id: Some(id.to_string()),
        user_name: Some(format!("user-{id}")),
        ..Default::default()
    }
}

fn local(id: &str) -> CallParticipant {
    CallParticipant {
        local: Some(true),
        ..participant(id)
    }
}

fn setup() -> (Arc<InMemoryCallObject>, Arc<dyn CallObject>, Arc<ParticipantStore>) {
    let memory = InMemoryCallObject::with_local(local("me"));
    let call: Arc<dyn CallObject> = memory.clone();
    (memory, call, ParticipantStore::new(false))
}

fn ids(store: &ParticipantStore) -> Vec<String> {
    store
        .state()
        .participants()
        .map(|p| p.id.to_string())
        .collect()
}

fn assert_one_handler_per_event(memory: &InMemoryCallObject) {
    for kind in CallEventKind::ROSTER
        .into_iter()
        .chain([CallEventKind::ActiveSpeakerChange])
    {
        assert_eq!(memory.handler_count(kind), 1, "{kind}");
    }
}

#[test]
fn attach_resyncs_from_snapshot_and_subscribes() {
    let (memory, call, store) = setup();
    memory.emit(CallEvent::ParticipantJoined {
        participant: participant("early"),
    });

    let binder = EventBinder::attach(&call, &store);

    assert_eq!(ids(&store), vec!["early".to_string(), "me".to_string()]);
    assert_one_handler_per_event(&memory);
    assert_eq!(memory.total_handler_count(), 5);
    drop(binder);
}

#[test]
fn resync_assigns_positions_in_join_order() {
    let (memory, call, store) = setup();
    let joined = |id: &str, seconds| CallParticipant {
        joined_at: Utc.timestamp_opt(seconds, 0).single(),
        ..participant(id)
    };
    memory.emit(CallEvent::ParticipantJoined {
        participant: joined("amy", 200),
    });
    memory.emit(CallEvent::ParticipantJoined {
        participant: joined("zed", 100),
    });

    let _binder = EventBinder::attach(&call, &store);

    let order: Vec<String> = store
        .view()
        .all_participants
        .iter()
        .map(|p| p.id.to_string())
        .collect();
    assert_eq!(order, ["zed", "amy", "me"]);
}

#[test]
fn roster_events_flow_into_store() {
    let (memory, call, store) = setup();
    let _binder = EventBinder::attach(&call, &store);

    memory.emit(CallEvent::JoinedMeeting {
        participants: CallParticipants {
            local: Some(local("me")),
            others: vec![participant("a")],
        },
    });
    memory.emit(CallEvent::ParticipantJoined {
        participant: participant("b"),
    });
    memory.emit(CallEvent::ParticipantUpdated {
        participant: CallParticipant {
            owner: Some(true),
            ..participant("b")
        },
    });
    memory.emit(CallEvent::ParticipantLeft {
        participant: participant("a"),
    });

    assert_eq!(ids(&store), vec!["b".to_string(), "me".to_string()]);
    let view = store.view();
    let b = view
        .all_participants
        .iter()
        .find(|p| p.id == RosterKey::Human("b".into()))
        .expect("b");
    assert!(b.is_owner);
}

#[test]
fn remote_active_speaker_is_flagged() {
    let (memory, call, store) = setup();
    let _binder = EventBinder::attach(&call, &store);
    memory.emit(CallEvent::ParticipantJoined {
        participant: participant("a"),
    });

    memory.emit(CallEvent::ActiveSpeakerChange {
        active_speaker: ActiveSpeaker {
            peer_id: Some("a".into()),
        },
    });

    let view = store.view();
    let active = view.active_participant.as_ref().expect("active");
    assert_eq!(active.id, RosterKey::Human("a".into()));
    assert!(active.last_active_date.is_some());
}

#[test]
fn local_active_speaker_is_suppressed_before_dispatch() {
    let (memory, call, store) = setup();
    let _binder = EventBinder::attach(&call, &store);
    memory.emit(CallEvent::ParticipantJoined {
        participant: participant("a"),
    });
    let recomputations = store.recomputations();

    memory.emit(CallEvent::ActiveSpeakerChange {
        active_speaker: ActiveSpeaker {
            peer_id: Some("me".into()),
        },
    });
    memory.emit(CallEvent::ActiveSpeakerChange {
        active_speaker: ActiveSpeaker { peer_id: None },
    });

    assert_eq!(store.view().active_participant, None);
    assert_eq!(store.recomputations(), recomputations);
}

#[test]
fn drop_removes_exactly_its_handlers() {
    let (memory, call, store) = setup();
    let foreign = memory.on(
        CallEventKind::ParticipantJoined,
        Arc::new(|_event: &CallEvent| {}),
    );

    let binder = EventBinder::attach(&call, &store);
    assert_eq!(memory.total_handler_count(), 6);
    drop(binder);

    assert_eq!(memory.total_handler_count(), 1);
    assert_eq!(memory.handler_count(CallEventKind::ParticipantJoined), 1);
    memory.off(CallEventKind::ParticipantJoined, foreign);

    memory.emit(CallEvent::ParticipantJoined {
        participant: participant("after"),
    });
    assert!(!ids(&store).contains(&"after".to_string()));
}

#[test]
fn detach_is_idempotent_and_reattach_does_not_duplicate() {
    let (memory, call, store) = setup();

    let mut binder = EventBinder::attach(&call, &store);
    binder.detach();
    binder.detach();
    assert_eq!(memory.total_handler_count(), 0);
    drop(binder);

    let _binder = EventBinder::attach(&call, &store);
    assert_one_handler_per_event(&memory);
    assert_eq!(memory.total_handler_count(), 5);
}

#[test]
fn handlers_tolerate_dropped_store() {
    let (memory, call, store) = setup();
    let binder = EventBinder::attach(&call, &store);
    drop(store);

    memory.emit(CallEvent::ParticipantJoined {
        participant: participant("a"),
    });
    memory.emit(CallEvent::ActiveSpeakerChange {
        active_speaker: ActiveSpeaker {
            peer_id: Some("a".into()),
        },
    });
    drop(binder);
    assert_eq!(memory.total_handler_count(), 0);
}

#[test]
fn detach_after_call_dropped_is_a_noop() {
    let (memory, call, store) = setup();
    let mut binder = EventBinder::attach(&call, &store);
    drop(call);
    drop(memory);

    binder.detach();
    binder.detach();
}
