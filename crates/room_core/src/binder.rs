//! Bridges a [`CallObject`]'s named events to [`ParticipantStore`] actions.
//!
//! An [`EventBinder`] owns exactly the subscriptions it registered and removes
//! them when dropped, so replacing or tearing down a call never leaves stale
//! handlers behind.

use std::sync::{Arc, Weak};

use call_object::{CallEventHandler, CallObject};
use chrono::Utc;
use shared::{
    domain::{ParticipantId, SubscriptionId},
    protocol::{CallEvent, CallEventKind},
};
use tracing::{debug, info};

use crate::{action::ParticipantAction, store::ParticipantStore};

pub struct EventBinder {
    call: Weak<dyn CallObject>,
    subscriptions: Vec<(CallEventKind, SubscriptionId)>,
}

impl EventBinder {
    pub fn attach(call: &Arc<dyn CallObject>, store: &Arc<ParticipantStore>) -> Self {
        dispatch_roster_event(store, call.as_ref(), None);

        let weak_call = Arc::downgrade(call);
        let weak_store = Arc::downgrade(store);
        let mut subscriptions = Vec::with_capacity(CallEventKind::ROSTER.len() + 1);

        let roster_handler: CallEventHandler = {
            let call = weak_call.clone();
            let store = weak_store.clone();
            Arc::new(move |event: &CallEvent| {
                let (Some(call), Some(store)) = (call.upgrade(), store.upgrade()) else {
                    return;
                };
                dispatch_roster_event(&store, call.as_ref(), Some(event));
            })
        };
        for kind in CallEventKind::ROSTER {
            subscriptions.push((kind, call.on(kind, Arc::clone(&roster_handler))));
        }

        let speaker_handler: CallEventHandler = {
            let call = weak_call.clone();
            let store = weak_store;
            Arc::new(move |event: &CallEvent| {
                let (Some(call), Some(store)) = (call.upgrade(), store.upgrade()) else {
                    return;
                };
                dispatch_active_speaker(&store, call.as_ref(), event);
            })
        };
        subscriptions.push((
            CallEventKind::ActiveSpeakerChange,
            call.on(CallEventKind::ActiveSpeakerChange, speaker_handler),
        ));

        info!(handlers = subscriptions.len(), "binder: attached to call");
        Self {
            call: weak_call,
            subscriptions,
        }
    }

    pub fn detach(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        let Some(call) = self.call.upgrade() else {
            debug!("binder: call already dropped, nothing to unsubscribe");
            self.subscriptions.clear();
            return;
        };
        for (kind, subscription) in self.subscriptions.drain(..) {
            call.off(kind, subscription);
        }
        info!("binder: detached from call");
    }
}

impl Drop for EventBinder {
    fn drop(&mut self) {
        self.detach();
    }
}

/// `None` resyncs from the call's synchronous snapshot. Snapshots are applied
/// in join order so new entries get positions in the order people arrived.
fn dispatch_roster_event(store: &ParticipantStore, call: &dyn CallObject, event: Option<&CallEvent>) {
    match event {
        None => {
            let snapshot = call.participants();
            for participant in snapshot.in_join_order() {
                store.dispatch(ParticipantAction::Updated(participant.clone()));
            }
        }
        Some(CallEvent::JoinedMeeting { participants }) => {
            for participant in participants.in_join_order() {
                store.dispatch(ParticipantAction::Joined(participant.clone()));
            }
        }
        Some(CallEvent::ParticipantJoined { participant }) => {
            store.dispatch(ParticipantAction::Joined(participant.clone()));
        }
        Some(CallEvent::ParticipantUpdated { participant }) => {
            store.dispatch(ParticipantAction::Updated(participant.clone()));
        }
        Some(CallEvent::ParticipantLeft { participant }) => {
            store.dispatch(ParticipantAction::Left(participant.clone()));
        }
        Some(CallEvent::ActiveSpeakerChange { .. }) => {}
    }
}

fn dispatch_active_speaker(store: &ParticipantStore, call: &dyn CallObject, event: &CallEvent) {
    let CallEvent::ActiveSpeakerChange { active_speaker } = event else {
        return;
    };
    let Some(peer_id) = active_speaker.peer_id.as_deref() else {
        return;
    };

    let snapshot = call.participants();
    if snapshot.local_session_id() == Some(peer_id) {
        debug!(peer_id, "binder: ignoring local active speaker");
        return;
    }

    store.dispatch(ParticipantAction::ActiveSpeaker {
        peer_id: Some(ParticipantId::from(peer_id)),
        at: Utc::now(),
    });
}

#[cfg(test)]
#[path = "tests/binder_tests.rs"]
mod tests;
