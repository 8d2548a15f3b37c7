use std::sync::Arc;

use parking_lot::RwLock;
use shared::domain::ParticipantId;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    action::ParticipantAction,
    projection::{ProjectionCache, RoomView},
    reducer::{reduce, RoomState},
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum RoomEvent {
    ParticipantsChanged(Arc<RoomView>),
    MarkedForRemovalChanged(Option<ParticipantId>),
}

struct StoreInner {
    state: RoomState,
    broadcast: bool,
    cache: ProjectionCache,
    view: Arc<RoomView>,
}

/// Sole owner of the roster. Actions are applied one at a time under the write
/// lock; readers only ever see finished states and derived views.
pub struct ParticipantStore {
    inner: RwLock<StoreInner>,
    events: broadcast::Sender<RoomEvent>,
}

impl ParticipantStore {
    pub fn new(broadcast: bool) -> Arc<Self> {
        let state = RoomState::default();
        let mut cache = ProjectionCache::default();
        let view = cache.view(&state, broadcast);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            inner: RwLock::new(StoreInner {
                state,
                broadcast,
                cache,
                view,
            }),
            events,
        })
    }

    pub fn dispatch(&self, action: ParticipantAction) -> bool {
        let changed_view = {
            let mut inner = self.inner.write();
            let next = reduce(&inner.state, &action);
            if next == inner.state {
                debug!(action = action.name(), "store: action left roster unchanged");
                return false;
            }
            inner.state = next;
            let StoreInner {
                state,
                broadcast,
                cache,
                view,
            } = &mut *inner;
            *view = cache.view(state, *broadcast);
            debug!(
                action = action.name(),
                roster = state.len(),
                "store: roster updated"
            );
            Arc::clone(view)
        };

        self.publish(RoomEvent::ParticipantsChanged(changed_view));
        true
    }

    pub fn set_broadcast(&self, broadcast: bool) {
        let changed_view = {
            let mut inner = self.inner.write();
            if inner.broadcast == broadcast {
                return;
            }
            inner.broadcast = broadcast;
            let StoreInner {
                state, cache, view, ..
            } = &mut *inner;
            *view = cache.view(state, broadcast);
            Arc::clone(view)
        };
        self.publish(RoomEvent::ParticipantsChanged(changed_view));
    }

    pub fn broadcast(&self) -> bool {
        self.inner.read().broadcast
    }

    pub fn state(&self) -> RoomState {
        self.inner.read().state.clone()
    }

    pub fn view(&self) -> Arc<RoomView> {
        Arc::clone(&self.inner.read().view)
    }

    pub fn recomputations(&self) -> u64 {
        self.inner.read().cache.recomputations()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: RoomEvent) {
        // No receivers is the normal state before a UI subscribes.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
