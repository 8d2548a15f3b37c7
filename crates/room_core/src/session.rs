use std::sync::Arc;

use call_object::{CallConnector, CallObject, JoinOptions};
use parking_lot::Mutex;
use shared::domain::{ParticipantId, RosterKey};
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    action::ParticipantAction,
    binder::EventBinder,
    error::RoomError,
    participant::Participant,
    projection::RoomView,
    store::{ParticipantStore, RoomEvent},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomOptions {
    pub broadcast: bool,
}

struct ActiveCall {
    call: Arc<dyn CallObject>,
    binder: EventBinder,
}

pub struct RoomSession {
    store: Arc<ParticipantStore>,
    active: Mutex<Option<ActiveCall>>,
    marked_for_removal: Mutex<Option<ParticipantId>>,
}

impl RoomSession {
    pub fn new(options: RoomOptions) -> Self {
        Self {
            store: ParticipantStore::new(options.broadcast),
            active: Mutex::new(None),
            marked_for_removal: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<ParticipantStore> {
        &self.store
    }

    /// Binds `call`, replacing whatever was bound before. Switching to a
    /// different call object starts from an empty roster.
    pub fn attach(&self, call: Arc<dyn CallObject>) {
        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            let same_call = same_call(&previous.call, &call);
            drop(previous);
            if !same_call {
                self.clear_roster();
            }
        }

        let binder = EventBinder::attach(&call, &self.store);
        *active = Some(ActiveCall { call, binder });
    }

    pub fn detach(&self) {
        let previous = self.active.lock().take();
        if previous.is_some() {
            drop(previous);
            info!("room: call detached");
        }
        self.clear_roster();
    }

    pub fn is_attached(&self) -> bool {
        self.active.lock().is_some()
    }

    pub async fn join(
        &self,
        connector: &dyn CallConnector,
        options: JoinOptions,
    ) -> Result<(), RoomError> {
        let room_url = options.room_url.clone();
        let call = connector
            .join(options)
            .await
            .map_err(|err| RoomError::Join(err.to_string()))?;
        self.attach(call);
        info!(room = %room_url, "room: joined call");
        Ok(())
    }

    /// Unsubscribes before asking the call to leave so no late events land in
    /// the cleared roster.
    pub async fn leave(&self) -> Result<(), RoomError> {
        let active = self.active.lock().take();
        let Some(ActiveCall { call, binder }) = active else {
            return Err(RoomError::NoActiveCall);
        };
        drop(binder);
        self.clear_roster();

        call.leave()
            .await
            .map_err(|err| RoomError::Leave(err.to_string()))?;
        info!("room: left call");
        Ok(())
    }

    pub fn username(&self) -> Option<String> {
        let call = self.current_call()?;
        let snapshot = call.participants();
        snapshot.local_user_name().map(str::to_string)
    }

    /// Forwarded to the call; the roster picks the new name up from the
    /// call's next update event.
    pub fn set_username(&self, name: &str) -> Result<(), RoomError> {
        let call = self.current_call().ok_or(RoomError::NoActiveCall)?;
        call.set_user_name(name);
        Ok(())
    }

    pub fn swap_participant_position(&self, first: RosterKey, second: RosterKey) {
        self.store
            .dispatch(ParticipantAction::SwapPosition { first, second });
    }

    pub fn participant_marked_for_removal(&self) -> Option<ParticipantId> {
        self.marked_for_removal.lock().clone()
    }

    pub fn set_participant_marked_for_removal(&self, participant: Option<ParticipantId>) {
        {
            let mut marked = self.marked_for_removal.lock();
            if *marked == participant {
                return;
            }
            *marked = participant.clone();
        }
        self.store
            .publish(RoomEvent::MarkedForRemovalChanged(participant));
    }

    pub fn set_broadcast(&self, broadcast: bool) {
        self.store.set_broadcast(broadcast);
    }

    pub fn view(&self) -> Arc<RoomView> {
        self.store.view()
    }

    pub fn all_participants(&self) -> Vec<Participant> {
        self.view().all_participants.clone()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.view().participants.clone()
    }

    pub fn participant_count(&self) -> usize {
        self.view().participant_count
    }

    pub fn active_participant(&self) -> Option<Participant> {
        self.view().active_participant.clone()
    }

    pub fn current_speaker(&self) -> Option<Participant> {
        self.view().current_speaker.clone()
    }

    pub fn local_participant(&self) -> Option<Participant> {
        self.view().local_participant.clone()
    }

    pub fn screens(&self) -> Vec<Participant> {
        self.view().screens.clone()
    }

    pub fn is_owner(&self) -> bool {
        self.view().is_owner
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RoomEvent> {
        self.store.subscribe_events()
    }

    fn current_call(&self) -> Option<Arc<dyn CallObject>> {
        self.active
            .lock()
            .as_ref()
            .map(|active| Arc::clone(&active.call))
    }

    fn clear_roster(&self) {
        self.store.dispatch(ParticipantAction::Reset);
        let had_mark = self.marked_for_removal.lock().take().is_some();
        if had_mark {
            self.store
                .publish(RoomEvent::MarkedForRemovalChanged(None));
        }
    }
}

fn same_call(a: &Arc<dyn CallObject>, b: &Arc<dyn CallObject>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
