//! In-process call adapter. Events are pushed in with [`InMemoryCallObject::emit`]
//! and delivered synchronously to the handlers registered for their name.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared::{
    domain::SubscriptionId,
    protocol::{CallEvent, CallEventKind, CallParticipant, CallParticipants},
};
use tracing::{debug, info};

use crate::{CallConnector, CallEventHandler, CallObject, JoinOptions};

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: BTreeMap<CallEventKind, Vec<(SubscriptionId, CallEventHandler)>>,
}

#[derive(Default)]
struct Roster {
    local: Option<CallParticipant>,
    others: BTreeMap<String, CallParticipant>,
    left: bool,
}

#[derive(Default)]
pub struct InMemoryCallObject {
    registry: Mutex<Registry>,
    roster: Mutex<Roster>,
}

impl InMemoryCallObject {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds the local participant without emitting anything, as an adapter
    /// does between `join()` and the first `joined-meeting` event.
    pub fn with_local(local: CallParticipant) -> Arc<Self> {
        let call = Self::default();
        call.roster.lock().local = Some(CallParticipant {
            local: Some(true),
            ..local
        });
        Arc::new(call)
    }

    pub fn emit(&self, event: CallEvent) {
        self.apply_to_roster(&event);

        let handlers: Vec<CallEventHandler> = {
            let registry = self.registry.lock();
            registry
                .handlers
                .get(&event.kind())
                .map(|subs| subs.iter().map(|(_, handler)| Arc::clone(handler)).collect())
                .unwrap_or_default()
        };

        debug!(
            event = %event.kind(),
            handlers = handlers.len(),
            "call: delivering event"
        );
        for handler in handlers {
            handler(&event);
        }
    }

    pub fn handler_count(&self, event: CallEventKind) -> usize {
        self.registry
            .lock()
            .handlers
            .get(&event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn total_handler_count(&self) -> usize {
        self.registry.lock().handlers.values().map(Vec::len).sum()
    }

    pub fn has_left(&self) -> bool {
        self.roster.lock().left
    }

    fn apply_to_roster(&self, event: &CallEvent) {
        let mut roster = self.roster.lock();
        match event {
            CallEvent::JoinedMeeting { participants } => {
                if let Some(local) = &participants.local {
                    roster.upsert(CallParticipant {
                        local: Some(true),
                        ..local.clone()
                    });
                }
                for other in &participants.others {
                    roster.upsert(other.clone());
                }
            }
            CallEvent::ParticipantJoined { participant }
            | CallEvent::ParticipantUpdated { participant } => {
                roster.upsert(participant.clone());
            }
            CallEvent::ParticipantLeft { participant } => {
                if let Some(id) = participant.session_id.as_deref() {
                    roster.others.remove(id);
                }
            }
            CallEvent::ActiveSpeakerChange { .. } => {}
        }
    }
}

impl Roster {
    fn upsert(&mut self, participant: CallParticipant) {
        let is_local_update = participant.is_local()
            || (participant.session_id.is_some()
                && self.local.as_ref().map(|local| &local.session_id)
                    == Some(&participant.session_id));
        if is_local_update {
            match self.local.as_mut() {
                Some(local) if local.session_id == participant.session_id => {
                    local.merge(&participant);
                }
                _ => self.local = Some(participant),
            }
            return;
        }
        let Some(id) = participant.session_id.clone() else {
            return;
        };
        match self.others.get_mut(&id) {
            Some(known) => known.merge(&participant),
            None => {
                self.others.insert(id, participant);
            }
        }
    }
}

#[async_trait]
impl CallObject for InMemoryCallObject {
    fn on(&self, event: CallEventKind, handler: CallEventHandler) -> SubscriptionId {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry
            .handlers
            .entry(event)
            .or_default()
            .push((id, handler));
        id
    }

    fn off(&self, event: CallEventKind, subscription: SubscriptionId) {
        let mut registry = self.registry.lock();
        if let Some(subs) = registry.handlers.get_mut(&event) {
            subs.retain(|(id, _)| *id != subscription);
            if subs.is_empty() {
                registry.handlers.remove(&event);
            }
        }
    }

    fn participants(&self) -> CallParticipants {
        let roster = self.roster.lock();
        CallParticipants {
            local: roster.local.clone(),
            others: roster.others.values().cloned().collect(),
        }
    }

    fn set_user_name(&self, name: &str) {
        let updated = {
            let mut roster = self.roster.lock();
            let Some(local) = roster.local.as_mut() else {
                debug!("call: set_user_name before local participant is known");
                return;
            };
            local.user_name = Some(name.to_string());
            local.clone()
        };
        self.emit(CallEvent::ParticipantUpdated {
            participant: updated,
        });
    }

    async fn leave(&self) -> anyhow::Result<()> {
        let mut roster = self.roster.lock();
        if roster.left {
            return Err(anyhow!("call already left"));
        }
        roster.left = true;
        roster.others.clear();
        Ok(())
    }
}

/// Hands out one fresh [`InMemoryCallObject`] per join, seeded with a local
/// participant named after the join request.
#[derive(Default)]
pub struct InMemoryConnector {
    joined: Mutex<Vec<(JoinOptions, Arc<InMemoryCallObject>)>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_call(&self) -> Option<Arc<InMemoryCallObject>> {
        self.joined.lock().last().map(|(_, call)| Arc::clone(call))
    }

    pub fn joins(&self) -> Vec<JoinOptions> {
        self.joined
            .lock()
            .iter()
            .map(|(options, _)| options.clone())
            .collect()
    }
}

#[async_trait]
impl CallConnector for InMemoryConnector {
    async fn join(&self, options: JoinOptions) -> anyhow::Result<Arc<dyn CallObject>> {
        if options.room_url.trim().is_empty() {
            return Err(anyhow!("room url must not be empty"));
        }

        let mut joined = self.joined.lock();
        let call = InMemoryCallObject::with_local(CallParticipant {
            session_id: Some(format!("local-{}", joined.len() + 1)),
            user_name: Some(options.user_name.clone()),
            ..Default::default()
        });
        info!(room = %options.room_url, "call: joined in-memory room");
        joined.push((options, Arc::clone(&call)));
        Ok(call)
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
