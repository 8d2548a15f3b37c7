//! Pure roster transitions. `reduce` never performs I/O and never reads a clock,
//! so the same `(state, action)` pair always produces the same result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use shared::{
    domain::{ParticipantId, RosterKey},
    protocol::CallParticipant,
};
use tracing::{debug, warn};

use crate::{action::ParticipantAction, participant::Participant};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomState {
    participants: BTreeMap<RosterKey, Participant>,
}

impl RoomState {
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.participants.len()
    }

    fn next_position(&self) -> u64 {
        self.participants
            .values()
            .map(|p| p.position + 1)
            .max()
            .unwrap_or(0)
    }
}

pub fn reduce(state: &RoomState, action: &ParticipantAction) -> RoomState {
    let mut next = state.clone();
    match action {
        ParticipantAction::Joined(source) => upsert(&mut next, source, UpsertKind::Join),
        ParticipantAction::Updated(source) => upsert(&mut next, source, UpsertKind::Update),
        ParticipantAction::Left(source) => remove(&mut next, source),
        ParticipantAction::ActiveSpeaker { peer_id, at } => {
            mark_active_speaker(&mut next, peer_id.as_ref(), *at)
        }
        ParticipantAction::SwapPosition { first, second } => swap(&mut next, first, second),
        ParticipantAction::Reset => next.participants.clear(),
    }
    next
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpsertKind {
    Join,
    Update,
}

fn upsert(state: &mut RoomState, source: &CallParticipant, kind: UpsertKind) {
    let Some(id) = source.participant_id() else {
        warn!(?kind, "roster: dropping participant payload without session id");
        return;
    };
    let human_key = RosterKey::Human(id.clone());
    let screen_key = RosterKey::Screen(id.clone());

    let known = state.participants.get(&human_key);
    let base = match (kind, known) {
        (UpsertKind::Join, Some(_)) => {
            debug!(%id, "roster: rejoin replaces known entry");
            None
        }
        (UpsertKind::Update, None) => {
            debug!(%id, "roster: update before join creates entry");
            None
        }
        (UpsertKind::Join, None) => None,
        (UpsertKind::Update, Some(known)) => Some(known),
    };
    let human = Participant::human(id.clone(), source, base, known, state.next_position());

    if human.is_local {
        drop_stale_local(state, &id);
    }

    // An update that says nothing about the screen keeps the current one.
    let sharing = match (kind, source.screen) {
        (_, Some(screen)) => screen,
        (UpsertKind::Join, None) => false,
        (UpsertKind::Update, None) => state.participants.contains_key(&screen_key),
    };
    let screen = sharing.then(|| {
        let previous = state.participants.get(&screen_key);
        let next_position = previous.map_or_else(
            || state.next_position().max(human.position + 1),
            |p| p.position,
        );
        Participant::screenshare(&human, previous, next_position)
    });

    state.participants.insert(human_key, human);
    match screen {
        Some(screen) => {
            state.participants.insert(screen_key, screen);
        }
        None => {
            state.participants.remove(&screen_key);
        }
    }
}

/// Keeps at most one local human entry: a local payload under a new id evicts
/// the previous local entry together with its screen.
fn drop_stale_local(state: &mut RoomState, id: &ParticipantId) {
    let stale: Vec<ParticipantId> = state
        .participants
        .values()
        .filter(|p| p.is_local_human() && &p.owner_id != id)
        .map(|p| p.owner_id.clone())
        .collect();
    for stale_id in stale {
        debug!(%stale_id, %id, "roster: local session id changed");
        state.participants.remove(&RosterKey::Screen(stale_id.clone()));
        state.participants.remove(&RosterKey::Human(stale_id));
    }
}

fn remove(state: &mut RoomState, source: &CallParticipant) {
    let Some(id) = source.participant_id() else {
        warn!("roster: dropping leave payload without session id");
        return;
    };

    let removed_screen = state
        .participants
        .remove(&RosterKey::Screen(id.clone()))
        .is_some();
    let removed = state.participants.remove(&RosterKey::Human(id.clone())).is_some();
    if !removed && !removed_screen {
        debug!(%id, "roster: leave for unknown participant ignored");
    }
}

fn mark_active_speaker(state: &mut RoomState, peer_id: Option<&ParticipantId>, at: DateTime<Utc>) {
    let Some(peer_id) = peer_id else {
        return;
    };
    let speaker = RosterKey::Human(peer_id.clone());
    let Some(target) = state.participants.get(&speaker) else {
        debug!(%peer_id, "roster: active speaker not in roster");
        return;
    };
    if target.is_local {
        return;
    }

    for participant in state.participants.values_mut() {
        participant.is_active_speaker = participant.id == speaker;
        if participant.is_active_speaker {
            participant.last_active_date = Some(at);
        }
    }
}

fn swap(state: &mut RoomState, first: &RosterKey, second: &RosterKey) {
    if first == second {
        return;
    }
    let (Some(a), Some(b)) = (
        state.participants.get(first).map(|p| p.position),
        state.participants.get(second).map(|p| p.position),
    ) else {
        debug!(%first, %second, "roster: swap with unknown participant ignored");
        return;
    };

    if let Some(p) = state.participants.get_mut(first) {
        p.position = b;
    }
    if let Some(p) = state.participants.get_mut(second) {
        p.position = a;
    }
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
