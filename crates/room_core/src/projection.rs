//! Read-only views derived from the roster. Every function here is pure; the
//! [`ProjectionCache`] only skips recomputation when the inputs are deeply equal
//! to the previous ones.

use std::sync::Arc;

use serde::Serialize;

use crate::{participant::Participant, reducer::RoomState};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoomView {
    pub all_participants: Vec<Participant>,
    pub participants: Vec<Participant>,
    pub participant_count: usize,
    pub active_participant: Option<Participant>,
    pub local_participant: Option<Participant>,
    pub current_speaker: Option<Participant>,
    pub screens: Vec<Participant>,
    pub is_owner: bool,
}

impl RoomView {
    pub fn derive(state: &RoomState, broadcast: bool) -> Self {
        let all = all_participants(state);
        let visible = visible_participants(&all, broadcast);
        let active = active_participant(&visible);
        let local = local_participant(&all);

        Self {
            participant_count: participant_count(&visible),
            current_speaker: current_speaker(active.as_ref(), &visible, local.as_ref()),
            is_owner: is_owner(local.as_ref()),
            screens: screens(&all),
            active_participant: active,
            local_participant: local,
            participants: visible,
            all_participants: all,
        }
    }
}

pub fn all_participants(state: &RoomState) -> Vec<Participant> {
    let mut all: Vec<Participant> = state.participants().cloned().collect();
    all.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    all
}

/// Broadcast mode hides ordinary attendees; only owners and screens stay visible.
pub fn visible_participants(all: &[Participant], broadcast: bool) -> Vec<Participant> {
    all.iter()
        .filter(|p| !broadcast || p.is_owner || p.is_screenshare)
        .cloned()
        .collect()
}

pub fn participant_count(visible: &[Participant]) -> usize {
    visible.iter().filter(|p| !p.is_screenshare).count()
}

pub fn active_participant(visible: &[Participant]) -> Option<Participant> {
    visible.iter().find(|p| p.is_active_speaker).cloned()
}

pub fn local_participant(all: &[Participant]) -> Option<Participant> {
    all.iter().find(|p| p.is_local_human()).cloned()
}

pub fn is_owner(local: Option<&Participant>) -> bool {
    local.is_some_and(|p| p.is_owner)
}

pub fn screens(all: &[Participant]) -> Vec<Participant> {
    all.iter().filter(|p| p.is_screenshare).cloned().collect()
}

/// Who the UI should show prominently:
/// 1. the flagged active speaker, if it is still visible;
/// 2. otherwise the most recently active visible non-local entry;
/// 3. otherwise the local participant.
pub fn current_speaker(
    active: Option<&Participant>,
    visible: &[Participant],
    local: Option<&Participant>,
) -> Option<Participant> {
    if let Some(active) = active {
        if visible.iter().any(|p| p.id == active.id) {
            return Some(active.clone());
        }
    }

    let mut others: Vec<&Participant> = visible.iter().filter(|p| !p.is_local).collect();
    others.sort_by(|a, b| {
        b.last_active_date
            .cmp(&a.last_active_date)
            .then_with(|| a.position.cmp(&b.position))
    });

    others
        .first()
        .map(|p| (*p).clone())
        .or_else(|| local.cloned())
}

#[derive(Debug, Default)]
pub struct ProjectionCache {
    inputs: Option<(RoomState, bool)>,
    view: Arc<RoomView>,
    recomputations: u64,
}

impl ProjectionCache {
    pub fn view(&mut self, state: &RoomState, broadcast: bool) -> Arc<RoomView> {
        if let Some((cached_state, cached_broadcast)) = &self.inputs {
            if *cached_broadcast == broadcast && cached_state == state {
                return Arc::clone(&self.view);
            }
        }

        self.view = Arc::new(RoomView::derive(state, broadcast));
        self.inputs = Some((state.clone(), broadcast));
        self.recomputations += 1;
        Arc::clone(&self.view)
    }

    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}

#[cfg(test)]
#[path = "tests/projection_tests.rs"]
mod tests;
