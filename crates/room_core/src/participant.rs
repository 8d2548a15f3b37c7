use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{
    domain::{ParticipantId, RosterKey},
    protocol::CallParticipant,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub id: RosterKey,
    /// Human entry this one belongs to.
    pub owner_id: ParticipantId,
    pub user_name: String,
    pub is_local: bool,
    pub is_owner: bool,
    pub is_screenshare: bool,
    pub is_active_speaker: bool,
    pub has_audio: bool,
    pub has_video: bool,
    pub last_active_date: Option<DateTime<Utc>>,
    pub position: u64,
}

impl Participant {
    /// Builds the human entry for `source`. Fields absent from `source` keep
    /// their value from `base`; the store-owned fields (position, speaker
    /// state) always come from `known` when the id is already in the roster.
    pub(crate) fn human(
        id: ParticipantId,
        source: &CallParticipant,
        base: Option<&Participant>,
        known: Option<&Participant>,
        next_position: u64,
    ) -> Self {
        let keep = |field: Option<bool>, current: fn(&Participant) -> bool| {
            field.unwrap_or_else(|| base.is_some_and(current))
        };
        Self {
            id: RosterKey::Human(id.clone()),
            owner_id: id,
            user_name: source
                .user_name
                .clone()
                .or_else(|| base.map(|p| p.user_name.clone()))
                .unwrap_or_default(),
            is_local: keep(source.local, |p| p.is_local),
            is_owner: keep(source.owner, |p| p.is_owner),
            is_screenshare: false,
            is_active_speaker: known.is_some_and(|p| p.is_active_speaker),
            has_audio: keep(source.audio, |p| p.has_audio),
            has_video: keep(source.video, |p| p.has_video),
            last_active_date: known.and_then(|p| p.last_active_date),
            position: known.map_or(next_position, |p| p.position),
        }
    }

    pub(crate) fn screenshare(
        owner: &Participant,
        previous: Option<&Participant>,
        next_position: u64,
    ) -> Self {
        Self {
            id: RosterKey::Screen(owner.owner_id.clone()),
            owner_id: owner.owner_id.clone(),
            user_name: owner.user_name.clone(),
            is_local: owner.is_local,
            is_owner: owner.is_owner,
            is_screenshare: true,
            is_active_speaker: previous.is_some_and(|p| p.is_active_speaker),
            has_audio: false,
            has_video: true,
            last_active_date: previous.and_then(|p| p.last_active_date),
            position: previous.map_or(next_position, |p| p.position),
        }
    }

    pub fn is_local_human(&self) -> bool {
        self.is_local && !self.is_screenshare
    }
}
