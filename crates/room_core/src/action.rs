use chrono::{DateTime, Utc};
use shared::{
    domain::{ParticipantId, RosterKey},
    protocol::CallParticipant,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantAction {
    Joined(CallParticipant),
    /// Overlays the fields it carries onto an existing entry, or creates one
    /// when the update outran its join.
    Updated(CallParticipant),
    Left(CallParticipant),
    /// `at` is stamped by whoever observed the signal; the reducer never reads a clock.
    ActiveSpeaker {
        peer_id: Option<ParticipantId>,
        at: DateTime<Utc>,
    },
    SwapPosition {
        first: RosterKey,
        second: RosterKey,
    },
    Reset,
}

impl ParticipantAction {
    pub fn name(&self) -> &'static str {
        match self {
            ParticipantAction::Joined(_) => "participant_joined",
            ParticipantAction::Updated(_) => "participant_updated",
            ParticipantAction::Left(_) => "participant_left",
            ParticipantAction::ActiveSpeaker { .. } => "active_speaker",
            ParticipantAction::SwapPosition { .. } => "swap_position",
            ParticipantAction::Reset => "reset",
        }
    }
}
