use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{domain::ParticipantId, error::ProtocolError};

/// Participant as reported by the call adapter. Every field is optional on the
/// wire: updates may carry only what changed, and payloads without a
/// `session_id` are dropped by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallParticipant {
    pub session_id: Option<String>,
    pub user_name: Option<String>,
    pub local: Option<bool>,
    pub owner: Option<bool>,
    pub screen: Option<bool>,
    pub audio: Option<bool>,
    pub video: Option<bool>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl CallParticipant {
    pub fn participant_id(&self) -> Option<ParticipantId> {
        self.session_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(ParticipantId::from)
    }

    pub fn is_local(&self) -> bool {
        self.local.unwrap_or(false)
    }

    /// Overlays the fields present in `update`; absent fields keep their value.
    pub fn merge(&mut self, update: &CallParticipant) {
        fn overlay<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }
        overlay(&mut self.session_id, &update.session_id);
        overlay(&mut self.user_name, &update.user_name);
        overlay(&mut self.local, &update.local);
        overlay(&mut self.owner, &update.owner);
        overlay(&mut self.screen, &update.screen);
        overlay(&mut self.audio, &update.audio);
        overlay(&mut self.video, &update.video);
        overlay(&mut self.joined_at, &update.joined_at);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallParticipants {
    pub local: Option<CallParticipant>,
    pub others: Vec<CallParticipant>,
}

impl CallParticipants {
    pub fn local_session_id(&self) -> Option<&str> {
        self.local
            .as_ref()
            .and_then(|local| local.session_id.as_deref())
    }

    pub fn local_user_name(&self) -> Option<&str> {
        self.local
            .as_ref()
            .and_then(|local| local.user_name.as_deref())
    }

    /// Everyone in the snapshot in join order; entries without `joined_at` go last.
    pub fn in_join_order(&self) -> Vec<&CallParticipant> {
        let mut all: Vec<&CallParticipant> = self.local.iter().chain(self.others.iter()).collect();
        all.sort_by_key(|p| (p.joined_at.is_none(), p.joined_at));
        all
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveSpeaker {
    pub peer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum CallEvent {
    JoinedMeeting { participants: CallParticipants },
    ParticipantJoined { participant: CallParticipant },
    ParticipantUpdated { participant: CallParticipant },
    ParticipantLeft { participant: CallParticipant },
    ActiveSpeakerChange { active_speaker: ActiveSpeaker },
}

impl CallEvent {
    pub fn kind(&self) -> CallEventKind {
        match self {
            CallEvent::JoinedMeeting { .. } => CallEventKind::JoinedMeeting,
            CallEvent::ParticipantJoined { .. } => CallEventKind::ParticipantJoined,
            CallEvent::ParticipantUpdated { .. } => CallEventKind::ParticipantUpdated,
            CallEvent::ParticipantLeft { .. } => CallEventKind::ParticipantLeft,
            CallEvent::ActiveSpeakerChange { .. } => CallEventKind::ActiveSpeakerChange,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallEventKind {
    JoinedMeeting,
    ParticipantJoined,
    ParticipantUpdated,
    ParticipantLeft,
    ActiveSpeakerChange,
}

impl CallEventKind {
    /// Events that carry roster changes and share one dispatcher.
    pub const ROSTER: [CallEventKind; 4] = [
        CallEventKind::JoinedMeeting,
        CallEventKind::ParticipantJoined,
        CallEventKind::ParticipantUpdated,
        CallEventKind::ParticipantLeft,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CallEventKind::JoinedMeeting => "joined-meeting",
            CallEventKind::ParticipantJoined => "participant-joined",
            CallEventKind::ParticipantUpdated => "participant-updated",
            CallEventKind::ParticipantLeft => "participant-left",
            CallEventKind::ActiveSpeakerChange => "active-speaker-change",
        }
    }
}

impl fmt::Display for CallEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallEventKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "joined-meeting" => Ok(CallEventKind::JoinedMeeting),
            "participant-joined" => Ok(CallEventKind::ParticipantJoined),
            "participant-updated" => Ok(CallEventKind::ParticipantUpdated),
            "participant-left" => Ok(CallEventKind::ParticipantLeft),
            "active-speaker-change" => Ok(CallEventKind::ActiveSpeakerChange),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
