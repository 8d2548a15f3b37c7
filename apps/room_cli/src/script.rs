//! Replay scripts: one JSON object per line, `#` comments and blank lines skipped.

use anyhow::{Context, Result};
use call_object::InMemoryCallObject;
use room_core::RoomSession;
use serde::Deserialize;
use shared::{
    domain::{ParticipantId, RosterKey},
    protocol::CallEvent,
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum ScriptStep {
    Emit { event: CallEvent },
    Swap { first: RosterKey, second: RosterKey },
    SetUsername { name: String },
    MarkForRemoval { participant: Option<String> },
    Broadcast { enabled: bool },
    Attach,
    Detach,
}

pub fn parse_script(raw: &str) -> Result<Vec<ScriptStep>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line.trim())
                .with_context(|| format!("invalid script step on line {}", index + 1))
        })
        .collect()
}

pub fn run_script(
    session: &RoomSession,
    call: &std::sync::Arc<InMemoryCallObject>,
    steps: Vec<ScriptStep>,
) -> Result<()> {
    for step in steps {
        debug!(?step, "script: applying step");
        match step {
            ScriptStep::Emit { event } => call.emit(event),
            ScriptStep::Swap { first, second } => session.swap_participant_position(first, second),
            ScriptStep::SetUsername { name } => session
                .set_username(&name)
                .context("set-username step failed")?,
            ScriptStep::MarkForRemoval { participant } => {
                session.set_participant_marked_for_removal(participant.map(ParticipantId::from))
            }
            ScriptStep::Broadcast { enabled } => session.set_broadcast(enabled),
            ScriptStep::Attach => session.attach(call.clone()),
            ScriptStep::Detach => session.detach(),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/script_tests.rs"]
mod tests;
