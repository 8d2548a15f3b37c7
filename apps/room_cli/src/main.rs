use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use call_object::InMemoryCallObject;
use clap::Parser;
use room_core::{RoomEvent, RoomOptions, RoomSession};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod script;

use config::{load_settings, Overrides};
use script::{parse_script, run_script};

/// Replays call adapter events through the participant store and prints the
/// resulting room view.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "room.toml")]
    config: String,
    #[arg(long)]
    script: Option<PathBuf>,
    /// Hide ordinary attendees; only owners and screenshares are listed.
    #[arg(long)]
    broadcast: bool,
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(
        &args.config,
        Overrides {
            broadcast: args.broadcast.then_some(true),
            log_filter: args.log_filter,
            script_path: args.script,
        },
    )?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .init();

    let script_path = settings
        .script_path
        .clone()
        .context("no replay script given; pass --script or set `script` in the config")?;
    let raw = fs::read_to_string(&script_path)
        .with_context(|| format!("failed to read script '{}'", script_path.display()))?;
    let steps = parse_script(&raw)?;
    info!(steps = steps.len(), broadcast = settings.broadcast, "replay: starting");

    let call = InMemoryCallObject::new();
    let session = RoomSession::new(RoomOptions {
        broadcast: settings.broadcast,
    });

    let mut events = session.subscribe_events();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RoomEvent::ParticipantsChanged(view)) => info!(
                    participants = view.participant_count,
                    screens = view.screens.len(),
                    speaker = ?view.current_speaker.as_ref().map(|p| p.id.to_string()),
                    "room: participants changed"
                ),
                Ok(RoomEvent::MarkedForRemovalChanged(marked)) => info!(
                    participant = ?marked.map(|id| id.to_string()),
                    "room: marked for removal"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "room: event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    session.attach(call.clone());
    run_script(&session, &call, steps)?;

    let view = session.view();
    println!("{}", serde_json::to_string_pretty(view.as_ref())?);
    if let Some(marked) = session.participant_marked_for_removal() {
        println!("marked for removal: {marked}");
    }

    session.detach();
    drop(session);
    logger.await.context("event logger task failed")?;
    Ok(())
}
