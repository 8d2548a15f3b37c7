//! Participant roster synchronization for a call room: a pure reducer over
//! adapter events, projections for the UI, and the session that wires a call
//! adapter to both.

pub mod action;
pub mod binder;
pub mod error;
pub mod participant;
pub mod projection;
pub mod reducer;
pub mod session;
pub mod store;

pub use action::ParticipantAction;
pub use binder::EventBinder;
pub use error::RoomError;
pub use participant::Participant;
pub use projection::{ProjectionCache, RoomView};
pub use reducer::{reduce, RoomState};
pub use session::{RoomOptions, RoomSession};
pub use store::{ParticipantStore, RoomEvent};
