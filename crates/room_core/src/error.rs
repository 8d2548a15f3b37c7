use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("no call is attached to this room")]
    NoActiveCall,
    #[error("failed to join call: {0}")]
    Join(String),
    #[error("failed to leave call: {0}")]
    Leave(String),
}
