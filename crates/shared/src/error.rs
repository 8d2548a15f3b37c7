use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown call event name: {0}")]
    UnknownEvent(String),
    #[error("malformed call event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}
