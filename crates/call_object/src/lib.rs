use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::SubscriptionId,
    protocol::{CallEvent, CallEventKind, CallParticipants},
};

pub mod memory;

pub use memory::{InMemoryCallObject, InMemoryConnector};

pub type CallEventHandler = Arc<dyn Fn(&CallEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOptions {
    pub room_url: String,
    pub token: Option<String>,
    pub user_name: String,
}

/// Signaling side of a call: named event subscriptions plus a synchronous
/// view of who the adapter believes is in the room.
#[async_trait]
pub trait CallObject: Send + Sync {
    fn on(&self, event: CallEventKind, handler: CallEventHandler) -> SubscriptionId;
    fn off(&self, event: CallEventKind, subscription: SubscriptionId);
    fn participants(&self) -> CallParticipants;
    fn set_user_name(&self, name: &str);
    async fn leave(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait CallConnector: Send + Sync {
    async fn join(&self, options: JoinOptions) -> anyhow::Result<Arc<dyn CallObject>>;
}
