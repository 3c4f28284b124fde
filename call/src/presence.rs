//! Presence collaborator boundary.
//!
//! Only announces channel membership, it carries no media. The controller
//! enters the channel once connected and leaves it on disconnect.

use crate::session::ParticipantId;
use std::future::Future;

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceDescriptor {
    pub id: ParticipantId,
    pub display_name: String,
    pub avatar: Option<String>,
}

pub trait PresenceChannel: Send + Sync + 'static {
    fn enter(&self, channel: &str, descriptor: PresenceDescriptor) -> impl Future<Output = eyre::Result<()>> + Send;

    fn leave(&self, channel: &str, participant: &ParticipantId) -> impl Future<Output = ()> + Send;
}
