use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use actix::Addr;
use tracing::debug;

use crate::models::VideoResponse;

pub mod message_types;
pub mod session;

use message_types::{batch_update, single_update};
use session::{NotificationSession, PushMessage};

/// Unique identifier for a connected notifications client
///
/// Assigned when the session registers; used for precise removal when the
/// connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Subscriber {
    id: SubscriberId,
    addr: Addr<NotificationSession>,
}

/// The set of currently open notification connections
///
/// Purely in-memory, scoped to the process lifetime. Broadcast is
/// best-effort: a connection whose mailbox refuses a message is dropped
/// from the set, with no retry.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Vec<Subscriber>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection.
    pub async fn add(&self, id: SubscriberId, addr: Addr<NotificationSession>) {
        let mut guard = self.inner.write().await;
        guard.push(Subscriber { id, addr });
        debug!(subscribers = guard.len(), "Notification client connected");
    }

    /// Remove a connection when it closes.
    pub async fn remove(&self, id: SubscriberId) {
        let mut guard = self.inner.write().await;
        guard.retain(|s| s.id != id);
        debug!(subscribers = guard.len(), "Notification client disconnected");
    }

    /// Push one serialized message to every open connection, dropping any
    /// connection that refuses the write.
    pub async fn broadcast(&self, message: String) {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|s| s.addr.try_send(PushMessage(message.clone())).is_ok());
        let dropped = before - guard.len();
        if dropped > 0 {
            debug!(dropped, "Dropped unreachable notification clients");
        }
    }

    /// Broadcast a single-video-update for one record view.
    pub async fn broadcast_single(&self, video: &VideoResponse) -> crate::Result<()> {
        let message = serde_json::to_string(&single_update(video))?;
        self.broadcast(message).await;
        Ok(())
    }

    /// Serialize a batch-video-update envelope (sent per-connection as the
    /// catch-up snapshot, never broadcast).
    pub fn batch_message(videos: &[VideoResponse]) -> crate::Result<String> {
        Ok(serde_json::to_string(&batch_update(videos))?)
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.read().await.len()
    }
}
