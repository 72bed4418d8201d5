use crate::error::Result;
use crate::payload::trigger_payload;
use crate::{Delivery, NotificationChannel};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use vigil_common::types::{AlertTrigger, ChannelKind, NotificationConfig};

/// Pushes JSON to whatever sessions a user has open right now.
pub trait WebsocketHub: Send + Sync {
    /// Fire-and-forget. Returns how many sessions received the payload.
    fn send_to_user(&self, user_id: &str, payload: &Value) -> usize;
}

pub type SessionId = u64;

/// Frames a stalled session may hold before further pushes to it are dropped.
pub const SESSION_QUEUE_CAPACITY: usize = 16;

type Sessions = HashMap<String, Vec<(SessionId, mpsc::Sender<String>)>>;

/// In-process hub. Each connected socket holds the receiving end of a small
/// bounded channel; nothing is queued for users without a session.
#[derive(Default)]
pub struct SessionHub {
    next_id: AtomicU64,
    sessions: Mutex<Sessions>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a session for `user_id` and returns the stream of text
    /// frames to forward to it.
    pub fn connect(&self, user_id: &str) -> (SessionId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        self.lock()
            .entry(user_id.to_string())
            .or_default()
            .push((id, tx));
        tracing::debug!(user_id, session_id = id, "Websocket session registered");
        (id, rx)
    }

    pub fn disconnect(&self, user_id: &str, session_id: SessionId) {
        let mut sessions = self.lock();
        if let Some(list) = sessions.get_mut(user_id) {
            list.retain(|(id, _)| *id != session_id);
            if list.is_empty() {
                sessions.remove(user_id);
            }
        }
        tracing::debug!(user_id, session_id, "Websocket session removed");
    }

    pub fn session_count(&self, user_id: &str) -> usize {
        self.lock().get(user_id).map_or(0, Vec::len)
    }
}

impl WebsocketHub for SessionHub {
    fn send_to_user(&self, user_id: &str, payload: &Value) -> usize {
        let text = payload.to_string();
        let mut sessions = self.lock();
        let Some(list) = sessions.get_mut(user_id) else {
            return 0;
        };
        let mut reached = 0;
        list.retain(|(session_id, tx)| match tx.try_send(text.clone()) {
            Ok(()) => {
                reached += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(user_id, session_id, "Websocket session is not reading, push dropped");
                true
            }
            // Receivers dropped by closed sockets are pruned here.
            Err(TrySendError::Closed(_)) => false,
        });
        if list.is_empty() {
            sessions.remove(user_id);
        }
        reached
    }
}

/// Pushes triggers to the owner's live websocket sessions.
pub struct WebsocketChannel {
    hub: Arc<dyn WebsocketHub>,
}

impl WebsocketChannel {
    pub fn new(hub: Arc<dyn WebsocketHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl NotificationChannel for WebsocketChannel {
    async fn send(&self, trigger: &AlertTrigger, _config: &NotificationConfig) -> Result<Delivery> {
        let message = json!({ "type": "alert", "data": trigger_payload(trigger) });
        let reached = self.hub.send_to_user(&trigger.user_id, &message);
        if reached == 0 {
            tracing::debug!(
                alert_id = %trigger.alert_id,
                user_id = %trigger.user_id,
                "No websocket session connected, push dropped"
            );
            return Ok(Delivery::Skipped("no connected session".into()));
        }
        tracing::debug!(alert_id = %trigger.alert_id, sessions = reached, "Websocket push sent");
        Ok(Delivery::Delivered)
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Websocket
    }
}
