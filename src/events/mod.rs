//! Progress/Event Emitter.
//!
//! Fans out progress and log events to zero or more observers without
//! ever blocking the orchestrator. Each session gets a bounded
//! broadcast channel: an attached, keeping-up observer receives every
//! event in emission order; a lagging or disconnected observer drops
//! events on its own side, never on the producer's. An append-only
//! per-session log backs late inspection and tests.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

/// Broadcast buffer per session. An observer further behind than this
/// starts losing events (reported as lag on its receiver).
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A point-in-time notification forwarded to observers. Transient:
/// not part of persisted session data.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Log {
        level: LogLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Progress {
        /// Overall completion, 0-100
        percentage: u8,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ProgressEvent {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        ProgressEvent::Log {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn progress(percentage: u8, message: impl Into<String>) -> Self {
        ProgressEvent::Progress {
            percentage: percentage.min(100),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn percentage(&self) -> Option<u8> {
        match self {
            ProgressEvent::Progress { percentage, .. } => Some(*percentage),
            ProgressEvent::Log { .. } => None,
        }
    }
}

struct SessionChannel {
    tx: broadcast::Sender<ProgressEvent>,
    log: Mutex<Vec<ProgressEvent>>,
}

/// Per-session event fan-out. `publish` never fails and never blocks,
/// whether or not anyone is listening.
pub struct ProgressEmitter {
    channels: RwLock<HashMap<Uuid, Arc<SessionChannel>>>,
}

impl ProgressEmitter {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Open the event channel for a session. Idempotent.
    pub fn register(&self, session_id: Uuid) {
        let mut channels = self.channels.write();
        channels.entry(session_id).or_insert_with(|| {
            let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
            Arc::new(SessionChannel {
                tx,
                log: Mutex::new(Vec::new()),
            })
        });
    }

    fn channel(&self, session_id: Uuid) -> Option<Arc<SessionChannel>> {
        self.channels.read().get(&session_id).cloned()
    }

    /// Publish an event for a session. A send error only means no
    /// observer is currently attached, which is fine.
    pub fn publish(&self, session_id: Uuid, event: ProgressEvent) {
        let Some(channel) = self.channel(session_id) else {
            tracing::trace!(%session_id, "event published for unregistered session, dropped");
            return;
        };
        channel.log.lock().push(event.clone());
        let _ = channel.tx.send(event);
    }

    /// Attach an observer. Delivery starts from the point of attachment.
    pub fn subscribe(&self, session_id: Uuid) -> Option<broadcast::Receiver<ProgressEvent>> {
        self.channel(session_id).map(|c| c.tx.subscribe())
    }

    /// All events published so far for a session, in emission order.
    pub fn history(&self, session_id: Uuid) -> Vec<ProgressEvent> {
        self.channel(session_id)
            .map(|c| c.log.lock().clone())
            .unwrap_or_default()
    }

    /// Close a session's channel after its terminal event. Attached
    /// observers drain what they already received, then see the end of
    /// stream.
    pub fn close(&self, session_id: Uuid) {
        self.channels.write().remove(&session_id);
    }
}

impl Default for ProgressEmitter {
    fn default() -> Self {
        Self::new()
    }
}
