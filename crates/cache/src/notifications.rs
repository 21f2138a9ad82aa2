//! Invalidating active reports when their recording changes on the target

use crate::active::ActiveRecordingReportCache;
use recap_core::ConnectionDescriptor;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// A recording changed on its target, so any report of it is stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingEvent {
    Stopped {
        connection: ConnectionDescriptor,
        recording_name: String,
    },
    Deleted {
        connection: ConnectionDescriptor,
        recording_name: String,
    },
}

impl RecordingEvent {
    pub fn connection(&self) -> &ConnectionDescriptor {
        match self {
            RecordingEvent::Stopped { connection, .. } | RecordingEvent::Deleted { connection, .. } => {
                connection
            }
        }
    }

    pub fn recording_name(&self) -> &str {
        match self {
            RecordingEvent::Stopped { recording_name, .. }
            | RecordingEvent::Deleted { recording_name, .. } => recording_name,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            RecordingEvent::Stopped { .. } => "stopped",
            RecordingEvent::Deleted { .. } => "deleted",
        }
    }
}

/// Channel the recording event feed publishes on
pub fn recording_events(capacity: usize) -> broadcast::Sender<RecordingEvent> {
    broadcast::channel(capacity).0
}

/// Delete cached reports for every recording event until the feed closes
pub fn spawn_invalidation_listener(
    cache: ActiveRecordingReportCache,
    mut events: broadcast::Receiver<RecordingEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let removed = cache
                        .delete(event.connection(), event.recording_name())
                        .await;
                    tracing::debug!(
                        event = event.kind(),
                        target_id = event.connection().target_id(),
                        recording = event.recording_name(),
                        removed,
                        "handled recording event"
                    );
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "recording event listener fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("recording event feed closed");
    })
}
