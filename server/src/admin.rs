use serde::Serialize;
use system::{ActivityRecord, Participant, RelayError, RenderProgressEvent, SessionId, Timestamp};
use tokio::sync::oneshot::Sender;

/// Requests from the HTTP side. Each carries the channel its answer goes to.
#[derive(Debug)]
pub enum AdminCommand {
    ListSessions {
        tx: Sender<Vec<SessionSummary>>,
    },
    GetPresence {
        session_id: SessionId,
        limit: usize,
        tx: Sender<Result<Presence, RelayError>>,
    },
    NotifyRenderProgress {
        session_id: SessionId,
        progress: RenderProgressEvent,
        tx: Sender<Result<usize, RelayError>>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub users: usize,
    pub connections: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub session_id: SessionId,
    pub users: Vec<Participant>,
    pub recent_activity: Vec<ActivityRecord>,
    pub timestamp: Timestamp,
}
