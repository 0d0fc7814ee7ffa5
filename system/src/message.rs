use crate::{
    Color, CursorPosition, Overlay, OverlayId, Participant, RelayError, SessionId, Timestamp,
    UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client → relay. One JSON text frame: `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SessionCommand {
    JoinSession(JoinSessionCommand),
    LeaveSession(LeaveSessionCommand),
    UserUpdate(UserUpdateCommand),
    Operation(OperationCommand),
    PoseAnalysisUpdate(PoseAnalysisCommand),
    OverlayCreate(OverlayCreateCommand),
    OverlayUpdate(OverlayUpdateCommand),
    OverlayDelete(OverlayDeleteCommand),
    CursorUpdate(CursorUpdateCommand),
    ChatMessage(ChatMessageCommand),
    Ping,
}

impl SessionCommand {
    pub fn from_json(text: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::JoinSession(c) => Some(&c.session_id),
            Self::LeaveSession(c) => Some(&c.session_id),
            Self::UserUpdate(c) => Some(&c.session_id),
            Self::Operation(c) => Some(&c.session_id),
            Self::PoseAnalysisUpdate(c) => Some(&c.session_id),
            Self::OverlayCreate(c) => Some(&c.session_id),
            Self::OverlayUpdate(c) => Some(&c.session_id),
            Self::OverlayDelete(c) => Some(&c.session_id),
            Self::CursorUpdate(c) => Some(&c.session_id),
            Self::ChatMessage(c) => Some(&c.session_id),
            Self::Ping => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionCommand {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveSessionCommand {
    pub session_id: SessionId,
    pub user_id: UserId,
}

/// Partial participant record: `userId` plus whatever fields changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub user_id: UserId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateCommand {
    pub session_id: SessionId,
    pub user: UserPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationCommand {
    pub session_id: SessionId,
    pub operation: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseAnalysisCommand {
    pub session_id: SessionId,
    pub update: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayCreateCommand {
    pub session_id: SessionId,
    pub overlay: Overlay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayUpdateCommand {
    pub session_id: SessionId,
    pub overlay_id: OverlayId,
    pub updates: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDeleteCommand {
    pub session_id: SessionId,
    pub overlay_id: OverlayId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdateCommand {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub position: CursorPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageCommand {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub message: String,
}

/// Relay → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SessionEvent {
    SessionState(SessionSnapshot),
    UserJoined(UserJoinedEvent),
    UserLeft(UserId),
    UserUpdate(UserPatch),
    Operation(Value),
    PoseAnalysisUpdate(Value),
    OverlayCreated(Overlay),
    OverlayUpdated(OverlayUpdatedEvent),
    OverlayDeleted(OverlayId),
    CursorUpdated(CursorUpdatedEvent),
    ChatMessage(ChatMessageEvent),
    RenderProgress(RenderProgressEvent),
    Pong,
    Error(ErrorEvent),
}

impl SessionEvent {
    pub fn to_json(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorEvent {
            message: message.into(),
        })
    }
}

/// Sent only to the connection that joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub users: Vec<Participant>,
    pub operations: Vec<Value>,
    pub overlays: Vec<Overlay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedEvent {
    pub user_id: UserId,
    pub username: String,
    pub color: Color,
    pub last_active: Timestamp,
}

impl From<&Participant> for UserJoinedEvent {
    fn from(p: &Participant) -> Self {
        Self {
            user_id: p.user_id.clone(),
            username: p.username.clone(),
            color: p.color.clone(),
            last_active: p.last_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayUpdatedEvent {
    pub overlay_id: OverlayId,
    pub updates: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdatedEvent {
    pub user_id: UserId,
    pub position: CursorPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    pub user_id: UserId,
    pub username: String,
    pub message: String,
    pub timestamp: Timestamp,
}

/// Also the request body of the render-progress admin endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderProgressEvent {
    pub render_id: String,
    pub progress: f64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
}
