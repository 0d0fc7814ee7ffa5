use crate::{OverlayId, SessionId, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("overlay not found: {0}")]
    OverlayNotFound(OverlayId),
}

impl RelayError {
    /// Errors a client caused by sending something unusable, as opposed to
    /// referencing state that no longer exists.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            RelayError::MalformedEvent(_) | RelayError::InvalidField { .. }
        )
    }
}
