use crate::activity::{ActivityKind, ActivityLog, ActivityRecord, DEFAULT_ACTIVITY_LIMIT};
use crate::{CursorPosition, Overlay, Participant, RelayError, SessionId, SessionSnapshot, UserId};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLimits {
    /// `None` keeps every operation for the lifetime of the session.
    pub max_operations: Option<usize>,
    pub activity_limit: usize,
}

impl Default for DocumentLimits {
    fn default() -> Self {
        Self {
            max_operations: None,
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
        }
    }
}

/// Outcome of adding a user to a session roster.
#[derive(Debug, Clone)]
pub struct Admission {
    pub participant: Participant,
    pub is_new: bool,
}

/// Everything a collaboration session shares: roster, operation log,
/// overlays and the latest pose analysis. Last write wins everywhere.
#[derive(Debug, Clone)]
pub struct SessionDocument {
    users: Vec<Participant>,
    operations: Vec<Value>,
    overlays: Vec<Overlay>,
    pose_analysis: Option<Value>,
    activity: ActivityLog,
    max_operations: Option<usize>,
}

impl SessionDocument {
    pub fn new(limits: &DocumentLimits) -> Self {
        Self {
            users: Vec::new(),
            operations: Vec::new(),
            overlays: Vec::new(),
            pose_analysis: None,
            activity: ActivityLog::new(limits.activity_limit),
            max_operations: limits.max_operations,
        }
    }

    pub fn users(&self) -> &[Participant] {
        &self.users
    }

    pub fn operations(&self) -> &[Value] {
        &self.operations
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn pose_analysis(&self) -> Option<&Value> {
        self.pose_analysis.as_ref()
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.users.iter().find(|p| p.user_id == user_id)
    }

    pub fn overlay(&self, overlay_id: &str) -> Option<&Overlay> {
        self.overlays.iter().find(|o| o.id == overlay_id)
    }

    /// Adds `user_id` to the roster unless present. A returning user keeps
    /// their color but gets the new username and a fresh activity stamp.
    pub fn admit(&mut self, user_id: &str, username: &str) -> Admission {
        if let Some(existing) = self.users.iter_mut().find(|p| p.user_id == user_id) {
            existing.username = username.to_owned();
            existing.touch();
            return Admission {
                participant: existing.clone(),
                is_new: false,
            };
        }

        let participant = Participant::new(user_id.to_owned(), username.to_owned());
        self.users.push(participant.clone());
        Admission {
            participant,
            is_new: true,
        }
    }

    pub fn remove_participant(&mut self, user_id: &str) -> Option<Participant> {
        let index = self.users.iter().position(|p| p.user_id == user_id)?;
        Some(self.users.remove(index))
    }

    pub fn update_participant(
        &mut self,
        user_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<&Participant, RelayError> {
        let participant = self.participant_mut(user_id)?;
        participant.merge(fields)?;
        Ok(&*participant)
    }

    pub fn move_cursor(
        &mut self,
        user_id: &str,
        position: CursorPosition,
    ) -> Result<&Participant, RelayError> {
        let participant = self.participant_mut(user_id)?;
        participant.cursor_position = position;
        participant.touch();
        Ok(&*participant)
    }

    pub fn touch_participant(&mut self, user_id: &str) -> bool {
        self.participant_mut(user_id).map(|p| p.touch()).is_ok()
    }

    pub fn append_operation(&mut self, operation: Value) {
        self.operations.push(operation);
        if let Some(max) = self.max_operations {
            if self.operations.len() > max {
                let excess = self.operations.len() - max;
                self.operations.drain(..excess);
            }
        }
    }

    pub fn set_pose_analysis(&mut self, update: Value) {
        self.pose_analysis = Some(update);
    }

    /// Inserts the overlay, replacing any existing one with the same id in
    /// place. Returns `true` when an overlay was replaced.
    pub fn upsert_overlay(&mut self, overlay: Overlay) -> bool {
        if let Some(existing) = self.overlays.iter_mut().find(|o| o.id == overlay.id) {
            *existing = overlay;
            true
        } else {
            self.overlays.push(overlay);
            false
        }
    }

    pub fn update_overlay(
        &mut self,
        overlay_id: &str,
        updates: &Map<String, Value>,
    ) -> Result<&Overlay, RelayError> {
        let overlay = self
            .overlays
            .iter_mut()
            .find(|o| o.id == overlay_id)
            .ok_or_else(|| RelayError::OverlayNotFound(overlay_id.to_owned()))?;
        overlay.merge(updates);
        Ok(&*overlay)
    }

    pub fn remove_overlay(&mut self, overlay_id: &str) -> Result<Overlay, RelayError> {
        let index = self
            .overlays
            .iter()
            .position(|o| o.id == overlay_id)
            .ok_or_else(|| RelayError::OverlayNotFound(overlay_id.to_owned()))?;
        Ok(self.overlays.remove(index))
    }

    pub fn record_activity(&mut self, kind: ActivityKind, user_id: Option<UserId>, payload: Value) {
        self.activity.push(kind, user_id, payload);
    }

    pub fn recent_activity(&self, count: usize) -> Vec<ActivityRecord> {
        self.activity.recent(count)
    }

    pub fn snapshot(&self, session_id: &SessionId) -> SessionSnapshot {
        SessionSnapshot {
            session_id: session_id.clone(),
            users: self.users.clone(),
            operations: self.operations.clone(),
            overlays: self.overlays.clone(),
        }
    }

    fn participant_mut(&mut self, user_id: &str) -> Result<&mut Participant, RelayError> {
        self.users
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| RelayError::UserNotFound(user_id.to_owned()))
    }
}

impl Default for SessionDocument {
    fn default() -> Self {
        Self::new(&DocumentLimits::default())
    }
}
