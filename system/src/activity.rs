use crate::{now, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

pub const DEFAULT_ACTIVITY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    OverlayCreated,
    OverlayUpdated,
    OverlayDeleted,
    ChatMessage,
    RenderProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub payload: Value,
    pub timestamp: Timestamp,
}

/// Ring of the most recent activity in a session, oldest first.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    records: VecDeque<ActivityRecord>,
    limit: usize,
}

impl ActivityLog {
    pub fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            limit,
        }
    }

    pub fn push(&mut self, kind: ActivityKind, user_id: Option<UserId>, payload: Value) {
        if self.limit == 0 {
            return;
        }
        while self.records.len() >= self.limit {
            self.records.pop_front();
        }
        self.records.push_back(ActivityRecord {
            kind,
            user_id,
            payload,
            timestamp: now(),
        });
    }

    /// Up to `count` latest records, oldest first.
    pub fn recent(&self, count: usize) -> Vec<ActivityRecord> {
        let skip = self.records.len().saturating_sub(count);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_LIMIT)
    }
}
