//! Append-only activity record for audit display. Informational only, never
//! consulted by visibility or selection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Upload,
    FolderCreated,
}

#[derive(Clone, Debug, Serialize)]
pub struct ActivityEntry {
    pub actor: Uuid,
    pub kind: ActivityKind,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
pub struct ActivityLog {
    entries: Vec<ActivityEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, actor: Uuid, kind: ActivityKind, name: impl Into<String>) {
        self.entries.push(ActivityEntry {
            actor,
            kind,
            name: name.into(),
            timestamp: Utc::now(),
        });
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<&ActivityEntry> {
        self.entries.iter().rev().take(n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
