//! Chat sessions and their selection snapshots. Sessions are namespaced per
//! user: one user's sessions are never visible to another, admins included,
//! so lookups by a non-owner answer "not found" rather than "forbidden".

use crate::error::{EngineError, Result};
use crate::model::Message;
use crate::selection::{ContextMode, ContextSelection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    pub messages: Vec<Message>,
    pub selected_doc_ids: HashSet<Uuid>,
    pub selected_folder_ids: HashSet<Uuid>,
    pub mode: ContextMode,
    /// Documents uploaded within this session, kept with the snapshot so
    /// library mode can exclude them after the session is reopened.
    pub session_upload_ids: HashSet<Uuid>,
    pub last_updated: DateTime<Utc>,
}

impl ChatSession {
    /// Rebuild the live selection from the last snapshot.
    pub fn selection(&self) -> ContextSelection {
        ContextSelection::from_parts(
            self.selected_doc_ids.clone(),
            self.selected_folder_ids.clone(),
            self.mode,
            self.session_upload_ids.clone(),
        )
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: std::collections::HashMap<Uuid, ChatSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session. An empty initial selection starts in library mode;
    /// a caller-supplied id list ("chat about this one document") starts
    /// focused on exactly those ids.
    pub fn create(&mut self, owner: Uuid, title: String, initial_docs: &[Uuid]) -> Uuid {
        let id = Uuid::new_v4();
        let mode = if initial_docs.is_empty() {
            ContextMode::default()
        } else {
            ContextMode::Focused
        };
        self.sessions.insert(
            id,
            ChatSession {
                id,
                owner,
                title,
                messages: Vec::new(),
                selected_doc_ids: initial_docs.iter().copied().collect(),
                selected_folder_ids: HashSet::new(),
                mode,
                session_upload_ids: HashSet::new(),
                last_updated: Utc::now(),
            },
        );
        id
    }

    pub fn get(&self, owner: Uuid, id: Uuid) -> Result<&ChatSession> {
        match self.sessions.get(&id) {
            Some(s) if s.owner == owner => Ok(s),
            _ => Err(EngineError::NotFound(id)),
        }
    }

    fn get_mut(&mut self, owner: Uuid, id: Uuid) -> Result<&mut ChatSession> {
        match self.sessions.get_mut(&id) {
            Some(s) if s.owner == owner => Ok(s),
            _ => Err(EngineError::NotFound(id)),
        }
    }

    /// Append to the message list. Messages are append-only; nothing edits
    /// or removes an existing entry.
    pub fn append_message(&mut self, owner: Uuid, id: Uuid, message: Message) -> Result<()> {
        let session = self.get_mut(owner, id)?;
        session.messages.push(message);
        session.last_updated = Utc::now();
        Ok(())
    }

    /// Persist the current selection alongside the session so reopening it
    /// restores the same context.
    pub fn snapshot_selection(
        &mut self,
        owner: Uuid,
        id: Uuid,
        selection: &ContextSelection,
    ) -> Result<()> {
        let session = self.get_mut(owner, id)?;
        session.selected_doc_ids = selection.doc_ids().clone();
        session.selected_folder_ids = selection.folder_ids().clone();
        session.mode = selection.mode();
        session.session_upload_ids = selection.session_uploads().clone();
        session.last_updated = Utc::now();
        Ok(())
    }

    /// The owner's sessions, most recently updated first.
    pub fn list(&self, owner: Uuid) -> Vec<&ChatSession> {
        let mut sessions: Vec<&ChatSession> = self
            .sessions
            .values()
            .filter(|s| s.owner == owner)
            .collect();
        sessions.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        sessions
    }
}
