//! Per-session context selection: the subset of accessible documents that
//! will be submitted with the next question.

use crate::model::DocStatus;
use crate::visibility::AccessView;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// How the selection is turned into a query context. The mode is an explicit
/// per-session flag set by the caller, never inferred from upload recency.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ContextMode {
    /// Submit exactly the selected set.
    Focused,
    /// Ignore the selection and submit every approved, non-deleted accessible
    /// document, optionally leaving out documents uploaded within the current
    /// session so library-wide questions don't double-count a one-off file.
    Library { exclude_session_uploads: bool },
}

impl Default for ContextMode {
    fn default() -> Self {
        ContextMode::Library {
            exclude_session_uploads: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextSelection {
    docs: HashSet<Uuid>,
    folders: HashSet<Uuid>,
    mode: ContextMode,
    /// Documents uploaded within the owning session, tracked so library mode
    /// can exclude them.
    session_uploads: HashSet<Uuid>,
}

impl ContextSelection {
    pub fn new(mode: ContextMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn from_parts(
        docs: HashSet<Uuid>,
        folders: HashSet<Uuid>,
        mode: ContextMode,
        session_uploads: HashSet<Uuid>,
    ) -> Self {
        Self {
            docs,
            folders,
            mode,
            session_uploads,
        }
    }

    pub fn doc_ids(&self) -> &HashSet<Uuid> {
        &self.docs
    }

    pub fn folder_ids(&self) -> &HashSet<Uuid> {
        &self.folders
    }

    pub fn mode(&self) -> ContextMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ContextMode) {
        self.mode = mode;
    }

    pub fn session_uploads(&self) -> &HashSet<Uuid> {
        &self.session_uploads
    }

    pub fn record_session_upload(&mut self, id: Uuid) {
        self.session_uploads.insert(id);
        self.docs.insert(id);
    }

    /// Flip membership of a single document. No-op when the document is not
    /// in the caller's accessible view.
    pub fn toggle_document(&mut self, id: Uuid, view: &AccessView) {
        if !view.contains_document(id) {
            return;
        }
        if !self.docs.remove(&id) {
            self.docs.insert(id);
        }
    }

    /// Cascading bulk toggle over a folder's approved accessible documents.
    /// A folder is binary: fully in or fully out. If every document in the
    /// folder is already selected, all of them leave the set; otherwise all
    /// of them enter it. Applying it twice restores the prior state.
    pub fn toggle_folder(&mut self, folder_id: Uuid, view: &AccessView) {
        let docs_in_folder = view.approved_docs_in_folder(folder_id);
        // vacuously true for an empty folder, which therefore toggles off
        let fully_selected = docs_in_folder.iter().all(|id| self.docs.contains(id));
        if fully_selected {
            for id in &docs_in_folder {
                self.docs.remove(id);
            }
            self.folders.remove(&folder_id);
        } else {
            for id in &docs_in_folder {
                self.docs.insert(*id);
            }
            self.folders.insert(folder_id);
        }
    }

    /// Select every accessible document and every non-system visible folder.
    pub fn select_all(&mut self, view: &AccessView) {
        self.docs = view.document_ids();
        self.folders = view
            .folders
            .iter()
            .filter(|f| !f.is_system)
            .map(|f| f.id)
            .collect();
    }

    pub fn deselect_all(&mut self) {
        self.docs.clear();
        self.folders.clear();
    }

    /// Drop ids the resolver no longer returns. Called whenever the
    /// underlying document or folder sets may have changed; stale ids are
    /// removed silently rather than failing the next query.
    pub fn revalidate(&mut self, view: &AccessView) {
        let accessible = view.document_ids();
        self.docs.retain(|id| accessible.contains(id));
        let folders = view.folder_ids();
        self.folders.retain(|id| folders.contains(id));
        self.session_uploads.retain(|id| accessible.contains(id));
    }

    /// Document names to submit to the generation backend for the next
    /// question, according to the active mode. Only approved documents are
    /// ever submitted.
    pub fn resolve_for_query(&self, view: &AccessView) -> Vec<String> {
        match self.mode {
            ContextMode::Focused => view
                .documents
                .iter()
                .filter(|d| d.status == DocStatus::Approved && self.docs.contains(&d.id))
                .map(|d| d.name.clone())
                .collect(),
            ContextMode::Library {
                exclude_session_uploads,
            } => view
                .documents
                .iter()
                .filter(|d| d.status == DocStatus::Approved && !d.is_deleted)
                .filter(|d| !(exclude_session_uploads && self.session_uploads.contains(&d.id)))
                .map(|d| d.name.clone())
                .collect(),
        }
    }
}
