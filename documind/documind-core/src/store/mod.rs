//! Owned catalog of documents and folders. All lifecycle transitions go
//! through the methods here so the invariants (one personal folder per user,
//! scope-consistent nesting, guarded status transitions) are enforced at the
//! write boundary.

use crate::error::{EngineError, Result};
use crate::model::{DocStatus, Document, Folder, FolderScope, MimeClass, User};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

#[cfg(test)]
mod tests;

#[derive(Default)]
pub struct Catalog {
    documents: HashMap<Uuid, Document>,
    folders: HashMap<Uuid, Folder>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily provision the user's personal folder and return its id. The id
    /// is derived from the user id, so calling this repeatedly is idempotent
    /// and can never create a duplicate.
    pub fn ensure_personal_folder(&mut self, user: &User) -> Uuid {
        let id = user.personal_folder_id();
        self.folders.entry(id).or_insert_with(|| {
            debug!(user = %user.id, folder = %id, "provisioning personal folder");
            Folder {
                id,
                name: "Personal".to_string(),
                parent_id: None,
                scope: FolderScope::Personal(user.id),
                status: DocStatus::Approved,
                is_system: true,
            }
        });
        id
    }

    /// Create a folder. A parent, when given, must exist and share the new
    /// folder's scope: no cross-department or cross-user nesting.
    pub fn create_folder(
        &mut self,
        name: String,
        parent_id: Option<Uuid>,
        scope: FolderScope,
    ) -> Result<Uuid> {
        if let Some(pid) = parent_id {
            let parent = self.folders.get(&pid).ok_or(EngineError::NotFound(pid))?;
            if parent.scope != scope {
                return Err(EngineError::ScopeMismatch);
            }
        }
        let id = Uuid::new_v4();
        self.folders.insert(
            id,
            Folder {
                id,
                name,
                parent_id,
                scope,
                status: DocStatus::Approved,
                is_system: false,
            },
        );
        Ok(id)
    }

    /// Phase one of the two-phase upload: create the placeholder record in
    /// `Uploading` before the byte transfer starts, so callers can show
    /// progress. With a target folder the department comes from the folder
    /// alone; a caller-supplied department applies only to unfiled uploads.
    /// A personal folder therefore always yields a department-less document.
    pub fn begin_upload(
        &mut self,
        user: &User,
        name: String,
        size_bytes: u64,
        folder_id: Option<Uuid>,
        department_id: Option<Uuid>,
    ) -> Result<Uuid> {
        let department_id = match folder_id {
            Some(fid) => {
                let folder = self.folders.get(&fid).ok_or(EngineError::NotFound(fid))?;
                folder.department_id()
            }
            None => department_id,
        };
        let id = Uuid::new_v4();
        let mime = MimeClass::from_name(&name);
        self.documents.insert(
            id,
            Document {
                id,
                owner: user.id,
                name,
                size_bytes,
                mime,
                uploaded_at: Utc::now(),
                folder_id,
                department_id,
                status: DocStatus::Uploading,
                is_deleted: false,
            },
        );
        Ok(id)
    }

    /// Phase two, success: promote the placeholder in place. Auto-approves
    /// when the uploader is an admin or the target folder is the uploader's
    /// own personal folder; everything else enters the review queue.
    pub fn complete_upload(&mut self, user: &User, id: Uuid) -> Result<DocStatus> {
        let personal = user.personal_folder_id();
        let doc = self
            .documents
            .get_mut(&id)
            .ok_or(EngineError::NotFound(id))?;
        if doc.owner != user.id {
            return Err(EngineError::Forbidden);
        }
        if doc.status != DocStatus::Uploading {
            return Err(EngineError::InvalidTransition { from: doc.status });
        }
        doc.status = if user.is_admin() || doc.folder_id == Some(personal) {
            DocStatus::Approved
        } else {
            DocStatus::Pending
        };
        debug!(doc = %id, status = ?doc.status, "upload completed");
        Ok(doc.status)
    }

    /// Phase two, failure: the placeholder is removed entirely, leaving no
    /// trace. The engine never retries on its own.
    pub fn fail_upload(&mut self, id: Uuid) {
        if let Some(doc) = self.documents.get(&id) {
            if doc.status == DocStatus::Uploading {
                warn!(doc = %id, name = %doc.name, "discarding failed upload");
                self.documents.remove(&id);
            }
        }
    }

    /// Admin review decision. Compare-and-set on `Pending` so that when two
    /// admins act simultaneously exactly one decision wins.
    pub fn decide(&mut self, admin: &User, id: Uuid, approve: bool) -> Result<DocStatus> {
        if !admin.is_admin() {
            return Err(EngineError::Forbidden);
        }
        let doc = self
            .documents
            .get_mut(&id)
            .ok_or(EngineError::NotFound(id))?;
        if doc.status != DocStatus::Pending {
            return Err(EngineError::InvalidTransition { from: doc.status });
        }
        doc.status = if approve {
            DocStatus::Approved
        } else {
            DocStatus::Rejected
        };
        Ok(doc.status)
    }

    /// Soft-delete toggle. Available to the owner (any role) and to admins,
    /// for any status except `Uploading`.
    pub fn set_deleted(&mut self, user: &User, id: Uuid, deleted: bool) -> Result<()> {
        let doc = self
            .documents
            .get_mut(&id)
            .ok_or(EngineError::NotFound(id))?;
        if doc.owner != user.id && !user.is_admin() {
            return Err(EngineError::Forbidden);
        }
        if doc.status == DocStatus::Uploading {
            return Err(EngineError::InvalidTransition { from: doc.status });
        }
        doc.is_deleted = deleted;
        Ok(())
    }

    /// Hard delete: irreversible. Admins may remove anything; an owner may
    /// remove their own document only once it is already soft-deleted.
    pub fn remove(&mut self, user: &User, id: Uuid) -> Result<Document> {
        let doc = self.documents.get(&id).ok_or(EngineError::NotFound(id))?;
        let allowed = user.is_admin() || (doc.owner == user.id && doc.is_deleted);
        if !allowed {
            return Err(EngineError::Forbidden);
        }
        Ok(self.documents.remove(&id).expect("checked above"))
    }

    pub fn document(&self, id: Uuid) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub fn folder(&self, id: Uuid) -> Option<&Folder> {
        self.folders.get(&id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn folders(&self) -> impl Iterator<Item = &Folder> {
        self.folders.values()
    }

    pub fn documents_in_folder(&self, folder_id: Uuid) -> impl Iterator<Item = &Document> {
        self.documents
            .values()
            .filter(move |d| d.folder_id == Some(folder_id))
    }

    pub fn documents_owned_by(&self, owner: Uuid) -> impl Iterator<Item = &Document> {
        self.documents.values().filter(move |d| d.owner == owner)
    }
}
