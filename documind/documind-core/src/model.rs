//! Core record types shared across the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Namespace for deriving per-user personal folder ids. Deriving the id from
/// the user id keeps lazy provisioning idempotent: re-deriving can never
/// produce a second personal folder.
const PERSONAL_FOLDER_NS: Uuid = Uuid::from_u128(0x6f1d_a2b4_9c3e_4f58_8a70_2d1b_5e94_c307);

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub department_id: Option<Uuid>,
    /// Documents individually granted to this user on top of the scope rules.
    #[serde(default)]
    pub doc_grants: HashSet<Uuid>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Deterministic id of this user's personal folder.
    pub fn personal_folder_id(&self) -> Uuid {
        Uuid::new_v5(&PERSONAL_FOLDER_NS, self.id.as_bytes())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
}

/// Every folder belongs to exactly one scope: a department, or one user's
/// private space. Personal folders never cross user boundaries.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum FolderScope {
    Department(Uuid),
    Personal(Uuid),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub scope: FolderScope,
    pub status: DocStatus,
    /// True only for the auto-provisioned personal folder.
    pub is_system: bool,
}

impl Folder {
    pub fn department_id(&self) -> Option<Uuid> {
        match self.scope {
            FolderScope::Department(id) => Some(id),
            FolderScope::Personal(_) => None,
        }
    }

    pub fn personal_owner(&self) -> Option<Uuid> {
        match self.scope {
            FolderScope::Personal(owner) => Some(owner),
            FolderScope::Department(_) => None,
        }
    }
}

/// Document lifecycle status. `Uploading` is the phase-one placeholder and is
/// excluded from every visibility and selection computation for anyone but
/// the uploader.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    Uploading,
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MimeClass {
    Pdf,
    Doc,
    Docx,
    Pptx,
    Txt,
    Xlsx,
}

impl MimeClass {
    /// Classify by file-name extension. Unknown extensions fall back to `Txt`.
    pub fn from_name(name: &str) -> Self {
        let ext = name.rsplit('.').next().unwrap_or("");
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => MimeClass::Pdf,
            "doc" => MimeClass::Doc,
            "docx" => MimeClass::Docx,
            "pptx" | "ppt" => MimeClass::Pptx,
            "xlsx" | "xls" => MimeClass::Xlsx,
            _ => MimeClass::Txt,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MimeClass::Pdf => "pdf",
            MimeClass::Doc => "doc",
            MimeClass::Docx => "docx",
            MimeClass::Pptx => "pptx",
            MimeClass::Txt => "txt",
            MimeClass::Xlsx => "xlsx",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub size_bytes: u64,
    pub mime: MimeClass,
    pub uploaded_at: DateTime<Utc>,
    pub folder_id: Option<Uuid>,
    /// Inherited from the target folder at upload time.
    pub department_id: Option<Uuid>,
    pub status: DocStatus,
    /// Soft-delete flag, independent of `status`.
    pub is_deleted: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
