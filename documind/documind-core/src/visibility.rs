//! Pure visibility resolution. `resolve` is a function of its inputs only:
//! it never mutates, and re-running it with unchanged inputs yields identical
//! sets. Output is sorted by id so it is independent of map iteration order.

use crate::model::{DocStatus, Document, Folder, FolderScope, Role, User};
use crate::store::Catalog;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

/// The filtered view of folders and documents one user is permitted to see.
#[derive(Clone, Debug, Serialize)]
pub struct AccessView {
    pub folders: Vec<Folder>,
    pub documents: Vec<Document>,
}

impl AccessView {
    pub fn contains_document(&self, id: Uuid) -> bool {
        self.documents.iter().any(|d| d.id == id)
    }

    pub fn document(&self, id: Uuid) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn folder_ids(&self) -> HashSet<Uuid> {
        self.folders.iter().map(|f| f.id).collect()
    }

    pub fn document_ids(&self) -> HashSet<Uuid> {
        self.documents.iter().map(|d| d.id).collect()
    }

    /// Approved documents filed directly under the given folder. This is the
    /// set a folder-level cascade toggle operates on.
    pub fn approved_docs_in_folder(&self, folder_id: Uuid) -> Vec<Uuid> {
        self.documents
            .iter()
            .filter(|d| d.folder_id == Some(folder_id) && d.status == DocStatus::Approved)
            .map(|d| d.id)
            .collect()
    }
}

/// Resolve the folders and documents `user` may see and act on.
pub fn resolve(user: &User, catalog: &Catalog) -> AccessView {
    let mut folders: Vec<Folder> = catalog
        .folders()
        .filter(|f| folder_visible(user, f))
        .cloned()
        .collect();
    folders.sort_by_key(|f| f.id);
    let folder_ids: HashSet<Uuid> = folders.iter().map(|f| f.id).collect();

    let mut documents: Vec<Document> = catalog
        .documents()
        .filter(|d| document_accessible(user, d, catalog, &folder_ids))
        .cloned()
        .collect();
    documents.sort_by_key(|d| d.id);

    AccessView { folders, documents }
}

/// The owner's soft-deleted documents, for the dedicated trash view.
pub fn trash(user: &User, catalog: &Catalog) -> Vec<Document> {
    let mut docs: Vec<Document> = catalog
        .documents_owned_by(user.id)
        .filter(|d| d.is_deleted)
        .cloned()
        .collect();
    docs.sort_by_key(|d| d.id);
    docs
}

fn folder_visible(user: &User, folder: &Folder) -> bool {
    match folder.scope {
        // Personal folders are private scratch space. Even admins must not
        // see another user's personal folder.
        FolderScope::Personal(owner) => owner == user.id,
        FolderScope::Department(dep) => match user.role {
            Role::Admin => true,
            Role::Member => user.department_id == Some(dep),
        },
    }
}

fn document_accessible(
    user: &User,
    doc: &Document,
    catalog: &Catalog,
    visible_folders: &HashSet<Uuid>,
) -> bool {
    // An in-flight upload exists for its uploader only.
    if doc.status == DocStatus::Uploading && doc.owner != user.id {
        return false;
    }
    // Soft-deleted documents live in the trash view, not the normal one.
    if doc.is_deleted && !user.is_admin() {
        return false;
    }
    // Owners always see their own uploads, to track pending/rejected state.
    if doc.owner == user.id {
        return true;
    }
    if user.is_admin() {
        let in_other_personal = doc
            .folder_id
            .and_then(|fid| catalog.folder(fid))
            .map_or(false, |f| {
                matches!(f.scope, FolderScope::Personal(owner) if owner != user.id)
            });
        if !in_other_personal {
            return true;
        }
        // fall through: the remaining clauses apply to admins too
    }
    if doc.status != DocStatus::Approved {
        return false;
    }
    if doc
        .folder_id
        .map_or(false, |fid| visible_folders.contains(&fid))
    {
        return true;
    }
    if doc.department_id.is_some() && doc.department_id == user.department_id {
        return true;
    }
    user.doc_grants.contains(&doc.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MimeClass;
    use std::collections::HashSet;

    fn member(department_id: Option<Uuid>) -> User {
        User {
            id: Uuid::new_v4(),
            name: "member".into(),
            role: Role::Member,
            department_id,
            doc_grants: HashSet::new(),
        }
    }

    fn admin() -> User {
        User {
            id: Uuid::new_v4(),
            name: "admin".into(),
            role: Role::Admin,
            department_id: None,
            doc_grants: HashSet::new(),
        }
    }

    fn upload(
        catalog: &mut Catalog,
        who: &User,
        name: &str,
        folder: Option<Uuid>,
    ) -> Uuid {
        let id = catalog
            .begin_upload(who, name.into(), 100, folder, None)
            .unwrap();
        catalog.complete_upload(who, id).unwrap();
        id
    }

    #[test]
    fn unapproved_foreign_documents_are_invisible_to_members() {
        let mut catalog = Catalog::new();
        let sales = Uuid::new_v4();
        let folder = catalog
            .create_folder("Sales".into(), None, FolderScope::Department(sales))
            .unwrap();
        let alice = member(Some(sales));
        let bob = member(Some(sales));
        let doc = upload(&mut catalog, &alice, "q3.pdf", Some(folder)); // pending

        let view = resolve(&bob, &catalog);
        assert!(!view.contains_document(doc));
        // the owner still sees it
        assert!(resolve(&alice, &catalog).contains_document(doc));
    }

    #[test]
    fn approval_widens_visibility_to_the_department_only() {
        let mut catalog = Catalog::new();
        let sales = Uuid::new_v4();
        let engineering = Uuid::new_v4();
        let folder = catalog
            .create_folder("Sales".into(), None, FolderScope::Department(sales))
            .unwrap();
        let alice = member(Some(sales));
        let bob = member(Some(sales));
        let eve = member(Some(engineering));
        let root = admin();

        let doc = upload(&mut catalog, &alice, "q3.pdf", Some(folder));
        catalog.decide(&root, doc, true).unwrap();

        assert!(resolve(&alice, &catalog).contains_document(doc));
        assert!(resolve(&bob, &catalog).contains_document(doc));
        assert!(!resolve(&eve, &catalog).contains_document(doc));
    }

    #[test]
    fn personal_folders_are_private_even_from_admins() {
        let mut catalog = Catalog::new();
        let alice = member(None);
        let root = admin();
        let personal = catalog.ensure_personal_folder(&alice);
        let doc = upload(&mut catalog, &alice, "diary.txt", Some(personal));

        let admin_view = resolve(&root, &catalog);
        assert!(!admin_view.folder_ids().contains(&personal));
        assert!(!admin_view.contains_document(doc));

        let alice_view = resolve(&alice, &catalog);
        assert!(alice_view.folder_ids().contains(&personal));
        assert!(alice_view.contains_document(doc));
    }

    #[test]
    fn members_never_see_other_personal_folders() {
        let mut catalog = Catalog::new();
        let alice = member(None);
        let bob = member(None);
        let alice_personal = catalog.ensure_personal_folder(&alice);
        catalog.ensure_personal_folder(&bob);

        let bob_view = resolve(&bob, &catalog);
        assert!(bob_view.folder_ids().contains(&bob.personal_folder_id()));
        assert!(!bob_view.folder_ids().contains(&alice_personal));
    }

    #[test]
    fn admins_see_all_department_folders() {
        let mut catalog = Catalog::new();
        let sales = Uuid::new_v4();
        let engineering = Uuid::new_v4();
        let f1 = catalog
            .create_folder("Sales".into(), None, FolderScope::Department(sales))
            .unwrap();
        let f2 = catalog
            .create_folder("Eng".into(), None, FolderScope::Department(engineering))
            .unwrap();
        let root = admin();
        let ids = resolve(&root, &catalog).folder_ids();
        assert!(ids.contains(&f1) && ids.contains(&f2));
    }

    #[test]
    fn uploading_documents_never_leak() {
        let mut catalog = Catalog::new();
        let sales = Uuid::new_v4();
        let folder = catalog
            .create_folder("Sales".into(), None, FolderScope::Department(sales))
            .unwrap();
        let alice = member(Some(sales));
        let bob = member(Some(sales));
        let root = admin();
        let doc = catalog
            .begin_upload(&alice, "inflight.pdf".into(), 10, Some(folder), None)
            .unwrap();

        assert!(resolve(&alice, &catalog).contains_document(doc));
        assert!(!resolve(&bob, &catalog).contains_document(doc));
        assert!(!resolve(&root, &catalog).contains_document(doc));
    }

    #[test]
    fn explicit_grant_requires_approval() {
        let mut catalog = Catalog::new();
        let sales = Uuid::new_v4();
        let folder = catalog
            .create_folder("Sales".into(), None, FolderScope::Department(sales))
            .unwrap();
        let alice = member(Some(sales));
        let mut eve = member(None);
        let root = admin();
        let doc = upload(&mut catalog, &alice, "q3.pdf", Some(folder)); // pending

        eve.doc_grants.insert(doc);
        assert!(!resolve(&eve, &catalog).contains_document(doc));

        catalog.decide(&root, doc, true).unwrap();
        assert!(resolve(&eve, &catalog).contains_document(doc));
    }

    #[test]
    fn soft_deleted_documents_move_to_trash() {
        let mut catalog = Catalog::new();
        let alice = member(None);
        let personal = catalog.ensure_personal_folder(&alice);
        let doc = upload(&mut catalog, &alice, "old.txt", Some(personal));
        catalog.set_deleted(&alice, doc, true).unwrap();

        assert!(!resolve(&alice, &catalog).contains_document(doc));
        let trashed = trash(&alice, &catalog);
        assert_eq!(trashed.len(), 1);
        assert_eq!(trashed[0].id, doc);
        assert_eq!(trashed[0].mime, MimeClass::Txt);

        // restore brings it back
        catalog.set_deleted(&alice, doc, false).unwrap();
        assert!(resolve(&alice, &catalog).contains_document(doc));
        assert!(trash(&alice, &catalog).is_empty());
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut catalog = Catalog::new();
        let sales = Uuid::new_v4();
        let folder = catalog
            .create_folder("Sales".into(), None, FolderScope::Department(sales))
            .unwrap();
        let alice = member(Some(sales));
        catalog.ensure_personal_folder(&alice);
        for i in 0..5 {
            upload(&mut catalog, &alice, &format!("doc{i}.pdf"), Some(folder));
        }

        let first = resolve(&alice, &catalog);
        let second = resolve(&alice, &catalog);
        let ids = |v: &AccessView| {
            (
                v.folders.iter().map(|f| f.id).collect::<Vec<_>>(),
                v.documents.iter().map(|d| d.id).collect::<Vec<_>>(),
            )
        };
        assert_eq!(ids(&first), ids(&second));
    }
}
