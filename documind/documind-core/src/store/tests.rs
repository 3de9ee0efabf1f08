use super::*;
use crate::model::Role;
use std::collections::HashSet;

fn user(role: Role, department_id: Option<Uuid>) -> User {
    User {
        id: Uuid::new_v4(),
        name: "test".into(),
        role,
        department_id,
        doc_grants: HashSet::new(),
    }
}

#[test]
fn personal_folder_provisioned_once() {
    let mut catalog = Catalog::new();
    let alice = user(Role::Member, None);
    let first = catalog.ensure_personal_folder(&alice);
    let second = catalog.ensure_personal_folder(&alice);
    assert_eq!(first, second);
    assert_eq!(catalog.folders().count(), 1);
    let folder = catalog.folder(first).unwrap();
    assert!(folder.is_system);
    assert_eq!(folder.status, DocStatus::Approved);
    assert_eq!(folder.scope, FolderScope::Personal(alice.id));
}

#[test]
fn folder_nesting_stays_in_scope() {
    let mut catalog = Catalog::new();
    let sales = Uuid::new_v4();
    let engineering = Uuid::new_v4();
    let parent = catalog
        .create_folder("Sales".into(), None, FolderScope::Department(sales))
        .unwrap();
    let child = catalog
        .create_folder("Q3".into(), Some(parent), FolderScope::Department(sales))
        .unwrap();
    assert_eq!(catalog.folder(child).unwrap().parent_id, Some(parent));

    let err = catalog
        .create_folder(
            "Sneaky".into(),
            Some(parent),
            FolderScope::Department(engineering),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::ScopeMismatch));

    let alice = user(Role::Member, Some(sales));
    let err = catalog
        .create_folder(
            "Private".into(),
            Some(parent),
            FolderScope::Personal(alice.id),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::ScopeMismatch));
}

#[test]
fn member_department_upload_enters_review() {
    let mut catalog = Catalog::new();
    let sales = Uuid::new_v4();
    let folder = catalog
        .create_folder("Sales".into(), None, FolderScope::Department(sales))
        .unwrap();
    let alice = user(Role::Member, Some(sales));

    let id = catalog
        .begin_upload(&alice, "q3.pdf".into(), 1024, Some(folder), None)
        .unwrap();
    assert_eq!(catalog.document(id).unwrap().status, DocStatus::Uploading);
    // department inherited from the folder
    assert_eq!(catalog.document(id).unwrap().department_id, Some(sales));
    assert_eq!(catalog.document(id).unwrap().mime, MimeClass::Pdf);

    let status = catalog.complete_upload(&alice, id).unwrap();
    assert_eq!(status, DocStatus::Pending);
}

#[test]
fn admin_upload_auto_approves_without_pending_step() {
    let mut catalog = Catalog::new();
    let admin = user(Role::Admin, None);
    let id = catalog
        .begin_upload(&admin, "notes.txt".into(), 12, None, None)
        .unwrap();
    let status = catalog.complete_upload(&admin, id).unwrap();
    assert_eq!(status, DocStatus::Approved);
}

#[test]
fn personal_folder_upload_auto_approves() {
    let mut catalog = Catalog::new();
    let alice = user(Role::Member, None);
    let personal = catalog.ensure_personal_folder(&alice);
    let id = catalog
        .begin_upload(&alice, "diary.txt".into(), 64, Some(personal), None)
        .unwrap();
    assert_eq!(catalog.complete_upload(&alice, id).unwrap(), DocStatus::Approved);
}

#[test]
fn failed_transfer_leaves_no_trace() {
    let mut catalog = Catalog::new();
    let alice = user(Role::Member, None);
    let id = catalog
        .begin_upload(&alice, "broken.pdf".into(), 0, None, None)
        .unwrap();
    catalog.fail_upload(id);
    assert!(catalog.document(id).is_none());
}

#[test]
fn fail_upload_ignores_settled_documents() {
    let mut catalog = Catalog::new();
    let admin = user(Role::Admin, None);
    let id = catalog
        .begin_upload(&admin, "done.pdf".into(), 5, None, None)
        .unwrap();
    catalog.complete_upload(&admin, id).unwrap();
    catalog.fail_upload(id);
    assert!(catalog.document(id).is_some());
}

#[test]
fn double_decision_races_to_one_winner() {
    let mut catalog = Catalog::new();
    let sales = Uuid::new_v4();
    let folder = catalog
        .create_folder("Sales".into(), None, FolderScope::Department(sales))
        .unwrap();
    let alice = user(Role::Member, Some(sales));
    let admin = user(Role::Admin, None);
    let id = catalog
        .begin_upload(&alice, "q3.pdf".into(), 1024, Some(folder), None)
        .unwrap();
    catalog.complete_upload(&alice, id).unwrap();

    assert_eq!(catalog.decide(&admin, id, true).unwrap(), DocStatus::Approved);
    let err = catalog.decide(&admin, id, false).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            from: DocStatus::Approved
        }
    ));
    assert_eq!(catalog.document(id).unwrap().status, DocStatus::Approved);
}

#[test]
fn members_cannot_decide() {
    let mut catalog = Catalog::new();
    let alice = user(Role::Member, None);
    let id = catalog
        .begin_upload(&alice, "a.txt".into(), 1, None, None)
        .unwrap();
    catalog.complete_upload(&alice, id).unwrap();
    let err = catalog.decide(&alice, id, true).unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));
}

#[test]
fn soft_delete_is_reversible_and_guarded() {
    let mut catalog = Catalog::new();
    let alice = user(Role::Member, None);
    let mallory = user(Role::Member, None);
    let id = catalog
        .begin_upload(&alice, "a.txt".into(), 1, None, None)
        .unwrap();

    // uploading records cannot be trashed
    let err = catalog.set_deleted(&alice, id, true).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    catalog.complete_upload(&alice, id).unwrap();
    assert!(matches!(
        catalog.set_deleted(&mallory, id, true).unwrap_err(),
        EngineError::Forbidden
    ));

    catalog.set_deleted(&alice, id, true).unwrap();
    assert!(catalog.document(id).unwrap().is_deleted);
    catalog.set_deleted(&alice, id, false).unwrap();
    assert!(!catalog.document(id).unwrap().is_deleted);
}

#[test]
fn hard_delete_requires_admin_or_trashed_owner() {
    let mut catalog = Catalog::new();
    let alice = user(Role::Member, None);
    let admin = user(Role::Admin, None);
    let id = catalog
        .begin_upload(&alice, "a.txt".into(), 1, None, None)
        .unwrap();
    catalog.complete_upload(&alice, id).unwrap();

    // owner must soft-delete first
    assert!(matches!(
        catalog.remove(&alice, id).unwrap_err(),
        EngineError::Forbidden
    ));
    catalog.set_deleted(&alice, id, true).unwrap();
    let removed = catalog.remove(&alice, id).unwrap();
    assert_eq!(removed.name, "a.txt");
    assert!(catalog.document(id).is_none());

    // admins may remove directly
    let id = catalog
        .begin_upload(&alice, "b.txt".into(), 1, None, None)
        .unwrap();
    catalog.complete_upload(&alice, id).unwrap();
    catalog.remove(&admin, id).unwrap();
    assert!(catalog.document(id).is_none());
}

#[test]
fn filed_uploads_take_their_department_from_the_folder_alone() {
    let mut catalog = Catalog::new();
    let sales = Uuid::new_v4();
    let alice = user(Role::Member, Some(sales));
    let bob = user(Role::Member, Some(sales));
    let personal = catalog.ensure_personal_folder(&alice);

    // a caller-supplied department must not stick to a personal-folder upload
    let id = catalog
        .begin_upload(&alice, "leak.pdf".into(), 10, Some(personal), Some(sales))
        .unwrap();
    assert_eq!(catalog.document(id).unwrap().department_id, None);
    assert_eq!(catalog.complete_upload(&alice, id).unwrap(), DocStatus::Approved);
    assert!(!crate::visibility::resolve(&bob, &catalog).contains_document(id));

    // nor override the department of a department-scoped folder
    let engineering = Uuid::new_v4();
    let folder = catalog
        .create_folder("Sales".into(), None, FolderScope::Department(sales))
        .unwrap();
    let id = catalog
        .begin_upload(&alice, "q3.pdf".into(), 10, Some(folder), Some(engineering))
        .unwrap();
    assert_eq!(catalog.document(id).unwrap().department_id, Some(sales));
}
