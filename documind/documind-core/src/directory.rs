//! User and department records. Authentication beyond "a user record with a
//! role and department exists" is out of scope; the HTTP layer only maps a
//! header to one of these records.

use crate::error::{EngineError, Result};
use crate::model::{Department, Role, User};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct Directory {
    users: HashMap<Uuid, User>,
    departments: HashMap<Uuid, Department>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_user(
        &mut self,
        name: String,
        role: Role,
        department_id: Option<Uuid>,
    ) -> Result<Uuid> {
        if let Some(dep) = department_id {
            if !self.departments.contains_key(&dep) {
                return Err(EngineError::NotFound(dep));
            }
        }
        let id = Uuid::new_v4();
        self.users.insert(
            id,
            User {
                id,
                name,
                role,
                department_id,
                doc_grants: Default::default(),
            },
        );
        Ok(id)
    }

    pub fn user(&self, id: Uuid) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn has_admin(&self) -> bool {
        self.users.values().any(|u| u.role == Role::Admin)
    }

    /// Grant a single document to a user on top of the scope rules.
    pub fn grant_document(&mut self, user_id: Uuid, doc_id: Uuid) -> Result<()> {
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or(EngineError::NotFound(user_id))?;
        user.doc_grants.insert(doc_id);
        Ok(())
    }

    pub fn create_department(&mut self, name: String) -> Uuid {
        let id = Uuid::new_v4();
        self.departments.insert(id, Department { id, name });
        id
    }

    pub fn department(&self, id: Uuid) -> Option<&Department> {
        self.departments.get(&id)
    }

    pub fn departments(&self) -> impl Iterator<Item = &Department> {
        self.departments.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_unknown_department() {
        let mut dir = Directory::new();
        let err = dir
            .register_user("bob".into(), Role::Member, Some(Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn grants_accumulate() {
        let mut dir = Directory::new();
        let uid = dir.register_user("bob".into(), Role::Member, None).unwrap();
        let doc = Uuid::new_v4();
        dir.grant_document(uid, doc).unwrap();
        assert!(dir.user(uid).unwrap().doc_grants.contains(&doc));
    }
}
