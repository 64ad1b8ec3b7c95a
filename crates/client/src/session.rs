//! Bearer sessions per actor role
//!
//! Callers pick a [`Session`] from the [`SessionStore`] and pass it to every
//! API call; nothing in this crate looks up a token on its own.

use atlas_common::auth::Role;
use std::collections::HashMap;
use std::sync::RwLock;

/// An authenticated actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    role: Role,
    token: String,
    user_id: Option<String>,
}

impl Session {
    pub fn new(role: Role, token: impl Into<String>) -> Self {
        Self {
            role,
            token: token.into(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

/// Holds at most one session per role
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Role, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any session already held for the same role
    pub fn insert(&self, session: Session) {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.insert(session.role, session);
    }

    pub fn get(&self, role: Role) -> Option<Session> {
        let sessions = self
            .sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.get(&role).cloned()
    }

    pub fn remove(&self, role: Role) -> Option<Session> {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.remove(&role)
    }

    pub fn clear(&self) {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_session_per_role() {
        let store = SessionStore::new();
        store.insert(Session::new(Role::Admin, "t1"));
        store.insert(Session::new(Role::Registrant, "t2").with_user("reg-1"));
        store.insert(Session::new(Role::Admin, "t3"));

        assert_eq!(store.get(Role::Admin).unwrap().token(), "t3");
        assert_eq!(store.get(Role::Registrant).unwrap().user_id(), Some("reg-1"));
        assert!(store.get(Role::Author).is_none());

        store.remove(Role::Admin);
        assert!(store.get(Role::Admin).is_none());
        store.clear();
        assert!(store.get(Role::Registrant).is_none());
    }

    #[test]
    fn bearer_header() {
        let session = Session::new(Role::Reviewer, "abc");
        assert_eq!(session.bearer(), "Bearer abc");
        assert!(!session.is_staff());
    }
}
