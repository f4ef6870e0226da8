//! Identity seam: who is acting, and which roles a user holds.
//!
//! Authentication itself happens elsewhere; callers hand the resolved
//! `Actor` to mutating operations.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::error::ClubError;
use super::store::{collections, get_record, DocumentStore};
use crate::models::{Role, UserRoles};

/// Authenticated user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    /// Display name or email used in audit entries.
    pub display: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display: display.into(),
        }
    }
}

/// Anonymous calls are rejected before anything else happens.
pub fn require_actor(actor: Option<&Actor>) -> Result<&Actor, ClubError> {
    match actor {
        Some(actor) if !actor.user_id.trim().is_empty() => Ok(actor),
        _ => Err(ClubError::PermissionDenied(
            "an authenticated user is required for this operation".to_string(),
        )),
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Roles of a user, or `None` when the user is unknown.
    async fn roles_of(&self, user_id: &str) -> Result<Option<BTreeSet<Role>>, ClubError>;
}

/// Reads role assignments from the `user_roles` collection.
#[derive(Clone)]
pub struct StoreIdentityProvider {
    store: Arc<dyn DocumentStore>,
}

impl StoreIdentityProvider {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityProvider for StoreIdentityProvider {
    async fn roles_of(&self, user_id: &str) -> Result<Option<BTreeSet<Role>>, ClubError> {
        let record: Option<UserRoles> =
            get_record(self.store.as_ref(), collections::USER_ROLES, user_id).await?;
        Ok(record.map(|r| r.roles.into_iter().collect()))
    }
}

/// Fixed role table, for tests and local runs.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    users: std::sync::RwLock<HashMap<String, BTreeSet<Role>>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: impl Into<String>, roles: &[Role]) -> Self {
        self.add_user(user_id, roles);
        self
    }

    pub fn add_user(&self, user_id: impl Into<String>, roles: &[Role]) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user_id.into(), roles.iter().copied().collect());
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn roles_of(&self, user_id: &str) -> Result<Option<BTreeSet<Role>>, ClubError> {
        let users = self
            .users
            .read()
            .map_err(|e| ClubError::store("read identity table", e))?;
        Ok(users.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::{set_record, InMemoryStore};

    #[test]
    fn test_require_actor_rejects_anonymous() {
        assert!(matches!(
            require_actor(None),
            Err(ClubError::PermissionDenied(_))
        ));
        let blank = Actor::new("  ", "nobody");
        assert!(matches!(
            require_actor(Some(&blank)),
            Err(ClubError::PermissionDenied(_))
        ));
        let admin = Actor::new("admin-1", "admin@club.test");
        assert_eq!(require_actor(Some(&admin)).unwrap().user_id, "admin-1");
    }

    #[tokio::test]
    async fn test_store_identity_provider_reads_roles() {
        let store = Arc::new(InMemoryStore::new());
        let record = UserRoles {
            user_id: "coach-7".to_string(),
            email: Some("coach@club.test".to_string()),
            roles: vec![Role::Trainer, Role::Member],
        };
        set_record(store.as_ref(), collections::USER_ROLES, "coach-7", &record)
            .await
            .unwrap();

        let provider = StoreIdentityProvider::new(store);
        let roles = provider.roles_of("coach-7").await.unwrap().unwrap();
        assert!(roles.contains(&Role::Trainer));
        assert!(roles.contains(&Role::Member));
        assert!(provider.roles_of("ghost").await.unwrap().is_none());
    }
}
