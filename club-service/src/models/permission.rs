use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{AccessLevel, PageId, Role};

/// Access level granted to every holder of a role on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePermission {
    #[serde(rename = "_id")]
    pub id: String,
    pub role_id: Role,
    pub page_id: PageId,
    pub access_level: AccessLevel,
    pub created_by: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl RolePermission {
    /// Document id; one record per (role, page).
    pub fn record_id(role: Role, page: PageId) -> String {
        format!("{}:{}", role, page)
    }

    pub fn new(
        role_id: Role,
        page_id: PageId,
        access_level: AccessLevel,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let created_by = created_by.into();
        Self {
            id: Self::record_id(role_id, page_id),
            role_id,
            page_id,
            access_level,
            updated_by: created_by.clone(),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-user permission, optionally overriding whatever the user's roles grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPermission {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub page_id: PageId,
    pub access_level: AccessLevel,
    #[serde(default)]
    pub overrides_role: bool,
    pub created_by: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl UserPermission {
    /// Document id; one record per (user, page).
    pub fn record_id(user_id: &str, page: PageId) -> String {
        format!("{}:{}", user_id, page)
    }

    pub fn new(
        user_id: impl Into<String>,
        page_id: PageId,
        access_level: AccessLevel,
        overrides_role: bool,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let user_id = user_id.into();
        let created_by = created_by.into();
        Self {
            id: Self::record_id(&user_id, page_id),
            user_id,
            page_id,
            access_level,
            overrides_role,
            updated_by: created_by.clone(),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Where a resolved access level came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionSource {
    Role,
    User,
    Both,
}

/// Derived access decision for one user on one page. Never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectivePermission {
    pub page_id: PageId,
    pub access_level: AccessLevel,
    pub source: PermissionSource,
    pub role_permissions: Vec<RolePermission>,
    pub user_permission: Option<UserPermission>,
}

impl EffectivePermission {
    /// True when no role or user permission contributed to this decision.
    pub fn is_unconfigured(&self) -> bool {
        self.role_permissions.is_empty() && self.user_permission.is_none()
    }

    /// Second step of resolution: the page default when nothing is configured,
    /// the resolved level otherwise.
    pub fn level_or_default(&self) -> AccessLevel {
        if self.is_unconfigured() {
            self.page_id.default_access_level()
        } else {
            self.access_level
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditTarget {
    Role,
    User,
}

impl AuditTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditTarget::Role => "role",
            AuditTarget::User => "user",
        }
    }
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        }
    }
}

/// Append-only trail of permission changes.
///
/// `timestamp` is stored at millisecond precision; `sequence` orders entries
/// that share a millisecond and only ever grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionAuditLog {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sequence: i64,
    pub actor_id: String,
    pub actor_display: String,
    pub action: AuditAction,
    pub target_type: AuditTarget,
    pub target_id: String,
    pub page_id: PageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_access_level: Option<AccessLevel>,
    pub new_access_level: AccessLevel,
}

impl PermissionAuditLog {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: DateTime<Utc>,
        actor_id: impl Into<String>,
        actor_display: impl Into<String>,
        action: AuditAction,
        target_type: AuditTarget,
        target_id: impl Into<String>,
        page_id: PageId,
        old_access_level: Option<AccessLevel>,
        new_access_level: AccessLevel,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            sequence: timestamp.timestamp_micros(),
            actor_id: actor_id.into(),
            actor_display: actor_display.into(),
            action,
            target_type,
            target_id: target_id.into(),
            page_id,
            old_access_level,
            new_access_level,
        }
    }

    pub fn with_sequence(mut self, sequence: i64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// Role assignment of one application user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRoles {
    #[serde(rename = "_id")]
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Request to grant a role an access level on a page.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetRolePermissionRequest {
    #[validate(length(min = 1, max = 64))]
    pub role_id: String,
    #[validate(length(min = 1, max = 64))]
    pub page_id: String,
    pub access_level: AccessLevel,
}

/// Request to grant a single user an access level on a page.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetUserPermissionRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[validate(length(min = 1, max = 64))]
    pub page_id: String,
    pub access_level: AccessLevel,
    #[serde(default)]
    pub overrides_role: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_record_ids_are_unique_per_pair() {
        assert_eq!(
            RolePermission::record_id(Role::Trainer, PageId::TrainingPlans),
            "trainer:training-plans"
        );
        assert_eq!(
            UserPermission::record_id("u-42", PageId::Members),
            "u-42:members"
        );
    }

    #[test]
    fn test_level_or_default_only_applies_when_unconfigured() {
        let unconfigured = EffectivePermission {
            page_id: PageId::Dashboard,
            access_level: AccessLevel::None,
            source: PermissionSource::Role,
            role_permissions: vec![],
            user_permission: None,
        };
        assert_eq!(unconfigured.level_or_default(), AccessLevel::Read);

        let explicit_none = EffectivePermission {
            user_permission: Some(UserPermission::new(
                "u-1",
                PageId::Dashboard,
                AccessLevel::None,
                true,
                "admin-1",
                now(),
            )),
            source: PermissionSource::User,
            ..unconfigured
        };
        assert_eq!(explicit_none.level_or_default(), AccessLevel::None);
    }

    #[test]
    fn test_bson_round_trip_keeps_enum_keys() {
        let perm = RolePermission::new(
            Role::Admin,
            PageId::UserManagement,
            AccessLevel::Full,
            "admin-1",
            now(),
        );
        let doc = mongodb::bson::to_document(&perm).unwrap();
        assert_eq!(doc.get_str("_id").unwrap(), "admin:user-management");
        assert_eq!(doc.get_str("role_id").unwrap(), "admin");
        assert_eq!(doc.get_str("access_level").unwrap(), "full");
        let back: RolePermission = mongodb::bson::from_document(doc).unwrap();
        assert_eq!(back, perm);
    }

    #[test]
    fn test_request_validation() {
        let req = SetUserPermissionRequest {
            user_id: String::new(),
            page_id: "members".to_string(),
            access_level: AccessLevel::Read,
            overrides_role: false,
        };
        assert!(req.validate().is_err());
    }
}
