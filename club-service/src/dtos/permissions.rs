use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    AccessLevel, AuditAction, AuditTarget, EffectivePermission, PageId, PermissionAuditLog,
    PermissionSource, Role, RolePermission, UserPermission,
};

#[derive(Debug, Serialize)]
pub struct RolePermissionResponse {
    pub id: String,
    pub role_id: Role,
    pub page_id: PageId,
    pub access_level: AccessLevel,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl From<RolePermission> for RolePermissionResponse {
    fn from(perm: RolePermission) -> Self {
        Self {
            id: perm.id,
            role_id: perm.role_id,
            page_id: perm.page_id,
            access_level: perm.access_level,
            created_by: perm.created_by,
            created_at: perm.created_at,
            updated_by: perm.updated_by,
            updated_at: perm.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPermissionResponse {
    pub id: String,
    pub user_id: String,
    pub page_id: PageId,
    pub access_level: AccessLevel,
    pub overrides_role: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl From<UserPermission> for UserPermissionResponse {
    fn from(perm: UserPermission) -> Self {
        Self {
            id: perm.id,
            user_id: perm.user_id,
            page_id: perm.page_id,
            access_level: perm.access_level,
            overrides_role: perm.overrides_role,
            created_by: perm.created_by,
            created_at: perm.created_at,
            updated_by: perm.updated_by,
            updated_at: perm.updated_at,
        }
    }
}

/// Effective permission with the page default already applied in
/// `level_or_default`; `access_level` is the raw resolution.
#[derive(Debug, Serialize)]
pub struct EffectivePermissionResponse {
    pub page_id: PageId,
    pub access_level: AccessLevel,
    pub level_or_default: AccessLevel,
    pub source: PermissionSource,
    pub role_permissions: Vec<RolePermissionResponse>,
    pub user_permission: Option<UserPermissionResponse>,
}

impl From<EffectivePermission> for EffectivePermissionResponse {
    fn from(effective: EffectivePermission) -> Self {
        let level_or_default = effective.level_or_default();
        Self {
            page_id: effective.page_id,
            access_level: effective.access_level,
            level_or_default,
            source: effective.source,
            role_permissions: effective
                .role_permissions
                .into_iter()
                .map(Into::into)
                .collect(),
            user_permission: effective.user_permission.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub sequence: i64,
    pub actor_id: String,
    pub actor_display: String,
    pub action: AuditAction,
    pub target_type: AuditTarget,
    pub target_id: String,
    pub page_id: PageId,
    pub old_access_level: Option<AccessLevel>,
    pub new_access_level: AccessLevel,
}

impl From<PermissionAuditLog> for AuditLogResponse {
    fn from(entry: PermissionAuditLog) -> Self {
        Self {
            id: entry.id,
            timestamp: entry.timestamp,
            sequence: entry.sequence,
            actor_id: entry.actor_id,
            actor_display: entry.actor_display,
            action: entry.action,
            target_type: entry.target_type,
            target_id: entry.target_id,
            page_id: entry.page_id,
            old_access_level: entry.old_access_level,
            new_access_level: entry.new_access_level,
        }
    }
}
