//! Permission management: role and user permission records, their audit
//! trail, and effective-permission lookups for a user.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use validator::Validate;

use super::clock::Clock;
use super::error::ClubError;
use super::identity::{require_actor, Actor, IdentityProvider};
use super::metrics::record_permission_change;
use super::permission_resolver::{
    resolve_all_pages, resolve_effective_permission, resolve_for_page_key,
};
use super::store::{
    collections, get_record, query_records, query_records_sorted, to_record, DocumentStore,
    FieldFilter, SortKey, WriteOp,
};
use crate::models::{
    AccessLevel, AuditAction, AuditTarget, EffectivePermission, PageId, PermissionAuditLog, Role,
    RolePermission, SetRolePermissionRequest, SetUserPermissionRequest, UserPermission,
};

#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
}

impl PermissionService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            identity,
            clock,
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn list_role_permissions(
        &self,
        role: Option<Role>,
    ) -> Result<Vec<RolePermission>, ClubError> {
        let filters: Vec<FieldFilter> = role
            .map(|r| vec![FieldFilter::eq("role_id", r.as_str())])
            .unwrap_or_default();
        let mut perms: Vec<RolePermission> = query_records(
            self.store.as_ref(),
            collections::ROLE_PERMISSIONS,
            &filters,
        )
        .await?;
        perms.sort_by(|a, b| (a.role_id, a.page_id).cmp(&(b.role_id, b.page_id)));
        Ok(perms)
    }

    pub async fn list_user_permissions(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserPermission>, ClubError> {
        let mut perms: Vec<UserPermission> = query_records(
            self.store.as_ref(),
            collections::USER_PERMISSIONS,
            &[FieldFilter::eq("user_id", user_id)],
        )
        .await?;
        perms.sort_by_key(|p| p.page_id);
        Ok(perms)
    }

    /// Most recent audit entries first.
    pub async fn audit_log(&self, limit: usize) -> Result<Vec<PermissionAuditLog>, ClubError> {
        query_records_sorted(
            self.store.as_ref(),
            collections::PERMISSION_AUDIT_LOG,
            &[],
            &[SortKey::desc("timestamp"), SortKey::desc("sequence")],
            Some(limit),
        )
        .await
    }

    /// Sequence for a new audit entry: the change time in microseconds, or
    /// one past the latest stored sequence when that is not already later.
    async fn next_audit_sequence(&self, now: DateTime<Utc>) -> Result<i64, ClubError> {
        let latest: Vec<PermissionAuditLog> = query_records_sorted(
            self.store.as_ref(),
            collections::PERMISSION_AUDIT_LOG,
            &[],
            &[SortKey::desc("sequence")],
            Some(1),
        )
        .await?;
        let floor = latest
            .first()
            .map_or(i64::MIN, |entry| entry.sequence.saturating_add(1));
        Ok(now.timestamp_micros().max(floor))
    }

    async fn roles_of(&self, user_id: &str) -> Result<BTreeSet<Role>, ClubError> {
        self.identity
            .roles_of(user_id)
            .await?
            .ok_or_else(|| ClubError::NotFound(format!("User not found: {}", user_id)))
    }

    /// Raw resolution for `page_key`; apply `level_or_default` for the page default.
    #[tracing::instrument(skip(self))]
    pub async fn effective_permission(
        &self,
        user_id: &str,
        page_key: &str,
    ) -> Result<EffectivePermission, ClubError> {
        let roles = self.roles_of(user_id).await?;
        let role_perms = self.list_role_permissions(None).await?;
        let user_perms = self.list_user_permissions(user_id).await?;
        resolve_for_page_key(page_key, &roles, &role_perms, &user_perms)
    }

    /// Resolution for every page.
    #[tracing::instrument(skip(self))]
    pub async fn effective_permissions(
        &self,
        user_id: &str,
    ) -> Result<Vec<EffectivePermission>, ClubError> {
        let roles = self.roles_of(user_id).await?;
        let role_perms = self.list_role_permissions(None).await?;
        let user_perms = self.list_user_permissions(user_id).await?;
        Ok(resolve_all_pages(&roles, &role_perms, &user_perms))
    }

    /// Fails with `PermissionDenied` unless the user's level on `page`,
    /// after the page default, reaches `required`.
    pub async fn check_access(
        &self,
        user_id: &str,
        page: PageId,
        required: AccessLevel,
    ) -> Result<AccessLevel, ClubError> {
        let level = self
            .effective_permission(user_id, page.as_str())
            .await?
            .level_or_default();
        if level.allows(required) {
            Ok(level)
        } else {
            Err(ClubError::PermissionDenied(format!(
                "user {} has {} access to {}, {} required",
                user_id, level, page, required
            )))
        }
    }

    async fn role_permissions_for_page(
        &self,
        page: PageId,
    ) -> Result<Vec<RolePermission>, ClubError> {
        query_records(
            self.store.as_ref(),
            collections::ROLE_PERMISSIONS,
            &[FieldFilter::eq("page_id", page.as_str())],
        )
        .await
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    #[tracing::instrument(skip(self, actor), fields(actor = ?actor.map(|a| &a.user_id)))]
    pub async fn set_role_permission(
        &self,
        actor: Option<&Actor>,
        request: &SetRolePermissionRequest,
    ) -> Result<RolePermission, ClubError> {
        let actor = require_actor(actor)?;
        request.validate()?;
        let role: Role = request.role_id.parse()?;
        let page: PageId = request.page_id.parse()?;
        let now = self.clock.now();

        let id = RolePermission::record_id(role, page);
        let existing: Option<RolePermission> =
            get_record(self.store.as_ref(), collections::ROLE_PERMISSIONS, &id).await?;

        let record = match &existing {
            Some(prev) => RolePermission {
                access_level: request.access_level,
                updated_by: actor.user_id.clone(),
                updated_at: now,
                ..prev.clone()
            },
            None => RolePermission::new(role, page, request.access_level, &actor.user_id, now),
        };

        if page == PageId::UserManagement {
            let mut prospective: Vec<RolePermission> = self
                .role_permissions_for_page(page)
                .await?
                .into_iter()
                .filter(|p| p.id != id)
                .collect();
            prospective.push(record.clone());
            let own = self.list_user_permissions(&actor.user_id).await?;
            self.ensure_no_self_lockout(actor, &prospective, &own).await?;
        }

        let action = if existing.is_some() {
            AuditAction::Update
        } else {
            AuditAction::Create
        };
        let audit = PermissionAuditLog::new(
            now,
            &actor.user_id,
            &actor.display,
            action,
            AuditTarget::Role,
            role.as_str(),
            page,
            existing.as_ref().map(|p| p.access_level),
            request.access_level,
        )
        .with_sequence(self.next_audit_sequence(now).await?);

        self.store
            .apply_batch(vec![
                WriteOp::set(collections::ROLE_PERMISSIONS, &id, to_record(&record)?),
                WriteOp::set(
                    collections::PERMISSION_AUDIT_LOG,
                    &audit.id,
                    to_record(&audit)?,
                ),
            ])
            .await?;

        record_permission_change(AuditTarget::Role.as_str(), action.as_str());
        tracing::info!(
            role = %role,
            page = %page,
            level = %request.access_level,
            action = action.as_str(),
            "Role permission saved"
        );
        Ok(record)
    }

    #[tracing::instrument(skip(self, actor), fields(actor = ?actor.map(|a| &a.user_id)))]
    pub async fn delete_role_permission(
        &self,
        actor: Option<&Actor>,
        role_id: &str,
        page_id: &str,
    ) -> Result<(), ClubError> {
        let actor = require_actor(actor)?;
        let role: Role = role_id.parse()?;
        let page: PageId = page_id.parse()?;
        let now = self.clock.now();

        let id = RolePermission::record_id(role, page);
        let existing: RolePermission =
            get_record(self.store.as_ref(), collections::ROLE_PERMISSIONS, &id)
                .await?
                .ok_or_else(|| {
                    ClubError::NotFound(format!("Role permission not found: {}", id))
                })?;

        if page == PageId::UserManagement {
            let prospective: Vec<RolePermission> = self
                .role_permissions_for_page(page)
                .await?
                .into_iter()
                .filter(|p| p.id != id)
                .collect();
            let own = self.list_user_permissions(&actor.user_id).await?;
            self.ensure_no_self_lockout(actor, &prospective, &own).await?;
        }

        let audit = PermissionAuditLog::new(
            now,
            &actor.user_id,
            &actor.display,
            AuditAction::Delete,
            AuditTarget::Role,
            role.as_str(),
            page,
            Some(existing.access_level),
            AccessLevel::None,
        )
        .with_sequence(self.next_audit_sequence(now).await?);

        self.store
            .apply_batch(vec![
                WriteOp::delete(collections::ROLE_PERMISSIONS, &id),
                WriteOp::set(
                    collections::PERMISSION_AUDIT_LOG,
                    &audit.id,
                    to_record(&audit)?,
                ),
            ])
            .await?;

        record_permission_change(AuditTarget::Role.as_str(), AuditAction::Delete.as_str());
        tracing::info!(role = %role, page = %page, "Role permission deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self, actor), fields(actor = ?actor.map(|a| &a.user_id)))]
    pub async fn set_user_permission(
        &self,
        actor: Option<&Actor>,
        request: &SetUserPermissionRequest,
    ) -> Result<UserPermission, ClubError> {
        let actor = require_actor(actor)?;
        request.validate()?;
        let page: PageId = request.page_id.parse()?;
        // Target must be a known user.
        self.roles_of(&request.user_id).await?;
        let now = self.clock.now();

        let id = UserPermission::record_id(&request.user_id, page);
        let existing: Option<UserPermission> =
            get_record(self.store.as_ref(), collections::USER_PERMISSIONS, &id).await?;

        let record = match &existing {
            Some(prev) => UserPermission {
                access_level: request.access_level,
                overrides_role: request.overrides_role,
                updated_by: actor.user_id.clone(),
                updated_at: now,
                ..prev.clone()
            },
            None => UserPermission::new(
                &request.user_id,
                page,
                request.access_level,
                request.overrides_role,
                &actor.user_id,
                now,
            ),
        };

        if page == PageId::UserManagement && request.user_id == actor.user_id {
            let role_perms = self.role_permissions_for_page(page).await?;
            let mut own: Vec<UserPermission> = self
                .list_user_permissions(&actor.user_id)
                .await?
                .into_iter()
                .filter(|p| p.id != id)
                .collect();
            own.push(record.clone());
            self.ensure_no_self_lockout(actor, &role_perms, &own).await?;
        }

        let action = if existing.is_some() {
            AuditAction::Update
        } else {
            AuditAction::Create
        };
        let audit = PermissionAuditLog::new(
            now,
            &actor.user_id,
            &actor.display,
            action,
            AuditTarget::User,
            &request.user_id,
            page,
            existing.as_ref().map(|p| p.access_level),
            request.access_level,
        )
        .with_sequence(self.next_audit_sequence(now).await?);

        self.store
            .apply_batch(vec![
                WriteOp::set(collections::USER_PERMISSIONS, &id, to_record(&record)?),
                WriteOp::set(
                    collections::PERMISSION_AUDIT_LOG,
                    &audit.id,
                    to_record(&audit)?,
                ),
            ])
            .await?;

        record_permission_change(AuditTarget::User.as_str(), action.as_str());
        tracing::info!(
            user_id = %request.user_id,
            page = %page,
            level = %request.access_level,
            overrides_role = request.overrides_role,
            action = action.as_str(),
            "User permission saved"
        );
        Ok(record)
    }

    #[tracing::instrument(skip(self, actor), fields(actor = ?actor.map(|a| &a.user_id)))]
    pub async fn delete_user_permission(
        &self,
        actor: Option<&Actor>,
        user_id: &str,
        page_id: &str,
    ) -> Result<(), ClubError> {
        let actor = require_actor(actor)?;
        let page: PageId = page_id.parse()?;
        let now = self.clock.now();

        let id = UserPermission::record_id(user_id, page);
        let existing: UserPermission =
            get_record(self.store.as_ref(), collections::USER_PERMISSIONS, &id)
                .await?
                .ok_or_else(|| {
                    ClubError::NotFound(format!("User permission not found: {}", id))
                })?;

        if page == PageId::UserManagement && user_id == actor.user_id {
            let role_perms = self.role_permissions_for_page(page).await?;
            let own: Vec<UserPermission> = self
                .list_user_permissions(&actor.user_id)
                .await?
                .into_iter()
                .filter(|p| p.id != id)
                .collect();
            self.ensure_no_self_lockout(actor, &role_perms, &own).await?;
        }

        let audit = PermissionAuditLog::new(
            now,
            &actor.user_id,
            &actor.display,
            AuditAction::Delete,
            AuditTarget::User,
            user_id,
            page,
            Some(existing.access_level),
            AccessLevel::None,
        )
        .with_sequence(self.next_audit_sequence(now).await?);

        self.store
            .apply_batch(vec![
                WriteOp::delete(collections::USER_PERMISSIONS, &id),
                WriteOp::set(
                    collections::PERMISSION_AUDIT_LOG,
                    &audit.id,
                    to_record(&audit)?,
                ),
            ])
            .await?;

        record_permission_change(AuditTarget::User.as_str(), AuditAction::Delete.as_str());
        tracing::info!(user_id = %user_id, page = %page, "User permission deleted");
        Ok(())
    }

    /// Rejects a change that would take the acting user's user-management
    /// access from some level down to `None`. Inputs are the permission sets
    /// as they would be after the change.
    async fn ensure_no_self_lockout(
        &self,
        actor: &Actor,
        role_permissions: &[RolePermission],
        own_permissions: &[UserPermission],
    ) -> Result<(), ClubError> {
        let roles = self
            .identity
            .roles_of(&actor.user_id)
            .await?
            .unwrap_or_default();

        let current = resolve_effective_permission(
            PageId::UserManagement,
            &roles,
            &self.role_permissions_for_page(PageId::UserManagement).await?,
            &self.list_user_permissions(&actor.user_id).await?,
        )
        .level_or_default();
        let after = resolve_effective_permission(
            PageId::UserManagement,
            &roles,
            role_permissions,
            own_permissions,
        )
        .level_or_default();

        if current != AccessLevel::None && after == AccessLevel::None {
            tracing::warn!(
                actor = %actor.user_id,
                from = %current,
                "Rejected permission change that would remove own user-management access"
            );
            return Err(ClubError::PermissionDenied(format!(
                "user {} cannot remove their own {} access",
                actor.user_id,
                PageId::UserManagement
            )));
        }
        Ok(())
    }
}
