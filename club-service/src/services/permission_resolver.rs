//! Effective-permission resolution.
//!
//! Pure functions over already-fetched permission records. The result is the
//! raw resolution: when nothing is configured for a page the level is `None`
//! and callers apply the page default through
//! [`EffectivePermission::level_or_default`].

use std::collections::BTreeSet;

use super::error::ClubError;
use crate::models::{
    AccessLevel, EffectivePermission, PageId, PermissionSource, Role, RolePermission,
    UserPermission,
};

/// Resolve one user's access to `page`.
///
/// `user_permissions` must belong to the user being resolved; at most one of
/// them targets `page`.
pub fn resolve_effective_permission(
    page: PageId,
    user_roles: &BTreeSet<Role>,
    role_permissions: &[RolePermission],
    user_permissions: &[UserPermission],
) -> EffectivePermission {
    let matched: Vec<RolePermission> = role_permissions
        .iter()
        .filter(|p| p.page_id == page && user_roles.contains(&p.role_id))
        .cloned()
        .collect();

    let user_permission = user_permissions.iter().find(|p| p.page_id == page).cloned();

    if let Some(up) = user_permission.as_ref().filter(|p| p.overrides_role) {
        return EffectivePermission {
            page_id: page,
            access_level: up.access_level,
            source: PermissionSource::User,
            role_permissions: matched,
            user_permission,
        };
    }

    let highest_role_level = AccessLevel::highest(matched.iter().map(|p| p.access_level));

    let (access_level, source) = match &user_permission {
        Some(up) => (
            up.access_level.max(highest_role_level),
            PermissionSource::Both,
        ),
        None => (highest_role_level, PermissionSource::Role),
    };

    EffectivePermission {
        page_id: page,
        access_level,
        source,
        role_permissions: matched,
        user_permission,
    }
}

/// Like [`resolve_effective_permission`] for an untyped page key. Unknown keys
/// are rejected rather than resolved to `None`.
pub fn resolve_for_page_key(
    page_key: &str,
    user_roles: &BTreeSet<Role>,
    role_permissions: &[RolePermission],
    user_permissions: &[UserPermission],
) -> Result<EffectivePermission, ClubError> {
    let page: PageId = page_key.parse()?;
    Ok(resolve_effective_permission(
        page,
        user_roles,
        role_permissions,
        user_permissions,
    ))
}

/// Resolution for every page, in `PageId::ALL` order.
pub fn resolve_all_pages(
    user_roles: &BTreeSet<Role>,
    role_permissions: &[RolePermission],
    user_permissions: &[UserPermission],
) -> Vec<EffectivePermission> {
    PageId::ALL
        .into_iter()
        .map(|page| {
            resolve_effective_permission(page, user_roles, role_permissions, user_permissions)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn role_perm(role: Role, page: PageId, level: AccessLevel) -> RolePermission {
        RolePermission::new(
            role,
            page,
            level,
            "admin-1",
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn user_perm(page: PageId, level: AccessLevel, overrides_role: bool) -> UserPermission {
        UserPermission::new(
            "u-1",
            page,
            level,
            overrides_role,
            "admin-1",
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn roles(list: &[Role]) -> BTreeSet<Role> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_no_permissions_resolves_to_none_from_roles() {
        let result =
            resolve_effective_permission(PageId::Members, &roles(&[Role::Member]), &[], &[]);
        assert_eq!(result.access_level, AccessLevel::None);
        assert_eq!(result.source, PermissionSource::Role);
        assert!(result.role_permissions.is_empty());
        assert!(result.user_permission.is_none());
    }

    #[test]
    fn test_highest_matching_role_wins() {
        let perms = vec![
            role_perm(Role::Member, PageId::Members, AccessLevel::Read),
            role_perm(Role::Trainer, PageId::Members, AccessLevel::ReadWrite),
            role_perm(Role::Admin, PageId::Members, AccessLevel::Full),
            role_perm(Role::Trainer, PageId::Zones, AccessLevel::Full),
        ];
        let result = resolve_effective_permission(
            PageId::Members,
            &roles(&[Role::Member, Role::Trainer]),
            &perms,
            &[],
        );
        assert_eq!(result.access_level, AccessLevel::ReadWrite);
        assert_eq!(result.source, PermissionSource::Role);
        assert_eq!(result.role_permissions.len(), 2);
    }

    #[test]
    fn test_override_beats_higher_role_level() {
        let perms = vec![role_perm(Role::Admin, PageId::Chips, AccessLevel::Full)];
        let users = vec![user_perm(PageId::Chips, AccessLevel::Read, true)];
        let result =
            resolve_effective_permission(PageId::Chips, &roles(&[Role::Admin]), &perms, &users);
        assert_eq!(result.access_level, AccessLevel::Read);
        assert_eq!(result.source, PermissionSource::User);
        assert_eq!(result.role_permissions.len(), 1);
    }

    #[test]
    fn test_override_can_revoke_to_none() {
        let perms = vec![role_perm(Role::Trainer, PageId::Zones, AccessLevel::ReadWrite)];
        let users = vec![user_perm(PageId::Zones, AccessLevel::None, true)];
        let result =
            resolve_effective_permission(PageId::Zones, &roles(&[Role::Trainer]), &perms, &users);
        assert_eq!(result.access_level, AccessLevel::None);
    }

    #[test]
    fn test_combination_takes_maximum() {
        let perms = vec![role_perm(Role::Trainer, PageId::TrainingPlans, AccessLevel::Read)];

        let higher_user = vec![user_perm(PageId::TrainingPlans, AccessLevel::Full, false)];
        let result = resolve_effective_permission(
            PageId::TrainingPlans,
            &roles(&[Role::Trainer]),
            &perms,
            &higher_user,
        );
        assert_eq!(result.access_level, AccessLevel::Full);
        assert_eq!(result.source, PermissionSource::Both);

        let lower_user = vec![user_perm(PageId::TrainingPlans, AccessLevel::None, false)];
        let result = resolve_effective_permission(
            PageId::TrainingPlans,
            &roles(&[Role::Trainer]),
            &perms,
            &lower_user,
        );
        assert_eq!(result.access_level, AccessLevel::Read);
        assert_eq!(result.source, PermissionSource::Both);
    }

    #[test]
    fn test_combination_matches_max_for_every_pair() {
        for role_level in AccessLevel::ALL {
            for user_level in AccessLevel::ALL {
                let perms = vec![role_perm(Role::Member, PageId::Dashboard, role_level)];
                let users = vec![user_perm(PageId::Dashboard, user_level, false)];
                let result = resolve_effective_permission(
                    PageId::Dashboard,
                    &roles(&[Role::Member]),
                    &perms,
                    &users,
                );
                assert_eq!(result.access_level, role_level.max(user_level));
            }
        }
    }

    #[test]
    fn test_roles_the_user_lacks_are_ignored() {
        let perms = vec![role_perm(Role::Admin, PageId::Permissions, AccessLevel::Full)];
        let result = resolve_effective_permission(
            PageId::Permissions,
            &roles(&[Role::Member]),
            &perms,
            &[],
        );
        assert_eq!(result.access_level, AccessLevel::None);
        assert!(result.is_unconfigured());
    }

    #[test]
    fn test_page_default_is_not_applied_by_resolver() {
        let result =
            resolve_effective_permission(PageId::Dashboard, &roles(&[Role::Member]), &[], &[]);
        assert_eq!(result.access_level, AccessLevel::None);
        assert_eq!(result.level_or_default(), AccessLevel::Read);
    }

    #[test]
    fn test_unknown_page_key_is_invalid_argument() {
        let result = resolve_for_page_key("finance", &roles(&[Role::Admin]), &[], &[]);
        assert!(matches!(result, Err(ClubError::InvalidArgument(_))));

        let result = resolve_for_page_key("zones", &roles(&[Role::Admin]), &[], &[]).unwrap();
        assert_eq!(result.page_id, PageId::Zones);
    }

    #[test]
    fn test_resolve_all_pages_covers_every_page() {
        let perms = vec![role_perm(Role::Admin, PageId::Zones, AccessLevel::Full)];
        let all = resolve_all_pages(&roles(&[Role::Admin]), &perms, &[]);
        assert_eq!(all.len(), PageId::ALL.len());
        let zones = all.iter().find(|p| p.page_id == PageId::Zones).unwrap();
        assert_eq!(zones.access_level, AccessLevel::Full);
    }
}
