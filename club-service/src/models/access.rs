//! Access levels, application pages and club roles.
//!
//! `PageId` and `Role` are closed sets. Display metadata for pages lives in a
//! separate lookup table so the enums stay free of presentation concerns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::services::error::ClubError;

/// Access to one page, ordered `None < Read < ReadWrite < Full`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    None,
    Read,
    ReadWrite,
    Full,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 4] = [
        AccessLevel::None,
        AccessLevel::Read,
        AccessLevel::ReadWrite,
        AccessLevel::Full,
    ];

    /// Highest level of the iterator; `None` for an empty one.
    pub fn highest<I>(levels: I) -> AccessLevel
    where
        I: IntoIterator<Item = AccessLevel>,
    {
        levels.into_iter().max().unwrap_or(AccessLevel::None)
    }

    /// True when this level grants at least `required`.
    pub fn allows(self, required: AccessLevel) -> bool {
        self >= required
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::None => "none",
            AccessLevel::Read => "read",
            AccessLevel::ReadWrite => "read_write",
            AccessLevel::Full => "full",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| ClubError::InvalidArgument(format!("Unknown access level: {}", s)))
    }
}

/// Application modules that carry their own access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageId {
    Dashboard,
    UserManagement,
    Members,
    AccessDashboard,
    Zones,
    Chips,
    ExternalPersons,
    TrainingGroups,
    TrainingPlans,
    AttendanceStats,
    MemberDashboard,
    Permissions,
}

impl PageId {
    pub const ALL: [PageId; 12] = [
        PageId::Dashboard,
        PageId::UserManagement,
        PageId::Members,
        PageId::AccessDashboard,
        PageId::Zones,
        PageId::Chips,
        PageId::ExternalPersons,
        PageId::TrainingGroups,
        PageId::TrainingPlans,
        PageId::AttendanceStats,
        PageId::MemberDashboard,
        PageId::Permissions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PageId::Dashboard => "dashboard",
            PageId::UserManagement => "user-management",
            PageId::Members => "members",
            PageId::AccessDashboard => "access-dashboard",
            PageId::Zones => "zones",
            PageId::Chips => "chips",
            PageId::ExternalPersons => "external-persons",
            PageId::TrainingGroups => "training-groups",
            PageId::TrainingPlans => "training-plans",
            PageId::AttendanceStats => "attendance-stats",
            PageId::MemberDashboard => "member-dashboard",
            PageId::Permissions => "permissions",
        }
    }

    /// Static metadata for this page.
    pub fn metadata(self) -> &'static PageMetadata {
        // PAGE_METADATA is declared in variant order.
        &PAGE_METADATA[self as usize]
    }

    /// Level applied by callers when neither a role nor a user permission exists.
    pub fn default_access_level(self) -> AccessLevel {
        self.metadata().default_access_level
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageId {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageId::ALL
            .into_iter()
            .find(|page| page.as_str() == s)
            .ok_or_else(|| ClubError::InvalidArgument(format!("Unknown page id: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageCategory {
    System,
    Access,
    Training,
    Member,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMetadata {
    pub page: PageId,
    pub name: &'static str,
    pub description: &'static str,
    pub path: &'static str,
    pub category: PageCategory,
    pub default_access_level: AccessLevel,
}

pub static PAGE_METADATA: [PageMetadata; 12] = [
    PageMetadata {
        page: PageId::Dashboard,
        name: "Dashboard",
        description: "Club overview and quick links",
        path: "/",
        category: PageCategory::System,
        default_access_level: AccessLevel::Read,
    },
    PageMetadata {
        page: PageId::UserManagement,
        name: "User Management",
        description: "Manage application users and their roles",
        path: "/users",
        category: PageCategory::System,
        default_access_level: AccessLevel::None,
    },
    PageMetadata {
        page: PageId::Members,
        name: "Members",
        description: "Club member directory",
        path: "/members",
        category: PageCategory::Member,
        default_access_level: AccessLevel::None,
    },
    PageMetadata {
        page: PageId::AccessDashboard,
        name: "Access Dashboard",
        description: "Door access events and live occupancy",
        path: "/access",
        category: PageCategory::Access,
        default_access_level: AccessLevel::None,
    },
    PageMetadata {
        page: PageId::Zones,
        name: "Zones",
        description: "Physical access zones and their doors",
        path: "/access/zones",
        category: PageCategory::Access,
        default_access_level: AccessLevel::None,
    },
    PageMetadata {
        page: PageId::Chips,
        name: "Chips",
        description: "NFC/RFID chips issued to members",
        path: "/access/chips",
        category: PageCategory::Access,
        default_access_level: AccessLevel::None,
    },
    PageMetadata {
        page: PageId::ExternalPersons,
        name: "External Persons",
        description: "Non-member persons with access rights",
        path: "/access/external-persons",
        category: PageCategory::Access,
        default_access_level: AccessLevel::None,
    },
    PageMetadata {
        page: PageId::TrainingGroups,
        name: "Training Groups",
        description: "Training groups, trainers and rosters",
        path: "/training/groups",
        category: PageCategory::Training,
        default_access_level: AccessLevel::None,
    },
    PageMetadata {
        page: PageId::TrainingPlans,
        name: "Training Plans",
        description: "Scheduled training sessions and attendance recording",
        path: "/training/plans",
        category: PageCategory::Training,
        default_access_level: AccessLevel::None,
    },
    PageMetadata {
        page: PageId::AttendanceStats,
        name: "Attendance Statistics",
        description: "Attendance rates per group and member",
        path: "/training/stats",
        category: PageCategory::Training,
        default_access_level: AccessLevel::None,
    },
    PageMetadata {
        page: PageId::MemberDashboard,
        name: "My Dashboard",
        description: "Personal trainings and attendance",
        path: "/me",
        category: PageCategory::Member,
        default_access_level: AccessLevel::Read,
    },
    PageMetadata {
        page: PageId::Permissions,
        name: "Permissions",
        description: "Role and user page permissions",
        path: "/permissions",
        category: PageCategory::System,
        default_access_level: AccessLevel::None,
    },
];

/// Club roles a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Trainer,
    Member,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Trainer, Role::Member];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Trainer => "trainer",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ClubError::InvalidArgument(format!("Unknown role id: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_total_order() {
        for a in AccessLevel::ALL {
            for b in AccessLevel::ALL {
                let relations = [a < b, a == b, a > b];
                assert_eq!(relations.iter().filter(|r| **r).count(), 1, "{a} vs {b}");
            }
        }
        assert!(AccessLevel::None < AccessLevel::Read);
        assert!(AccessLevel::Read < AccessLevel::ReadWrite);
        assert!(AccessLevel::ReadWrite < AccessLevel::Full);
    }

    #[test]
    fn test_highest_level() {
        assert_eq!(
            AccessLevel::highest([AccessLevel::Read, AccessLevel::Full, AccessLevel::None]),
            AccessLevel::Full
        );
        assert_eq!(
            AccessLevel::highest([AccessLevel::ReadWrite, AccessLevel::Read]),
            AccessLevel::ReadWrite
        );
        assert_eq!(AccessLevel::highest([]), AccessLevel::None);
    }

    #[test]
    fn test_allows() {
        assert!(AccessLevel::Full.allows(AccessLevel::ReadWrite));
        assert!(AccessLevel::Read.allows(AccessLevel::Read));
        assert!(!AccessLevel::Read.allows(AccessLevel::ReadWrite));
        assert!(AccessLevel::None.allows(AccessLevel::None));
    }

    #[test]
    fn test_page_keys_round_trip_through_metadata() {
        for page in PageId::ALL {
            assert_eq!(page.metadata().page, page);
            assert_eq!(page.as_str().parse::<PageId>().unwrap(), page);
        }
    }

    #[test]
    fn test_unknown_keys_are_invalid_arguments() {
        assert!(matches!(
            "billing".parse::<PageId>(),
            Err(ClubError::InvalidArgument(_))
        ));
        assert!(matches!(
            "superuser".parse::<Role>(),
            Err(ClubError::InvalidArgument(_))
        ));
        assert!(matches!(
            "write".parse::<AccessLevel>(),
            Err(ClubError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_default_access_levels() {
        assert_eq!(PageId::Dashboard.default_access_level(), AccessLevel::Read);
        assert_eq!(PageId::MemberDashboard.default_access_level(), AccessLevel::Read);
        assert_eq!(PageId::UserManagement.default_access_level(), AccessLevel::None);
        assert_eq!(PageId::Permissions.default_access_level(), AccessLevel::None);
    }

    #[test]
    fn test_serde_keys_match_display() {
        let json = serde_json::to_string(&PageId::UserManagement).unwrap();
        assert_eq!(json, "\"user-management\"");
        let json = serde_json::to_string(&AccessLevel::ReadWrite).unwrap();
        assert_eq!(json, "\"read_write\"");
    }
}
