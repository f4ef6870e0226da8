pub mod access;
pub mod attendance;
pub mod club;
pub mod permission;

pub use access::{AccessLevel, PageCategory, PageId, PageMetadata, Role, PAGE_METADATA};
pub use attendance::{
    AttendanceEntry, AttendanceMark, AttendanceRecord, AttendanceStatus, GroupAttendanceStats,
    MemberAttendanceStats, MemberGroupStats, SessionMark,
};
pub use club::{Member, TrainingGroup, TrainingSession};
pub use permission::{
    AuditAction, AuditTarget, EffectivePermission, PermissionAuditLog, PermissionSource,
    RolePermission, SetRolePermissionRequest, SetUserPermissionRequest, UserPermission, UserRoles,
};
