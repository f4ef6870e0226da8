pub mod attendance;
pub mod permissions;

pub use attendance::{AttendanceRecordResponse, SessionMarkResponse};
pub use permissions::{
    AuditLogResponse, EffectivePermissionResponse, RolePermissionResponse,
    UserPermissionResponse,
};
