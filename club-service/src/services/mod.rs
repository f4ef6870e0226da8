pub mod attendance;
pub mod attendance_stats;
pub mod clock;
pub mod database;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod permission_resolver;
pub mod permissions;
pub mod roster_cache;
pub mod store;

pub use attendance::AttendanceService;
pub use attendance_stats::DateWindow;
pub use clock::{Clock, FixedClock, SystemClock};
pub use database::MongoStore;
pub use error::ClubError;
pub use identity::{Actor, IdentityProvider, StaticIdentityProvider, StoreIdentityProvider};
pub use permissions::PermissionService;
pub use roster_cache::RosterCache;
pub use store::{DocumentStore, InMemoryStore};
