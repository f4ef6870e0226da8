#![allow(dead_code)]

use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use club_service::config::{ClubConfig, MongoConfig, ObservabilityConfig, RosterCacheConfig};
use club_service::models::{
    AccessLevel, Member, Role, SetRolePermissionRequest, SetUserPermissionRequest,
    TrainingGroup, TrainingSession,
};
use club_service::services::store::{collections, set_record};
use club_service::services::{
    Actor, AttendanceService, FixedClock, InMemoryStore, PermissionService,
    StaticIdentityProvider,
};
use club_service::{router, AppState};
use service_core::config::Config as CoreConfig;
use std::sync::Arc;

pub const ADMIN: &str = "admin-1";
pub const COACH: &str = "coach-1";
pub const MEMBER: &str = "member-1";

pub fn test_config() -> ClubConfig {
    ClubConfig {
        common: CoreConfig {
            port: 0,
            log_level: "debug".to_string(),
        },
        mongodb: MongoConfig {
            uri: std::env::var("TEST_MONGODB_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string()),
            database: format!("club_test_{}", uuid::Uuid::new_v4().simple()),
        },
        roster_cache: RosterCacheConfig { ttl_seconds: 300 },
        observability: ObservabilityConfig {
            log_level: "debug".to_string(),
            otlp_endpoint: None,
        },
    }
}

/// Thursday 2025-03-20, 08:00 UTC.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 20, 8, 0, 0).unwrap()
}

pub fn admin() -> Actor {
    Actor::new(ADMIN, "admin@club.test")
}

pub fn coach() -> Actor {
    Actor::new(COACH, "coach@club.test")
}

/// Services over an in-memory store, a fixed clock and a static role table
/// with one admin, one trainer and one member.
pub struct TestContext {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub identity: Arc<StaticIdentityProvider>,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(start_time()));
        let identity = Arc::new(
            StaticIdentityProvider::new()
                .with_user(ADMIN, &[Role::Admin])
                .with_user(COACH, &[Role::Trainer, Role::Member])
                .with_user(MEMBER, &[Role::Member]),
        );
        let state = AppState::new(
            test_config(),
            store.clone(),
            identity.clone(),
            clock.clone(),
        );
        Self {
            store,
            clock,
            identity,
            state,
        }
    }

    pub fn permissions(&self) -> &PermissionService {
        &self.state.permissions
    }

    pub fn attendance(&self) -> &AttendanceService {
        &self.state.attendance
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub fn audit_count(&self) -> usize {
        self.store.count(collections::PERMISSION_AUDIT_LOG)
    }

    pub async fn grant_role(&self, role: Role, page: &str, level: AccessLevel) {
        self.permissions()
            .set_role_permission(
                Some(&admin()),
                &SetRolePermissionRequest {
                    role_id: role.as_str().to_string(),
                    page_id: page.to_string(),
                    access_level: level,
                },
            )
            .await
            .expect("Failed to grant role permission");
    }

    pub async fn grant_user(&self, user_id: &str, page: &str, level: AccessLevel, overrides: bool) {
        self.permissions()
            .set_user_permission(
                Some(&admin()),
                &SetUserPermissionRequest {
                    user_id: user_id.to_string(),
                    page_id: page.to_string(),
                    access_level: level,
                    overrides_role: overrides,
                },
            )
            .await
            .expect("Failed to grant user permission");
    }

    pub async fn seed_member(&self, id: &str, first: &str, last: &str) {
        set_record(
            self.store.as_ref(),
            collections::MEMBERS,
            id,
            &Member::new(id, first, last),
        )
        .await
        .expect("Failed to seed member");
    }

    pub async fn seed_group(&self, id: &str, name: &str, member_ids: &[&str]) {
        let group = TrainingGroup {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            trainer_ids: vec![COACH.to_string()],
            member_ids: member_ids.iter().map(|m| m.to_string()).collect(),
        };
        set_record(self.store.as_ref(), collections::TRAINING_GROUPS, id, &group)
            .await
            .expect("Failed to seed group");
    }

    pub async fn seed_session(&self, id: &str, group_id: &str, date: DateTime<Utc>) {
        let session = TrainingSession::new(id, group_id, date);
        set_record(
            self.store.as_ref(),
            collections::TRAINING_SESSIONS,
            id,
            &session,
        )
        .await
        .expect("Failed to seed session");
    }
}
