//! Application startup and lifecycle management.

use axum::{
    middleware::from_fn,
    routing::{delete, get, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ClubConfig;
use crate::handlers::{attendance, health, permissions};
use crate::services::{
    AttendanceService, Clock, DocumentStore, IdentityProvider, MongoStore, PermissionService,
    RosterCache, StoreIdentityProvider, SystemClock,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ClubConfig,
    pub store: Arc<dyn DocumentStore>,
    pub permissions: PermissionService,
    pub attendance: AttendanceService,
}

impl AppState {
    pub fn new(
        config: ClubConfig,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let roster = RosterCache::new(store.clone(), clock.clone(), config.roster_cache.ttl());
        Self {
            permissions: PermissionService::new(store.clone(), identity, clock.clone()),
            attendance: AttendanceService::new(store.clone(), clock, roster),
            config,
            store,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_endpoint))
        .route("/pages", get(permissions::list_pages))
        .route(
            "/permissions/roles",
            get(permissions::list_role_permissions).put(permissions::set_role_permission),
        )
        .route(
            "/permissions/roles/:role_id/:page_id",
            delete(permissions::delete_role_permission),
        )
        .route("/permissions/users", put(permissions::set_user_permission))
        .route(
            "/permissions/users/:user_id",
            get(permissions::list_user_permissions),
        )
        .route(
            "/permissions/users/:user_id/:page_id",
            delete(permissions::delete_user_permission),
        )
        .route(
            "/permissions/users/:user_id/effective",
            get(permissions::effective_permissions),
        )
        .route(
            "/permissions/users/:user_id/effective/:page_id",
            get(permissions::effective_permission),
        )
        .route(
            "/permissions/users/:user_id/access/:page_id",
            get(permissions::check_access),
        )
        .route("/permissions/audit", get(permissions::audit_log))
        .route(
            "/sessions/:session_id/attendance",
            get(attendance::session_attendance).put(attendance::record_attendance),
        )
        .route("/groups/:group_id/stats", get(attendance::group_stats))
        .route(
            "/groups/:group_id/members/:member_id/stats",
            get(attendance::member_stats),
        )
        .route(
            "/groups/:group_id/members/:member_id/marks",
            get(attendance::member_marks),
        )
        .route(
            "/members/:member_id/attendance",
            get(attendance::member_overview),
        )
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application against MongoDB.
    pub async fn build(config: ClubConfig) -> Result<Self, AppError> {
        let store = MongoStore::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                AppError::from(e)
            })?;

        store.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            AppError::from(e)
        })?;

        let store: Arc<dyn DocumentStore> = Arc::new(store);
        let identity = Arc::new(StoreIdentityProvider::new(store.clone()));
        Self::build_with_store(config, store, identity, Arc::new(SystemClock)).await
    }

    /// Build the application over an already constructed store.
    pub async fn build_with_store(
        config: ClubConfig,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        // Port 0 binds a random port for testing.
        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Club service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state: AppState::new(config, store, identity, clock),
        })
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until the process receives Ctrl+C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.http_listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                e
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
