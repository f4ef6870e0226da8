//! Permission management endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use super::context::Caller;
use crate::dtos::{
    AuditLogResponse, EffectivePermissionResponse, RolePermissionResponse,
    UserPermissionResponse,
};
use crate::models::{
    AccessLevel, PageId, PageMetadata, Role, SetRolePermissionRequest, SetUserPermissionRequest,
    PAGE_METADATA,
};
use crate::startup::AppState;

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct RoleFilter {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub required: Option<AccessLevel>,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub user_id: String,
    pub page_id: PageId,
    pub access_level: AccessLevel,
}

/// GET /pages
pub async fn list_pages() -> Json<&'static [PageMetadata]> {
    Json(&PAGE_METADATA[..])
}

/// GET /permissions/roles?role=trainer
pub async fn list_role_permissions(
    State(state): State<AppState>,
    Query(filter): Query<RoleFilter>,
) -> Result<Json<Vec<RolePermissionResponse>>, AppError> {
    let role = filter
        .role
        .as_deref()
        .map(str::parse::<Role>)
        .transpose()?;
    let permissions = state.permissions.list_role_permissions(role).await?;
    Ok(Json(permissions.into_iter().map(Into::into).collect()))
}

/// PUT /permissions/roles
pub async fn set_role_permission(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<SetRolePermissionRequest>,
) -> Result<Json<RolePermissionResponse>, AppError> {
    let permission = state
        .permissions
        .set_role_permission(caller.actor(), &request)
        .await?;
    Ok(Json(permission.into()))
}

/// DELETE /permissions/roles/:role_id/:page_id
pub async fn delete_role_permission(
    State(state): State<AppState>,
    caller: Caller,
    Path((role_id, page_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .permissions
        .delete_role_permission(caller.actor(), &role_id, &page_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /permissions/users/:user_id
pub async fn list_user_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<UserPermissionResponse>>, AppError> {
    let permissions = state.permissions.list_user_permissions(&user_id).await?;
    Ok(Json(permissions.into_iter().map(Into::into).collect()))
}

/// PUT /permissions/users
pub async fn set_user_permission(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<SetUserPermissionRequest>,
) -> Result<Json<UserPermissionResponse>, AppError> {
    let permission = state
        .permissions
        .set_user_permission(caller.actor(), &request)
        .await?;
    Ok(Json(permission.into()))
}

/// DELETE /permissions/users/:user_id/:page_id
pub async fn delete_user_permission(
    State(state): State<AppState>,
    caller: Caller,
    Path((user_id, page_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .permissions
        .delete_user_permission(caller.actor(), &user_id, &page_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /permissions/users/:user_id/effective
pub async fn effective_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<EffectivePermissionResponse>>, AppError> {
    let effective = state.permissions.effective_permissions(&user_id).await?;
    Ok(Json(effective.into_iter().map(Into::into).collect()))
}

/// GET /permissions/users/:user_id/effective/:page_id
pub async fn effective_permission(
    State(state): State<AppState>,
    Path((user_id, page_id)): Path<(String, String)>,
) -> Result<Json<EffectivePermissionResponse>, AppError> {
    let effective = state
        .permissions
        .effective_permission(&user_id, &page_id)
        .await?;
    Ok(Json(effective.into()))
}

/// GET /permissions/users/:user_id/access/:page_id?required=read
///
/// 403 when the user's level, after the page default, is below `required`.
pub async fn check_access(
    State(state): State<AppState>,
    Path((user_id, page_id)): Path<(String, String)>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<AccessResponse>, AppError> {
    let page: PageId = page_id.parse()?;
    let required = query.required.unwrap_or(AccessLevel::Read);
    let access_level = state
        .permissions
        .check_access(&user_id, page, required)
        .await?;
    Ok(Json(AccessResponse {
        user_id,
        page_id: page,
        access_level,
    }))
}

/// GET /permissions/audit?limit=50
pub async fn audit_log(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogResponse>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    let entries = state.permissions.audit_log(limit).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
