//! Attendance recording and statistics endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use service_core::error::AppError;

use super::context::Caller;
use crate::dtos::{AttendanceRecordResponse, SessionMarkResponse};
use crate::models::{
    AttendanceEntry, GroupAttendanceStats, MemberAttendanceStats, MemberGroupStats,
};
use crate::services::DateWindow;
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkAttendanceRequest {
    pub group_id: String,
    #[serde(default)]
    pub entries: Vec<AttendanceEntry>,
}

/// `?start=2025-01-01T00:00:00Z&end=2025-03-31T23:59:59Z`, both optional.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl WindowQuery {
    fn window(&self) -> Result<DateWindow, AppError> {
        Ok(DateWindow::new(self.start, self.end)?)
    }
}

/// PUT /sessions/:session_id/attendance
///
/// Replaces every record of the session with the submitted list.
pub async fn record_attendance(
    State(state): State<AppState>,
    caller: Caller,
    Path(session_id): Path<String>,
    Json(request): Json<BulkAttendanceRequest>,
) -> Result<Json<Vec<AttendanceRecordResponse>>, AppError> {
    let records = state
        .attendance
        .record_bulk_attendance(
            caller.actor(),
            &session_id,
            &request.group_id,
            request.entries,
        )
        .await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// GET /sessions/:session_id/attendance
pub async fn session_attendance(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<AttendanceRecordResponse>>, AppError> {
    let records = state.attendance.session_attendance(&session_id).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// GET /groups/:group_id/stats
pub async fn group_stats(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<GroupAttendanceStats>, AppError> {
    let window = query.window()?;
    Ok(Json(state.attendance.group_stats(&group_id, &window).await?))
}

/// GET /groups/:group_id/members/:member_id/stats
pub async fn member_stats(
    State(state): State<AppState>,
    Path((group_id, member_id)): Path<(String, String)>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<MemberAttendanceStats>, AppError> {
    let window = query.window()?;
    Ok(Json(
        state
            .attendance
            .member_stats(&group_id, &member_id, &window)
            .await?,
    ))
}

/// GET /groups/:group_id/members/:member_id/marks
pub async fn member_marks(
    State(state): State<AppState>,
    Path((group_id, member_id)): Path<(String, String)>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<SessionMarkResponse>>, AppError> {
    let window = query.window()?;
    let marks = state
        .attendance
        .member_marks(&group_id, &member_id, &window)
        .await?;
    Ok(Json(marks.into_iter().map(Into::into).collect()))
}

/// GET /members/:member_id/attendance
pub async fn member_overview(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<MemberGroupStats>>, AppError> {
    let window = query.window()?;
    Ok(Json(
        state
            .attendance
            .member_overview(&member_id, &window)
            .await?,
    ))
}
