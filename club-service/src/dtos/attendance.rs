use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

use crate::models::{AttendanceMark, AttendanceRecord, AttendanceStatus, SessionMark};

#[derive(Debug, Serialize)]
pub struct AttendanceRecordResponse {
    pub id: String,
    pub session_id: String,
    pub group_id: String,
    pub member_id: String,
    pub member_name: String,
    pub status: AttendanceStatus,
    pub counts_as_attended: bool,
    pub note: Option<String>,
    pub arrival_time: Option<NaiveTime>,
    pub departure_time: Option<NaiveTime>,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
}

impl From<AttendanceRecord> for AttendanceRecordResponse {
    fn from(record: AttendanceRecord) -> Self {
        Self {
            id: record.id,
            session_id: record.session_id,
            group_id: record.group_id,
            member_id: record.member_id,
            member_name: record.member_name,
            status: record.status,
            counts_as_attended: record.status.counts_as_attended(),
            note: record.note,
            arrival_time: record.arrival_time,
            departure_time: record.departure_time,
            recorded_by: record.recorded_by,
            recorded_at: record.recorded_at,
        }
    }
}

/// One cell of a member's attendance history. `status` is what statistics
/// count; `mark` and `label` keep "not recorded" apart from `unknown`.
#[derive(Debug, Serialize)]
pub struct SessionMarkResponse {
    pub session_id: String,
    pub date: DateTime<Utc>,
    pub mark: AttendanceMark,
    pub label: &'static str,
    pub status: AttendanceStatus,
    pub counts_as_attended: bool,
}

impl From<SessionMark> for SessionMarkResponse {
    fn from(mark: SessionMark) -> Self {
        let status = mark.mark.effective_status();
        Self {
            session_id: mark.session_id,
            date: mark.date,
            mark: mark.mark,
            label: mark.mark.label(),
            status,
            counts_as_attended: status.counts_as_attended(),
        }
    }
}
