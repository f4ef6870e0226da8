use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    LeftEarly,
    Excused,
    Unexcused,
    Unknown,
}

impl AttendanceStatus {
    /// Present, late and left-early all count as having attended.
    pub fn counts_as_attended(self) -> bool {
        matches!(
            self,
            AttendanceStatus::Present | AttendanceStatus::Late | AttendanceStatus::LeftEarly
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::LeftEarly => "left_early",
            AttendanceStatus::Excused => "excused",
            AttendanceStatus::Unexcused => "unexcused",
            AttendanceStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attendance of one member at one training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub session_id: String,
    pub group_id: String,
    pub member_id: String,
    pub member_name: String,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<NaiveTime>,
    pub recorded_by: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub recorded_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Document id; one record per (session, member).
    pub fn record_id(session_id: &str, member_id: &str) -> String {
        format!("{}:{}", session_id, member_id)
    }

    pub fn from_entry(
        session_id: &str,
        group_id: &str,
        entry: AttendanceEntry,
        recorded_by: &str,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::record_id(session_id, &entry.member_id),
            session_id: session_id.to_string(),
            group_id: group_id.to_string(),
            member_id: entry.member_id,
            member_name: entry.member_name,
            status: entry.status,
            note: entry.note,
            arrival_time: entry.arrival_time,
            departure_time: entry.departure_time,
            recorded_by: recorded_by.to_string(),
            recorded_at,
        }
    }
}

/// One line of a bulk attendance submission.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AttendanceEntry {
    #[validate(length(min = 1, max = 128))]
    pub member_id: String,
    #[validate(length(max = 256))]
    #[serde(default)]
    pub member_name: String,
    pub status: AttendanceStatus,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub arrival_time: Option<NaiveTime>,
    #[serde(default)]
    pub departure_time: Option<NaiveTime>,
}

impl AttendanceEntry {
    pub fn new(
        member_id: impl Into<String>,
        member_name: impl Into<String>,
        status: AttendanceStatus,
    ) -> Self {
        Self {
            member_id: member_id.into(),
            member_name: member_name.into(),
            status,
            note: None,
            arrival_time: None,
            departure_time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberAttendanceStats {
    pub member_id: String,
    pub member_name: String,
    pub total_trainings: usize,
    pub present: usize,
    pub late: usize,
    pub left_early: usize,
    pub excused: usize,
    pub unexcused: usize,
    pub unknown: usize,
    /// Sessions whose status counts as attended.
    pub attended: usize,
    /// Percentage of eligible sessions attended (present, late or left early).
    pub attendance_rate: f64,
    /// Percentage of eligible sessions attended on time and in full.
    pub active_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAttendanceStats {
    pub group_id: String,
    pub group_name: String,
    pub total_trainings: usize,
    pub member_count: usize,
    pub average_attendance: f64,
    /// Sorted by attendance rate, highest first.
    pub members: Vec<MemberAttendanceStats>,
}

/// Member stats within one of the member's groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberGroupStats {
    pub group_id: String,
    pub group_name: String,
    pub stats: MemberAttendanceStats,
}

/// How a (session, member) cell is shown. Aggregation treats both
/// `NotRecorded` and `Recorded(Unknown)` as unknown; display keeps them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum AttendanceMark {
    NotRecorded,
    Recorded(AttendanceStatus),
}

impl AttendanceMark {
    /// Status used for statistics.
    pub fn effective_status(self) -> AttendanceStatus {
        match self {
            AttendanceMark::NotRecorded => AttendanceStatus::Unknown,
            AttendanceMark::Recorded(status) => status,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttendanceMark::NotRecorded => "not recorded",
            AttendanceMark::Recorded(AttendanceStatus::Present) => "present",
            AttendanceMark::Recorded(AttendanceStatus::Late) => "late",
            AttendanceMark::Recorded(AttendanceStatus::LeftEarly) => "left early",
            AttendanceMark::Recorded(AttendanceStatus::Excused) => "excused",
            AttendanceMark::Recorded(AttendanceStatus::Unexcused) => "unexcused",
            AttendanceMark::Recorded(AttendanceStatus::Unknown) => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMark {
    pub session_id: String,
    pub date: DateTime<Utc>,
    pub mark: AttendanceMark,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_as_attended() {
        assert!(AttendanceStatus::Present.counts_as_attended());
        assert!(AttendanceStatus::Late.counts_as_attended());
        assert!(AttendanceStatus::LeftEarly.counts_as_attended());
        assert!(!AttendanceStatus::Excused.counts_as_attended());
        assert!(!AttendanceStatus::Unexcused.counts_as_attended());
        assert!(!AttendanceStatus::Unknown.counts_as_attended());
    }

    #[test]
    fn test_marks_unify_for_stats_but_not_for_display() {
        let missing = AttendanceMark::NotRecorded;
        let unknown = AttendanceMark::Recorded(AttendanceStatus::Unknown);
        assert_eq!(missing.effective_status(), unknown.effective_status());
        assert_ne!(missing.label(), unknown.label());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&AttendanceStatus::LeftEarly).unwrap();
        assert_eq!(json, "\"left_early\"");
    }
}
