//! Attendance statistics over a date window.
//!
//! Pure aggregation of sparse per-session records. Sessions after the end of
//! the `as_of` day never count; sessions earlier that day do. A session
//! without a record and a record with status `unknown` are counted alike.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::error::ClubError;
use crate::models::{
    AttendanceMark, AttendanceRecord, AttendanceStatus, GroupAttendanceStats,
    MemberAttendanceStats, SessionMark, TrainingGroup, TrainingSession,
};

/// Optional inclusive bounds on session dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl DateWindow {
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, ClubError> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ClubError::InvalidArgument(format!(
                    "date window starts after it ends ({} > {})",
                    s.to_rfc3339(),
                    e.to_rfc3339()
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

/// Last millisecond of the UTC day containing `at`.
pub fn end_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .map(|n| n.and_utc())
        .unwrap_or(at)
}

/// Sessions that count toward statistics: not cancelled, inside the window,
/// and not after today.
pub fn eligible_sessions<'a>(
    sessions: &'a [TrainingSession],
    window: &DateWindow,
    as_of: DateTime<Utc>,
) -> Vec<&'a TrainingSession> {
    let cutoff = end_of_day(as_of);
    sessions
        .iter()
        .filter(|s| !s.cancelled && s.date <= cutoff && window.contains(s.date))
        .collect()
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Recorded statuses of one member, by session.
fn statuses_of<'a>(
    records: &'a [AttendanceRecord],
    member_id: &str,
) -> HashMap<&'a str, AttendanceStatus> {
    records
        .iter()
        .filter(|r| r.member_id == member_id)
        .map(|r| (r.session_id.as_str(), r.status))
        .collect()
}

fn mark_for(
    statuses: &HashMap<&str, AttendanceStatus>,
    session: &TrainingSession,
) -> AttendanceMark {
    statuses
        .get(session.id.as_str())
        .copied()
        .map(AttendanceMark::Recorded)
        .unwrap_or(AttendanceMark::NotRecorded)
}

fn member_stats_over(
    member_id: &str,
    member_name: &str,
    eligible: &[&TrainingSession],
    records: &[AttendanceRecord],
) -> MemberAttendanceStats {
    let statuses = statuses_of(records, member_id);

    let mut stats = MemberAttendanceStats {
        member_id: member_id.to_string(),
        member_name: member_name.to_string(),
        total_trainings: eligible.len(),
        present: 0,
        late: 0,
        left_early: 0,
        excused: 0,
        unexcused: 0,
        unknown: 0,
        attended: 0,
        attendance_rate: 0.0,
        active_rate: 0.0,
    };

    for session in eligible {
        let status = mark_for(&statuses, session).effective_status();
        if status.counts_as_attended() {
            stats.attended += 1;
        }
        match status {
            AttendanceStatus::Present => stats.present += 1,
            AttendanceStatus::Late => stats.late += 1,
            AttendanceStatus::LeftEarly => stats.left_early += 1,
            AttendanceStatus::Excused => stats.excused += 1,
            AttendanceStatus::Unexcused => stats.unexcused += 1,
            AttendanceStatus::Unknown => stats.unknown += 1,
        }
    }

    stats.attendance_rate = rate(stats.attended, stats.total_trainings);
    stats.active_rate = rate(stats.present, stats.total_trainings);
    stats
}

/// Statistics for one member over the group's sessions. Records of other
/// members are ignored.
pub fn compute_member_stats(
    member_id: &str,
    member_name: &str,
    sessions: &[TrainingSession],
    records: &[AttendanceRecord],
    window: &DateWindow,
    as_of: DateTime<Utc>,
) -> MemberAttendanceStats {
    let eligible = eligible_sessions(sessions, window, as_of);
    member_stats_over(member_id, member_name, &eligible, records)
}

/// Roster line used for group statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub member_id: String,
    pub member_name: String,
}

impl RosterEntry {
    pub fn new(member_id: impl Into<String>, member_name: impl Into<String>) -> Self {
        Self {
            member_id: member_id.into(),
            member_name: member_name.into(),
        }
    }
}

pub fn compute_group_stats(
    group: &TrainingGroup,
    roster: &[RosterEntry],
    sessions: &[TrainingSession],
    records: &[AttendanceRecord],
    window: &DateWindow,
    as_of: DateTime<Utc>,
) -> GroupAttendanceStats {
    let eligible = eligible_sessions(sessions, window, as_of);
    let total_trainings = eligible.len();

    let mut members: Vec<MemberAttendanceStats> = roster
        .iter()
        .map(|entry| member_stats_over(&entry.member_id, &entry.member_name, &eligible, records))
        .collect();

    let attended: usize = members.iter().map(|m| m.attended).sum();
    let average_attendance = rate(attended, total_trainings * members.len());

    // Stable: ties keep roster order.
    members.sort_by(|a, b| b.attendance_rate.total_cmp(&a.attendance_rate));

    GroupAttendanceStats {
        group_id: group.id.clone(),
        group_name: group.name.clone(),
        total_trainings,
        member_count: members.len(),
        average_attendance,
        members,
    }
}

/// Per-session display marks for one member, oldest session first.
pub fn attendance_marks(
    sessions: &[TrainingSession],
    records: &[AttendanceRecord],
    member_id: &str,
    window: &DateWindow,
    as_of: DateTime<Utc>,
) -> Vec<SessionMark> {
    let statuses = statuses_of(records, member_id);

    let mut eligible = eligible_sessions(sessions, window, as_of);
    eligible.sort_by_key(|s| s.date);
    eligible
        .into_iter()
        .map(|s| SessionMark {
            session_id: s.id.clone(),
            date: s.date,
            mark: mark_for(&statuses, s),
        })
        .collect()
}
