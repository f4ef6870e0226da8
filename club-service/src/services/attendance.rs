//! Attendance recording and statistics over the document store.

use std::collections::HashSet;
use std::sync::Arc;
use validator::Validate;

use super::attendance_stats::{
    attendance_marks, compute_group_stats, compute_member_stats, DateWindow, RosterEntry,
};
use super::clock::Clock;
use super::error::ClubError;
use super::identity::{require_actor, Actor};
use super::metrics::record_attendance;
use super::roster_cache::RosterCache;
use super::store::{
    collections, get_record, query_records, to_record, DocumentStore, FieldFilter, WriteOp,
};
use crate::models::{
    AttendanceEntry, AttendanceRecord, GroupAttendanceStats, MemberAttendanceStats,
    MemberGroupStats, SessionMark, TrainingGroup, TrainingSession,
};

#[derive(Clone)]
pub struct AttendanceService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    roster: RosterCache,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, roster: RosterCache) -> Self {
        Self {
            store,
            clock,
            roster,
        }
    }

    async fn load_group(&self, group_id: &str) -> Result<TrainingGroup, ClubError> {
        get_record(self.store.as_ref(), collections::TRAINING_GROUPS, group_id)
            .await?
            .ok_or_else(|| ClubError::NotFound(format!("training group {}", group_id)))
    }

    async fn load_session(&self, session_id: &str) -> Result<TrainingSession, ClubError> {
        get_record(self.store.as_ref(), collections::TRAINING_SESSIONS, session_id)
            .await?
            .ok_or_else(|| ClubError::NotFound(format!("training session {}", session_id)))
    }

    /// The group, provided its roster lists `member_id`.
    async fn load_group_of_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<TrainingGroup, ClubError> {
        let group = self.load_group(group_id).await?;
        if !group.has_member(member_id) {
            return Err(ClubError::NotFound(format!(
                "member {} in training group {}",
                member_id, group_id
            )));
        }
        Ok(group)
    }

    async fn group_sessions(&self, group_id: &str) -> Result<Vec<TrainingSession>, ClubError> {
        query_records(
            self.store.as_ref(),
            collections::TRAINING_SESSIONS,
            &[FieldFilter::eq("group_id", group_id)],
        )
        .await
    }

    async fn group_records(&self, group_id: &str) -> Result<Vec<AttendanceRecord>, ClubError> {
        query_records(
            self.store.as_ref(),
            collections::ATTENDANCE_RECORDS,
            &[FieldFilter::eq("group_id", group_id)],
        )
        .await
    }

    /// Roster lines in group order, named through the roster cache. Members
    /// missing from the roster keep their id as name.
    async fn roster_for(&self, group: &TrainingGroup) -> Result<Vec<RosterEntry>, ClubError> {
        let names = self.roster.names().await?;
        Ok(group
            .member_ids
            .iter()
            .map(|id| {
                let name = names.get(id).cloned().unwrap_or_else(|| id.clone());
                RosterEntry::new(id.clone(), name)
            })
            .collect())
    }

    /// Replace every record of a session with `entries`, atomically.
    #[tracing::instrument(skip(self, actor, entries), fields(entries = entries.len()))]
    pub async fn record_bulk_attendance(
        &self,
        actor: Option<&Actor>,
        session_id: &str,
        group_id: &str,
        entries: Vec<AttendanceEntry>,
    ) -> Result<Vec<AttendanceRecord>, ClubError> {
        let actor = require_actor(actor)?;

        let mut seen = HashSet::new();
        for entry in &entries {
            entry.validate()?;
            if !seen.insert(entry.member_id.as_str()) {
                return Err(ClubError::InvalidArgument(format!(
                    "member {} listed more than once",
                    entry.member_id
                )));
            }
        }

        let session = self.load_session(session_id).await?;
        if session.group_id != group_id {
            return Err(ClubError::InvalidArgument(format!(
                "session {} belongs to group {}, not {}",
                session_id, session.group_id, group_id
            )));
        }

        let names = if entries.iter().any(|e| e.member_name.trim().is_empty()) {
            Some(self.roster.names().await?)
        } else {
            None
        };

        let now = self.clock.now();
        let records: Vec<AttendanceRecord> = entries
            .into_iter()
            .map(|mut entry| {
                if entry.member_name.trim().is_empty() {
                    entry.member_name = names
                        .as_ref()
                        .and_then(|n| n.get(&entry.member_id).cloned())
                        .unwrap_or_else(|| entry.member_id.clone());
                }
                AttendanceRecord::from_entry(session_id, group_id, entry, &actor.user_id, now)
            })
            .collect();

        let mut ops = Vec::with_capacity(records.len() + 1);
        ops.push(WriteOp::delete_where(
            collections::ATTENDANCE_RECORDS,
            vec![FieldFilter::eq("session_id", session_id)],
        ));
        for record in &records {
            ops.push(WriteOp::set(
                collections::ATTENDANCE_RECORDS,
                &record.id,
                to_record(record)?,
            ));
        }
        self.store.apply_batch(ops).await?;

        for record in &records {
            record_attendance(record.status.as_str());
        }

        tracing::info!(
            session_id = %session_id,
            group_id = %group_id,
            recorded_by = %actor.user_id,
            count = records.len(),
            "Attendance recorded"
        );

        Ok(records)
    }

    /// Stored records of one session, by member name.
    pub async fn session_attendance(
        &self,
        session_id: &str,
    ) -> Result<Vec<AttendanceRecord>, ClubError> {
        self.load_session(session_id).await?;
        let mut records: Vec<AttendanceRecord> = query_records(
            self.store.as_ref(),
            collections::ATTENDANCE_RECORDS,
            &[FieldFilter::eq("session_id", session_id)],
        )
        .await?;
        records.sort_by(|a, b| a.member_name.cmp(&b.member_name));
        Ok(records)
    }

    #[tracing::instrument(skip(self))]
    pub async fn group_stats(
        &self,
        group_id: &str,
        window: &DateWindow,
    ) -> Result<GroupAttendanceStats, ClubError> {
        let group = self.load_group(group_id).await?;
        let sessions = self.group_sessions(group_id).await?;
        let records = self.group_records(group_id).await?;
        let roster = self.roster_for(&group).await?;

        Ok(compute_group_stats(
            &group,
            &roster,
            &sessions,
            &records,
            window,
            self.clock.now(),
        ))
    }

    #[tracing::instrument(skip(self))]
    pub async fn member_stats(
        &self,
        group_id: &str,
        member_id: &str,
        window: &DateWindow,
    ) -> Result<MemberAttendanceStats, ClubError> {
        self.load_group_of_member(group_id, member_id).await?;

        let sessions = self.group_sessions(group_id).await?;
        let records = self.group_records(group_id).await?;
        let name = self
            .roster
            .names()
            .await?
            .remove(member_id)
            .unwrap_or_else(|| member_id.to_string());

        Ok(compute_member_stats(
            member_id,
            &name,
            &sessions,
            &records,
            window,
            self.clock.now(),
        ))
    }

    /// One mark per eligible session of the group, oldest first. Sessions
    /// without a record are `NotRecorded`, unlike a recorded `unknown`.
    #[tracing::instrument(skip(self))]
    pub async fn member_marks(
        &self,
        group_id: &str,
        member_id: &str,
        window: &DateWindow,
    ) -> Result<Vec<SessionMark>, ClubError> {
        self.load_group_of_member(group_id, member_id).await?;
        let sessions = self.group_sessions(group_id).await?;
        let records = self.group_records(group_id).await?;
        Ok(attendance_marks(
            &sessions,
            &records,
            member_id,
            window,
            self.clock.now(),
        ))
    }

    /// Stats for the member in every group whose roster lists them, by group
    /// name.
    #[tracing::instrument(skip(self))]
    pub async fn member_overview(
        &self,
        member_id: &str,
        window: &DateWindow,
    ) -> Result<Vec<MemberGroupStats>, ClubError> {
        let mut groups: Vec<TrainingGroup> =
            query_records(self.store.as_ref(), collections::TRAINING_GROUPS, &[]).await?;
        groups.retain(|g| g.has_member(member_id));
        groups.sort_by(|a, b| a.name.cmp(&b.name));

        let name = self
            .roster
            .names()
            .await?
            .remove(member_id)
            .unwrap_or_else(|| member_id.to_string());
        let as_of = self.clock.now();

        let mut overview = Vec::with_capacity(groups.len());
        for group in groups {
            let sessions = self.group_sessions(&group.id).await?;
            let records = self.group_records(&group.id).await?;
            let stats =
                compute_member_stats(member_id, &name, &sessions, &records, window, as_of);
            overview.push(MemberGroupStats {
                group_id: group.id,
                group_name: group.name,
                stats,
            });
        }
        Ok(overview)
    }
}
