mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use club_service::models::{AttendanceEntry, AttendanceStatus};
use club_service::services::store::collections;
use club_service::services::{ClubError, DateWindow};
use common::{coach, TestContext};

fn march(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

fn entry(member_id: &str, status: AttendanceStatus) -> AttendanceEntry {
    AttendanceEntry::new(member_id, "", status)
}

/// Group g1 with members a, b, c and four past sessions s1..s4.
async fn scenario() -> TestContext {
    let ctx = TestContext::new();
    ctx.seed_member("a", "Anna", "Berg").await;
    ctx.seed_member("b", "Ben", "Cole").await;
    ctx.seed_member("c", "Carla", "Diaz").await;
    ctx.seed_group("g1", "Youth Judo", &["a", "b", "c"]).await;
    for (id, day) in [("s1", 3), ("s2", 5), ("s3", 10), ("s4", 12)] {
        ctx.seed_session(id, "g1", march(day, 17)).await;
    }
    ctx
}

async fn record(ctx: &TestContext, session: &str, entries: Vec<AttendanceEntry>) {
    ctx.attendance()
        .record_bulk_attendance(Some(&coach()), session, "g1", entries)
        .await
        .expect("Failed to record attendance");
}

#[tokio::test]
async fn test_bulk_record_replaces_previous_list() {
    let ctx = scenario().await;

    record(
        &ctx,
        "s1",
        vec![
            entry("a", AttendanceStatus::Present),
            entry("b", AttendanceStatus::Late),
            entry("c", AttendanceStatus::Excused),
        ],
    )
    .await;
    record(
        &ctx,
        "s2",
        vec![entry("a", AttendanceStatus::Present)],
    )
    .await;

    record(
        &ctx,
        "s1",
        vec![
            entry("b", AttendanceStatus::Present),
            entry("c", AttendanceStatus::Unexcused),
        ],
    )
    .await;

    let s1 = ctx.attendance().session_attendance("s1").await.unwrap();
    let marks: Vec<(&str, AttendanceStatus)> = s1
        .iter()
        .map(|r| (r.member_id.as_str(), r.status))
        .collect();
    assert_eq!(
        marks,
        vec![
            ("b", AttendanceStatus::Present),
            ("c", AttendanceStatus::Unexcused),
        ]
    );
    assert_eq!(s1[0].member_name, "Ben Cole");

    // Other sessions are untouched.
    assert_eq!(ctx.attendance().session_attendance("s2").await.unwrap().len(), 1);
    assert_eq!(ctx.store.count(collections::ATTENDANCE_RECORDS), 3);
}

#[tokio::test]
async fn test_empty_list_clears_session() {
    let ctx = scenario().await;
    record(&ctx, "s1", vec![entry("a", AttendanceStatus::Present)]).await;
    record(&ctx, "s1", vec![]).await;
    assert!(ctx.attendance().session_attendance("s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bulk_record_rejections_leave_store_untouched() {
    let ctx = scenario().await;
    record(&ctx, "s1", vec![entry("a", AttendanceStatus::Present)]).await;

    let result = ctx
        .attendance()
        .record_bulk_attendance(None, "s1", "g1", vec![entry("b", AttendanceStatus::Late)])
        .await;
    assert!(matches!(result, Err(ClubError::PermissionDenied(_))));

    let result = ctx
        .attendance()
        .record_bulk_attendance(
            Some(&coach()),
            "s1",
            "g1",
            vec![
                entry("b", AttendanceStatus::Late),
                entry("b", AttendanceStatus::Present),
            ],
        )
        .await;
    assert!(matches!(result, Err(ClubError::InvalidArgument(_))));

    let result = ctx
        .attendance()
        .record_bulk_attendance(
            Some(&coach()),
            "s1",
            "g1",
            vec![entry("", AttendanceStatus::Late)],
        )
        .await;
    assert!(matches!(result, Err(ClubError::InvalidArgument(_))));

    let s1 = ctx.attendance().session_attendance("s1").await.unwrap();
    assert_eq!(s1.len(), 1);
    assert_eq!(s1[0].member_id, "a");
}

#[tokio::test]
async fn test_group_scenario_statistics() {
    let ctx = scenario().await;
    record(
        &ctx,
        "s1",
        vec![
            entry("a", AttendanceStatus::Present),
            entry("b", AttendanceStatus::Present),
        ],
    )
    .await;
    record(
        &ctx,
        "s2",
        vec![
            entry("a", AttendanceStatus::Present),
            entry("b", AttendanceStatus::Unexcused),
        ],
    )
    .await;
    record(
        &ctx,
        "s3",
        vec![
            entry("a", AttendanceStatus::Present),
            entry("b", AttendanceStatus::Present),
            entry("c", AttendanceStatus::Unknown),
        ],
    )
    .await;
    record(
        &ctx,
        "s4",
        vec![
            entry("a", AttendanceStatus::Late),
            entry("b", AttendanceStatus::Unexcused),
        ],
    )
    .await;

    let stats = ctx
        .attendance()
        .group_stats("g1", &DateWindow::unbounded())
        .await
        .unwrap();

    assert_eq!(stats.group_name, "Youth Judo");
    assert_eq!(stats.total_trainings, 4);
    assert_eq!(stats.member_count, 3);
    assert_eq!(stats.average_attendance, 50.0);

    let a = &stats.members[0];
    assert_eq!(a.member_id, "a");
    assert_eq!(a.member_name, "Anna Berg");
    assert_eq!(a.attendance_rate, 100.0);
    assert_eq!(a.active_rate, 75.0);

    let b = &stats.members[1];
    assert_eq!(b.member_id, "b");
    assert_eq!(b.attendance_rate, 50.0);
    assert_eq!(b.active_rate, 50.0);

    let c = &stats.members[2];
    assert_eq!(c.member_id, "c");
    assert_eq!(c.unknown, 4);
    assert_eq!(c.attendance_rate, 0.0);

    let single = ctx
        .attendance()
        .member_stats("g1", "b", &DateWindow::unbounded())
        .await
        .unwrap();
    assert_eq!(&single, b);
}

#[tokio::test]
async fn test_future_sessions_do_not_count_until_their_day() {
    let ctx = scenario().await;
    // Clock starts on 2025-03-20 08:00; this session is later today.
    ctx.seed_session("today", "g1", march(20, 18)).await;
    ctx.seed_session("tomorrow", "g1", march(21, 18)).await;

    let stats = ctx
        .attendance()
        .group_stats("g1", &DateWindow::unbounded())
        .await
        .unwrap();
    assert_eq!(stats.total_trainings, 5);

    ctx.clock.advance(Duration::days(1));
    let stats = ctx
        .attendance()
        .group_stats("g1", &DateWindow::unbounded())
        .await
        .unwrap();
    assert_eq!(stats.total_trainings, 6);
}

#[tokio::test]
async fn test_window_limits_sessions() {
    let ctx = scenario().await;
    record(&ctx, "s3", vec![entry("a", AttendanceStatus::Present)]).await;

    let window = DateWindow::new(Some(march(6, 0)), Some(march(11, 0))).unwrap();
    let stats = ctx
        .attendance()
        .member_stats("g1", "a", &window)
        .await
        .unwrap();
    assert_eq!(stats.total_trainings, 1);
    assert_eq!(stats.attendance_rate, 100.0);

    assert!(matches!(
        DateWindow::new(Some(march(11, 0)), Some(march(6, 0))),
        Err(ClubError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let ctx = scenario().await;
    assert!(matches!(
        ctx.attendance().session_attendance("nope").await,
        Err(ClubError::NotFound(_))
    ));
    assert!(matches!(
        ctx.attendance()
            .group_stats("nope", &DateWindow::unbounded())
            .await,
        Err(ClubError::NotFound(_))
    ));
    assert!(matches!(
        ctx.attendance()
            .member_stats("g1", "zed", &DateWindow::unbounded())
            .await,
        Err(ClubError::NotFound(_))
    ));
}
