//! Integration tests for calendar drag-and-drop rescheduling

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use libsocialelf::error::ProviderError;
use libsocialelf::platforms::PlatformOptions;
use libsocialelf::profiles::StaticProfiles;
use libsocialelf::provider::mock::{MockOperation, MockProvider};
use libsocialelf::service::calendar::{CalendarView, MoveOutcome};
use libsocialelf::service::events::{Event, EventBus};
use libsocialelf::service::scheduling::SchedulingOrchestrator;
use libsocialelf::timezone::TimezoneResolver;
use libsocialelf::types::PostStatus;
use libsocialelf::{Platform, PostDraft, PostFilter, Profile, SocialElfError};

struct Fixture {
    mock: MockProvider,
    orchestrator: SchedulingOrchestrator,
    events: EventBus,
}

fn fixture() -> Fixture {
    let mock = MockProvider::new().with_account("prof_1", Platform::Linkedin, "acc_li");
    let events = EventBus::default();
    let orchestrator = SchedulingOrchestrator::new(
        Arc::new(mock.clone()),
        Arc::new(StaticProfiles::new(vec![
            Profile::new("main", "prof_1").with_timezone("Europe/Paris")
        ])),
        TimezoneResolver::default(),
        events.clone(),
    );
    Fixture {
        mock,
        orchestrator,
        events,
    }
}

fn may(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 5, day).unwrap()
}

async fn seed(fixture: &Fixture) -> String {
    // 08:30 UTC is 10:30 in Paris during summer time
    let post = fixture
        .orchestrator
        .create_post(
            "main",
            PostDraft::new("Weekly update")
                .with_platform(PlatformOptions::bare(Platform::Linkedin))
                .scheduled_at(Utc.with_ymd_and_hms(2030, 5, 6, 8, 30, 0).unwrap()),
        )
        .await
        .unwrap();
    post.id
}

async fn load(fixture: &Fixture) -> CalendarView {
    CalendarView::load(
        fixture.orchestrator.clone(),
        "main",
        PostFilter {
            limit: Some(100),
            ..PostFilter::default()
        },
        fixture.events.clone(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_move_keeps_local_time_of_day() {
    let fixture = fixture();
    let post_id = seed(&fixture).await;
    let mut view = load(&fixture).await;

    let outcome = view.move_post(&post_id, may(9), None).await.unwrap();

    let expected = Utc.with_ymd_and_hms(2030, 5, 9, 8, 30, 0).unwrap();
    match outcome {
        MoveOutcome::Confirmed(post) => assert_eq!(post.scheduled_for, Some(expected)),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(view.post(&post_id).unwrap().scheduled_for, Some(expected));
    assert_eq!(fixture.mock.post(&post_id).unwrap().scheduled_for, Some(expected));
    assert!(!view.is_pending(&post_id));
}

#[tokio::test]
async fn test_precise_drop_time() {
    let fixture = fixture();
    let post_id = seed(&fixture).await;
    let mut view = load(&fixture).await;

    view.move_post(&post_id, may(10), NaiveTime::from_hms_opt(17, 45, 0))
        .await
        .unwrap();

    // 17:45 in Paris is 15:45 UTC
    assert_eq!(
        fixture.mock.post(&post_id).unwrap().scheduled_for,
        Some(Utc.with_ymd_and_hms(2030, 5, 10, 15, 45, 0).unwrap())
    );
}

#[tokio::test]
async fn test_optimistic_position_shows_before_confirmation() {
    let fixture = fixture();
    let post_id = seed(&fixture).await;
    let mut view = load(&fixture).await;

    let pending = view.begin_move(&post_id, may(12), None).unwrap();
    assert!(view.is_pending(&post_id));
    assert_eq!(view.post(&post_id).unwrap().scheduled_for, Some(pending.to));
    assert_eq!(view.posts_by_day().get(&may(12)).map(Vec::len), Some(1));

    let second = view.begin_move(&post_id, may(13), None).unwrap_err();
    assert!(matches!(second, SocialElfError::Validation(_)));

    let result = fixture
        .orchestrator
        .reschedule_post("main", &post_id, pending.to)
        .await;
    let outcome = view.settle(pending, result).await;
    assert!(matches!(outcome, MoveOutcome::Confirmed(_)));
    assert!(!view.is_pending(&post_id));
}

#[tokio::test]
async fn test_refused_move_reloads_from_provider() {
    let fixture = fixture();
    let post_id = seed(&fixture).await;
    let original = fixture.mock.post(&post_id).unwrap().scheduled_for;
    let mut view = load(&fixture).await;
    let mut rx = fixture.events.subscribe();

    fixture.mock.fail_next(
        MockOperation::ReplacePost,
        ProviderError::Status {
            status: 500,
            message: "Scheduler unavailable".to_string(),
            body: None,
        },
    );
    let outcome = view.move_post(&post_id, may(20), None).await.unwrap();

    match outcome {
        MoveOutcome::Reverted { message, view_refreshed } => {
            assert!(view_refreshed);
            assert!(message.contains("Scheduler unavailable"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(view.post(&post_id).unwrap().scheduled_for, original);
    assert!(!view.is_stale());

    match rx.recv().await.unwrap() {
        Event::RescheduleReverted { post_id: id, view_refreshed, .. } => {
            assert_eq!(id, post_id);
            assert!(view_refreshed);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_reload_marks_view_stale() {
    let fixture = fixture();
    let post_id = seed(&fixture).await;
    let mut view = load(&fixture).await;

    fixture.mock.fail_next(
        MockOperation::ReplacePost,
        ProviderError::Network("connection reset".to_string()),
    );
    fixture.mock.fail_next(
        MockOperation::ListPosts,
        ProviderError::Network("connection reset".to_string()),
    );
    let outcome = view.move_post(&post_id, may(21), None).await.unwrap();

    assert!(matches!(
        outcome,
        MoveOutcome::Reverted { view_refreshed: false, .. }
    ));
    assert!(view.is_stale());
}

#[tokio::test]
async fn test_post_published_mid_drag_is_reverted() {
    let fixture = fixture();
    let post_id = seed(&fixture).await;
    let mut view = load(&fixture).await;

    let pending = view.begin_move(&post_id, may(15), None).unwrap();
    fixture.mock.set_status(&post_id, PostStatus::Publishing);
    fixture.mock.set_delay(StdDuration::from_millis(10));

    let result = fixture
        .orchestrator
        .reschedule_post("main", &post_id, pending.to)
        .await;
    assert!(matches!(result, Err(SocialElfError::PostLocked { .. })));

    let outcome = view.settle(pending, result).await;
    assert!(matches!(outcome, MoveOutcome::Reverted { view_refreshed: true, .. }));
    assert_eq!(view.post(&post_id).unwrap().status, PostStatus::Publishing);
}

#[tokio::test]
async fn test_locked_posts_cannot_be_dragged() {
    let fixture = fixture();
    let post_id = seed(&fixture).await;
    fixture.mock.set_status(&post_id, PostStatus::Published);
    let mut view = load(&fixture).await;

    let err = view.begin_move(&post_id, may(8), None).unwrap_err();
    assert!(matches!(err, SocialElfError::PostLocked { .. }));
    assert!(!view.is_pending(&post_id));
}
