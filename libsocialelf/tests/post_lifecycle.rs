//! Integration tests for the post lifecycle
//!
//! Drives `SocialElfService` end to end against the in-memory provider.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use libsocialelf::config::{Config, ConnectionConfig};
use libsocialelf::error::ProviderError;
use libsocialelf::platforms::{InstagramOptions, PlatformOptions, TwitterOptions};
use libsocialelf::provider::mock::{MockOperation, MockProvider};
use libsocialelf::provider::ProviderCall;
use libsocialelf::service::events::Event;
use libsocialelf::types::{MediaItem, PostStatus};
use libsocialelf::{Platform, PostDraft, PostFilter, PostPatch, Profile, SocialElfError, SocialElfService};
use tempfile::TempDir;

fn setup(mock: &MockProvider) -> (SocialElfService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        connection: ConnectionConfig {
            state_file: Some(temp_dir.path().join("flows.json").display().to_string()),
            ..ConnectionConfig::default()
        },
        profiles: vec![Profile::new("main", "prof_1").with_timezone("America/New_York")],
        ..Config::default()
    };

    let service = SocialElfService::with_provider(config, Arc::new(mock.clone())).unwrap();
    (service, temp_dir)
}

fn connected() -> MockProvider {
    MockProvider::new()
        .with_account("prof_1", Platform::Twitter, "acc_tw")
        .with_account("prof_1", Platform::Instagram, "acc_ig")
        .with_account("prof_1", Platform::Linkedin, "acc_li")
}

#[tokio::test]
async fn test_scheduled_post_reaches_provider_in_one_write() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);
    let mut events = service.subscribe();
    let at = Utc.with_ymd_and_hms(2030, 1, 15, 14, 0, 0).unwrap();

    let draft = PostDraft::new("Big news")
        .with_platform(PlatformOptions::bare(Platform::Twitter))
        .with_platform(PlatformOptions::bare(Platform::Linkedin))
        .with_tags(["launch"])
        .scheduled_at(at);
    let post = service.create_post("main", draft).await.unwrap();

    assert_eq!(post.status, PostStatus::Scheduled);
    assert_eq!(post.scheduled_for, Some(at));
    assert_eq!(post.timezone.as_deref(), Some("America/New_York"));
    assert_eq!(mock.count(|c| *c == ProviderCall::CreatePost), 1);

    let payload = &mock.payloads()[0];
    let accounts: Vec<&str> = payload.platforms.iter().map(|t| t.account_id.as_str()).collect();
    assert_eq!(accounts, vec!["acc_tw", "acc_li"]);
    assert!(!payload.publish_now);
    assert!(!payload.is_draft);

    match events.recv().await.unwrap() {
        Event::PostCreated { post_id, status, platforms } => {
            assert_eq!(post_id, post.id);
            assert_eq!(status, PostStatus::Scheduled);
            assert_eq!(platforms, vec![Platform::Twitter, Platform::Linkedin]);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_account_blocks_whole_post() {
    let mock = MockProvider::new().with_account("prof_1", Platform::Twitter, "acc_tw");
    let (service, _temp_dir) = setup(&mock);

    let draft = PostDraft::new("Hello")
        .with_platform(PlatformOptions::bare(Platform::Twitter))
        .with_platform(PlatformOptions::bare(Platform::Facebook))
        .now();
    let err = service.create_post("main", draft).await.unwrap_err();

    assert!(matches!(
        err,
        SocialElfError::AccountNotConnected { platform: Platform::Facebook }
    ));
    assert!(mock.write_calls().is_empty());
    assert_eq!(mock.post_count(), 0);
}

#[tokio::test]
async fn test_rejected_platform_options_name_only_that_platform() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);

    let draft = PostDraft::new("Thread time")
        .with_platform(PlatformOptions::Twitter(TwitterOptions {
            thread: Some(vec!["Thread time".to_string(), "   ".to_string()]),
        }))
        .with_platform(PlatformOptions::bare(Platform::Linkedin))
        .as_draft();
    let err = service.create_post("main", draft).await.unwrap_err();

    match err {
        SocialElfError::PlatformValidation(issues) => {
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].platform, Platform::Twitter);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_instagram_carousel_shaping() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);

    let draft = PostDraft::new("Gallery")
        .with_platform(PlatformOptions::Instagram(InstagramOptions::default()))
        .with_media(MediaItem::image("https://cdn.example.com/1.jpg"))
        .with_media(MediaItem::image("https://cdn.example.com/2.jpg"))
        .as_draft();
    let post = service.create_post("main", draft).await.unwrap();

    let target = post.target(Platform::Instagram).unwrap();
    assert_eq!(target.account_id, "acc_ig");
    assert_eq!(target.platform_specific_data["contentType"], "carousel");
    assert_eq!(post.status, PostStatus::Draft);
}

#[tokio::test]
async fn test_edit_keeps_fields_the_patch_leaves_alone() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);
    let at = Utc::now() + Duration::days(3);

    let post = service
        .create_post(
            "main",
            PostDraft::new("First version")
                .with_platform(PlatformOptions::bare(Platform::Linkedin))
                .with_tags(["a", "b"])
                .scheduled_at(at),
        )
        .await
        .unwrap();

    let patch = PostPatch {
        content: Some("Second version".to_string()),
        ..PostPatch::default()
    };
    let updated = service.update_post("main", &post.id, patch).await.unwrap();

    assert_eq!(updated.content, "Second version");
    assert_eq!(updated.scheduled_for, post.scheduled_for);
    assert_eq!(updated.tags, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(updated.platforms[0].account_id, "acc_li");

    let calls = mock.calls();
    let get = calls
        .iter()
        .position(|c| *c == ProviderCall::GetPost(post.id.clone()))
        .unwrap();
    let put = calls
        .iter()
        .position(|c| *c == ProviderCall::ReplacePost(post.id.clone()))
        .unwrap();
    assert!(get < put, "current record must be read before the replace");
}

#[tokio::test]
async fn test_publishing_post_is_locked_for_edits_but_deletable() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);

    let post = service
        .create_post(
            "main",
            PostDraft::new("Going out")
                .with_platform(PlatformOptions::bare(Platform::Twitter))
                .scheduled_at(Utc::now() + Duration::hours(1)),
        )
        .await
        .unwrap();
    mock.set_status(&post.id, PostStatus::Publishing);

    let err = service
        .reschedule_post("main", &post.id, Utc::now() + Duration::hours(5))
        .await
        .unwrap_err();
    assert!(matches!(err, SocialElfError::PostLocked { .. }));
    assert_eq!(mock.count(|c| matches!(c, ProviderCall::ReplacePost(_))), 0);

    let ack = service.delete_post("main", &post.id).await.unwrap();
    assert_eq!(ack.post_id, post.id);
    assert!(mock.post(&post.id).is_none());
}

#[tokio::test]
async fn test_published_post_cannot_be_deleted() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);

    let post = service
        .create_post(
            "main",
            PostDraft::new("Done")
                .with_platform(PlatformOptions::bare(Platform::Twitter))
                .now(),
        )
        .await
        .unwrap();
    mock.set_status(&post.id, PostStatus::Published);

    let err = service.delete_post("main", &post.id).await.unwrap_err();
    assert!(matches!(err, SocialElfError::PostLocked { .. }));
    assert!(mock.post(&post.id).is_some());
}

#[tokio::test]
async fn test_provider_lock_race_is_reported_as_locked() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);

    let post = service
        .create_post(
            "main",
            PostDraft::new("Racing")
                .with_platform(PlatformOptions::bare(Platform::Twitter))
                .scheduled_at(Utc::now() + Duration::hours(1)),
        )
        .await
        .unwrap();
    mock.fail_next(
        MockOperation::ReplacePost,
        ProviderError::Status {
            status: 400,
            message: "Published posts cannot be edited".to_string(),
            body: None,
        },
    );

    let err = service
        .reschedule_post("main", &post.id, Utc::now() + Duration::hours(2))
        .await
        .unwrap_err();
    assert!(matches!(err, SocialElfError::PostLocked { .. }));
}

#[tokio::test]
async fn test_listing_filters_by_date_range() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);
    let base = Utc.with_ymd_and_hms(2030, 5, 1, 12, 0, 0).unwrap();

    for days in [0, 5, 10] {
        service
            .create_post(
                "main",
                PostDraft::new(format!("Day {}", days))
                    .with_platform(PlatformOptions::bare(Platform::Linkedin))
                    .scheduled_at(base + Duration::days(days)),
            )
            .await
            .unwrap();
    }
    service
        .create_post(
            "main",
            PostDraft::new("Unscheduled")
                .with_platform(PlatformOptions::bare(Platform::Linkedin))
                .as_draft(),
        )
        .await
        .unwrap();

    let filter = PostFilter {
        from: Some(base + Duration::days(1)),
        until: Some(base + Duration::days(10)),
        limit: Some(50),
        ..PostFilter::default()
    };
    let page = service.list_posts("main", &filter).await.unwrap();

    let contents: Vec<&str> = page.posts.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(contents, vec!["Day 5", "Day 10"]);
}

#[tokio::test]
async fn test_upstream_timeout_is_distinguished() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);
    mock.fail_next(
        MockOperation::GetPost,
        ProviderError::Timeout("operation timed out".to_string()),
    );

    let err = service.get_post("main", "post_0001").await.unwrap_err();
    assert!(matches!(err, SocialElfError::UpstreamTimeout(_)));
    assert_eq!(err.kind().code(), "upstream_timeout");
}

#[tokio::test]
async fn test_delete_missing_post_is_not_found() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);

    let err = service.delete_post("main", "post_9999").await.unwrap_err();
    assert!(matches!(err, SocialElfError::NotFound(_)));
}

#[tokio::test]
async fn test_draft_scheduled_published_lifecycle() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);

    let draft = PostDraft::new("Hello")
        .with_platform(PlatformOptions::bare(Platform::Twitter))
        .as_draft();
    let post = service.create_post("main", draft).await.unwrap();
    assert_eq!(post.status, PostStatus::Draft);
    assert!(post.scheduled_for.is_none());
    assert!(mock.payloads()[0].scheduled_for.is_none());

    let at = Utc::now() + Duration::days(3);
    let patch = PostPatch {
        scheduled_for: Some(at),
        is_draft: Some(false),
        ..PostPatch::default()
    };
    let scheduled = service.update_post("main", &post.id, patch).await.unwrap();
    assert_eq!(scheduled.status, PostStatus::Scheduled);
    assert_eq!(scheduled.scheduled_for, Some(at));

    mock.set_status(&post.id, PostStatus::Published);
    let err = service.delete_post("main", &post.id).await.unwrap_err();
    assert!(matches!(err, SocialElfError::PostLocked { .. }));
    assert_eq!(
        mock.count(|c| matches!(c, ProviderCall::DeletePost(_))),
        0
    );
}

#[tokio::test]
async fn test_created_post_reads_back_unchanged() {
    let mock = connected();
    let (service, _temp_dir) = setup(&mock);
    let at = Utc.with_ymd_and_hms(2030, 3, 10, 16, 30, 0).unwrap();

    let draft = PostDraft::new("Round trip")
        .with_platform(PlatformOptions::bare(Platform::Twitter))
        .with_platform(PlatformOptions::bare(Platform::Linkedin))
        .scheduled_at(at);
    let created = service.create_post("main", draft).await.unwrap();
    let fetched = service.get_post("main", &created.id).await.unwrap();

    assert_eq!(fetched.content, created.content);
    assert_eq!(fetched.content, "Round trip");
    assert_eq!(fetched.platforms, created.platforms);
    assert_eq!(fetched.scheduled_for, Some(at));
}
