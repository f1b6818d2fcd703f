//! Per-platform payload shaping
//!
//! One authoring intent becomes one provider `platforms[]` entry per selected
//! platform. Everything here is pure: no I/O and no account lookups. Account
//! ids are attached later by [`crate::accounts::AccountResolver`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::{PlatformIssue, Result, SocialElfError};
use crate::types::{MediaItem, Platform, PlatformTarget};

pub mod instagram;
pub mod twitter;
pub mod youtube;

pub use instagram::{InstagramContentType, InstagramOptions};
pub use twitter::{ThreadEditor, TwitterOptions};
pub use youtube::YoutubeOptions;

/// Options passed through as `platformSpecificData` without interpretation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawOptions(pub Map<String, Value>);

/// Authoring options for one selected platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PlatformOptions {
    Twitter(TwitterOptions),
    Instagram(InstagramOptions),
    Facebook,
    Youtube(YoutubeOptions),
    Linkedin(RawOptions),
    Tiktok(RawOptions),
    Threads(RawOptions),
}

impl PlatformOptions {
    pub fn platform(&self) -> Platform {
        match self {
            PlatformOptions::Twitter(_) => Platform::Twitter,
            PlatformOptions::Instagram(_) => Platform::Instagram,
            PlatformOptions::Facebook => Platform::Facebook,
            PlatformOptions::Youtube(_) => Platform::Youtube,
            PlatformOptions::Linkedin(_) => Platform::Linkedin,
            PlatformOptions::Tiktok(_) => Platform::Tiktok,
            PlatformOptions::Threads(_) => Platform::Threads,
        }
    }

    /// Default options for a platform
    pub fn bare(platform: Platform) -> Self {
        match platform {
            Platform::Twitter => PlatformOptions::Twitter(TwitterOptions::default()),
            Platform::Instagram => PlatformOptions::Instagram(InstagramOptions::default()),
            Platform::Facebook => PlatformOptions::Facebook,
            Platform::Youtube => PlatformOptions::Youtube(YoutubeOptions::default()),
            Platform::Linkedin => PlatformOptions::Linkedin(RawOptions::default()),
            Platform::Tiktok => PlatformOptions::Tiktok(RawOptions::default()),
            Platform::Threads => PlatformOptions::Threads(RawOptions::default()),
        }
    }

    /// Rebuild authoring options from a target the provider already holds
    ///
    /// Used when editing: the fetched post is turned back into options so it
    /// can be re-transformed against new content or media.
    pub fn from_target(target: &PlatformTarget) -> Self {
        let data = target.platform_specific_data.as_object();
        let text = |key: &str| {
            data.and_then(|d| d.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        match target.platform {
            Platform::Twitter => PlatformOptions::Twitter(TwitterOptions {
                thread: twitter::thread_items(&target.platform_specific_data),
            }),
            Platform::Instagram => PlatformOptions::Instagram(InstagramOptions {
                content_type: data
                    .and_then(|d| d.get("contentType"))
                    .and_then(|v| serde_json::from_value(v.clone()).ok()),
                collaborators: data
                    .and_then(|d| d.get("collaborators"))
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default(),
                thumbnail: target.instagram_thumbnail.clone(),
            }),
            Platform::Facebook => PlatformOptions::Facebook,
            Platform::Youtube => PlatformOptions::Youtube(YoutubeOptions {
                title: text("title"),
                first_comment: text("firstComment"),
                ..YoutubeOptions::default()
            }),
            Platform::Linkedin => PlatformOptions::Linkedin(RawOptions(data.cloned().unwrap_or_default())),
            Platform::Tiktok => PlatformOptions::Tiktok(RawOptions(data.cloned().unwrap_or_default())),
            Platform::Threads => PlatformOptions::Threads(RawOptions(data.cloned().unwrap_or_default())),
        }
    }
}

/// Provider-ready data for one platform, still missing its account id
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformPayload {
    pub platform: Platform,
    pub platform_specific_data: Value,
    pub instagram_thumbnail: Option<String>,
    /// Tags to lift onto the post itself
    pub post_tags: Vec<String>,
    /// Thumbnail for the post's first video item
    pub video_thumbnail: Option<String>,
}

impl PlatformPayload {
    pub fn new(platform: Platform, data: Value) -> Self {
        Self {
            platform,
            platform_specific_data: data,
            instagram_thumbnail: None,
            post_tags: Vec::new(),
            video_thumbnail: None,
        }
    }

    pub fn into_target(self, account_id: impl Into<String>) -> PlatformTarget {
        let mut target = PlatformTarget::new(self.platform, account_id, self.platform_specific_data);
        target.instagram_thumbnail = self.instagram_thumbnail;
        target
    }
}

/// Shape one platform's options against the post's content and media
pub fn transform(
    options: &PlatformOptions,
    content: &str,
    media_items: &[MediaItem],
) -> std::result::Result<PlatformPayload, PlatformIssue> {
    match options {
        PlatformOptions::Twitter(opts) => twitter::transform(opts, content),
        PlatformOptions::Instagram(opts) => instagram::transform(opts, media_items),
        PlatformOptions::Facebook => Ok(PlatformPayload::new(Platform::Facebook, json!({}))),
        PlatformOptions::Youtube(opts) => Ok(youtube::transform(opts, content)),
        PlatformOptions::Linkedin(raw) => Ok(raw_payload(Platform::Linkedin, raw)),
        PlatformOptions::Tiktok(raw) => Ok(raw_payload(Platform::Tiktok, raw)),
        PlatformOptions::Threads(raw) => Ok(raw_payload(Platform::Threads, raw)),
    }
}

fn raw_payload(platform: Platform, raw: &RawOptions) -> PlatformPayload {
    PlatformPayload::new(platform, Value::Object(raw.0.clone()))
}

/// Per-platform outcome of transforming a whole selection
#[derive(Debug, Clone, Default)]
pub struct TransformReport {
    pub accepted: Vec<PlatformPayload>,
    pub issues: Vec<PlatformIssue>,
}

pub fn transform_all(
    options: &[PlatformOptions],
    content: &str,
    media_items: &[MediaItem],
) -> TransformReport {
    let mut report = TransformReport::default();
    for opts in options {
        match transform(opts, content, media_items) {
            Ok(payload) => report.accepted.push(payload),
            Err(issue) => report.issues.push(issue),
        }
    }
    report
}

/// Post-level result of shaping every selected platform
#[derive(Debug, Clone)]
pub struct Assembly {
    pub payloads: Vec<PlatformPayload>,
    pub media_items: Vec<MediaItem>,
    pub tags: Vec<String>,
}

/// Transform every platform and apply the post-level rules.
///
/// Fails with `PlatformValidation` naming only the platforms whose options
/// were rejected.
pub fn assemble(
    content: &str,
    media_items: &[MediaItem],
    tags: &[String],
    options: &[PlatformOptions],
) -> Result<Assembly> {
    if options.is_empty() {
        return Err(SocialElfError::Validation(
            "Select at least one platform".to_string(),
        ));
    }
    ensure_unique(options)?;

    let report = transform_all(options, content, media_items);
    if !report.issues.is_empty() {
        return Err(SocialElfError::PlatformValidation(report.issues));
    }

    let mut media_items = media_items.to_vec();
    let mut all_tags: Vec<&str> = tags.iter().map(String::as_str).collect();

    for payload in &report.accepted {
        all_tags.extend(payload.post_tags.iter().map(String::as_str));

        if let Some(thumbnail) = &payload.video_thumbnail {
            match media_items.iter_mut().find(|m| m.is_video()) {
                Some(video) => video.thumbnail = Some(thumbnail.clone()),
                None => warn!(
                    platform = %payload.platform,
                    "thumbnail dropped: post has no video media item"
                ),
            }
        }
    }

    let tags = normalize_tags(all_tags);
    Ok(Assembly {
        payloads: report.accepted,
        media_items,
        tags,
    })
}

fn ensure_unique(options: &[PlatformOptions]) -> Result<()> {
    let mut seen = HashSet::new();
    for opts in options {
        if !seen.insert(opts.platform()) {
            return Err(SocialElfError::Validation(format!(
                "Platform '{}' selected more than once",
                opts.platform()
            )));
        }
    }
    Ok(())
}

/// Trim, drop blanks, and deduplicate keeping first occurrence
pub fn normalize_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty() && seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn youtube(tags: &[&str], thumbnail: Option<&str>) -> PlatformOptions {
        PlatformOptions::Youtube(YoutubeOptions {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            thumbnail: thumbnail.map(str::to_string),
            ..YoutubeOptions::default()
        })
    }

    #[test]
    fn test_facebook_has_no_specific_data() {
        let payload = transform(&PlatformOptions::Facebook, "hi", &[]).unwrap();
        assert_eq!(payload.platform_specific_data, json!({}));
    }

    #[test]
    fn test_raw_options_pass_through() {
        let mut map = Map::new();
        map.insert("visibility".to_string(), json!("CONNECTIONS"));
        let payload = transform(&PlatformOptions::Linkedin(RawOptions(map)), "hi", &[]).unwrap();
        assert_eq!(payload.platform_specific_data, json!({"visibility": "CONNECTIONS"}));

        let empty = transform(&PlatformOptions::bare(Platform::Tiktok), "hi", &[]).unwrap();
        assert_eq!(empty.platform_specific_data, json!({}));
    }

    #[test]
    fn test_options_deserialize_from_tagged_json() {
        let options: Vec<PlatformOptions> = serde_json::from_value(json!([
            {"platform": "facebook"},
            {"platform": "instagram", "contentType": "reel", "thumbnail": "https://t/1.jpg"},
            {"platform": "threads", "topic": "rust"}
        ]))
        .unwrap();

        assert_eq!(options[0], PlatformOptions::Facebook);
        assert_eq!(options[1].platform(), Platform::Instagram);
        match &options[2] {
            PlatformOptions::Threads(raw) => assert_eq!(raw.0["topic"], "rust"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_platform_rejected() {
        let err = assemble(
            "hi",
            &[],
            &[],
            &[PlatformOptions::Facebook, PlatformOptions::Facebook],
        )
        .unwrap_err();
        assert!(err.to_string().contains("selected more than once"));
    }

    #[test]
    fn test_empty_selection_rejected() {
        assert!(matches!(
            assemble("hi", &[], &[], &[]),
            Err(SocialElfError::Validation(_))
        ));
    }

    #[test]
    fn test_issues_name_only_offending_platforms() {
        let media = vec![
            MediaItem::image("https://cdn/a.jpg"),
            MediaItem::video("https://cdn/b.mp4"),
        ];
        let err = assemble(
            "hi",
            &media,
            &[],
            &[
                PlatformOptions::Facebook,
                PlatformOptions::bare(Platform::Instagram),
            ],
        )
        .unwrap_err();

        match err {
            SocialElfError::PlatformValidation(issues) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].platform, Platform::Instagram);
            }
            other => panic!("unexpected {:?}", other),
        }

        let report = transform_all(
            &[PlatformOptions::Facebook, PlatformOptions::bare(Platform::Instagram)],
            "hi",
            &media,
        );
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].platform, Platform::Facebook);
    }

    #[test]
    fn test_youtube_tags_union_with_post_tags() {
        let assembly = assemble(
            "hi",
            &[],
            &["launch".to_string(), " rust ".to_string()],
            &[youtube(&["rust", "video", "launch", ""], None)],
        )
        .unwrap();
        assert_eq!(assembly.tags, vec!["launch", "rust", "video"]);
    }

    #[test]
    fn test_youtube_thumbnail_lands_on_first_video() {
        let media = vec![
            MediaItem::image("https://cdn/cover.jpg"),
            MediaItem::video("https://cdn/one.mp4"),
            MediaItem::video("https://cdn/two.mp4"),
        ];
        let assembly = assemble(
            "hi",
            &media,
            &[],
            &[youtube(&[], Some("https://cdn/thumb.jpg"))],
        )
        .unwrap();

        assert_eq!(assembly.media_items[0].thumbnail, None);
        assert_eq!(
            assembly.media_items[1].thumbnail.as_deref(),
            Some("https://cdn/thumb.jpg")
        );
        assert_eq!(assembly.media_items[2].thumbnail, None);
    }

    #[test]
    fn test_youtube_thumbnail_without_video_is_dropped() {
        let media = vec![MediaItem::image("https://cdn/cover.jpg")];
        let assembly = assemble(
            "hi",
            &media,
            &[],
            &[youtube(&[], Some("https://cdn/thumb.jpg"))],
        )
        .unwrap();
        assert_eq!(assembly.media_items, media);
    }

    #[test]
    fn test_from_target_round_trips_instagram() {
        let original = InstagramOptions {
            content_type: Some(InstagramContentType::Reel),
            collaborators: vec!["alice".to_string()],
            thumbnail: Some("https://cdn/t.jpg".to_string()),
        };
        let payload = instagram::transform(&original, &[MediaItem::video("https://cdn/r.mp4")]).unwrap();
        let target = payload.into_target("acc_ig");

        assert_eq!(
            PlatformOptions::from_target(&target),
            PlatformOptions::Instagram(original)
        );
    }

    #[test]
    fn test_from_target_recovers_thread() {
        let target = PlatformTarget::new(
            Platform::Twitter,
            "acc_tw",
            json!({"threadItems": [{"content": "head"}, {"content": "tail"}]}),
        );
        assert_eq!(
            PlatformOptions::from_target(&target),
            PlatformOptions::Twitter(TwitterOptions {
                thread: Some(vec!["head".to_string(), "tail".to_string()]),
            })
        );
    }
}
