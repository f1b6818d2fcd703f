//! Core types for SocialElf
//!
//! Wire types mirror the posting provider's JSON (camelCase, `_id` keys).
//! Intent types (`PostDraft`, `PostPatch`, `PostFilter`) are what callers
//! hand to the orchestrator.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SocialElfError};
use crate::platforms::PlatformOptions;

/// Upper bound on post content, matching what the provider accepts in one request
pub const MAX_CONTENT_BYTES: usize = 100 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Instagram,
    Facebook,
    Youtube,
    Linkedin,
    Tiktok,
    Threads,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Platform::Twitter,
        Platform::Instagram,
        Platform::Facebook,
        Platform::Youtube,
        Platform::Linkedin,
        Platform::Tiktok,
        Platform::Threads,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Youtube => "youtube",
            Platform::Linkedin => "linkedin",
            Platform::Tiktok => "tiktok",
            Platform::Threads => "threads",
        }
    }

    /// Connecting requires picking a page after the OAuth exchange
    pub fn requires_page_selection(&self) -> bool {
        matches!(self, Platform::Facebook)
    }
}

impl FromStr for Platform {
    type Err = SocialElfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" => Ok(Platform::Twitter),
            "instagram" => Ok(Platform::Instagram),
            "facebook" => Ok(Platform::Facebook),
            "youtube" => Ok(Platform::Youtube),
            "linkedin" => Ok(Platform::Linkedin),
            "tiktok" => Ok(Platform::Tiktok),
            "threads" => Ok(Platform::Threads),
            other => Err(SocialElfError::Validation(format!(
                "Unsupported platform '{}'. Valid options: {}",
                other,
                Platform::ALL
                    .iter()
                    .map(Platform::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Scheduled,
    Publishing,
    Published,
    Failed,
}

impl PostStatus {
    /// Delivery has started or finished; the record can no longer be edited
    pub fn blocks_update(&self) -> bool {
        matches!(self, PostStatus::Publishing | PostStatus::Published)
    }

    pub fn blocks_delete(&self) -> bool {
        matches!(self, PostStatus::Published)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }
}

impl FromStr for PostStatus {
    type Err = SocialElfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "publishing" => Ok(PostStatus::Publishing),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(SocialElfError::Validation(format!(
                "Invalid status '{}'. Valid options: draft, scheduled, publishing, published, failed",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-platform delivery status reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Scheduled,
    Publishing,
    Published,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mov", "m4v", "webm", "avi", "mkv"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub kind: MediaType,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl MediaItem {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            kind: MediaType::Image,
            url: url.into(),
            thumbnail: None,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            kind: MediaType::Video,
            url: url.into(),
            thumbnail: None,
        }
    }

    /// Guess the media type from the URL's file extension
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let is_video = path
            .rsplit_once('.')
            .map(|(_, ext)| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);

        if is_video {
            Self::video(url)
        } else {
            Self::image(url)
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaType::Video
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Accepts a bare account id or a populated account object carrying `_id`
fn deserialize_account_ref<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Object(map) => map
            .get("_id")
            .or_else(|| map.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| de::Error::custom("account object without _id")),
        other => Err(de::Error::custom(format!(
            "unexpected account reference: {}",
            other
        ))),
    }
}

/// One platform a post is delivered to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformTarget {
    pub platform: Platform,
    #[serde(deserialize_with = "deserialize_account_ref")]
    pub account_id: String,
    #[serde(default = "empty_object")]
    pub platform_specific_data: Value,
    /// Provider-owned; never sent back
    #[serde(default, skip_serializing)]
    pub status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_thumbnail: Option<String>,
    /// Fields this crate does not model, carried through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlatformTarget {
    pub fn new(platform: Platform, account_id: impl Into<String>, data: Value) -> Self {
        Self {
            platform,
            account_id: account_id.into(),
            platform_specific_data: data,
            status: None,
            instagram_thumbnail: None,
            extra: Map::new(),
        }
    }
}

/// A post as the provider records it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub platforms: Vec<PlatformTarget>,
    #[serde(default)]
    pub media_items: Vec<MediaItem>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub publish_now: bool,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn platform_names(&self) -> Vec<&'static str> {
        self.platforms.iter().map(|t| t.platform.as_str()).collect()
    }

    pub fn target(&self, platform: Platform) -> Option<&PlatformTarget> {
        self.platforms.iter().find(|t| t.platform == platform)
    }
}

/// Body of a create (`POST`) or full replace (`PUT`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPayload {
    pub content: String,
    pub platforms: Vec<PlatformTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    pub timezone: String,
    pub publish_now: bool,
    pub is_draft: bool,
    pub media_items: Vec<MediaItem>,
    pub tags: Vec<String>,
}

/// How a new post leaves the composer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Now,
    Draft,
    At(DateTime<Utc>),
}

/// Authoring intent for a new post
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub content: String,
    pub platforms: Vec<PlatformOptions>,
    pub publish_now: bool,
    pub is_draft: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub media_items: Vec<MediaItem>,
    pub tags: Vec<String>,
}

impl PostDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_platform(mut self, options: PlatformOptions) -> Self {
        self.platforms.push(options);
        self
    }

    pub fn with_media(mut self, item: MediaItem) -> Self {
        self.media_items.push(item);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn scheduled_at(mut self, instant: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(instant);
        self
    }

    pub fn as_draft(mut self) -> Self {
        self.is_draft = true;
        self
    }

    pub fn now(mut self) -> Self {
        self.publish_now = true;
        self
    }

    /// Exactly one of publish-now, draft, or a scheduled time must be chosen
    pub fn timing(&self) -> Result<Timing> {
        match (self.publish_now, self.is_draft, self.scheduled_for) {
            (true, false, None) => Ok(Timing::Now),
            (false, true, None) => Ok(Timing::Draft),
            (false, false, Some(at)) => Ok(Timing::At(at)),
            (false, false, None) => Err(SocialElfError::Validation(
                "Choose one of publish now, save as draft, or a scheduled time".to_string(),
            )),
            _ => Err(SocialElfError::Validation(
                "Publish now, draft, and scheduled time are mutually exclusive".to_string(),
            )),
        }
    }
}

/// Partial update; `None` keeps the provider's current value
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub content: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub publish_now: Option<bool>,
    pub is_draft: Option<bool>,
    pub media_items: Option<Vec<MediaItem>>,
    pub tags: Option<Vec<String>>,
    pub platforms: Option<Vec<PlatformOptions>>,
}

impl PostPatch {
    pub fn reschedule(instant: DateTime<Utc>) -> Self {
        Self {
            scheduled_for: Some(instant),
            ..Self::default()
        }
    }

    /// Names of the fields this patch touches, for logs and events
    pub fn fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        let mut mark = |set: bool, name: &str| {
            if set {
                fields.push(name.to_string());
            }
        };
        mark(self.content.is_some(), "content");
        mark(self.scheduled_for.is_some(), "scheduledFor");
        mark(self.publish_now.is_some(), "publishNow");
        mark(self.is_draft.is_some(), "isDraft");
        mark(self.media_items.is_some(), "mediaItems");
        mark(self.tags.is_some(), "tags");
        mark(self.platforms.is_some(), "platforms");
        fields
    }
}

/// Listing filter; dates bound `scheduledFor` inclusively
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub platform: Option<Platform>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PostFilter {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 10;

    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(Self::DEFAULT_PAGE)
    }

    pub fn limit(&self) -> u32 {
        self.limit.filter(|l| *l > 0).unwrap_or(Self::DEFAULT_LIMIT)
    }

    pub fn has_date_range(&self) -> bool {
        self.from.is_some() || self.until.is_some()
    }

    /// Posts without a schedule never match a date range
    pub fn matches_range(&self, post: &Post) -> bool {
        if !self.has_date_range() {
            return true;
        }
        let Some(at) = post.scheduled_for else {
            return false;
        };
        self.from.map_or(true, |from| at >= from) && self.until.map_or(true, |until| at <= until)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostPage {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// A connected social account under a provider profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(alias = "_id")]
    pub id: String,
    pub platform: Platform,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl Account {
    pub fn label(&self) -> &str {
        self.username
            .as_deref()
            .or(self.display_name.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAck {
    pub post_id: String,
}
