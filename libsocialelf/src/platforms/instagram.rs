//! Instagram content types, carousel rules, and collaborators

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::PlatformPayload;
use crate::error::PlatformIssue;
use crate::types::{MediaItem, Platform};

pub const MAX_CAROUSEL_ITEMS: usize = 10;
pub const MAX_COLLABORATORS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstagramContentType {
    #[default]
    Post,
    Story,
    Reel,
    Carousel,
}

impl std::str::FromStr for InstagramContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "post" => Ok(Self::Post),
            "story" => Ok(Self::Story),
            "reel" => Ok(Self::Reel),
            "carousel" => Ok(Self::Carousel),
            other => Err(format!(
                "Invalid Instagram content type '{}'. Valid options: post, story, reel, carousel",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstagramOptions {
    pub content_type: Option<InstagramContentType>,
    pub collaborators: Vec<String>,
    /// Custom cover image, reels only
    pub thumbnail: Option<String>,
}

/// More than one media item always makes a carousel
pub fn effective_content_type(
    requested: Option<InstagramContentType>,
    media_items: &[MediaItem],
) -> InstagramContentType {
    if media_items.len() > 1 {
        InstagramContentType::Carousel
    } else {
        requested.unwrap_or_default()
    }
}

pub(super) fn transform(
    options: &InstagramOptions,
    media_items: &[MediaItem],
) -> Result<PlatformPayload, PlatformIssue> {
    let issue = |message: String| PlatformIssue::new(Platform::Instagram, message);
    let content_type = effective_content_type(options.content_type, media_items);

    if content_type == InstagramContentType::Carousel {
        if media_items.len() > MAX_CAROUSEL_ITEMS {
            return Err(issue(format!(
                "Carousel posts allow at most {} media items, got {}",
                MAX_CAROUSEL_ITEMS,
                media_items.len()
            )));
        }
        let videos = media_items.iter().filter(|m| m.is_video()).count();
        if videos > 0 && videos < media_items.len() {
            return Err(issue(
                "Carousel cannot mix images and videos".to_string(),
            ));
        }
    }

    let collaborators = normalize_collaborators(&options.collaborators);
    if collaborators.len() > MAX_COLLABORATORS {
        return Err(issue(format!(
            "Maximum {} collaborators allowed for Instagram posts",
            MAX_COLLABORATORS
        )));
    }

    let thumbnail = options
        .thumbnail
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if thumbnail.is_some() && content_type != InstagramContentType::Reel {
        return Err(issue(
            "Custom thumbnails are only supported for reels".to_string(),
        ));
    }

    let mut data = json!({ "contentType": content_type });
    if !collaborators.is_empty() {
        data["collaborators"] = Value::from(collaborators);
    }

    let mut payload = PlatformPayload::new(Platform::Instagram, data);
    payload.instagram_thumbnail = thumbnail.map(str::to_string);
    Ok(payload)
}

fn normalize_collaborators(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in raw.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if !out.iter().any(|existing| existing == name) {
            out.push(name.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(n: usize) -> Vec<MediaItem> {
        (0..n)
            .map(|i| MediaItem::image(format!("https://cdn/{}.jpg", i)))
            .collect()
    }

    #[test]
    fn test_defaults_to_post() {
        let payload = transform(&InstagramOptions::default(), &images(1)).unwrap();
        assert_eq!(payload.platform_specific_data, json!({"contentType": "post"}));
        assert!(payload.instagram_thumbnail.is_none());
    }

    #[test]
    fn test_multiple_media_forces_carousel() {
        let options = InstagramOptions {
            content_type: Some(InstagramContentType::Story),
            ..InstagramOptions::default()
        };
        let payload = transform(&options, &images(3)).unwrap();
        assert_eq!(payload.platform_specific_data["contentType"], "carousel");
    }

    #[test]
    fn test_carousel_item_limit() {
        assert!(transform(&InstagramOptions::default(), &images(10)).is_ok());

        let issue = transform(&InstagramOptions::default(), &images(11)).unwrap_err();
        assert_eq!(issue.platform, Platform::Instagram);
        assert!(issue.message.contains("at most 10"));
    }

    #[test]
    fn test_carousel_rejects_mixed_media() {
        let media = vec![
            MediaItem::image("https://cdn/a.jpg"),
            MediaItem::video("https://cdn/b.mp4"),
        ];
        let issue = transform(&InstagramOptions::default(), &media).unwrap_err();
        assert_eq!(issue.message, "Carousel cannot mix images and videos");

        let all_video = vec![
            MediaItem::video("https://cdn/a.mp4"),
            MediaItem::video("https://cdn/b.mp4"),
        ];
        assert!(transform(&InstagramOptions::default(), &all_video).is_ok());
    }

    #[test]
    fn test_collaborators_trimmed_deduplicated_and_capped() {
        let options = InstagramOptions {
            collaborators: vec![
                " alice ".to_string(),
                "bob".to_string(),
                "alice".to_string(),
                "".to_string(),
                "carol".to_string(),
            ],
            ..InstagramOptions::default()
        };
        let payload = transform(&options, &images(1)).unwrap();
        assert_eq!(
            payload.platform_specific_data["collaborators"],
            json!(["alice", "bob", "carol"])
        );

        let too_many = InstagramOptions {
            collaborators: vec!["a", "b", "c", "d"].into_iter().map(String::from).collect(),
            ..InstagramOptions::default()
        };
        let issue = transform(&too_many, &images(1)).unwrap_err();
        assert!(issue.message.contains("Maximum 3 collaborators"));
    }

    #[test]
    fn test_thumbnail_only_for_reels() {
        let reel = InstagramOptions {
            content_type: Some(InstagramContentType::Reel),
            thumbnail: Some("https://cdn/cover.jpg".to_string()),
            ..InstagramOptions::default()
        };
        let payload = transform(&reel, &[MediaItem::video("https://cdn/r.mp4")]).unwrap();
        assert_eq!(payload.instagram_thumbnail.as_deref(), Some("https://cdn/cover.jpg"));

        let post = InstagramOptions {
            thumbnail: Some("https://cdn/cover.jpg".to_string()),
            ..InstagramOptions::default()
        };
        assert!(transform(&post, &images(1)).is_err());
    }

    #[test]
    fn test_content_type_parse() {
        assert_eq!("Reel".parse::<InstagramContentType>().unwrap(), InstagramContentType::Reel);
        assert!("igtv".parse::<InstagramContentType>().is_err());
    }
}
