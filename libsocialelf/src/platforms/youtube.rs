//! YouTube title, first comment, tags, and thumbnail

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::PlatformPayload;
use crate::types::Platform;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YoutubeOptions {
    pub title: Option<String>,
    pub first_comment: Option<String>,
    /// Lifted to the post's top-level tags
    pub tags: Vec<String>,
    /// Applied to the post's first video item
    pub thumbnail: Option<String>,
}

/// Split a comma separated tag field
pub fn split_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub(super) fn transform(options: &YoutubeOptions, content: &str) -> PlatformPayload {
    let title = non_blank(&options.title).unwrap_or(content);

    let mut data = json!({ "title": title });
    if let Some(comment) = non_blank(&options.first_comment) {
        data["firstComment"] = Value::from(comment);
    }

    let mut payload = PlatformPayload::new(Platform::Youtube, data);
    payload.post_tags = options.tags.clone();
    payload.video_thumbnail = non_blank(&options.thumbnail).map(str::to_string);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_falls_back_to_content() {
        let payload = transform(&YoutubeOptions::default(), "My video");
        assert_eq!(payload.platform_specific_data, json!({"title": "My video"}));

        let blank = YoutubeOptions {
            title: Some("   ".to_string()),
            ..YoutubeOptions::default()
        };
        assert_eq!(transform(&blank, "My video").platform_specific_data["title"], "My video");
    }

    #[test]
    fn test_explicit_title_and_comment() {
        let options = YoutubeOptions {
            title: Some("Launch".to_string()),
            first_comment: Some("Links below".to_string()),
            ..YoutubeOptions::default()
        };
        assert_eq!(
            transform(&options, "ignored").platform_specific_data,
            json!({"title": "Launch", "firstComment": "Links below"})
        );
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(split_tags(" rust, video ,,tips "), vec!["rust", "video", "tips"]);
        assert!(split_tags("  ").is_empty());
    }
}
