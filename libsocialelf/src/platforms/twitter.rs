//! Twitter threads
//!
//! Item 0 of a thread is always the post's main content. Authoring goes
//! through [`ThreadEditor`], which keeps that invariant while items are
//! added, removed, and reordered.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::PlatformPayload;
use crate::error::{PlatformIssue, Result, SocialElfError};
use crate::types::Platform;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TwitterOptions {
    /// Full thread including the head; `None` posts a single tweet
    pub thread: Option<Vec<String>>,
}

pub(super) fn transform(options: &TwitterOptions, content: &str) -> std::result::Result<PlatformPayload, PlatformIssue> {
    let Some(items) = &options.thread else {
        return Ok(PlatformPayload::new(Platform::Twitter, json!({})));
    };

    if items.len() < 2 {
        return Err(PlatformIssue::new(
            Platform::Twitter,
            "A thread needs at least one follow-up tweet",
        ));
    }
    if let Some(blank) = items.iter().skip(1).position(|item| item.trim().is_empty()) {
        return Err(PlatformIssue::new(
            Platform::Twitter,
            format!("Thread item {} is empty", blank + 2),
        ));
    }

    let thread_items: Vec<Value> = std::iter::once(content)
        .chain(items.iter().skip(1).map(String::as_str))
        .map(|text| json!({ "content": text }))
        .collect();

    Ok(PlatformPayload::new(
        Platform::Twitter,
        json!({ "threadItems": thread_items }),
    ))
}

/// Thread texts stored in a provider `platformSpecificData`
pub fn thread_items(data: &Value) -> Option<Vec<String>> {
    let items = data.get("threadItems")?.as_array()?;
    Some(
        items
            .iter()
            .map(|item| {
                item.get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect(),
    )
}

/// Rewrite the head of a stored thread. Returns whether a thread was present.
pub fn sync_thread_head(data: &mut Value, content: &str) -> bool {
    match data
        .get_mut("threadItems")
        .and_then(Value::as_array_mut)
        .and_then(|items| items.first_mut())
        .and_then(Value::as_object_mut)
    {
        Some(head) => {
            head.insert("content".to_string(), Value::from(content));
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadEditor {
    items: Vec<String>,
}

impl ThreadEditor {
    /// Start a thread: the main content plus one empty follow-up
    pub fn enable(content: &str) -> Self {
        Self {
            items: vec![content.to_string(), String::new()],
        }
    }

    pub fn disable(&mut self) {
        self.items.clear();
    }

    pub fn is_enabled(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn sync_global(&mut self, content: &str) {
        if let Some(head) = self.items.first_mut() {
            *head = content.to_string();
        }
    }

    pub fn push(&mut self, text: impl Into<String>) {
        if self.is_enabled() {
            self.items.push(text.into());
        }
    }

    /// Edit a follow-up; the head only changes through `sync_global`
    pub fn set(&mut self, index: usize, text: impl Into<String>) -> Result<()> {
        self.check_follow_up(index)?;
        self.items[index] = text.into();
        Ok(())
    }

    /// Remove a follow-up after the first; the head and the first
    /// follow-up always stay
    pub fn remove(&mut self, index: usize) -> Result<()> {
        self.check_follow_up(index)?;
        if index == 1 {
            return Err(SocialElfError::Validation(
                "A thread keeps its first follow-up tweet".to_string(),
            ));
        }
        self.items.remove(index);
        Ok(())
    }

    pub fn move_up(&mut self, index: usize) -> Result<()> {
        if index <= 1 || index >= self.items.len() {
            return Err(SocialElfError::Validation(format!(
                "Thread item {} cannot move up",
                index
            )));
        }
        self.items.swap(index, index - 1);
        Ok(())
    }

    pub fn move_down(&mut self, index: usize) -> Result<()> {
        if index == 0 || index + 1 >= self.items.len() {
            return Err(SocialElfError::Validation(format!(
                "Thread item {} cannot move down",
                index
            )));
        }
        self.items.swap(index, index + 1);
        Ok(())
    }

    pub fn into_options(self) -> TwitterOptions {
        TwitterOptions {
            thread: self.is_enabled().then_some(self.items),
        }
    }

    fn check_follow_up(&self, index: usize) -> Result<()> {
        if index == 0 {
            return Err(SocialElfError::Validation(
                "The first tweet mirrors the post content".to_string(),
            ));
        }
        if index >= self.items.len() {
            return Err(SocialElfError::Validation(format!(
                "Thread item {} does not exist",
                index
            )));
        }
        Ok(())
    }
}
