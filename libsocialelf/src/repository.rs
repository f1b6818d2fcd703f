//! Post persistence through the provider
//!
//! The provider's record is authoritative. Updates are read-merge-write:
//! fetch the current post, refuse if it is locked, overlay the caller's
//! fields, then replace. There is no version check, so two concurrent
//! merges race and the later write wins.

use std::sync::Arc;

use tracing::{debug, info};

use crate::accounts::AccountResolver;
use crate::error::{ProviderError, Result, SocialElfError};
use crate::platforms::{self, twitter, PlatformOptions};
use crate::profiles::{ActingProfile, Profile};
use crate::provider::{PostQuery, PostingProvider};
use crate::types::{DeleteAck, Platform, Post, PostFilter, PostPage, PostPatch, PostPayload};

#[derive(Clone)]
pub struct PostRepository {
    provider: Arc<dyn PostingProvider>,
    accounts: AccountResolver,
}

impl PostRepository {
    pub fn new(provider: Arc<dyn PostingProvider>, accounts: AccountResolver) -> Self {
        Self { provider, accounts }
    }

    pub async fn create(&self, payload: &PostPayload) -> Result<Post> {
        self.provider
            .create_post(payload)
            .await
            .map_err(SocialElfError::write)
    }

    pub async fn get(&self, post_id: &str) -> Result<Post> {
        self.provider
            .get_post(post_id)
            .await
            .map_err(|e| match e.status() {
                Some(404) => SocialElfError::NotFound(format!("post {}", post_id)),
                _ => SocialElfError::fetch(e),
            })
    }

    /// Status and platform filter server-side; the date range applies here
    pub async fn list(&self, profile: &Profile, filter: &PostFilter) -> Result<PostPage> {
        let query = PostQuery {
            external_profile_id: profile.external_id()?.to_string(),
            page: filter.page(),
            limit: filter.limit(),
            status: filter.status,
            platform: filter.platform,
        };

        let mut page = self
            .provider
            .list_posts(&query)
            .await
            .map_err(SocialElfError::fetch)?;

        if filter.has_date_range() {
            let before = page.posts.len();
            page.posts.retain(|post| filter.matches_range(post));
            debug!(kept = page.posts.len(), dropped = before - page.posts.len(), "applied date range");
        }
        Ok(page)
    }

    pub async fn merge_update(
        &self,
        acting: &ActingProfile,
        post_id: &str,
        patch: &PostPatch,
    ) -> Result<Post> {
        let current = self.get(post_id).await?;
        if current.status.blocks_update() {
            return Err(SocialElfError::PostLocked {
                post_id: post_id.to_string(),
                reason: format!("post is {}", current.status),
            });
        }

        let mut payload = merge_fields(&current, patch, acting.timezone.name());

        if let Some(options) = &patch.platforms {
            if options.is_empty() {
                return Err(SocialElfError::Validation(
                    "A post needs at least one platform".to_string(),
                ));
            }
            let assembly = platforms::assemble(
                &payload.content,
                &payload.media_items,
                &payload.tags,
                options,
            )?;
            payload.platforms = self
                .accounts
                .resolve_all(&acting.profile, assembly.payloads)
                .await?;
            payload.media_items = assembly.media_items;
            payload.tags = assembly.tags;
        } else if patch.media_items.is_some() {
            reshape_for_media(&current, &mut payload)?;
        }

        info!(post_id, fields = ?patch.fields(), "replacing post");
        self.provider
            .replace_post(post_id, &payload)
            .await
            .map_err(|e| classify_write(post_id, e, "cannot be edited"))
    }

    /// Delete after confirming the post has not been published
    pub async fn delete(&self, post_id: &str) -> Result<DeleteAck> {
        let current = self.get(post_id).await?;
        if current.status.blocks_delete() {
            return Err(SocialElfError::PostLocked {
                post_id: post_id.to_string(),
                reason: format!("post is {}", current.status),
            });
        }

        self.provider
            .delete_post(post_id)
            .await
            .map_err(|e| classify_write(post_id, e, "cannot be deleted"))?;

        info!(post_id, "deleted post");
        Ok(DeleteAck {
            post_id: post_id.to_string(),
        })
    }
}

fn classify_write(post_id: &str, error: ProviderError, lock_phrase: &str) -> SocialElfError {
    if error.is_bad_request_mentioning(lock_phrase) {
        SocialElfError::PostLocked {
            post_id: post_id.to_string(),
            reason: match &error {
                ProviderError::Status { message, .. } => message.clone(),
                other => other.to_string(),
            },
        }
    } else if error.status() == Some(404) {
        SocialElfError::NotFound(format!("post {}", post_id))
    } else {
        SocialElfError::write(error)
    }
}

/// Re-run the platform rules on passed-through targets after a media change.
///
/// Targets keep their accounts and provider-owned fields. A YouTube target
/// keeps the thumbnail its video carried before the edit.
fn reshape_for_media(current: &Post, payload: &mut PostPayload) -> Result<()> {
    let video_thumbnail = current
        .media_items
        .iter()
        .find(|m| m.is_video())
        .and_then(|m| m.thumbnail.clone());

    let options: Vec<PlatformOptions> = current
        .platforms
        .iter()
        .map(|target| match PlatformOptions::from_target(target) {
            PlatformOptions::Youtube(mut youtube) => {
                youtube.thumbnail = video_thumbnail.clone();
                PlatformOptions::Youtube(youtube)
            }
            other => other,
        })
        .collect();

    let assembly = platforms::assemble(
        &payload.content,
        &payload.media_items,
        &payload.tags,
        &options,
    )?;

    payload.platforms = current
        .platforms
        .iter()
        .zip(assembly.payloads)
        .map(|(fetched, shaped)| {
            let mut target = shaped.into_target(fetched.account_id.clone());
            target.extra = fetched.extra.clone();
            target
        })
        .collect();
    payload.media_items = assembly.media_items;
    payload.tags = assembly.tags;
    debug!(platforms = payload.platforms.len(), "re-shaped platforms for new media");
    Ok(())
}

/// Overlay a patch on the fetched post.
///
/// Fetched platforms pass through untouched except that a twitter thread's
/// first item follows a content change.
pub fn merge_fields(current: &Post, patch: &PostPatch, timezone: &str) -> PostPayload {
    let content = patch
        .content
        .clone()
        .unwrap_or_else(|| current.content.clone());

    let mut platforms = current.platforms.clone();
    if content != current.content {
        for target in platforms
            .iter_mut()
            .filter(|t| t.platform == Platform::Twitter)
        {
            twitter::sync_thread_head(&mut target.platform_specific_data, &content);
        }
    }

    PostPayload {
        content,
        platforms,
        scheduled_for: patch.scheduled_for.or(current.scheduled_for),
        timezone: timezone.to_string(),
        publish_now: patch.publish_now.unwrap_or(current.publish_now),
        is_draft: patch.is_draft.unwrap_or(current.is_draft),
        media_items: patch
            .media_items
            .clone()
            .unwrap_or_else(|| current.media_items.clone()),
        tags: patch.tags.clone().unwrap_or_else(|| current.tags.clone()),
    }
}
