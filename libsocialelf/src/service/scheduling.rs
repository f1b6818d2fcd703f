//! Post lifecycle operations
//!
//! Everything a caller can do to a post goes through here. Input is checked
//! before any network call; lock checks happen against the provider's
//! current record, never a cached one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::events::{Event, EventBus};
use crate::accounts::AccountResolver;
use crate::error::{Result, SocialElfError};
use crate::platforms;
use crate::profiles::{ActingProfile, ProfileDirectory};
use crate::provider::PostingProvider;
use crate::repository::PostRepository;
use crate::timezone::TimezoneResolver;
use crate::types::{
    DeleteAck, Post, PostDraft, PostFilter, PostPage, PostPatch, PostPayload, Timing,
    MAX_CONTENT_BYTES,
};

#[derive(Clone)]
pub struct SchedulingOrchestrator {
    profiles: Arc<dyn ProfileDirectory>,
    accounts: AccountResolver,
    repository: PostRepository,
    timezones: TimezoneResolver,
    event_bus: EventBus,
}

impl SchedulingOrchestrator {
    pub fn new(
        provider: Arc<dyn PostingProvider>,
        profiles: Arc<dyn ProfileDirectory>,
        timezones: TimezoneResolver,
        event_bus: EventBus,
    ) -> Self {
        let accounts = AccountResolver::new(provider.clone());
        Self {
            profiles,
            repository: PostRepository::new(provider, accounts.clone()),
            accounts,
            timezones,
            event_bus,
        }
    }

    pub fn timezones(&self) -> TimezoneResolver {
        self.timezones
    }

    /// Look up a profile together with the timezone its writes use
    pub async fn acting(&self, profile_id: &str) -> Result<ActingProfile> {
        let profile = self.profiles.profile(profile_id).await?;
        let timezone = self.timezones.resolve(profile.timezone.as_deref());
        Ok(ActingProfile { profile, timezone })
    }

    /// Validate, shape, resolve accounts, then create in one provider write
    pub async fn create_post(&self, profile_id: &str, draft: PostDraft) -> Result<Post> {
        validate_content(&draft.content)?;
        if draft.platforms.is_empty() {
            return Err(SocialElfError::Validation(
                "Select at least one platform".to_string(),
            ));
        }
        let timing = draft.timing()?;

        let acting = self.acting(profile_id).await?;
        acting.external_id()?;

        let assembly = platforms::assemble(
            &draft.content,
            &draft.media_items,
            &draft.tags,
            &draft.platforms,
        )?;
        let targets = self
            .accounts
            .resolve_all(&acting.profile, assembly.payloads)
            .await?;

        let payload = PostPayload {
            content: draft.content,
            platforms: targets,
            scheduled_for: match timing {
                Timing::At(instant) => Some(instant),
                Timing::Now | Timing::Draft => None,
            },
            timezone: acting.timezone.name().to_string(),
            publish_now: timing == Timing::Now,
            is_draft: timing == Timing::Draft,
            media_items: assembly.media_items,
            tags: assembly.tags,
        };

        let post = self.repository.create(&payload).await?;
        info!(
            post_id = %post.id,
            profile_id,
            status = %post.status,
            platforms = ?post.platform_names(),
            "post created"
        );
        self.event_bus.emit(Event::PostCreated {
            post_id: post.id.clone(),
            status: post.status,
            platforms: post.platforms.iter().map(|t| t.platform).collect(),
        });
        Ok(post)
    }

    pub async fn get_post(&self, profile_id: &str, post_id: &str) -> Result<Post> {
        self.acting(profile_id).await?;
        self.repository.get(post_id).await
    }

    pub async fn list_posts(&self, profile_id: &str, filter: &PostFilter) -> Result<PostPage> {
        if let (Some(from), Some(until)) = (filter.from, filter.until) {
            if from > until {
                return Err(SocialElfError::Validation(
                    "Date range ends before it starts".to_string(),
                ));
            }
        }
        let acting = self.acting(profile_id).await?;
        self.repository.list(&acting.profile, filter).await
    }

    /// Merge `patch` onto the provider's current record
    pub async fn update_post(
        &self,
        profile_id: &str,
        post_id: &str,
        patch: PostPatch,
    ) -> Result<Post> {
        validate_patch(&patch)?;
        let acting = self.acting(profile_id).await?;

        let post = self
            .repository
            .merge_update(&acting, post_id, &patch)
            .await?;
        let fields = patch.fields();
        info!(post_id, profile_id, fields = ?fields, "post updated");
        self.event_bus.emit(Event::PostUpdated {
            post_id: post.id.clone(),
            fields,
        });
        Ok(post)
    }

    /// Move a post to a new time, leaving every other field as the provider has it
    pub async fn reschedule_post(
        &self,
        profile_id: &str,
        post_id: &str,
        instant: DateTime<Utc>,
    ) -> Result<Post> {
        let acting = self.acting(profile_id).await?;
        let post = self
            .repository
            .merge_update(&acting, post_id, &PostPatch::reschedule(instant))
            .await?;

        info!(post_id, profile_id, scheduled_for = %instant, "post rescheduled");
        self.event_bus.emit(Event::PostRescheduled {
            post_id: post.id.clone(),
            scheduled_for: instant,
        });
        Ok(post)
    }

    pub async fn delete_post(&self, profile_id: &str, post_id: &str) -> Result<DeleteAck> {
        self.acting(profile_id).await?;
        let ack = self.repository.delete(post_id).await?;
        self.event_bus.emit(Event::PostDeleted {
            post_id: ack.post_id.clone(),
        });
        Ok(ack)
    }
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(SocialElfError::Validation(
            "Content cannot be empty".to_string(),
        ));
    }
    if content.len() > MAX_CONTENT_BYTES {
        return Err(SocialElfError::Validation(format!(
            "Content too large: {} bytes (maximum: {} bytes)",
            content.len(),
            MAX_CONTENT_BYTES
        )));
    }
    Ok(())
}

fn validate_patch(patch: &PostPatch) -> Result<()> {
    if let Some(content) = &patch.content {
        validate_content(content)?;
    }
    if patch.publish_now == Some(true) && patch.is_draft == Some(true) {
        return Err(SocialElfError::Validation(
            "Publish now and draft are mutually exclusive".to_string(),
        ));
    }
    if matches!(&patch.platforms, Some(platforms) if platforms.is_empty()) {
        return Err(SocialElfError::Validation(
            "A post needs at least one platform".to_string(),
        ));
    }
    Ok(())
}
