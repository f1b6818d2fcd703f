//! Service layer for SocialElf
//!
//! `SocialElfService` is the single entry point the binaries use. It wires
//! the provider client, the profile directory, the post orchestrator and the
//! connection flow controller from one `Config`, and shares one event bus
//! between them.
//!
//! - `SchedulingOrchestrator`: create, read, update, reschedule and delete posts
//! - `CalendarView`: optimistic drag-and-drop rescheduling
//! - `ConnectionFlowController`: connect and disconnect social accounts
//! - `EventBus`: lifecycle events
//!
//! # Example
//!
//! ```no_run
//! use libsocialelf::platforms::PlatformOptions;
//! use libsocialelf::service::SocialElfService;
//! use libsocialelf::types::{Platform, PostDraft};
//!
//! # async fn example() -> libsocialelf::Result<()> {
//! let service = SocialElfService::new()?;
//!
//! let draft = PostDraft::new("Launch day!")
//!     .with_platform(PlatformOptions::bare(Platform::Linkedin))
//!     .as_draft();
//!
//! let post = service.create_post("main", draft).await?;
//! println!("Saved draft {}", post.id);
//! # Ok(())
//! # }
//! ```

pub mod calendar;
pub mod events;
pub mod scheduling;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use self::calendar::CalendarView;
use self::events::{EventBus, EventReceiver};
use self::scheduling::SchedulingOrchestrator;
use crate::config::Config;
use crate::connection::{
    CallbackOutcome, CallbackParams, ConnectionFlowController, ConnectionStart, FacebookOAuth,
    FlowStateStore, PageListing,
};
use crate::error::Result;
use crate::profiles::{ProfileDirectory, StaticProfiles};
use crate::provider::{HttpProvider, PageConnection, PostingProvider};
use crate::timezone::TimezoneResolver;
use crate::types::{Account, DeleteAck, Platform, Post, PostDraft, PostFilter, PostPage, PostPatch};

pub struct SocialElfService {
    config: Arc<Config>,
    scheduling: SchedulingOrchestrator,
    connections: Arc<ConnectionFlowController>,
    event_bus: EventBus,
}

impl SocialElfService {
    /// Load configuration from the default location and connect to the provider
    pub fn new() -> Result<Self> {
        Self::from_config(Config::load()?)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let provider: Arc<dyn PostingProvider> =
            Arc::new(HttpProvider::from_config(&config.provider)?);
        Self::with_provider(config, provider)
    }

    /// Use `provider` instead of the HTTP client, with profiles from config
    pub fn with_provider(config: Config, provider: Arc<dyn PostingProvider>) -> Result<Self> {
        let profiles: Arc<dyn ProfileDirectory> =
            Arc::new(StaticProfiles::new(config.profiles.clone()));
        Self::with_parts(config, provider, profiles)
    }

    pub fn with_parts(
        config: Config,
        provider: Arc<dyn PostingProvider>,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> Result<Self> {
        let event_bus = EventBus::new(100);
        let timezones = TimezoneResolver::new(&config.defaults.timezone)?;

        let scheduling = SchedulingOrchestrator::new(
            provider.clone(),
            profiles.clone(),
            timezones,
            event_bus.clone(),
        );

        let flows = FlowStateStore::open(config.state_file_path()?, config.connection.state_ttl());
        let mut connections = ConnectionFlowController::new(
            provider,
            profiles,
            flows,
            &config.oauth.redirect_base_url,
            event_bus.clone(),
        )?;
        if let Some(facebook) = &config.oauth.facebook {
            match FacebookOAuth::from_config(facebook, config.provider.timeout()) {
                Ok(oauth) => connections = connections.with_facebook(Arc::new(oauth)),
                Err(e) => warn!(error = %e, "Facebook connections unavailable"),
            }
        }

        Ok(Self {
            config: Arc::new(config),
            scheduling,
            connections: Arc::new(connections),
            event_bus,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduling(&self) -> &SchedulingOrchestrator {
        &self.scheduling
    }

    pub fn connections(&self) -> &ConnectionFlowController {
        &self.connections
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    pub async fn create_post(&self, profile_id: &str, draft: PostDraft) -> Result<Post> {
        self.scheduling.create_post(profile_id, draft).await
    }

    pub async fn get_post(&self, profile_id: &str, post_id: &str) -> Result<Post> {
        self.scheduling.get_post(profile_id, post_id).await
    }

    pub async fn list_posts(&self, profile_id: &str, filter: &PostFilter) -> Result<PostPage> {
        self.scheduling.list_posts(profile_id, filter).await
    }

    pub async fn update_post(
        &self,
        profile_id: &str,
        post_id: &str,
        patch: PostPatch,
    ) -> Result<Post> {
        self.scheduling.update_post(profile_id, post_id, patch).await
    }

    pub async fn reschedule_post(
        &self,
        profile_id: &str,
        post_id: &str,
        instant: DateTime<Utc>,
    ) -> Result<Post> {
        self.scheduling
            .reschedule_post(profile_id, post_id, instant)
            .await
    }

    pub async fn delete_post(&self, profile_id: &str, post_id: &str) -> Result<DeleteAck> {
        self.scheduling.delete_post(profile_id, post_id).await
    }

    pub async fn calendar(&self, profile_id: &str, filter: PostFilter) -> Result<CalendarView> {
        CalendarView::load(
            self.scheduling.clone(),
            profile_id,
            filter,
            self.event_bus.clone(),
        )
        .await
    }

    pub async fn initiate_connection(
        &self,
        profile_id: &str,
        platform: Platform,
    ) -> Result<ConnectionStart> {
        self.connections.initiate(profile_id, platform).await
    }

    pub async fn complete_connection_callback(
        &self,
        profile_id: &str,
        platform: Platform,
        params: &CallbackParams,
    ) -> Result<CallbackOutcome> {
        self.connections
            .complete_callback(profile_id, platform, params)
            .await
    }

    pub async fn list_connectable_pages(
        &self,
        profile_id: &str,
        temp_token: &str,
    ) -> Result<PageListing> {
        self.connections
            .list_connectable_pages(profile_id, temp_token)
            .await
    }

    pub async fn finalize_connection(
        &self,
        profile_id: &str,
        page_id: &str,
        temp_token: &str,
    ) -> Result<PageConnection> {
        self.connections
            .finalize_connection(profile_id, page_id, temp_token)
            .await
    }

    pub async fn list_connections(&self, profile_id: &str) -> Result<Vec<Account>> {
        self.connections.list_connections(profile_id).await
    }

    pub async fn disconnect(&self, profile_id: &str, account_id: &str) -> Result<()> {
        self.connections.disconnect(profile_id, account_id).await
    }
}
