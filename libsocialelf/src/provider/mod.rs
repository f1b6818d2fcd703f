//! The posting provider boundary
//!
//! The provider owns the authoritative post record and the connected
//! accounts. Everything above this trait treats it as the single source of
//! truth; nothing here retries.
//!
//! [`http::HttpProvider`] speaks the provider's REST API. [`mock::MockProvider`]
//! keeps everything in memory and is available in all builds so that
//! integration tests and the CLI test suites can use it.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::types::{Account, Platform, Post, PostPage, PostPayload, PostStatus};

pub mod http;
pub mod mock;

pub use http::HttpProvider;
pub use mock::{MockProvider, ProviderCall};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Server-side listing parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub external_profile_id: String,
    pub page: u32,
    pub limit: u32,
    pub status: Option<PostStatus>,
    pub platform: Option<Platform>,
}

/// Where to send the user to authorize a platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectUrl {
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacebookPage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Result of connecting a selected page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConnection {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub account: Option<Account>,
}

#[async_trait]
pub trait PostingProvider: Send + Sync {
    async fn get_post(&self, post_id: &str) -> ProviderResult<Post>;

    async fn list_posts(&self, query: &PostQuery) -> ProviderResult<PostPage>;

    async fn create_post(&self, payload: &PostPayload) -> ProviderResult<Post>;

    /// Full replace of an existing post
    async fn replace_post(&self, post_id: &str, payload: &PostPayload) -> ProviderResult<Post>;

    async fn delete_post(&self, post_id: &str) -> ProviderResult<()>;

    /// Every account under a profile, active or not
    async fn list_accounts(&self, external_profile_id: &str) -> ProviderResult<Vec<Account>>;

    async fn delete_account(&self, account_id: &str) -> ProviderResult<()>;

    async fn connect_url(
        &self,
        platform: Platform,
        external_profile_id: &str,
        redirect_url: &str,
    ) -> ProviderResult<ConnectUrl>;

    async fn list_facebook_pages(
        &self,
        external_profile_id: &str,
        access_token: &SecretString,
    ) -> ProviderResult<Vec<FacebookPage>>;

    async fn select_facebook_page(
        &self,
        external_profile_id: &str,
        page_id: &str,
        access_token: &SecretString,
    ) -> ProviderResult<PageConnection>;
}

/// Post responses arrive either bare or wrapped in `{"post": ...}`
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum PostEnvelope {
    Wrapped { post: Post },
    Bare(Post),
}

impl PostEnvelope {
    pub(crate) fn into_post(self) -> Post {
        match self {
            PostEnvelope::Wrapped { post } | PostEnvelope::Bare(post) => post,
        }
    }
}
