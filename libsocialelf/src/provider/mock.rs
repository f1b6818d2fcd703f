//! In-memory posting provider
//!
//! Behaves like the real provider closely enough to exercise the engine:
//! it derives post status from the publish flags, refuses to edit or delete
//! published posts with the provider's own 400 messages, and records every
//! call so tests can assert what reached the network and what did not.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::time::sleep;

use super::{ConnectUrl, FacebookPage, PageConnection, PostQuery, PostingProvider, ProviderResult};
use crate::error::ProviderError;
use crate::types::{Account, Pagination, Platform, Post, PostPage, PostPayload, PostStatus};

/// One call that reached the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    GetPost(String),
    ListPosts(PostQuery),
    CreatePost,
    ReplacePost(String),
    DeletePost(String),
    ListAccounts(String),
    DeleteAccount(String),
    ConnectUrl(Platform),
    ListFacebookPages(String),
    SelectFacebookPage(String),
}

impl ProviderCall {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            ProviderCall::CreatePost
                | ProviderCall::ReplacePost(_)
                | ProviderCall::DeletePost(_)
                | ProviderCall::DeleteAccount(_)
                | ProviderCall::SelectFacebookPage(_)
        )
    }
}

/// Operation selector for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    GetPost,
    ListPosts,
    CreatePost,
    ReplacePost,
    DeletePost,
    ListAccounts,
    DeleteAccount,
    ConnectUrl,
    ListFacebookPages,
    SelectFacebookPage,
}

#[derive(Default)]
struct MockState {
    posts: BTreeMap<String, Post>,
    accounts: Vec<(String, Account)>,
    pages: Vec<FacebookPage>,
    calls: Vec<ProviderCall>,
    failures: HashMap<MockOperation, VecDeque<ProviderError>>,
    payloads: Vec<PostPayload>,
    page_tokens: Vec<String>,
    next_id: u64,
    delay: Duration,
}

#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active account under a provider profile
    pub fn with_account(self, external_profile_id: &str, platform: Platform, account_id: &str) -> Self {
        self.add_account(
            external_profile_id,
            Account {
                id: account_id.to_string(),
                platform,
                username: Some(format!("{}_user", platform)),
                display_name: None,
                is_active: true,
            },
        );
        self
    }

    pub fn add_account(&self, external_profile_id: &str, account: Account) {
        self.state
            .lock()
            .unwrap()
            .accounts
            .push((external_profile_id.to_string(), account));
    }

    pub fn deactivate_account(&self, account_id: &str) {
        let mut state = self.state.lock().unwrap();
        for (_, account) in state.accounts.iter_mut() {
            if account.id == account_id {
                account.is_active = false;
            }
        }
    }

    pub fn set_pages(&self, pages: Vec<FacebookPage>) {
        self.state.lock().unwrap().pages = pages;
    }

    /// Simulated latency applied to every call
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    /// Make the next call to `operation` fail with `error`
    pub fn fail_next(&self, operation: MockOperation, error: ProviderError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Seed a post as if another client had created it
    pub fn insert_post(&self, post: Post) {
        self.state
            .lock()
            .unwrap()
            .posts
            .insert(post.id.clone(), post);
    }

    /// Move a post along its lifecycle the way the provider's scheduler would
    pub fn set_status(&self, post_id: &str, status: PostStatus) {
        if let Some(post) = self.state.lock().unwrap().posts.get_mut(post_id) {
            post.status = status;
        }
    }

    pub fn post(&self, post_id: &str) -> Option<Post> {
        self.state.lock().unwrap().posts.get(post_id).cloned()
    }

    pub fn post_count(&self) -> usize {
        self.state.lock().unwrap().posts.len()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn write_calls(&self) -> Vec<ProviderCall> {
        self.calls().into_iter().filter(ProviderCall::is_write).collect()
    }

    pub fn count(&self, matches: impl Fn(&ProviderCall) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| matches(c)).count()
    }

    /// Bodies of every create and replace, in order
    pub fn payloads(&self) -> Vec<PostPayload> {
        self.state.lock().unwrap().payloads.clone()
    }

    /// Access tokens submitted while listing or selecting pages
    pub fn page_tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().page_tokens.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Record the call, then honor delay and injected failures
    async fn enter(&self, call: ProviderCall, operation: MockOperation) -> ProviderResult<()> {
        let (delay, failure) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            let failure = state
                .failures
                .get_mut(&operation)
                .and_then(VecDeque::pop_front);
            (state.delay, failure)
        };

        if !delay.is_zero() {
            sleep(delay).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn not_found(what: &str) -> ProviderError {
    ProviderError::Status {
        status: 404,
        message: format!("{} not found", what),
        body: Some(json!({ "error": format!("{} not found", what) })),
    }
}

fn bad_request(message: &str) -> ProviderError {
    ProviderError::Status {
        status: 400,
        message: message.to_string(),
        body: Some(json!({ "error": message })),
    }
}

fn status_for(payload: &PostPayload) -> PostStatus {
    if payload.publish_now {
        PostStatus::Publishing
    } else if payload.is_draft {
        PostStatus::Draft
    } else if payload.scheduled_for.is_some() {
        PostStatus::Scheduled
    } else {
        PostStatus::Draft
    }
}

fn materialize(id: String, payload: &PostPayload, created_at: Option<chrono::DateTime<chrono::Utc>>) -> Post {
    Post {
        id,
        content: payload.content.clone(),
        status: status_for(payload),
        scheduled_for: payload.scheduled_for,
        timezone: Some(payload.timezone.clone()),
        platforms: payload.platforms.clone(),
        media_items: payload.media_items.clone(),
        tags: payload.tags.clone(),
        publish_now: payload.publish_now,
        is_draft: payload.is_draft,
        created_at,
    }
}

#[async_trait]
impl PostingProvider for MockProvider {
    async fn get_post(&self, post_id: &str) -> ProviderResult<Post> {
        self.enter(ProviderCall::GetPost(post_id.to_string()), MockOperation::GetPost)
            .await?;
        self.post(post_id).ok_or_else(|| not_found("Post"))
    }

    async fn list_posts(&self, query: &PostQuery) -> ProviderResult<PostPage> {
        self.enter(ProviderCall::ListPosts(query.clone()), MockOperation::ListPosts)
            .await?;

        let state = self.state.lock().unwrap();
        let matching: Vec<Post> = state
            .posts
            .values()
            .filter(|p| query.status.map_or(true, |s| p.status == s))
            .filter(|p| query.platform.map_or(true, |pl| p.target(pl).is_some()))
            .cloned()
            .collect();

        let limit = query.limit.max(1);
        let total = matching.len() as u64;
        let posts = matching
            .into_iter()
            .skip(((query.page.max(1) - 1) * limit) as usize)
            .take(limit as usize)
            .collect();

        Ok(PostPage {
            posts,
            pagination: Pagination {
                page: query.page,
                limit,
                total,
                pages: total.div_ceil(limit as u64) as u32,
            },
        })
    }

    async fn create_post(&self, payload: &PostPayload) -> ProviderResult<Post> {
        self.enter(ProviderCall::CreatePost, MockOperation::CreatePost)
            .await?;

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("post_{:04}", state.next_id);
        let post = materialize(id.clone(), payload, Some(chrono::Utc::now()));
        state.payloads.push(payload.clone());
        state.posts.insert(id, post.clone());
        Ok(post)
    }

    async fn replace_post(&self, post_id: &str, payload: &PostPayload) -> ProviderResult<Post> {
        self.enter(ProviderCall::ReplacePost(post_id.to_string()), MockOperation::ReplacePost)
            .await?;

        let mut state = self.state.lock().unwrap();
        let existing = state.posts.get(post_id).ok_or_else(|| not_found("Post"))?;
        if existing.status.blocks_update() {
            return Err(bad_request("Published posts cannot be edited"));
        }
        let post = materialize(post_id.to_string(), payload, existing.created_at);
        state.payloads.push(payload.clone());
        state.posts.insert(post_id.to_string(), post.clone());
        Ok(post)
    }

    async fn delete_post(&self, post_id: &str) -> ProviderResult<()> {
        self.enter(ProviderCall::DeletePost(post_id.to_string()), MockOperation::DeletePost)
            .await?;

        let mut state = self.state.lock().unwrap();
        match state.posts.get(post_id) {
            None => Err(not_found("Post")),
            Some(post) if post.status.blocks_delete() => {
                Err(bad_request("Published posts cannot be deleted"))
            }
            Some(_) => {
                state.posts.remove(post_id);
                Ok(())
            }
        }
    }

    async fn list_accounts(&self, external_profile_id: &str) -> ProviderResult<Vec<Account>> {
        self.enter(
            ProviderCall::ListAccounts(external_profile_id.to_string()),
            MockOperation::ListAccounts,
        )
        .await?;

        Ok(self
            .state
            .lock()
            .unwrap()
            .accounts
            .iter()
            .filter(|(owner, _)| owner == external_profile_id)
            .map(|(_, account)| account.clone())
            .collect())
    }

    async fn delete_account(&self, account_id: &str) -> ProviderResult<()> {
        self.enter(
            ProviderCall::DeleteAccount(account_id.to_string()),
            MockOperation::DeleteAccount,
        )
        .await?;

        let mut state = self.state.lock().unwrap();
        let before = state.accounts.len();
        state.accounts.retain(|(_, account)| account.id != account_id);
        if state.accounts.len() == before {
            return Err(not_found("Account"));
        }
        Ok(())
    }

    async fn connect_url(
        &self,
        platform: Platform,
        external_profile_id: &str,
        redirect_url: &str,
    ) -> ProviderResult<ConnectUrl> {
        self.enter(ProviderCall::ConnectUrl(platform), MockOperation::ConnectUrl)
            .await?;

        let mut auth_url = url::Url::parse(&format!("https://auth.example.com/{}", platform))
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        auth_url
            .query_pairs_mut()
            .append_pair("profileId", external_profile_id)
            .append_pair("redirect_url", redirect_url);

        Ok(ConnectUrl {
            auth_url: Some(auth_url.to_string()),
            state: None,
        })
    }

    async fn list_facebook_pages(
        &self,
        external_profile_id: &str,
        access_token: &SecretString,
    ) -> ProviderResult<Vec<FacebookPage>> {
        self.enter(
            ProviderCall::ListFacebookPages(external_profile_id.to_string()),
            MockOperation::ListFacebookPages,
        )
        .await?;

        let mut state = self.state.lock().unwrap();
        state.page_tokens.push(access_token.expose_secret().to_string());
        Ok(state.pages.clone())
    }

    async fn select_facebook_page(
        &self,
        external_profile_id: &str,
        page_id: &str,
        access_token: &SecretString,
    ) -> ProviderResult<PageConnection> {
        self.enter(
            ProviderCall::SelectFacebookPage(page_id.to_string()),
            MockOperation::SelectFacebookPage,
        )
        .await?;

        let mut state = self.state.lock().unwrap();
        state.page_tokens.push(access_token.expose_secret().to_string());
        let page = state
            .pages
            .iter()
            .find(|p| p.id == page_id)
            .cloned()
            .ok_or_else(|| bad_request("Page not found for this user"))?;

        let account = Account {
            id: format!("acc_fb_{}", page.id),
            platform: Platform::Facebook,
            username: Some(page.name.clone()),
            display_name: Some(page.name),
            is_active: true,
        };
        state
            .accounts
            .push((external_profile_id.to_string(), account.clone()));

        Ok(PageConnection {
            message: Some("Facebook page connected".to_string()),
            account: Some(account),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlatformTarget;

    fn payload(publish_now: bool, is_draft: bool) -> PostPayload {
        PostPayload {
            content: "hello".to_string(),
            platforms: vec![PlatformTarget::new(Platform::Facebook, "acc", json!({}))],
            scheduled_for: None,
            timezone: "UTC".to_string(),
            publish_now,
            is_draft,
            media_items: vec![],
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_status_derived_from_flags() {
        let mock = MockProvider::new();
        let now = mock.create_post(&payload(true, false)).await.unwrap();
        let draft = mock.create_post(&payload(false, true)).await.unwrap();

        assert_eq!(now.status, PostStatus::Publishing);
        assert_eq!(draft.status, PostStatus::Draft);
        assert_ne!(now.id, draft.id);
    }

    #[tokio::test]
    async fn test_published_posts_refuse_edits() {
        let mock = MockProvider::new();
        let post = mock.create_post(&payload(false, true)).await.unwrap();
        mock.set_status(&post.id, PostStatus::Published);

        let err = mock.replace_post(&post.id, &payload(false, true)).await.unwrap_err();
        assert!(err.is_bad_request_mentioning("cannot be edited"));

        let err = mock.delete_post(&post.id).await.unwrap_err();
        assert!(err.is_bad_request_mentioning("cannot be deleted"));
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let mock = MockProvider::new();
        mock.fail_next(
            MockOperation::ListAccounts,
            ProviderError::Timeout("slow".to_string()),
        );

        assert!(mock.list_accounts("prof").await.is_err());
        assert!(mock.list_accounts("prof").await.is_ok());
        assert_eq!(mock.count(|c| matches!(c, ProviderCall::ListAccounts(_))), 2);
    }

    #[tokio::test]
    async fn test_accounts_scoped_to_profile() {
        let mock = MockProvider::new()
            .with_account("prof_a", Platform::Twitter, "acc_1")
            .with_account("prof_b", Platform::Twitter, "acc_2");

        let accounts = mock.list_accounts("prof_a").await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, "acc_1");
    }
}
