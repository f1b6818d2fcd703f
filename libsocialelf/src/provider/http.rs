//! REST client for the posting provider

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::{
    ConnectUrl, FacebookPage, PageConnection, PostEnvelope, PostQuery, PostingProvider,
    ProviderResult,
};
use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError, Result};
use crate::types::{Account, Platform, Post, PostPage, PostPayload};

pub struct HttpProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpProvider {
    pub fn new(base_url: &str, api_key: SecretString, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ConfigError::InvalidValue(format!("provider base URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue(format!(
                "provider base URL '{}' cannot hold a path",
                base_url
            ))
            .into());
        }

        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            api_key,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(&config.base_url, config.api_key()?, config.timeout())
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(method = %method, path = url.path(), "provider request");
        self.client
            .request(method, url)
            .bearer_auth(self.api_key.expose_secret())
            .header(ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ProviderResult<T> {
        let response = request.send().await.map_err(transport_error)?;
        let response = check_status(response).await?;
        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Decode(e.to_string())
            }
        })
    }

    async fn send_discarding(&self, request: RequestBuilder) -> ProviderResult<()> {
        let response = request.send().await.map_err(transport_error)?;
        check_status(response).await.map(|_| ())
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("socialelf/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::InvalidValue(format!("HTTP client: {}", e)).into())
}

pub(crate) fn transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(error.to_string())
    } else {
        ProviderError::Network(error.to_string())
    }
}

/// Pass 2xx responses through, turn anything else into `ProviderError::Status`
pub(crate) async fn check_status(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let error = status_error(status.as_u16(), &text);
    debug!(status = status.as_u16(), error = %error, "provider returned an error");
    Err(error)
}

/// The provider's own message wins over the HTTP reason phrase
pub(crate) fn status_error(status: u16, text: &str) -> ProviderError {
    let body = serde_json::from_str::<Value>(text).ok();

    let message = body
        .as_ref()
        .and_then(|b| match b.get("error") {
            Some(Value::String(message)) => Some(message.clone()),
            Some(Value::Object(inner)) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => b.get("message").and_then(Value::as_str).map(str::to_string),
        })
        .or_else(|| {
            let trimmed = text.trim();
            (!trimmed.is_empty() && body.is_none()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("request failed")
                .to_string()
        });

    ProviderError::Status {
        status,
        message,
        body,
    }
}

#[derive(Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Vec<Value>,
}

#[derive(Deserialize)]
struct PagesResponse {
    #[serde(default)]
    pages: Vec<FacebookPage>,
}

#[async_trait]
impl PostingProvider for HttpProvider {
    async fn get_post(&self, post_id: &str) -> ProviderResult<Post> {
        let url = self.url(&["v1", "posts", post_id]);
        let envelope: PostEnvelope = self.send(self.request(Method::GET, url)).await?;
        Ok(envelope.into_post())
    }

    async fn list_posts(&self, query: &PostQuery) -> ProviderResult<PostPage> {
        let mut url = self.url(&["v1", "posts"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("page", &query.page.to_string())
                .append_pair("limit", &query.limit.to_string())
                .append_pair("profileId", &query.external_profile_id);
            if let Some(status) = query.status {
                pairs.append_pair("status", status.as_str());
            }
            if let Some(platform) = query.platform {
                pairs.append_pair("platform", platform.as_str());
            }
        }
        self.send(self.request(Method::GET, url)).await
    }

    async fn create_post(&self, payload: &PostPayload) -> ProviderResult<Post> {
        let url = self.url(&["v1", "posts"]);
        let envelope: PostEnvelope = self
            .send(self.request(Method::POST, url).json(payload))
            .await?;
        Ok(envelope.into_post())
    }

    async fn replace_post(&self, post_id: &str, payload: &PostPayload) -> ProviderResult<Post> {
        let url = self.url(&["v1", "posts", post_id]);
        let envelope: PostEnvelope = self
            .send(self.request(Method::PUT, url).json(payload))
            .await?;
        Ok(envelope.into_post())
    }

    async fn delete_post(&self, post_id: &str) -> ProviderResult<()> {
        let url = self.url(&["v1", "posts", post_id]);
        self.send_discarding(self.request(Method::DELETE, url)).await
    }

    async fn list_accounts(&self, external_profile_id: &str) -> ProviderResult<Vec<Account>> {
        let mut url = self.url(&["v1", "accounts"]);
        url.query_pairs_mut()
            .append_pair("profileId", external_profile_id);

        let response: AccountsResponse = self.send(self.request(Method::GET, url)).await?;
        Ok(response
            .accounts
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Account>(raw) {
                Ok(account) => Some(account),
                Err(e) => {
                    debug!(error = %e, "skipping account the engine does not support");
                    None
                }
            })
            .collect())
    }

    async fn delete_account(&self, account_id: &str) -> ProviderResult<()> {
        let url = self.url(&["v1", "accounts", account_id]);
        self.send_discarding(self.request(Method::DELETE, url)).await
    }

    async fn connect_url(
        &self,
        platform: Platform,
        external_profile_id: &str,
        redirect_url: &str,
    ) -> ProviderResult<ConnectUrl> {
        let mut url = self.url(&["v1", "connect", platform.as_str()]);
        url.query_pairs_mut()
            .append_pair("profileId", external_profile_id)
            .append_pair("redirect_url", redirect_url);
        self.send(self.request(Method::GET, url)).await
    }

    async fn list_facebook_pages(
        &self,
        external_profile_id: &str,
        access_token: &SecretString,
    ) -> ProviderResult<Vec<FacebookPage>> {
        let mut url = self.url(&["v1", "connect", "facebook", "select-page"]);
        url.query_pairs_mut()
            .append_pair("profileId", external_profile_id)
            .append_pair("tempToken", access_token.expose_secret());

        let response: PagesResponse = self.send(self.request(Method::GET, url)).await?;
        Ok(response.pages)
    }

    async fn select_facebook_page(
        &self,
        external_profile_id: &str,
        page_id: &str,
        access_token: &SecretString,
    ) -> ProviderResult<PageConnection> {
        let url = self.url(&["v1", "connect", "facebook", "select-page"]);
        let body = json!({
            "profileId": external_profile_id,
            "pageId": page_id,
            "tempToken": access_token.expose_secret(),
        });
        self.send(self.request(Method::POST, url).json(&body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_under_base_path() {
        let provider = HttpProvider::new(
            "https://getlate.dev/api",
            SecretString::from("k".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            provider.url(&["v1", "posts", "a/b"]).as_str(),
            "https://getlate.dev/api/v1/posts/a%2Fb"
        );

        let trailing = HttpProvider::new(
            "https://getlate.dev/api/",
            SecretString::from("k".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            trailing.url(&["v1", "accounts"]).as_str(),
            "https://getlate.dev/api/v1/accounts"
        );
    }

    #[test]
    fn test_status_error_prefers_provider_message() {
        let error = status_error(400, r#"{"error":"Published posts cannot be edited"}"#);
        match error {
            ProviderError::Status { status, message, body } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Published posts cannot be edited");
                assert!(body.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_status_error_reads_graph_style_errors() {
        let error = status_error(
            400,
            r#"{"error":{"message":"Invalid verification code format.","type":"OAuthException"}}"#,
        );
        assert!(error.to_string().contains("Invalid verification code format."));
    }

    #[test]
    fn test_status_error_falls_back_to_text_then_reason() {
        assert!(status_error(502, "upstream exploded").to_string().contains("upstream exploded"));
        assert_eq!(status_error(404, "").to_string(), "HTTP 404: Not Found");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(HttpProvider::new(
            "not a url",
            SecretString::from("k".to_string()),
            Duration::from_secs(1)
        )
        .is_err());
    }
}
