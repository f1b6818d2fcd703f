//! Facebook OAuth client
//!
//! Facebook pages are connected without the provider's hosted flow: the
//! user authorizes our app directly, we trade the code for a user access
//! token, and the provider is handed that token together with the page the
//! user picked.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::FacebookConfig;
use crate::error::{ConfigError, ProviderError, Result};
use crate::provider::http::{build_client, check_status, transport_error};
use crate::provider::ProviderResult;

/// Permissions needed to list pages and post to them
pub const FACEBOOK_SCOPES: [&str; 3] = [
    "pages_show_list",
    "pages_read_engagement",
    "pages_manage_posts",
];

pub const NO_PAGES_HINTS: [&str; 4] = [
    "Make sure you have admin access to at least one Facebook Business page",
    "Personal Facebook profiles cannot be used for posting",
    "Check if your Facebook pages are properly configured as Business pages",
    "Verify you completed the Facebook authorization with page permissions",
];

pub const UNAUTHORIZED_HINTS: [&str; 3] = [
    "The Facebook user access token has expired or is invalid",
    "Try starting the Facebook connection process again",
    "Make sure you granted all required permissions during Facebook OAuth",
];

pub const FORBIDDEN_HINTS: [&str; 3] = [
    "Make sure you have admin access to Facebook Business pages",
    "Verify that pages are Business pages, not personal profiles",
    "Check if your Facebook account has proper page management permissions",
];

pub const PAGE_CONNECT_HINTS: [&str; 3] = [
    "Make sure you have admin access to the selected Facebook page",
    "Verify the page is a Business page, not a personal profile",
    "Try disconnecting and reconnecting your Facebook account",
];

/// Hints for a failed page call: the provider's own list wins, then the
/// 401/403 defaults, then `fallback`
pub fn troubleshooting_for(error: &ProviderError, fallback: &[&str]) -> Vec<String> {
    let supplied: Vec<String> = error
        .body()
        .and_then(|body| body.get("troubleshooting"))
        .and_then(|hints| hints.as_array())
        .map(|hints| {
            hints
                .iter()
                .filter_map(|h| h.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    if !supplied.is_empty() {
        return supplied;
    }

    let defaults: &[&str] = match error.status() {
        Some(401) => &UNAUTHORIZED_HINTS,
        Some(403) => &FORBIDDEN_HINTS,
        _ => fallback,
    };
    defaults.iter().map(|h| h.to_string()).collect()
}

/// The decoded `state` query parameter of a Facebook callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacebookState {
    pub token: String,
    pub external_profile_id: String,
}

pub fn encode_state(token: &str, external_profile_id: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("token", token)
        .append_pair("externalProfileId", external_profile_id)
        .finish();
    URL_SAFE_NO_PAD.encode(query)
}

/// `None` when the value is not one we produced
pub fn decode_state(state: &str) -> Option<FacebookState> {
    let bytes = URL_SAFE_NO_PAD.decode(state.trim()).ok()?;
    let mut token = None;
    let mut external_profile_id = None;

    for (key, value) in url::form_urlencoded::parse(&bytes) {
        match key.as_ref() {
            "token" => token = Some(value.into_owned()),
            "externalProfileId" => external_profile_id = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(FacebookState {
        token: token.filter(|t| !t.is_empty())?,
        external_profile_id: external_profile_id.filter(|id| !id.is_empty())?,
    })
}

/// What the token endpoint handed back
#[derive(Debug)]
pub struct TokenGrant {
    pub access_token: Option<SecretString>,
    pub expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct RawGrant {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Authorization-code exchange with a platform's OAuth server
#[async_trait]
pub trait OAuthExchange: Send + Sync {
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> String;

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> ProviderResult<TokenGrant>;
}

pub struct FacebookOAuth {
    client: reqwest::Client,
    app_id: String,
    app_secret: SecretString,
    dialog_url: Url,
    token_url: Url,
}

impl FacebookOAuth {
    pub fn new(config: &FacebookConfig, app_secret: SecretString, timeout: Duration) -> Result<Self> {
        if config.app_id.trim().is_empty() {
            return Err(ConfigError::MissingField("oauth.facebook.app_id".to_string()).into());
        }

        let dialog_url = Url::parse(&config.dialog_url).map_err(|e| {
            ConfigError::InvalidValue(format!("oauth.facebook.dialog_url: {}", e))
        })?;
        let mut token_url = Url::parse(&config.graph_url).map_err(|e| {
            ConfigError::InvalidValue(format!("oauth.facebook.graph_url: {}", e))
        })?;
        token_url
            .path_segments_mut()
            .map_err(|_| {
                ConfigError::InvalidValue("oauth.facebook.graph_url cannot hold a path".to_string())
            })?
            .pop_if_empty()
            .extend(["oauth", "access_token"]);

        Ok(Self {
            client: build_client(timeout)?,
            app_id: config.app_id.clone(),
            app_secret,
            dialog_url,
            token_url,
        })
    }

    pub fn from_config(config: &FacebookConfig, timeout: Duration) -> Result<Self> {
        Self::new(config, config.app_secret()?, timeout)
    }
}

#[async_trait]
impl OAuthExchange for FacebookOAuth {
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> String {
        let mut url = self.dialog_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.app_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &FACEBOOK_SCOPES.join(","))
            .append_pair("response_type", "code")
            .append_pair("state", state);
        url.into()
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> ProviderResult<TokenGrant> {
        let mut url = self.token_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.app_id)
            .append_pair("client_secret", self.app_secret.expose_secret())
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("code", code);

        debug!(path = url.path(), "exchanging authorization code");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let raw: RawGrant = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(TokenGrant {
            access_token: raw
                .access_token
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            expires_in: raw.expires_in,
        })
    }
}
