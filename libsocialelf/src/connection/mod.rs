//! Connecting social accounts to a profile
//!
//! Most platforms use the provider's hosted authorization: we ask it for an
//! authorize URL, send the user there, and the provider calls us back with
//! `connected` and `username` once the account exists.
//!
//! Facebook needs a page choice, so it runs through our own app:
//!
//! ```text
//! Init -> RedirectIssued -> CodeReceived -> TokenExchanged
//!      -> PagesListed -> PageSelected -> Connected
//! ```
//!
//! Every redirect carries a single-use state token. Any step can end in a
//! [`ConnectionFailure`] whose [`FailureReason`] tells the caller whether a
//! fresh attempt can help.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::accounts::AccountResolver;
use crate::error::{
    ConfigError, ConnectionFailure, FailureReason, ProviderError, Result, SocialElfError,
};
use crate::profiles::{Profile, ProfileDirectory};
use crate::provider::{FacebookPage, PageConnection, PostingProvider};
use crate::service::events::{Event, EventBus};
use crate::types::{Account, Platform};

pub mod facebook;
pub mod state;

pub use facebook::{FacebookOAuth, OAuthExchange};
pub use state::{
    ConnectionFlowState, FlowStateStore, PageSelectionSession, TokenError, TokenLedger,
};

/// Where a flow is, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Init,
    RedirectIssued,
    CallbackReceived,
    CodeReceived,
    TokenExchanged,
    PagesListed,
    PageSelected,
    Connected,
}

impl std::fmt::Display for FlowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FlowStage::Init => "init",
            FlowStage::RedirectIssued => "redirect_issued",
            FlowStage::CallbackReceived => "callback_received",
            FlowStage::CodeReceived => "code_received",
            FlowStage::TokenExchanged => "token_exchanged",
            FlowStage::PagesListed => "pages_listed",
            FlowStage::PageSelected => "page_selected",
            FlowStage::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Where to send the user next
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStart {
    pub platform: Platform,
    pub auth_url: String,
    pub state: String,
}

/// Query parameters of an authorization callback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
    pub connected: Option<String>,
    pub username: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    /// Anything else, kept for diagnostics
    pub other: BTreeMap<String, String>,
}

impl CallbackParams {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = Some(value.into()).filter(|v: &String| !v.is_empty());
            match key.as_ref() {
                "state" => params.state = value,
                "code" => params.code = value,
                "connected" => params.connected = value,
                "username" => params.username = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                other => {
                    if let Some(value) = value {
                        params.other.insert(other.to_string(), value);
                    }
                }
            }
        }
        params
    }

    /// Parse the full callback URL the browser landed on
    pub fn from_url(callback_url: &str) -> Result<Self> {
        let url = Url::parse(callback_url.trim()).map_err(|e| {
            SocialElfError::Validation(format!("Invalid callback URL '{}': {}", callback_url, e))
        })?;
        Ok(Self::from_pairs(url.query_pairs().into_owned()))
    }

    /// Parameter names present, without values
    fn present(&self) -> Vec<&str> {
        let mut names: Vec<&str> = [
            ("state", &self.state),
            ("code", &self.code),
            ("connected", &self.connected),
            ("username", &self.username),
            ("error", &self.error),
            ("error_description", &self.error_description),
        ]
        .iter()
        .filter(|(_, value)| value.is_some())
        .map(|(name, _)| *name)
        .collect();
        names.extend(self.other.keys().map(String::as_str));
        names
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackOutcome {
    Connected {
        platform: Platform,
        username: String,
    },
    /// Facebook: the user now picks a page using this handle
    PageSelectionRequired {
        temp_token: String,
        expires_in: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageListing {
    pub pages: Vec<FacebookPage>,
    /// Set when no pages came back
    pub troubleshooting: Vec<String>,
    /// False once the session is closed and the flow must restart
    pub session_open: bool,
}

pub struct ConnectionFlowController {
    provider: Arc<dyn PostingProvider>,
    profiles: Arc<dyn ProfileDirectory>,
    accounts: AccountResolver,
    facebook: Option<Arc<dyn OAuthExchange>>,
    flows: FlowStateStore,
    sessions: TokenLedger<PageSelectionSession>,
    redirect_base: Url,
    events: EventBus,
}

impl ConnectionFlowController {
    pub fn new(
        provider: Arc<dyn PostingProvider>,
        profiles: Arc<dyn ProfileDirectory>,
        flows: FlowStateStore,
        redirect_base_url: &str,
        events: EventBus,
    ) -> Result<Self> {
        let redirect_base = Url::parse(redirect_base_url).map_err(|e| {
            ConfigError::InvalidValue(format!("redirect base URL '{}': {}", redirect_base_url, e))
        })?;
        if redirect_base.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue(format!(
                "redirect base URL '{}' cannot hold a path",
                redirect_base_url
            ))
            .into());
        }

        let ttl = flows.ttl();
        Ok(Self {
            accounts: AccountResolver::new(provider.clone()),
            provider,
            profiles,
            facebook: None,
            flows,
            sessions: TokenLedger::new(ttl),
            redirect_base,
            events,
        })
    }

    pub fn with_facebook(mut self, oauth: Arc<dyn OAuthExchange>) -> Self {
        self.facebook = Some(oauth);
        self
    }

    /// `{base}/api/profiles/{id}/connect/{platform}/callback`
    pub fn callback_url(&self, profile_id: &str, platform: Platform) -> String {
        let mut url = self.redirect_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend([
                "api",
                "profiles",
                profile_id,
                "connect",
                platform.as_str(),
                "callback",
            ]);
        }
        url.into()
    }

    /// Issue a state token and produce the authorize URL
    pub async fn initiate(&self, profile_id: &str, platform: Platform) -> Result<ConnectionStart> {
        let profile = self.profiles.profile(profile_id).await?;
        let external_id = profile.external_id()?.to_string();
        debug!(profile_id, %platform, stage = %FlowStage::Init, "starting connection");

        let oauth = if platform.requires_page_selection() {
            Some(self.facebook.as_ref().ok_or_else(|| {
                ConfigError::MissingField("oauth.facebook".to_string())
            })?)
        } else {
            None
        };

        let token = self.flows.issue(ConnectionFlowState {
            profile_id: profile_id.to_string(),
            external_profile_id: external_id.clone(),
            platform,
            issued_at: Utc::now(),
        })?;
        let redirect_uri = self.callback_url(profile_id, platform);

        let auth_url = match oauth {
            Some(oauth) => {
                oauth.authorize_url(&facebook::encode_state(&token, &external_id), &redirect_uri)
            }
            None => {
                self.provider_auth_url(platform, &external_id, &redirect_uri, &token)
                    .await?
            }
        };

        info!(profile_id, %platform, stage = %FlowStage::RedirectIssued, "authorization redirect issued");
        self.events.emit(Event::ConnectionStarted {
            profile_id: profile_id.to_string(),
            platform,
        });

        Ok(ConnectionStart {
            platform,
            auth_url,
            state: token,
        })
    }

    async fn provider_auth_url(
        &self,
        platform: Platform,
        external_id: &str,
        redirect_uri: &str,
        token: &str,
    ) -> Result<String> {
        let mut redirect = Url::parse(redirect_uri)
            .map_err(|e| ConfigError::InvalidValue(format!("callback URL: {}", e)))?;
        redirect.query_pairs_mut().append_pair("state", token);

        let response = self
            .provider
            .connect_url(platform, external_id, redirect.as_str())
            .await
            .map_err(|e| {
                if is_byok_refusal(&e) {
                    self.fail(
                        ConnectionFailure::new(
                            FailureReason::ByokRequired,
                            platform,
                            format!("{} requires your own API keys before it can be connected", platform),
                        ),
                        FlowStage::Init,
                    )
                } else {
                    SocialElfError::fetch(e)
                }
            })?;

        response
            .auth_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                SocialElfError::UpstreamFetch(ProviderError::Decode(
                    "connect response carried no authUrl".to_string(),
                ))
            })
    }

    /// Handle the browser's return from the authorization page
    pub async fn complete_callback(
        &self,
        profile_id: &str,
        platform: Platform,
        params: &CallbackParams,
    ) -> Result<CallbackOutcome> {
        debug!(
            profile_id,
            %platform,
            stage = %FlowStage::CallbackReceived,
            params = ?params.present(),
            "callback received"
        );

        if platform.requires_page_selection() {
            self.complete_facebook_callback(profile_id, params).await
        } else {
            self.complete_hosted_callback(profile_id, platform, params)
        }
    }

    fn complete_hosted_callback(
        &self,
        profile_id: &str,
        platform: Platform,
        params: &CallbackParams,
    ) -> Result<CallbackOutcome> {
        let token = params.state.as_deref().ok_or_else(|| {
            self.fail(
                ConnectionFailure::new(
                    FailureReason::InvalidState,
                    platform,
                    "Callback is missing its state parameter",
                ),
                FlowStage::CallbackReceived,
            )
        })?;

        let flow = self
            .flows
            .consume(token, Utc::now())?
            .map_err(|e| self.fail(token_failure(e, platform), FlowStage::CallbackReceived))?;
        if flow.profile_id != profile_id || flow.platform != platform {
            return Err(self.fail(
                ConnectionFailure::new(
                    FailureReason::InvalidState,
                    platform,
                    "State was issued for a different profile or platform",
                ),
                FlowStage::CallbackReceived,
            ));
        }

        if let Some(error) = &params.error {
            return Err(self.fail(denied(platform, error, params), FlowStage::CallbackReceived));
        }

        match (&params.connected, &params.username) {
            (Some(_), Some(username)) => {
                info!(profile_id, %platform, username = %username, stage = %FlowStage::Connected, "account connected");
                self.events.emit(Event::ConnectionEstablished {
                    profile_id: profile_id.to_string(),
                    platform,
                    account: Some(username.clone()),
                });
                Ok(CallbackOutcome::Connected {
                    platform,
                    username: username.clone(),
                })
            }
            _ => {
                warn!(
                    profile_id,
                    %platform,
                    connected = ?params.connected,
                    username = ?params.username,
                    other = ?params.other,
                    "callback carried no result"
                );
                Err(self.fail(
                    ConnectionFailure::new(
                        FailureReason::UnclearCallback,
                        platform,
                        "The connection result is unclear; please try again",
                    ),
                    FlowStage::CallbackReceived,
                ))
            }
        }
    }

    async fn complete_facebook_callback(
        &self,
        profile_id: &str,
        params: &CallbackParams,
    ) -> Result<CallbackOutcome> {
        let platform = Platform::Facebook;
        let decoded = params.state.as_deref().and_then(facebook::decode_state);

        if let Some(error) = &params.error {
            if let Some(state) = &decoded {
                // Retire the state so the denied flow cannot be replayed
                let _ = self.flows.consume(&state.token, Utc::now())?;
            }
            return Err(self.fail(denied(platform, error, params), FlowStage::CallbackReceived));
        }

        let invalid = |message: &str| {
            self.fail(
                ConnectionFailure::new(FailureReason::InvalidState, platform, message),
                FlowStage::CallbackReceived,
            )
        };

        let state = decoded.ok_or_else(|| invalid("Callback state is missing or malformed"))?;
        let flow = self
            .flows
            .consume(&state.token, Utc::now())?
            .map_err(|e| self.fail(token_failure(e, platform), FlowStage::CallbackReceived))?;

        if flow.platform != platform
            || flow.profile_id != profile_id
            || flow.external_profile_id != state.external_profile_id
        {
            return Err(invalid("State does not match the flow it claims to belong to"));
        }
        let profile = self.profiles.profile(profile_id).await?;
        if profile.external_id.as_deref() != Some(state.external_profile_id.as_str()) {
            return Err(invalid("State does not match the profile"));
        }

        let code = params.code.as_deref().ok_or_else(|| {
            self.fail(
                ConnectionFailure::new(
                    FailureReason::UnclearCallback,
                    platform,
                    "No authorization code received from Facebook",
                ),
                FlowStage::CallbackReceived,
            )
        })?;
        debug!(profile_id, stage = %FlowStage::CodeReceived, "authorization code received");

        let oauth = self
            .facebook
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("oauth.facebook".to_string()))?;
        let redirect_uri = self.callback_url(profile_id, platform);
        let grant = oauth.exchange_code(code, &redirect_uri).await.map_err(|e| {
            self.fail(
                ConnectionFailure::new(
                    FailureReason::TokenExchangeFailed,
                    platform,
                    format!("Facebook token exchange failed: {}", e),
                ),
                FlowStage::CodeReceived,
            )
        })?;

        let access_token = grant.access_token.ok_or_else(|| {
            self.fail(
                ConnectionFailure::new(
                    FailureReason::NoAccessToken,
                    platform,
                    "Facebook did not return an access token",
                ),
                FlowStage::CodeReceived,
            )
        })?;

        let temp_token = self.sessions.issue(
            PageSelectionSession {
                profile_id: profile_id.to_string(),
                external_profile_id: flow.external_profile_id,
                access_token,
            },
            Utc::now(),
        );
        info!(
            profile_id,
            expires_in = ?grant.expires_in,
            stage = %FlowStage::TokenExchanged,
            "facebook user token obtained"
        );

        Ok(CallbackOutcome::PageSelectionRequired {
            temp_token,
            expires_in: grant.expires_in,
        })
    }

    /// Pages the authorized user can connect.
    ///
    /// An empty list closes the session: the user has to fix their page
    /// access on Facebook and start over.
    pub async fn list_connectable_pages(
        &self,
        profile_id: &str,
        temp_token: &str,
    ) -> Result<PageListing> {
        let platform = Platform::Facebook;
        let (external_id, access_token) = self
            .sessions
            .inspect(temp_token, Utc::now(), |session| {
                (
                    session.profile_id.clone(),
                    session.external_profile_id.clone(),
                    SecretString::from(session.access_token.expose_secret().to_string()),
                )
            })
            .map_err(|e| self.fail(token_failure(e, platform), FlowStage::TokenExchanged))
            .and_then(|(owner, external_id, token)| {
                self.check_session_owner(&owner, profile_id, FlowStage::TokenExchanged)?;
                Ok((external_id, token))
            })?;

        let pages = match self
            .provider
            .list_facebook_pages(&external_id, &access_token)
            .await
        {
            Ok(pages) => pages,
            Err(e) => {
                self.sessions.discard(temp_token);
                let hints = facebook::troubleshooting_for(&e, &facebook::FORBIDDEN_HINTS);
                return Err(self.fail(
                    ConnectionFailure::new(
                        FailureReason::PageListingFailed,
                        platform,
                        format!("Failed to fetch Facebook pages: {}", provider_message(&e)),
                    )
                    .with_hints(hints),
                    FlowStage::TokenExchanged,
                ));
            }
        };

        if pages.is_empty() {
            self.sessions.discard(temp_token);
            info!(profile_id, stage = %FlowStage::PagesListed, "no facebook pages available");
            return Ok(PageListing {
                pages,
                troubleshooting: facebook::NO_PAGES_HINTS
                    .iter()
                    .map(|h| h.to_string())
                    .collect(),
                session_open: false,
            });
        }

        debug!(profile_id, count = pages.len(), stage = %FlowStage::PagesListed, "facebook pages listed");
        Ok(PageListing {
            pages,
            troubleshooting: Vec::new(),
            session_open: true,
        })
    }

    /// Connect the chosen page, consuming the selection session
    pub async fn finalize_connection(
        &self,
        profile_id: &str,
        page_id: &str,
        temp_token: &str,
    ) -> Result<PageConnection> {
        let platform = Platform::Facebook;
        if page_id.trim().is_empty() {
            return Err(SocialElfError::Validation(
                "A Facebook page must be selected".to_string(),
            ));
        }

        let session = self
            .sessions
            .consume(temp_token, Utc::now())
            .map_err(|e| self.fail(token_failure(e, platform), FlowStage::PagesListed))?;
        self.check_session_owner(&session.profile_id, profile_id, FlowStage::PagesListed)?;
        debug!(profile_id, page_id, stage = %FlowStage::PageSelected, "page selected");

        let connection = self
            .provider
            .select_facebook_page(&session.external_profile_id, page_id, &session.access_token)
            .await
            .map_err(|e| {
                let hints = facebook::troubleshooting_for(&e, &facebook::PAGE_CONNECT_HINTS);
                self.fail(
                    ConnectionFailure::new(
                        FailureReason::PageConnectFailed,
                        platform,
                        format!("Facebook connection error: {}", provider_message(&e)),
                    )
                    .with_hints(hints),
                    FlowStage::PageSelected,
                )
            })?;

        info!(profile_id, page_id, stage = %FlowStage::Connected, "facebook page connected");
        self.events.emit(Event::ConnectionEstablished {
            profile_id: profile_id.to_string(),
            platform,
            account: connection
                .account
                .as_ref()
                .map(|account| account.label().to_string()),
        });
        Ok(connection)
    }

    pub async fn list_connections(&self, profile_id: &str) -> Result<Vec<Account>> {
        let profile = self.profiles.profile(profile_id).await?;
        self.accounts.accounts(&profile).await
    }

    /// Remove an account from the profile
    pub async fn disconnect(&self, profile_id: &str, account_id: &str) -> Result<()> {
        let profile: Profile = self.profiles.profile(profile_id).await?;
        let accounts = self.accounts.accounts(&profile).await?;
        if !accounts.iter().any(|account| account.id == account_id) {
            return Err(SocialElfError::NotFound(format!(
                "account {} under profile {}",
                account_id, profile_id
            )));
        }

        self.provider
            .delete_account(account_id)
            .await
            .map_err(|e| match e.status() {
                Some(404) => SocialElfError::NotFound(format!("account {}", account_id)),
                _ => SocialElfError::write(e),
            })?;

        info!(profile_id, account_id, "account disconnected");
        self.events.emit(Event::ConnectionRemoved {
            profile_id: profile_id.to_string(),
            account_id: account_id.to_string(),
        });
        Ok(())
    }

    fn check_session_owner(&self, owner: &str, profile_id: &str, stage: FlowStage) -> Result<()> {
        if owner == profile_id {
            return Ok(());
        }
        Err(self.fail(
            ConnectionFailure::new(
                FailureReason::InvalidState,
                Platform::Facebook,
                "Page selection session belongs to a different profile",
            ),
            stage,
        ))
    }

    fn fail(&self, failure: ConnectionFailure, stage: FlowStage) -> SocialElfError {
        warn!(
            platform = %failure.platform,
            reason = %failure.reason,
            stage = %stage,
            "connection failed: {}",
            failure.message
        );
        self.events.emit(Event::ConnectionFailed {
            platform: failure.platform,
            reason: failure.reason,
            message: failure.message.clone(),
        });
        failure.into()
    }
}

fn token_failure(error: TokenError, platform: Platform) -> ConnectionFailure {
    match error {
        TokenError::AlreadyConsumed => ConnectionFailure::new(
            FailureReason::StateAlreadyConsumed,
            platform,
            "This authorization was already completed",
        ),
        TokenError::Expired => ConnectionFailure::new(
            FailureReason::InvalidState,
            platform,
            "The authorization took too long; please start again",
        ),
        TokenError::Unknown => ConnectionFailure::new(
            FailureReason::InvalidState,
            platform,
            "Unknown authorization state",
        ),
    }
}

fn denied(platform: Platform, error: &str, params: &CallbackParams) -> ConnectionFailure {
    let message = match &params.error_description {
        Some(description) => format!("{}: {}", error, description),
        None => error.to_string(),
    };
    ConnectionFailure::new(FailureReason::ProviderDenied, platform, message)
}

fn provider_message(error: &ProviderError) -> String {
    match error {
        ProviderError::Status { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// 403 flagged `requiresByok`, or whose message mentions BYOK
fn is_byok_refusal(error: &ProviderError) -> bool {
    if error.status() != Some(403) {
        return false;
    }
    let flagged = error
        .body()
        .and_then(|body| body.get("requiresByok"))
        .and_then(|flag| flag.as_bool())
        .unwrap_or(false);
    let mentioned = match error {
        ProviderError::Status { message, .. } => message.contains("BYOK"),
        _ => false,
    };
    flagged || mentioned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::StaticProfiles;
    use crate::provider::mock::MockProvider;
    use serde_json::json;

    fn controller(mock: &MockProvider) -> ConnectionFlowController {
        let profiles = StaticProfiles::new(vec![Profile::new("main", "prof_1")]);
        ConnectionFlowController::new(
            Arc::new(mock.clone()),
            Arc::new(profiles),
            FlowStateStore::in_memory(chrono::Duration::seconds(600)),
            "http://localhost:3000",
            EventBus::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_callback_url_layout() {
        let controller = controller(&MockProvider::new());
        assert_eq!(
            controller.callback_url("main", Platform::Linkedin),
            "http://localhost:3000/api/profiles/main/connect/linkedin/callback"
        );
    }

    #[test]
    fn test_callback_params_from_url() {
        let params = CallbackParams::from_url(
            "http://localhost:3000/cb?state=abc&connected=true&username=elf&extra=1&error=",
        )
        .unwrap();
        assert_eq!(params.state.as_deref(), Some("abc"));
        assert_eq!(params.username.as_deref(), Some("elf"));
        assert!(params.error.is_none());
        assert_eq!(params.other.get("extra").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_byok_detection() {
        let flagged = ProviderError::Status {
            status: 403,
            message: "Forbidden".to_string(),
            body: Some(json!({"error": "Forbidden", "requiresByok": true})),
        };
        let mentioned = ProviderError::Status {
            status: 403,
            message: "Twitter requires BYOK".to_string(),
            body: None,
        };
        let other = ProviderError::Status {
            status: 401,
            message: "BYOK".to_string(),
            body: None,
        };
        assert!(is_byok_refusal(&flagged));
        assert!(is_byok_refusal(&mentioned));
        assert!(!is_byok_refusal(&other));
    }

    #[tokio::test]
    async fn test_hosted_flow_connects() {
        let mock = MockProvider::new();
        let controller = controller(&mock);

        let start = controller.initiate("main", Platform::Twitter).await.unwrap();
        assert!(start.auth_url.starts_with("https://auth.example.com/twitter"));

        let params = CallbackParams::from_pairs([
            ("state", start.state.as_str()),
            ("connected", "true"),
            ("username", "elf"),
        ]);
        let outcome = controller
            .complete_callback("main", Platform::Twitter, &params)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CallbackOutcome::Connected {
                platform: Platform::Twitter,
                username: "elf".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unclear_callback_fails_closed() {
        let controller = controller(&MockProvider::new());
        let start = controller.initiate("main", Platform::Tiktok).await.unwrap();

        let params = CallbackParams::from_pairs([("state", start.state.as_str()), ("foo", "bar")]);
        let err = controller
            .complete_callback("main", Platform::Tiktok, &params)
            .await
            .unwrap_err();
        assert_eq!(err.kind().code(), "unclear_callback");
    }

    #[tokio::test]
    async fn test_facebook_without_oauth_config_is_config_error() {
        let controller = controller(&MockProvider::new());
        let err = controller
            .initiate("main", Platform::Facebook)
            .await
            .unwrap_err();
        assert!(matches!(err, SocialElfError::Config(_)));
    }
}
