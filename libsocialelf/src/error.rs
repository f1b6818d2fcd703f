//! Error types for SocialElf

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Platform;

pub type Result<T> = std::result::Result<T, SocialElfError>;

#[derive(Error, Debug)]
pub enum SocialElfError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Platform options rejected: {}", format_issues(.0))]
    PlatformValidation(Vec<PlatformIssue>),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("No connected {platform} account found for this profile")]
    AccountNotConnected { platform: Platform },

    #[error("Post {post_id} cannot be modified: {reason}")]
    PostLocked { post_id: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to fetch from provider: {0}")]
    UpstreamFetch(ProviderError),

    #[error("Provider rejected the write: {0}")]
    UpstreamWrite(ProviderError),

    #[error("Provider did not respond in time: {0}")]
    UpstreamTimeout(String),

    #[error("Connection failed: {0}")]
    Connection(#[from] ConnectionFailure),

    #[error("State file error: {0}")]
    StateFile(String),
}

impl SocialElfError {
    /// Translate a provider failure that happened while reading
    pub fn fetch(error: ProviderError) -> Self {
        match error {
            ProviderError::Timeout(message) => SocialElfError::UpstreamTimeout(message),
            other => SocialElfError::UpstreamFetch(other),
        }
    }

    /// Translate a provider failure that happened while writing
    pub fn write(error: ProviderError) -> Self {
        match error {
            ProviderError::Timeout(message) => SocialElfError::UpstreamTimeout(message),
            other => SocialElfError::UpstreamWrite(other),
        }
    }

    /// Machine-readable classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SocialElfError::Config(_) | SocialElfError::StateFile(_) => ErrorKind::ConfigError,
            SocialElfError::Validation(_) | SocialElfError::PlatformValidation(_) => {
                ErrorKind::ValidationError
            }
            SocialElfError::ProfileNotFound(_) => ErrorKind::ProfileNotFound,
            SocialElfError::AccountNotConnected { .. } => ErrorKind::AccountNotConnected,
            SocialElfError::PostLocked { .. } => ErrorKind::PostLocked,
            SocialElfError::NotFound(_) => ErrorKind::NotFound,
            SocialElfError::UpstreamFetch(_) => ErrorKind::UpstreamFetchError,
            SocialElfError::UpstreamWrite(_) => ErrorKind::UpstreamWriteError,
            SocialElfError::UpstreamTimeout(_) => ErrorKind::UpstreamTimeout,
            SocialElfError::Connection(failure) => ErrorKind::Connection(failure.reason),
        }
    }

    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SocialElfError::Validation(_)
            | SocialElfError::PlatformValidation(_)
            | SocialElfError::ProfileNotFound(_) => 3,
            SocialElfError::AccountNotConnected { .. } | SocialElfError::Connection(_) => 2,
            _ => 1,
        }
    }
}

/// Stable error codes exposed to callers (CLI JSON output, events)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigError,
    ValidationError,
    ProfileNotFound,
    AccountNotConnected,
    PostLocked,
    NotFound,
    UpstreamFetchError,
    UpstreamWriteError,
    UpstreamTimeout,
    Connection(FailureReason),
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ConfigError => "config_error",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::ProfileNotFound => "profile_not_found",
            ErrorKind::AccountNotConnected => "account_not_connected",
            ErrorKind::PostLocked => "post_locked",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UpstreamFetchError => "upstream_fetch_error",
            ErrorKind::UpstreamWriteError => "upstream_write_error",
            ErrorKind::UpstreamTimeout => "upstream_timeout",
            ErrorKind::Connection(reason) => reason.code(),
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Failure talking to the posting provider or an OAuth endpoint
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Non-2xx response; `message` is the provider's `error` field when present
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The provider's error body, when it sent JSON
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            ProviderError::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// True for a 400 whose message contains `phrase` (case-insensitive)
    pub fn is_bad_request_mentioning(&self, phrase: &str) -> bool {
        match self {
            ProviderError::Status {
                status: 400,
                message,
                ..
            } => message.to_lowercase().contains(&phrase.to_lowercase()),
            _ => false,
        }
    }
}

/// A platform-specific option set that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformIssue {
    pub platform: Platform,
    pub message: String,
}

impl PlatformIssue {
    pub fn new(platform: Platform, message: impl Into<String>) -> Self {
        Self {
            platform,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PlatformIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.platform, self.message)
    }
}

fn format_issues(issues: &[PlatformIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reason codes for a failed connection flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// State parameter missing, undecodable, unknown, expired or mismatched
    InvalidState,
    /// Token endpoint answered without an access token
    NoAccessToken,
    /// Callback carried neither a success indicator nor an error code
    UnclearCallback,
    /// The state token was already used by an earlier completion
    StateAlreadyConsumed,
    /// The user or the platform declined the authorization
    ProviderDenied,
    /// Token endpoint returned a non-2xx response
    TokenExchangeFailed,
    /// Listing the connectable pages failed
    PageListingFailed,
    /// The provider refused to connect the selected page
    PageConnectFailed,
    /// The platform requires the user's own API keys
    ByokRequired,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::InvalidState => "invalid_state",
            FailureReason::NoAccessToken => "no_access_token",
            FailureReason::UnclearCallback => "unclear_callback",
            FailureReason::StateAlreadyConsumed => "state_already_consumed",
            FailureReason::ProviderDenied => "provider_denied",
            FailureReason::TokenExchangeFailed => "token_exchange_failed",
            FailureReason::PageListingFailed => "page_listing_failed",
            FailureReason::PageConnectFailed => "page_connect_failed",
            FailureReason::ByokRequired => "byok_required",
        }
    }

    /// Whether restarting the authorization can fix this failure
    pub fn requires_reauthorization(&self) -> bool {
        match self {
            FailureReason::InvalidState
            | FailureReason::NoAccessToken
            | FailureReason::UnclearCallback
            | FailureReason::StateAlreadyConsumed
            | FailureReason::ProviderDenied
            | FailureReason::TokenExchangeFailed
            | FailureReason::PageListingFailed => true,
            FailureReason::PageConnectFailed | FailureReason::ByokRequired => false,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Terminal failure of a connection flow
#[derive(Error, Debug, Clone, Serialize)]
#[error("{reason}: {message}")]
pub struct ConnectionFailure {
    pub reason: FailureReason,
    pub platform: Platform,
    pub message: String,
    /// Platform-specific hints for the user, preserved from the provider when given
    pub troubleshooting: Vec<String>,
}

impl ConnectionFailure {
    pub fn new(reason: FailureReason, platform: Platform, message: impl Into<String>) -> Self {
        Self {
            reason,
            platform,
            message: message.into(),
            troubleshooting: Vec::new(),
        }
    }

    pub fn with_hints(mut self, hints: Vec<String>) -> Self {
        self.troubleshooting = hints;
        self
    }
}
