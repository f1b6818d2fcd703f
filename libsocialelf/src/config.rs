//! Configuration management for SocialElf

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, SocialElfError};
use crate::profiles::Profile;
use crate::timezone::DEFAULT_TIMEZONE;

pub const CONFIG_ENV: &str = "SOCIALELF_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn api_key(&self) -> Result<SecretString> {
        read_secret(&self.api_key_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Public base URL that OAuth callbacks are sent back to
    #[serde(default = "default_redirect_base_url")]
    pub redirect_base_url: String,
    #[serde(default)]
    pub facebook: Option<FacebookConfig>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            redirect_base_url: default_redirect_base_url(),
            facebook: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    pub app_id: String,
    #[serde(default = "default_app_secret_env")]
    pub app_secret_env: String,
    #[serde(default = "default_dialog_url")]
    pub dialog_url: String,
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
}

impl FacebookConfig {
    pub fn app_secret(&self) -> Result<SecretString> {
        read_secret(&self.app_secret_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_state_ttl_secs")]
    pub state_ttl_secs: u64,
    /// Where pending flow states are kept between CLI invocations
    #[serde(default)]
    pub state_file: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            state_ttl_secs: default_state_ttl_secs(),
            state_file: None,
        }
    }
}

impl ConnectionConfig {
    pub fn state_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.state_ttl_secs as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub profile: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            profile: None,
        }
    }
}

fn default_base_url() -> String {
    "https://getlate.dev/api".to_string()
}

fn default_api_key_env() -> String {
    "SOCIALELF_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_redirect_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_app_secret_env() -> String {
    "FACEBOOK_APP_SECRET".to_string()
}

fn default_dialog_url() -> String {
    "https://www.facebook.com/v18.0/dialog/oauth".to_string()
}

fn default_graph_url() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}

fn default_state_ttl_secs() -> u64 {
    600
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn read_secret(var: &str) -> Result<SecretString> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value.trim().to_string())),
        _ => Err(ConfigError::MissingField(format!("environment variable {}", var)).into()),
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.provider.base_url).map_err(|e| {
            ConfigError::InvalidValue(format!("provider.base_url '{}': {}", self.provider.base_url, e))
        })?;
        url::Url::parse(&self.oauth.redirect_base_url).map_err(|e| {
            ConfigError::InvalidValue(format!(
                "oauth.redirect_base_url '{}': {}",
                self.oauth.redirect_base_url, e
            ))
        })?;

        let mut seen = std::collections::HashSet::new();
        for profile in &self.profiles {
            if !seen.insert(profile.id.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "profile '{}' is defined more than once",
                    profile.id
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Profile to act as when the caller names none
    pub fn default_profile(&self) -> Option<&str> {
        self.defaults
            .profile
            .as_deref()
            .or_else(|| match self.profiles.as_slice() {
                [only] => Some(only.id.as_str()),
                _ => None,
            })
    }

    /// The profile named on the command line, or the configured default
    pub fn select_profile(&self, requested: Option<&str>) -> Result<String> {
        requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or_else(|| self.default_profile())
            .map(str::to_string)
            .ok_or_else(|| {
                SocialElfError::Validation(
                    "No profile selected. Pass --profile or set defaults.profile in the config"
                        .to_string(),
                )
            })
    }

    /// Location of the persisted flow-state ledger
    pub fn state_file_path(&self) -> Result<PathBuf> {
        match &self.connection.state_file {
            Some(path) => Ok(PathBuf::from(shellexpand::tilde(path).to_string())),
            None => Ok(resolve_data_path()?.join("flow-state.json")),
        }
    }
}

/// Resolve the configuration file path following the XDG Base Directory layout
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("socialelf").join("config.toml"))
}

/// Resolve the data directory path following the XDG Base Directory layout
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("socialelf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let file = write_config("");
        let config = Config::load_from_path(file.path()).unwrap();

        assert_eq!(config.provider.base_url, "https://getlate.dev/api");
        assert_eq!(config.provider.timeout(), Duration::from_secs(10));
        assert_eq!(config.defaults.timezone, "America/New_York");
        assert_eq!(config.connection.state_ttl(), chrono::Duration::seconds(600));
        assert!(config.oauth.facebook.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let file = write_config(
            r#"
[provider]
base_url = "http://127.0.0.1:9999/api"
api_key_env = "MY_KEY"
timeout_secs = 3

[oauth]
redirect_base_url = "https://elf.example.com"

[oauth.facebook]
app_id = "1234"

[connection]
state_ttl_secs = 120
state_file = "/tmp/elf-state.json"

[defaults]
timezone = "Europe/Berlin"
profile = "main"

[[profiles]]
id = "main"
external_id = "prof_abc"
timezone = "Europe/Berlin"

[[profiles]]
id = "side"
"#,
        );
        let config = Config::load_from_path(file.path()).unwrap();

        assert_eq!(config.provider.api_key_env, "MY_KEY");
        assert_eq!(config.provider.timeout(), Duration::from_secs(3));
        let facebook = config.oauth.facebook.as_ref().unwrap();
        assert_eq!(facebook.app_id, "1234");
        assert_eq!(facebook.app_secret_env, "FACEBOOK_APP_SECRET");
        assert!(facebook.graph_url.starts_with("https://graph.facebook.com"));
        assert_eq!(config.profiles.len(), 2);
        assert_eq!(config.profiles[0].external_id.as_deref(), Some("prof_abc"));
        assert!(config.profiles[1].external_id.is_none());
        assert_eq!(config.default_profile(), Some("main"));
        assert_eq!(
            config.state_file_path().unwrap(),
            PathBuf::from("/tmp/elf-state.json")
        );
    }

    #[test]
    fn test_duplicate_profiles_rejected() {
        let file = write_config(
            r#"
[[profiles]]
id = "main"

[[profiles]]
id = "main"
"#,
        );
        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("defined more than once"));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let file = write_config("[provider]\nbase_url = \"not a url\"\n");
        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("provider.base_url"));
    }

    #[test]
    fn test_single_profile_is_default() {
        let file = write_config("[[profiles]]\nid = \"solo\"\n");
        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.default_profile(), Some("solo"));
    }

    #[test]
    fn test_select_profile_prefers_request() {
        let file = write_config("[[profiles]]\nid = \"a\"\n\n[[profiles]]\nid = \"b\"\n");
        let config = Config::load_from_path(file.path()).unwrap();

        assert_eq!(config.select_profile(Some("b")).unwrap(), "b");
        assert!(matches!(
            config.select_profile(None),
            Err(SocialElfError::Validation(_))
        ));
        assert!(config.select_profile(Some("  ")).is_err());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = Config::load_from_path(Path::new("/nonexistent/socialelf.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    #[serial]
    fn test_config_path_from_env() {
        std::env::set_var(CONFIG_ENV, "/tmp/custom-elf.toml");
        assert_eq!(
            resolve_config_path().unwrap(),
            PathBuf::from("/tmp/custom-elf.toml")
        );
        std::env::remove_var(CONFIG_ENV);
    }

    #[test]
    #[serial]
    fn test_api_key_read_from_named_variable() {
        let provider = ProviderConfig {
            api_key_env: "SOCIALELF_TEST_KEY".to_string(),
            ..ProviderConfig::default()
        };

        std::env::remove_var("SOCIALELF_TEST_KEY");
        assert!(provider.api_key().is_err());

        std::env::set_var("SOCIALELF_TEST_KEY", " sk_live_123 ");
        assert_eq!(provider.api_key().unwrap().expose_secret(), "sk_live_123");
        std::env::remove_var("SOCIALELF_TEST_KEY");
    }
}
