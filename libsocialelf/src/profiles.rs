//! Profile lookup
//!
//! Profiles live outside this crate (user accounts, workspaces). The engine
//! only needs to map a local profile id to the provider's profile id and the
//! acting user's timezone.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SocialElfError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    /// Provider profile id; absent until the profile is synced
    #[serde(default, alias = "externalId")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Profile {
    pub fn new(id: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external_id: Some(external_id.into()),
            timezone: None,
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// The provider profile id, required for every provider call
    pub fn external_id(&self) -> Result<&str> {
        self.external_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                SocialElfError::Validation(format!(
                    "Profile '{}' is not synced with the posting provider",
                    self.id
                ))
            })
    }
}

/// The caller a write is performed for, with their current timezone
#[derive(Debug, Clone)]
pub struct ActingProfile {
    pub profile: Profile,
    pub timezone: Tz,
}

impl ActingProfile {
    pub fn external_id(&self) -> Result<&str> {
        self.profile.external_id()
    }
}

#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn profile(&self, profile_id: &str) -> Result<Profile>;
}

/// Profiles declared in the config file
#[derive(Debug, Clone, Default)]
pub struct StaticProfiles {
    profiles: HashMap<String, Profile>,
}

impl StaticProfiles {
    pub fn new(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileDirectory for StaticProfiles {
    async fn profile(&self, profile_id: &str) -> Result<Profile> {
        self.profiles
            .get(profile_id)
            .cloned()
            .ok_or_else(|| SocialElfError::ProfileNotFound(profile_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_known_and_unknown() {
        let directory = StaticProfiles::new(vec![Profile::new("main", "prof_1")]);

        let profile = directory.profile("main").await.unwrap();
        assert_eq!(profile.external_id().unwrap(), "prof_1");

        let err = directory.profile("ghost").await.unwrap_err();
        assert!(matches!(err, SocialElfError::ProfileNotFound(ref id) if id == "ghost"));
    }

    #[test]
    fn test_unsynced_profile_is_validation_error() {
        let profile = Profile {
            id: "fresh".to_string(),
            external_id: None,
            timezone: None,
        };
        let err = profile.external_id().unwrap_err();
        assert!(err.to_string().contains("not synced"));
        assert_eq!(err.exit_code(), 3);
    }
}
