//! Account resolution
//!
//! Maps (profile, platform) to the provider account a post is delivered
//! through. Account ids are never taken from the caller: every write resolves
//! them fresh from the provider's account list, and only active accounts
//! qualify.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, SocialElfError};
use crate::platforms::PlatformPayload;
use crate::profiles::Profile;
use crate::provider::PostingProvider;
use crate::types::{Account, Platform, PlatformTarget};

#[derive(Clone)]
pub struct AccountResolver {
    provider: Arc<dyn PostingProvider>,
}

impl AccountResolver {
    pub fn new(provider: Arc<dyn PostingProvider>) -> Self {
        Self { provider }
    }

    /// Every account under the profile, active or not
    pub async fn accounts(&self, profile: &Profile) -> Result<Vec<Account>> {
        let external_id = profile.external_id()?;
        self.provider
            .list_accounts(external_id)
            .await
            .map_err(SocialElfError::fetch)
    }

    pub async fn resolve(&self, profile: &Profile, platform: Platform) -> Result<String> {
        let accounts = self.accounts(profile).await?;
        find_active(&accounts, platform)
            .map(|account| account.id.clone())
            .ok_or(SocialElfError::AccountNotConnected { platform })
    }

    /// Attach account ids to every payload using a single account lookup.
    ///
    /// Fails on the first platform without an active account; nothing is
    /// returned partially.
    pub async fn resolve_all(
        &self,
        profile: &Profile,
        payloads: Vec<PlatformPayload>,
    ) -> Result<Vec<PlatformTarget>> {
        let accounts = self.accounts(profile).await?;

        payloads
            .into_iter()
            .map(|payload| {
                let platform = payload.platform;
                let account = find_active(&accounts, platform)
                    .ok_or(SocialElfError::AccountNotConnected { platform })?;
                debug!(%platform, account_id = %account.id, "resolved account");
                Ok(payload.into_target(account.id.clone()))
            })
            .collect()
    }
}

/// First active account for the platform, in provider order
pub fn find_active(accounts: &[Account], platform: Platform) -> Option<&Account> {
    accounts
        .iter()
        .find(|account| account.platform == platform && account.is_active)
}
