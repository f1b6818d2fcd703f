//! Single-use, time-limited tokens for connection flows
//!
//! A token is issued once, can be consumed exactly once, and is dead after
//! the TTL. Consumed tokens leave a marker behind until their TTL runs out so
//! a replayed callback is told the token was already used rather than that it
//! never existed.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use rand::RngCore;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{Result, SocialElfError};
use crate::types::Platform;

const TOKEN_BYTES: usize = 32;

/// Opaque URL-safe token with 256 bits of entropy
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is unknown")]
    Unknown,
    #[error("token has expired")]
    Expired,
    #[error("token was already used")]
    AlreadyConsumed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "slot", rename_all = "snake_case")]
pub enum Slot<T> {
    Live { issued_at: DateTime<Utc>, value: T },
    Consumed { issued_at: DateTime<Utc> },
}

impl<T> Slot<T> {
    fn issued_at(&self) -> DateTime<Utc> {
        match self {
            Slot::Live { issued_at, .. } | Slot::Consumed { issued_at } => *issued_at,
        }
    }
}

pub struct TokenLedger<T> {
    ttl: Duration,
    slots: Mutex<HashMap<String, Slot<T>>>,
}

impl<T> TokenLedger<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // The map stays consistent even if a holder panicked
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - issued_at > self.ttl
    }

    /// Store `value` under a fresh token
    pub fn issue(&self, value: T, now: DateTime<Utc>) -> String {
        let token = generate_token();
        self.slots().insert(
            token.clone(),
            Slot::Live {
                issued_at: now,
                value,
            },
        );
        token
    }

    /// Take the value out, leaving a consumed marker.
    ///
    /// Check and mark happen under one lock, so of two concurrent consumers
    /// exactly one receives the value.
    pub fn consume(&self, token: &str, now: DateTime<Utc>) -> std::result::Result<T, TokenError> {
        let mut slots = self.slots();
        let issued_at = match slots.get(token) {
            None => return Err(TokenError::Unknown),
            Some(Slot::Consumed { .. }) => return Err(TokenError::AlreadyConsumed),
            Some(Slot::Live { issued_at, .. }) => *issued_at,
        };

        if self.is_expired(issued_at, now) {
            slots.remove(token);
            return Err(TokenError::Expired);
        }

        match slots.insert(token.to_string(), Slot::Consumed { issued_at }) {
            Some(Slot::Live { value, .. }) => Ok(value),
            _ => Err(TokenError::Unknown),
        }
    }

    /// Read a live value without consuming it
    pub fn inspect<R>(
        &self,
        token: &str,
        now: DateTime<Utc>,
        read: impl FnOnce(&T) -> R,
    ) -> std::result::Result<R, TokenError> {
        let slots = self.slots();
        match slots.get(token) {
            None => Err(TokenError::Unknown),
            Some(Slot::Consumed { .. }) => Err(TokenError::AlreadyConsumed),
            Some(Slot::Live { issued_at, .. }) if self.is_expired(*issued_at, now) => {
                Err(TokenError::Expired)
            }
            Some(Slot::Live { value, .. }) => Ok(read(value)),
        }
    }

    /// Retire a live token without handing out its value
    pub fn discard(&self, token: &str) {
        let mut slots = self.slots();
        if let Some(issued_at) = slots.get(token).map(Slot::issued_at) {
            slots.insert(token.to_string(), Slot::Consumed { issued_at });
        }
    }

    /// Drop every slot past its TTL, returning how many were removed
    pub fn purge(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, slot| now - slot.issued_at() <= ttl);
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> TokenLedger<T> {
    fn snapshot(&self) -> HashMap<String, Slot<T>> {
        self.slots().clone()
    }

    fn replace(&self, entries: HashMap<String, Slot<T>>) {
        *self.slots() = entries;
    }
}

/// What an authorization redirect was issued for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionFlowState {
    pub profile_id: String,
    pub external_profile_id: String,
    pub platform: Platform,
    pub issued_at: DateTime<Utc>,
}

/// A user token held between code exchange and page selection
pub struct PageSelectionSession {
    pub profile_id: String,
    pub external_profile_id: String,
    pub access_token: SecretString,
}

impl std::fmt::Debug for PageSelectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSelectionSession")
            .field("profile_id", &self.profile_id)
            .field("external_profile_id", &self.external_profile_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Flow-state ledger, optionally mirrored to a JSON file so that a callback
/// can be completed by a different process than the one that started it.
///
/// With a file, every issue and consume runs under an exclusive lock on a
/// sibling `.lock` file and re-reads the ledger first, so two processes
/// completing the same callback still see exactly one winner.
pub struct FlowStateStore {
    ledger: TokenLedger<ConnectionFlowState>,
    path: Option<PathBuf>,
}

impl FlowStateStore {
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            ledger: TokenLedger::new(ttl),
            path: None,
        }
    }

    /// Open a file-backed store.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is logged
    /// and ignored: the pending flows it held will fail with an invalid
    /// state and can be restarted.
    pub fn open(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let store = Self {
            ledger: TokenLedger::new(ttl),
            path: Some(path.into()),
        };
        store.reload();
        store.ledger.purge(Utc::now());
        store
    }

    pub fn ttl(&self) -> Duration {
        self.ledger.ttl()
    }

    pub fn issue(&self, state: ConnectionFlowState) -> Result<String> {
        let _lock = self.lock()?;
        self.reload();

        let issued_at = state.issued_at;
        self.ledger.purge(issued_at);
        let token = self.ledger.issue(state, issued_at);
        self.save()?;
        Ok(token)
    }

    /// Consume `token`.
    ///
    /// The outer error is a storage failure: the consumed marker could not
    /// be recorded, so the flow must not continue.
    pub fn consume(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<std::result::Result<ConnectionFlowState, TokenError>> {
        let _lock = self.lock()?;
        self.reload();

        let outcome = self.ledger.consume(token, now);
        if !matches!(
            outcome,
            Err(TokenError::Unknown) | Err(TokenError::AlreadyConsumed)
        ) {
            self.save()?;
        }
        Ok(outcome)
    }

    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    /// Exclusive lock held until the returned file is dropped
    fn lock(&self) -> Result<Option<File>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| state_file_error(parent, e))?;
        }

        let lock_path = sibling(path, "lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| state_file_error(&lock_path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| state_file_error(&lock_path, e))?;
        Ok(Some(file))
    }

    /// Replace the in-memory ledger with what is on disk
    fn reload(&self) {
        let Some(path) = &self.path else {
            return;
        };

        let entries = if path.exists() {
            read_entries(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring unreadable flow state file");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };
        self.ledger.replace(entries);
    }

    /// Write to a temporary file and rename it over the ledger
    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(&self.ledger.snapshot())
            .map_err(|e| SocialElfError::StateFile(e.to_string()))?;
        let tmp = sibling(path, "tmp");
        std::fs::write(&tmp, json).map_err(|e| state_file_error(&tmp, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&tmp, perms).map_err(|e| state_file_error(&tmp, e))?;
        }

        std::fs::rename(&tmp, path).map_err(|e| state_file_error(path, e))?;
        debug!(path = %path.display(), entries = self.ledger.len(), "saved flow state");
        Ok(())
    }
}

/// `flows.json` -> `flows.json.lock`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn state_file_error(path: &Path, error: std::io::Error) -> SocialElfError {
    SocialElfError::StateFile(format!("{}: {}", path.display(), error))
}

fn read_entries(path: &Path) -> Result<HashMap<String, Slot<ConnectionFlowState>>> {
    let content = std::fs::read_to_string(path).map_err(|e| state_file_error(path, e))?;
    serde_json::from_str(&content).map_err(|e| SocialElfError::StateFile(e.to_string()))
}
