//! SocialElf - post scheduling and multi-platform publishing
//!
//! This library schedules, edits and deletes posts across several social
//! networks through a single posting provider, and walks users through
//! connecting their social accounts to a profile.

pub mod accounts;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod profiles;
pub mod provider;
pub mod repository;
pub mod scheduling;
pub mod service;
pub mod timezone;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConnectionFailure, ErrorKind, FailureReason, Result, SocialElfError};
pub use profiles::Profile;
pub use service::SocialElfService;
pub use types::{Platform, Post, PostDraft, PostFilter, PostPatch, PostStatus};
