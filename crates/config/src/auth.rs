//! Login and token configuration.

use std::{path::PathBuf, time::Duration};

use duration_str::deserialize_duration;
use secrecy::SecretString;
use serde::Deserialize;

use crate::IdentityClass;

/// Settings for issuing and verifying bearer tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC secret used to sign tokens. A random per-process key is used when absent.
    pub secret: Option<SecretString>,
    /// Lifetime of an issued token.
    #[serde(deserialize_with = "deserialize_duration")]
    pub token_ttl: Duration,
    /// JSON file holding an array of user records.
    pub users_file: Option<PathBuf>,
    /// User records defined inline.
    pub users: Vec<UserRecord>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            token_ttl: Duration::from_secs(3600),
            users_file: None,
            users: Vec::new(),
        }
    }
}

/// A stored credential.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRecord {
    /// Stable principal id, used as the quota key.
    pub id: String,
    /// Login name, matched case-sensitively.
    pub username: String,
    /// Password, matched exactly.
    pub password: SecretString,
    /// The class selecting this user's quota.
    #[serde(alias = "type")]
    pub class: IdentityClass,
}
