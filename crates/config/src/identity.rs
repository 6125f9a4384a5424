//! Runtime identity types.
//!
//! An [`Identity`] is resolved fresh for every request and never persisted. Its class selects the quota limit,
//! its key selects the usage bucket.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of an identity class, e.g. `guest`, `user` or `premium`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityClass(String);

impl IdentityClass {
    const GUEST: &'static str = "guest";

    /// Creates a class from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The class assigned to every unauthenticated request.
    pub fn guest() -> Self {
        Self(Self::GUEST.to_string())
    }

    /// The class name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity a request is accounted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Principal id for authenticated requests, request origin for guests.
    pub key: String,
    /// The class that selects the quota limit.
    pub class: IdentityClass,
    /// Whether the identity came from a verified token.
    pub authenticated: bool,
}

impl Identity {
    /// An unauthenticated identity keyed by the request origin.
    pub fn guest(origin: impl Into<String>) -> Self {
        Self {
            key: origin.into(),
            class: IdentityClass::guest(),
            authenticated: false,
        }
    }

    /// An authenticated identity decoded from a verified token.
    pub fn principal(id: impl Into<String>, class: IdentityClass) -> Self {
        Self {
            key: id.into(),
            class,
            authenticated: true,
        }
    }

    /// The usage bucket for this identity.
    ///
    /// Guests and principals live in separate namespaces, so a principal id can never share a bucket with an
    /// origin address.
    pub fn storage_key(&self) -> String {
        if self.authenticated {
            format!("principal:{}", self.key)
        } else {
            format!("guest:{}", self.key)
        }
    }
}
