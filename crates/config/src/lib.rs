//! Gatekeeper configuration structures to map the gatekeeper.toml configuration.

#![deny(missing_docs)]

mod auth;
mod identity;
mod llm;
mod loader;
mod quota;

use std::{
    borrow::Cow,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::{Path, PathBuf},
};

pub use auth::{AuthConfig, UserRecord};
pub use identity::{Identity, IdentityClass};
pub use llm::LlmConfig;
pub use quota::{EvictionConfig, QuotaConfig};
use serde::Deserialize;

/// Main configuration structure for the gatekeeper.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Downstream text generation settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates cross-field constraints that serde alone cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}

/// HTTP server configuration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: SocketAddr,
    /// Whether `X-Forwarded-For` and `X-Real-IP` are trusted to name the request origin.
    pub trust_forwarded_headers: bool,
    /// TLS configuration for secure connections.
    pub tls: Option<TlsServerConfig>,
    /// Health endpoint configuration.
    pub health: HealthConfig,
    /// Login and token settings.
    pub auth: AuthConfig,
    /// Per-class request quotas.
    pub quotas: QuotaConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3000)),
            trust_forwarded_headers: false,
            tls: None,
            health: HealthConfig::default(),
            auth: AuthConfig::default(),
            quotas: QuotaConfig::default(),
        }
    }
}

/// TLS configuration for secure connections.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsServerConfig {
    /// Path to the TLS certificate PEM file.
    pub certificate: PathBuf,
    /// Path to the TLS private key PEM file.
    pub key: PathBuf,
}

/// Health endpoint configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is enabled.
    pub enabled: bool,
    /// The path for the health endpoint.
    pub path: Cow<'static, str>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            enabled: true,
            path: Cow::Borrowed("/health"),
        }
    }
}
