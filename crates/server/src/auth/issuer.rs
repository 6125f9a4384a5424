use std::sync::Arc;

use jwt_compact::{
    AlgorithmExt, Claims, Header, TimeOptions,
    alg::{Hs256, Hs256Key},
};

use super::{AuthResult, claims::PrincipalClaims, credentials::CredentialStore, error::AuthError};

/// Exchanges a username and password for a signed, time-limited token.
pub struct CredentialIssuer {
    store: CredentialStore,
    key: Arc<Hs256Key>,
    ttl: chrono::Duration,
    time_options: TimeOptions,
}

impl CredentialIssuer {
    pub fn new(store: CredentialStore, key: Arc<Hs256Key>, ttl: std::time::Duration) -> anyhow::Result<Self> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| anyhow::anyhow!("Invalid token TTL: {e}"))?;

        Ok(Self {
            store,
            key,
            ttl,
            time_options: TimeOptions::default(),
        })
    }

    pub fn issue(&self, username: &str, password: &str) -> AuthResult<String> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let Some(user) = self.store.find(username, password) else {
            log::debug!("Login rejected for '{username}': no matching credentials");
            return Err(AuthError::InvalidCredentials);
        };

        let principal = PrincipalClaims {
            id: user.id.clone(),
            class: user.class.clone(),
        };

        let claims = Claims::new(principal).set_duration_and_issuance(&self.time_options, self.ttl);

        let token = Hs256.token(&Header::empty(), &claims, &self.key).map_err(|e| {
            log::error!("Failed to sign token: {e}");
            AuthError::Internal
        })?;

        log::debug!("Issued token for user id '{}' ({})", user.id, user.class);

        Ok(token)
    }
}
