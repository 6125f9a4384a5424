use std::sync::Arc;

use config::Identity;
use http::{HeaderMap, header::AUTHORIZATION};
use jwt_compact::{
    AlgorithmExt, TimeOptions, UntrustedToken,
    alg::{Hs256, Hs256Key},
};
use rate_limit::QuotaPolicy;

use super::{AuthResult, claims::PrincipalClaims, error::AuthError};

const BEARER_TOKEN_LENGTH: usize = 6;

/// Resolves the identity of a request from its optional bearer token.
pub struct TokenAuthenticator {
    key: Arc<Hs256Key>,
    policy: Arc<QuotaPolicy>,
    time_options: TimeOptions,
}

impl TokenAuthenticator {
    pub fn new(key: Arc<Hs256Key>, policy: Arc<QuotaPolicy>) -> Self {
        Self {
            key,
            policy,
            time_options: TimeOptions::default(),
        }
    }

    /// Without an `Authorization` header the request is a guest keyed by `origin`. A present header must carry a
    /// valid, unexpired token; anything else fails without falling back to guest.
    pub fn resolve(&self, headers: &HeaderMap, origin: &str) -> AuthResult<Identity> {
        let Some(token_header) = headers.get(AUTHORIZATION) else {
            log::debug!("No authorization header, resolving guest identity for origin {origin}");
            return Ok(Identity::guest(origin));
        };

        let token_str = token_header
            .to_str()
            .map_err(|_| AuthError::InvalidToken("invalid token".to_string()))?;

        let token = bearer_token(token_str)?;
        let claims = self.verify(token)?;

        log::debug!("Resolved principal '{}' of class '{}'", claims.id, claims.class);

        Ok(claims.into())
    }

    fn verify(&self, token: &str) -> AuthResult<PrincipalClaims> {
        let untrusted = UntrustedToken::new(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let token = Hs256
            .validator::<PrincipalClaims>(&self.key)
            .validate(&untrusted)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        token
            .claims()
            .validate_expiration(&self.time_options)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let principal = token.claims().custom.clone();

        if !self.policy.covers(&principal.class) {
            log::debug!("Token rejected: class '{}' has no quota limit", principal.class);
            return Err(AuthError::InvalidToken(format!("unknown class '{}'", principal.class)));
        }

        Ok(principal)
    }
}

/// Extracts the token from a `Bearer <token>` header value.
///
/// RFC 7235: the authentication scheme is case-insensitive.
fn bearer_token(value: &str) -> AuthResult<&str> {
    let has_scheme = value.len() > BEARER_TOKEN_LENGTH
        && value.is_char_boundary(BEARER_TOKEN_LENGTH)
        && value[..BEARER_TOKEN_LENGTH].eq_ignore_ascii_case("bearer")
        && value[BEARER_TOKEN_LENGTH..].starts_with(' ');

    if has_scheme {
        let token = value[BEARER_TOKEN_LENGTH + 1..].trim();

        if token.is_empty() {
            return Err(AuthError::InvalidToken("missing token".to_string()));
        }

        Ok(token)
    } else if value.trim().eq_ignore_ascii_case("bearer") {
        Err(AuthError::InvalidToken("missing token".to_string()))
    } else {
        Err(AuthError::InvalidToken("token must be prefixed with Bearer".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use config::{IdentityClass, QuotaConfig, UserRecord};
    use http::HeaderValue;
    use jwt_compact::{Claims, Header};

    use super::*;
    use crate::auth::{credentials::CredentialStore, issuer::CredentialIssuer};

    const SECRET: &[u8] = b"test-secret";

    fn authenticator() -> TokenAuthenticator {
        let policy = Arc::new(QuotaPolicy::new(&QuotaConfig::default()));

        TokenAuthenticator::new(Arc::new(Hs256Key::new(SECRET)), policy)
    }

    fn issued_token() -> String {
        let store = CredentialStore::new(vec![UserRecord {
            id: "42".to_string(),
            username: "a".to_string(),
            password: "right".to_string().into(),
            class: IdentityClass::new("user"),
        }])
        .unwrap();

        CredentialIssuer::new(store, Arc::new(Hs256Key::new(SECRET)), Duration::from_secs(3600))
            .unwrap()
            .issue("a", "right")
            .unwrap()
    }

    fn sign(claims: &Claims<PrincipalClaims>, secret: &[u8]) -> String {
        Hs256.token(&Header::empty(), claims, &Hs256Key::new(secret)).unwrap()
    }

    fn principal(class: &str) -> PrincipalClaims {
        PrincipalClaims {
            id: "42".to_string(),
            class: IdentityClass::new(class),
        }
    }

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    fn reason(result: AuthResult<Identity>) -> String {
        match result {
            Err(AuthError::InvalidToken(reason)) => reason,
            other => unreachable!("expected an invalid token, got {other:?}"),
        }
    }

    #[test]
    fn no_header_resolves_guest() {
        let identity = authenticator().resolve(&HeaderMap::new(), "198.51.100.4").unwrap();

        assert_eq!(identity, Identity::guest("198.51.100.4"));
    }

    #[test]
    fn issued_token_round_trips_to_principal() {
        let token = issued_token();
        let identity = authenticator()
            .resolve(&headers(&format!("Bearer {token}")), "198.51.100.4")
            .unwrap();

        assert_eq!(identity, Identity::principal("42", IdentityClass::new("user")));
        assert_eq!(identity.storage_key(), "principal:42");
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let token = issued_token();
        let identity = authenticator().resolve(&headers(&format!("bEaReR {token}")), "o");

        assert!(identity.is_ok());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let token = issued_token();
        let (payload, signature) = token.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{payload}.{flipped}{}", &signature[1..]);

        let reason = reason(authenticator().resolve(&headers(&format!("Bearer {tampered}")), "o"));

        assert!(!reason.is_empty());
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let claims = Claims::new(principal("user")).set_duration_and_issuance(
            &TimeOptions::default(),
            chrono::Duration::hours(1),
        );
        let token = sign(&claims, b"another-secret");

        let result = authenticator().resolve(&headers(&format!("Bearer {token}")), "o");

        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = Claims::new(principal("user"));
        claims.issued_at = Some(chrono::Utc::now() - chrono::Duration::hours(3));
        claims.expiration = Some(chrono::Utc::now() - chrono::Duration::hours(2));
        let token = sign(&claims, SECRET);

        let reason = reason(authenticator().resolve(&headers(&format!("Bearer {token}")), "o"));

        assert!(reason.contains("expired"), "{reason}");
    }

    #[test]
    fn token_without_expiry_is_rejected() {
        let token = sign(&Claims::new(principal("user")), SECRET);

        let result = authenticator().resolve(&headers(&format!("Bearer {token}")), "o");

        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn unknown_class_is_rejected() {
        let claims = Claims::new(principal("enterprise")).set_duration_and_issuance(
            &TimeOptions::default(),
            chrono::Duration::hours(1),
        );
        let token = sign(&claims, SECRET);

        let reason = reason(authenticator().resolve(&headers(&format!("Bearer {token}")), "o"));

        assert_eq!(reason, "unknown class 'enterprise'");
    }

    #[test]
    fn malformed_token_is_rejected() {
        let result = authenticator().resolve(&headers("Bearer not-a-jwt"), "o");

        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn header_must_use_bearer_scheme() {
        let authenticator = authenticator();

        assert_eq!(
            reason(authenticator.resolve(&headers("Basic dXNlcjpwYXNz"), "o")),
            "token must be prefixed with Bearer"
        );
        assert_eq!(reason(authenticator.resolve(&headers("Bearer"), "o")), "missing token");
        assert_eq!(reason(authenticator.resolve(&headers("Bearer    "), "o")), "missing token");
    }
}
