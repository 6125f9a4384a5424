use config::{Identity, IdentityClass};
use serde::{Deserialize, Serialize};

/// The principal encoded in an issued token, next to the standard `exp` and `iat` claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalClaims {
    /// Stable principal id.
    pub id: String,
    /// The class selecting the principal's quota.
    pub class: IdentityClass,
}

impl From<PrincipalClaims> for Identity {
    fn from(claims: PrincipalClaims) -> Self {
        Identity::principal(claims.id, claims.class)
    }
}
