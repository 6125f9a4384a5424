/// Failures of login and identity resolution.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Username and password are required")]
    MissingCredentials,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Internal server error")]
    Internal,
}
