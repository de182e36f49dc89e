//! Error types for Google OAuth operations

/// Errors from the flow and profile clients.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("authorization code missing or empty")]
    MissingCode,

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("userinfo request failed: {0}")]
    Userinfo(String),
}

/// Result alias for Google OAuth operations.
pub type Result<T> = std::result::Result<T, Error>;
