//! Handler error categories
//!
//! Every login failure that reaches a handler boundary ends up here. The
//! category is logged server-side with the full cause; the caller only ever
//! sees a 500 with a short generic text body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::consent::ConsentError;

/// Body returned for any callback failure
pub const AUTH_FAILED_BODY: &str = "Error during authentication";

/// Body returned for any whoami failure
pub const WHOAMI_FAILED_BODY: &str = "Error fetching user info";

#[derive(Error, Debug)]
pub enum HandlerError {
    /// Callback arrived without a usable code, or Google reported a denial
    #[error("authorization rejected: {0}")]
    Authorization(String),

    /// Anti-forgery state missing, unknown, or expired
    #[error("consent state rejected: {0}")]
    Consent(#[from] ConsentError),

    #[error("token exchange failed: {0}")]
    Exchange(google_auth::Error),

    /// `tokens` parameter absent, not JSON, or missing a required field
    #[error("token bundle rejected: {0}")]
    Bundle(google_auth::Error),

    #[error("profile fetch failed: {0}")]
    Profile(google_auth::Error),
}

impl HandlerError {
    /// Label used in logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            HandlerError::Authorization(_) | HandlerError::Consent(_) => "authorization",
            HandlerError::Exchange(_) => "token_exchange",
            HandlerError::Bundle(_) => "token_bundle",
            HandlerError::Profile(_) => "profile_fetch",
        }
    }

    fn public_body(&self) -> &'static str {
        match self {
            HandlerError::Authorization(_)
            | HandlerError::Consent(_)
            | HandlerError::Exchange(_) => AUTH_FAILED_BODY,
            HandlerError::Bundle(_) | HandlerError::Profile(_) => WHOAMI_FAILED_BODY,
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.public_body()).into_response()
    }
}
