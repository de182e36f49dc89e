//! Authorization code exchange
//!
//! POSTs the code, PKCE verifier and client credentials to the configured
//! token endpoint (`oauth2.googleapis.com/token` in production).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ClientConfig;
use crate::error::{Error, Result};

/// Successful response from the token endpoint.
///
/// Google only includes `refresh_token` on the first offline consent for a
/// client, so it is optional here.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Space-separated granted scopes
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// OAuth error body (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &ClientConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    if code.trim().is_empty() {
        return Err(Error::MissingCode);
    }

    let response = client
        .post(&config.token_uri)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(describe_failure(status, &body)));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;

    debug!(
        has_refresh_token = token.refresh_token.is_some(),
        expires_in = token.expires_in,
        "authorization code exchanged"
    );
    Ok(token)
}

/// Render a non-success token endpoint reply for logs, preferring the
/// structured OAuth error fields when the body carries them.
fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error,
            error_description: Some(description),
        }) => format!("token endpoint returned {status}: {error}: {description}"),
        Ok(ErrorBody { error, .. }) => format!("token endpoint returned {status}: {error}"),
        Err(_) => format!("token endpoint returned {status}: {body}"),
    }
}
