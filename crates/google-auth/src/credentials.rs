//! Token bundle: the credential that round-trips through the browser
//!
//! After a successful code exchange the callback serializes the bundle to
//! JSON and hands it to the browser. The whoami handler rebuilds it from that
//! same JSON. Nothing is stored server-side.
//!
//! Wire shape:
//! `{"token", "refresh_token" (string or null), "token_uri", "client_id",
//! "client_secret", "scopes"}`. Every field except `refresh_token` is
//! required when parsing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::ClientConfig;
use crate::error::{Error, Result};
use crate::token::TokenResponse;

/// Access token plus the metadata needed to rebuild an authenticated client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    /// Bearer access token
    pub token: String,
    /// Present only when Google granted offline access on this consent
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
}

impl TokenBundle {
    /// Assemble a bundle from a token endpoint response.
    ///
    /// Scopes come from the response's space-separated `scope` when Google
    /// reports them, otherwise the requested scopes are recorded.
    pub fn from_exchange(response: TokenResponse, config: &ClientConfig) -> Self {
        let scopes = match response.scope.as_deref() {
            Some(granted) if !granted.trim().is_empty() => {
                granted.split_whitespace().map(String::from).collect()
            }
            _ => config.scopes.clone(),
        };

        Self {
            token: response.access_token,
            refresh_token: response.refresh_token,
            token_uri: config.token_uri.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.expose().clone(),
            scopes,
        }
    }

    /// Rebuild a bundle from its query-string JSON form.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::CredentialParse(format!("parsing token bundle: {e}")))
    }

    /// Serialize to the JSON form embedded in the homepage redirect.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::CredentialParse(format!("serializing token bundle: {e}")))
    }
}

impl fmt::Debug for TokenBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBundle")
            .field("token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .finish()
    }
}
