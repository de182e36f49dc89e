//! Profile fetch ("get own profile")
//!
//! Calls the OAuth2 v2 userinfo endpoint with the bundle's access token and
//! returns Google's JSON object verbatim.
//!
//! There is no silent refresh. A 401/403 is returned to the caller as
//! `InvalidCredentials` and the request is never retried. The bundle's
//! `refresh_token`, `token_uri`, `client_id` and `client_secret` are carried
//! so that a holder of the bundle could mint a new access token itself, but
//! nothing in this module reads them.

use crate::credentials::TokenBundle;
use crate::error::{Error, Result};

/// Profile result: Google's userinfo object, shape owned by Google.
pub type Profile = serde_json::Map<String, serde_json::Value>;

/// Fetch the authenticated user's profile.
///
/// 401/403 mean the access token is expired or revoked, or that it lacks the
/// profile scope. The caller must log in again.
pub async fn fetch_profile(
    client: &reqwest::Client,
    userinfo_uri: &str,
    credentials: &TokenBundle,
) -> Result<Profile> {
    let response = client
        .get(userinfo_uri)
        .bearer_auth(&credentials.token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("userinfo request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "access token rejected ({status}): {body}"
            )));
        }

        return Err(Error::Userinfo(format!(
            "userinfo endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<Profile>()
        .await
        .map_err(|e| Error::Userinfo(format!("invalid userinfo response: {e}")))
}
