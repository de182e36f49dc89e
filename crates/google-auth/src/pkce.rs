//! Consent URL construction with PKCE (RFC 7636) and anti-forgery state
//!
//! The consent handler generates a fresh `state` and code verifier per login
//! attempt. The S256 challenge goes into the authorization URL; the verifier
//! is sent with the code exchange so Google can tie the two requests together.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::client::ClientConfig;

/// Generate a cryptographically random PKCE code verifier.
///
/// 64 random bytes encoded as URL-safe base64 (no padding) gives 86
/// characters, inside RFC 7636's 43-128 range.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate an opaque anti-forgery `state` value (32 random bytes, base64url).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the consent URL for the authorization-code grant.
///
/// Requests offline access so the token response carries a refresh token, and
/// `include_granted_scopes=true` so previously granted scopes are retained.
pub fn build_authorization_url(config: &ClientConfig, state: &str, challenge: &str) -> String {
    let scope = config.scopes.join(" ");
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256&access_type=offline&include_granted_scopes=true",
        config.auth_uri,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&scope),
        urlencoding::encode(state),
        urlencoding::encode(challenge),
    )
}
