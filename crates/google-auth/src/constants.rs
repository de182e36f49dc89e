//! Google OAuth endpoints and defaults
//!
//! These are the public endpoints of Google's OAuth 2.0 server. All three
//! can be overridden through `ClientConfig` so tests can point at a local
//! stand-in.

/// Consent screen (authorization endpoint)
pub const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";

/// Token endpoint for code exchange
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// OAuth2 v2 userinfo endpoint ("get own profile")
pub const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Basic profile scope: id, name, picture
pub const PROFILE_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.profile";
