//! Google OAuth client library
//!
//! Implements the two collaborators the login service delegates to:
//!
//! - the flow client ([`FlowClient`]), which builds the consent URL and
//!   exchanges an authorization code for a [`TokenBundle`]
//! - the profile client ([`ProfileClient`]), which calls the userinfo
//!   endpoint with a bundle's access token
//!
//! Credential flow:
//! 1. Service calls `pkce::generate_state()` + `pkce::generate_verifier()`
//! 2. User is redirected to `FlowClient::authorization_url()`
//! 3. Callback calls `FlowClient::exchange_code()` with the returned code
//! 4. The bundle travels through the browser as JSON (`TokenBundle::to_json`)
//! 5. `TokenBundle::from_json()` rebuilds it for `ProfileClient::get_own_profile()`

pub mod client;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod pkce;
pub mod token;
pub mod userinfo;

pub use client::{ClientConfig, FlowClient, GoogleFlow, GoogleProfileApi, ProfileClient};
pub use constants::*;
pub use credentials::TokenBundle;
pub use error::{Error, Result};
pub use pkce::{build_authorization_url, compute_challenge, generate_state, generate_verifier};
pub use token::{TokenResponse, exchange_code};
pub use userinfo::{Profile, fetch_profile};
