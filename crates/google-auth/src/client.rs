//! Flow and profile client abstractions
//!
//! The login service talks to Google only through these two traits, so its
//! handlers can be exercised against stubs. `GoogleFlow` and
//! `GoogleProfileApi` are the production implementations.
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn FlowClient>`).

use std::future::Future;
use std::pin::Pin;

use common::Secret;

use crate::constants::{AUTH_ENDPOINT, PROFILE_SCOPE, TOKEN_ENDPOINT};
use crate::credentials::TokenBundle;
use crate::error::Result;
use crate::pkce;
use crate::token;
use crate::userinfo::{self, Profile};

/// OAuth client registration: who we are to Google and where it sends users back.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_uri: String,
    pub token_uri: String,
}

impl ClientConfig {
    /// Registration with Google's production endpoints and the profile scope.
    pub fn new(client_id: String, client_secret: Secret<String>, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            scopes: vec![PROFILE_SCOPE.to_string()],
            auth_uri: AUTH_ENDPOINT.to_string(),
            token_uri: TOKEN_ENDPOINT.to_string(),
        }
    }
}

/// OAuth2 authorization-code grant.
pub trait FlowClient: Send + Sync {
    /// Consent URL carrying the anti-forgery `state` and the PKCE challenge.
    fn authorization_url(&self, state: &str, code_challenge: &str) -> String;

    /// Exchange the callback's authorization code for a token bundle.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        code_verifier: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenBundle>> + Send + 'a>>;
}

/// Authenticated "get own profile" call.
pub trait ProfileClient: Send + Sync {
    fn get_own_profile<'a>(
        &'a self,
        credentials: &'a TokenBundle,
    ) -> Pin<Box<dyn Future<Output = Result<Profile>> + Send + 'a>>;
}

/// Google's OAuth 2.0 server.
pub struct GoogleFlow {
    http: reqwest::Client,
    config: ClientConfig,
}

impl GoogleFlow {
    pub fn new(http: reqwest::Client, config: ClientConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl FlowClient for GoogleFlow {
    fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
        pkce::build_authorization_url(&self.config, state, code_challenge)
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        code_verifier: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenBundle>> + Send + 'a>> {
        Box::pin(async move {
            let response = token::exchange_code(&self.http, &self.config, code, code_verifier).await?;
            Ok(TokenBundle::from_exchange(response, &self.config))
        })
    }
}

/// Google's OAuth2 v2 userinfo API.
pub struct GoogleProfileApi {
    http: reqwest::Client,
    userinfo_uri: String,
}

impl GoogleProfileApi {
    pub fn new(http: reqwest::Client, userinfo_uri: String) -> Self {
        Self { http, userinfo_uri }
    }
}

impl ProfileClient for GoogleProfileApi {
    fn get_own_profile<'a>(
        &'a self,
        credentials: &'a TokenBundle,
    ) -> Pin<Box<dyn Future<Output = Result<Profile>> + Send + 'a>> {
        Box::pin(userinfo::fetch_profile(
            &self.http,
            &self.userinfo_uri,
            credentials,
        ))
    }
}
