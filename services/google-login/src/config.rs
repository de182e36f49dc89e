//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The config file
//! itself is optional; a deployment can run from environment alone.
//! The client secret is loaded from the CLIENT_SECRET env var or
//! client_secret_file, never stored in the TOML directly.

use common::Secret;
use google_auth::{AUTH_ENDPOINT, ClientConfig, PROFILE_SCOPE, TOKEN_ENDPOINT, USERINFO_ENDPOINT};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "google-login.toml";

/// Resolved configuration, immutable after startup.
#[derive(Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub userinfo_uri: String,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub max_connections: usize,
    /// Timeout for outbound calls to Google
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            max_connections: 1000,
            timeout_secs: 30,
        }
    }
}

/// `[google]` table as written in the file
#[derive(Debug, Deserialize)]
#[serde(default)]
struct GoogleSection {
    client_id: Option<String>,
    redirect_uri: Option<String>,
    client_secret_file: Option<PathBuf>,
    scopes: Vec<String>,
    auth_uri: String,
    token_uri: String,
    userinfo_uri: String,
}

impl Default for GoogleSection {
    fn default() -> Self {
        Self {
            client_id: None,
            redirect_uri: None,
            client_secret_file: None,
            scopes: vec![PROFILE_SCOPE.to_string()],
            auth_uri: AUTH_ENDPOINT.to_string(),
            token_uri: TOKEN_ENDPOINT.to_string(),
            userinfo_uri: USERINFO_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server: ServerConfig,
    google: GoogleSection,
}

impl Config {
    /// Load configuration from an optional TOML file, then overlay environment variables.
    ///
    /// Credential resolution:
    /// - client id: CLIENT_ID env var, then `google.client_id`
    /// - redirect URI: REDIRECT_URI env var, then `google.redirect_uri`
    /// - client secret: CLIENT_SECRET env var, then `google.client_secret_file`
    ///
    /// All three must resolve to non-empty values.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let file: FileConfig = match path {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => FileConfig::default(),
        };
        let FileConfig { server, google } = file;

        if server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if google.scopes.is_empty() {
            return Err(common::Error::Config("scopes must not be empty".into()));
        }

        let client_id = env_value("CLIENT_ID")
            .or(google.client_id.filter(|v| !v.trim().is_empty()))
            .ok_or(common::Error::MissingSetting("CLIENT_ID"))?;

        let redirect_uri = env_value("REDIRECT_URI")
            .or(google.redirect_uri.filter(|v| !v.trim().is_empty()))
            .ok_or(common::Error::MissingSetting("REDIRECT_URI"))?;

        let client_secret = match env_value("CLIENT_SECRET") {
            Some(secret) => Secret::new(secret),
            None => match google.client_secret_file {
                Some(ref secret_file) => {
                    let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                        common::Error::Config(format!(
                            "failed to read client_secret_file {}: {e}",
                            secret_file.display()
                        ))
                    })?;
                    Secret::new(secret.trim().to_owned())
                }
                None => return Err(common::Error::MissingSetting("CLIENT_SECRET")),
            },
        };
        if client_secret.is_blank() {
            return Err(common::Error::MissingSetting("CLIENT_SECRET"));
        }

        for (name, value) in [
            ("redirect_uri", &redirect_uri),
            ("auth_uri", &google.auth_uri),
            ("token_uri", &google.token_uri),
            ("userinfo_uri", &google.userinfo_uri),
        ] {
            require_http_url(name, value)?;
        }

        let client = ClientConfig {
            client_id,
            client_secret,
            redirect_uri,
            scopes: google.scopes,
            auth_uri: google.auth_uri,
            token_uri: google.token_uri,
        };

        Ok(Self {
            server,
            client,
            userinfo_uri: google.userinfo_uri,
        })
    }

    /// Resolve the config file from CLI arg, CONFIG_PATH env var, or the
    /// default file name if it exists in the working directory.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }
}

/// Non-empty, trimmed environment variable
fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn require_http_url(name: &str, value: &str) -> common::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{name} must start with http:// or https://, got: {value}"
        )))
    }
}
