//! Pending consent store
//!
//! Holds the PKCE verifier for each consent redirect, keyed by the
//! anti-forgery `state` sent to Google. The callback consumes the entry for
//! the `state` Google echoes back; entries are single use and expire after
//! `CONSENT_EXPIRY`. At most `MAX_PENDING_CONSENTS` entries are held; once
//! full, the oldest pending consent is evicted to make room.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Maximum age of a pending consent before the callback is refused.
pub const CONSENT_EXPIRY: Duration = Duration::from_secs(600);

/// Upper bound on consents awaiting a callback.
pub const MAX_PENDING_CONSENTS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConsentError {
    #[error("callback carried no state parameter")]
    Missing,

    #[error("state does not match any pending consent")]
    Unknown,

    #[error("consent expired, start the login again")]
    Expired,
}

struct PendingConsent {
    verifier: String,
    created_at: Instant,
}

/// Started consent: values to place in the authorization URL.
#[derive(Debug)]
pub struct ConsentTicket {
    pub state: String,
    pub code_challenge: String,
}

#[derive(Clone)]
pub struct ConsentStore {
    pending: Arc<Mutex<HashMap<String, PendingConsent>>>,
    expiry: Duration,
    max_pending: usize,
}

impl ConsentStore {
    pub fn new(expiry: Duration) -> Self {
        Self::with_limits(expiry, MAX_PENDING_CONSENTS)
    }

    pub fn with_limits(expiry: Duration, max_pending: usize) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            expiry,
            max_pending: max_pending.max(1),
        }
    }

    /// Register a new consent attempt and return its state and PKCE challenge.
    pub async fn begin(&self) -> ConsentTicket {
        let state = google_auth::generate_state();
        let verifier = google_auth::generate_verifier();
        let code_challenge = google_auth::compute_challenge(&verifier);

        let mut pending = self.pending.lock().await;
        // Lazy cleanup while holding the lock
        let expiry = self.expiry;
        pending.retain(|_, p| p.created_at.elapsed() < expiry);

        while pending.len() >= self.max_pending {
            let oldest = pending
                .iter()
                .min_by_key(|(_, p)| p.created_at)
                .map(|(s, _)| s.clone());
            let Some(oldest) = oldest else { break };
            pending.remove(&oldest);
            warn!(
                max_pending = self.max_pending,
                "pending consent limit reached, evicted oldest"
            );
        }

        pending.insert(
            state.clone(),
            PendingConsent {
                verifier,
                created_at: Instant::now(),
            },
        );
        debug!(pending = pending.len(), "consent registered");

        ConsentTicket {
            state,
            code_challenge,
        }
    }

    /// Consume the pending consent for `state`, returning its PKCE verifier.
    pub async fn take(&self, state: Option<&str>) -> Result<String, ConsentError> {
        let state = state
            .filter(|s| !s.is_empty())
            .ok_or(ConsentError::Missing)?;

        let entry = {
            let mut pending = self.pending.lock().await;
            pending.remove(state)
        };
        let entry = entry.ok_or(ConsentError::Unknown)?;

        if entry.created_at.elapsed() > self.expiry {
            return Err(ConsentError::Expired);
        }
        Ok(entry.verifier)
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    #[cfg(test)]
    async fn insert_aged(&self, state: &str, verifier: &str, age: Duration) {
        self.pending.lock().await.insert(
            state.to_string(),
            PendingConsent {
                verifier: verifier.to_string(),
                created_at: Instant::now() - age,
            },
        );
    }
}

impl Default for ConsentStore {
    fn default() -> Self {
        Self::new(CONSENT_EXPIRY)
    }
}
