//! The live backend credential and its synchronized holder.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::secrets::types::SecretString;

/// Backend access token plus the lease it was issued with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: SecretString,
    /// Lease granted by the backend; zero for static or non-expiring tokens.
    pub lease: Duration,
    /// Absolute expiry, `None` when the token does not expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// A pre-supplied token with no known lease.
    pub fn fixed(token: SecretString) -> Self {
        Self { token, lease: Duration::ZERO, expires_at: None }
    }

    /// A token issued now with the given lease.
    ///
    /// A lease too large to represent as a timestamp is treated as non-expiring.
    pub fn leased(token: SecretString, lease: Duration) -> Self {
        let expires_at = (!lease.is_zero())
            .then(|| chrono::Duration::from_std(lease).ok())
            .flatten()
            .and_then(|d| Utc::now().checked_add_signed(d));
        Self { token, lease, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| at <= Utc::now()).unwrap_or(false)
    }
}

/// Shared, internally synchronized holder of the current [`Credential`].
///
/// The transport reads it on every request; only the token manager replaces it.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    inner: Arc<RwLock<Credential>>,
}

impl CredentialStore {
    pub fn new(credential: Credential) -> Self {
        Self { inner: Arc::new(RwLock::new(credential)) }
    }

    /// Store for clients that authenticate later (starts with an empty token).
    pub fn unauthenticated() -> Self {
        Self::new(Credential::fixed(SecretString::default()))
    }

    /// Clone of the current token, the lock is released before returning.
    pub async fn token(&self) -> SecretString {
        self.inner.read().await.token.clone()
    }

    pub async fn current(&self) -> Credential {
        self.inner.read().await.clone()
    }

    pub async fn replace(&self, credential: Credential) {
        *self.inner.write().await = credential;
    }
}
