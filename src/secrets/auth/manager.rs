//! Token lifecycle: the startup login and the background renewal loop.

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::aws::IdentitySigner;
use super::credential::{Credential, CredentialStore};
use crate::secrets::error::{Result, SecretsError};
use crate::secrets::transport::{json_or_error, VaultHttp};
use crate::secrets::types::SecretString;

pub const AWS_LOGIN_PATH: &str = "auth/aws/login";
pub const RENEW_SELF_PATH: &str = "auth/token/renew-self";

#[derive(Debug, Deserialize)]
struct AuthResponse {
    auth: Option<AuthBlock>,
}

#[derive(Debug, Deserialize)]
struct AuthBlock {
    #[serde(default)]
    client_token: Option<String>,
    #[serde(default)]
    lease_duration: u64,
}

/// What a renewal tick ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Renewed,
    Reauthenticated,
    /// Both renewal and re-login failed; the previous token is still in use.
    Kept,
}

/// Obtains and refreshes the backend token through AWS IAM login.
pub struct TokenManager {
    http: VaultHttp,
    credentials: CredentialStore,
    signer: Arc<dyn IdentitySigner>,
    role: String,
}

impl TokenManager {
    pub fn new(
        http: VaultHttp,
        credentials: CredentialStore,
        signer: Arc<dyn IdentitySigner>,
        role: impl Into<String>,
    ) -> Self {
        Self { http, credentials, signer, role: role.into() }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Full IAM login. Replaces the stored credential on success.
    pub async fn authenticate(&self) -> Result<()> {
        let signed = self.signer.sign().await.map_err(|e| {
            SecretsError::authentication(format!("failed to sign identity request: {}", e))
        })?;
        let payload = signed.login_payload(&self.role)?;

        let resp = self
            .http
            .request(Method::POST, AWS_LOGIN_PATH)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SecretsError::authentication(format!("login request failed: {}", e)))?;
        let body: AuthResponse = json_or_error(resp)
            .await
            .map_err(|e| SecretsError::authentication(format!("login rejected: {}", e)))?;

        let auth = body
            .auth
            .ok_or_else(|| SecretsError::authentication("login response carried no auth block"))?;
        let token = auth
            .client_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SecretsError::authentication("login response carried no client token"))?;

        let lease = Duration::from_secs(auth.lease_duration);
        self.credentials.replace(Credential::leased(SecretString::new(token), lease)).await;
        info!(
            role = %self.role,
            lease_secs = auth.lease_duration,
            "Authenticated to secret backend via AWS IAM"
        );
        Ok(())
    }

    /// Extend the current token by its last lease.
    pub async fn renew(&self) -> Result<()> {
        let current = self.credentials.current().await;
        let body = if current.lease.is_zero() {
            json!({})
        } else {
            json!({ "increment": format!("{}s", current.lease.as_secs()) })
        };

        let resp = self
            .http
            .authed(&self.credentials, Method::POST, RENEW_SELF_PATH)
            .await
            .json(&body)
            .send()
            .await
            .map_err(|e| SecretsError::authentication(format!("renew request failed: {}", e)))?;
        let body: AuthResponse = json_or_error(resp)
            .await
            .map_err(|e| SecretsError::authentication(format!("renew rejected: {}", e)))?;

        let auth = body
            .auth
            .ok_or_else(|| SecretsError::authentication("renew response carried no auth block"))?;
        let token = auth
            .client_token
            .filter(|t| !t.is_empty())
            .map(SecretString::new)
            .unwrap_or(current.token);

        self.credentials
            .replace(Credential::leased(token, Duration::from_secs(auth.lease_duration)))
            .await;
        debug!(lease_secs = auth.lease_duration, "Renewed secret backend token");
        Ok(())
    }

    /// One renewal tick. Never fails: on double failure the old token stays.
    pub async fn refresh_once(&self) -> RefreshOutcome {
        let renew_err = match self.renew().await {
            Ok(()) => return RefreshOutcome::Renewed,
            Err(e) => e,
        };
        warn!(error = %renew_err, "Token renewal failed, logging in again");

        match self.authenticate().await {
            Ok(()) => RefreshOutcome::Reauthenticated,
            Err(e) => {
                error!(
                    renew_error = %renew_err,
                    login_error = %e,
                    "Token refresh failed, keeping previous token"
                );
                RefreshOutcome::Kept
            }
        }
    }

    /// Start the renewal loop. The first tick fires one `period` from now.
    pub fn spawn(self: Arc<Self>, period: Duration) -> RenewalHandle {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let period = period.max(Duration::from_millis(1));

        let join = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = period.as_secs(), "Token renewal loop started");

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let outcome = self.refresh_once().await;
                        debug!(?outcome, "Token renewal tick finished");
                    }
                }
            }
            info!("Token renewal loop stopped");
        });

        RenewalHandle { cancel, join: Some(join) }
    }
}

/// Owner of the background renewal task. Dropping it stops the task.
#[derive(Debug)]
pub struct RenewalHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl RenewalHandle {
    pub fn is_running(&self) -> bool {
        self.join.as_ref().map(|j| !j.is_finished()).unwrap_or(false)
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                warn!(error = %e, "Token renewal task ended abnormally");
            }
        }
    }
}

impl Drop for RenewalHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
