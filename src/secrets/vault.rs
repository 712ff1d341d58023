//! Secret operations against a Vault-style key/value backend.
//!
//! [`VaultSecretService`] is the only type callers need. It builds storage
//! paths from a secret's identity, adapts them to the configured KV wire
//! version, and translates payloads through the codec. When the client is
//! configured for AWS IAM login it also owns the background token renewal.
//!
//! # Example
//!
//! ```rust,ignore
//! use pipeline_vault::config::VaultSettings;
//! use pipeline_vault::domain::{Secret, SecretScope};
//! use pipeline_vault::secrets::VaultSecretService;
//!
//! let settings = VaultSettings::new("https://vault.example.com", "2").with_token("s.root");
//! let service = VaultSecretService::new(settings).await?;
//!
//! let secret = Secret::new("docker_password", "hunter2");
//! service.create(SecretScope::Repo, "octocat", "hello-world", &secret).await?;
//! let stored = service.get(SecretScope::Repo, "octocat", "hello-world", "docker_password").await?;
//! ```

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::Instrument;

use super::auth::{
    AuthMethod, AwsIamSigner, Credential, CredentialStore, IdentitySigner, RenewalHandle,
    TokenManager,
};
use super::codec;
use super::error::{Result, SecretsError};
use super::format::KvLayout;
use super::path::{directory_path, secret_path};
use super::transport::{HttpLogicalStore, LogicalStore, VaultHttp};
use crate::config::VaultSettings;
use crate::domain::{Secret, SecretKey, SecretScope, SecretValidator, StandardSecretValidator};

/// Name reported by [`VaultSecretService::driver`].
pub const DRIVER_NAME: &str = "vault";

const KEYS_FIELD: &str = "keys";
const MAX_PER_PAGE: usize = 100;

/// Page selection for [`VaultSecretService::list_page`]. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub page: usize,
    pub per_page: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}

impl ListOptions {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Clamp to page >= 1 and 1..=100 entries per page.
    fn normalized(self) -> (usize, usize) {
        (self.page.max(1), self.per_page.clamp(1, MAX_PER_PAGE))
    }
}

/// Create/Get/Update/Delete/List/Count over the secret backend.
pub struct VaultSecretService {
    store: Arc<dyn LogicalStore>,
    layout: KvLayout,
    validator: Arc<dyn SecretValidator>,
    renewal: Mutex<Option<RenewalHandle>>,
}

impl VaultSecretService {
    /// Connect using `settings`.
    ///
    /// With the `aws` auth method this signs against the environment's AWS
    /// credentials, logs in before returning and starts token renewal.
    pub async fn new(settings: VaultSettings) -> Result<Self> {
        let signer = AwsIamSigner::from_env().with_server_id(settings.aws_server_id.clone());
        Self::with_identity_signer(settings, Arc::new(signer)).await
    }

    /// Like [`new`](Self::new) with a caller-supplied identity signer.
    pub async fn with_identity_signer(
        settings: VaultSettings,
        signer: Arc<dyn IdentitySigner>,
    ) -> Result<Self> {
        settings.validate()?;
        let layout = settings.layout()?;
        let http = VaultHttp::new(&settings.address, settings.namespace.clone(), settings.timeout)?;

        let (credentials, renewal) = match settings.auth()? {
            AuthMethod::Token => {
                let token = settings.token.clone().unwrap_or_default();
                if token.is_empty() {
                    tracing::warn!(
                        address = %http.address(),
                        "No token configured for secret store"
                    );
                }
                (CredentialStore::new(Credential::fixed(token)), None)
            }
            AuthMethod::Aws => {
                let credentials = CredentialStore::unauthenticated();
                let role = settings.aws_role.clone().unwrap_or_default();
                let manager =
                    Arc::new(TokenManager::new(http.clone(), credentials.clone(), signer, role));
                manager.authenticate().await.map_err(|e| {
                    tracing::error!(
                        error = %e,
                        address = %http.address(),
                        "Initial secret store login failed"
                    );
                    e
                })?;
                (credentials, Some(manager.spawn(settings.renewal)))
            }
        };

        tracing::info!(
            address = %http.address(),
            version = %layout.version(),
            prefix = %layout.prefix(),
            auth_method = %settings.auth_method,
            "Connected to secret store"
        );

        let store = Arc::new(HttpLogicalStore::new(http, credentials));
        Ok(Self {
            store,
            layout,
            validator: Arc::new(StandardSecretValidator),
            renewal: Mutex::new(renewal),
        })
    }

    /// Service over an arbitrary logical store, without token management.
    pub fn with_store(store: Arc<dyn LogicalStore>, layout: KvLayout) -> Self {
        Self {
            store,
            layout,
            validator: Arc::new(StandardSecretValidator),
            renewal: Mutex::new(None),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn SecretValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn driver(&self) -> &'static str {
        DRIVER_NAME
    }

    pub fn layout(&self) -> &KvLayout {
        &self.layout
    }

    /// Stop token renewal. Idempotent.
    pub async fn shutdown(&self) {
        let handle = self.renewal.lock().await.take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    /// Store a new secret and return it as read back from the backend.
    pub async fn create(
        &self,
        scope: SecretScope,
        org: &str,
        secondary: &str,
        secret: &Secret,
    ) -> Result<Secret> {
        let key = SecretKey::new(scope, org, secondary, secret.name());
        let span = crate::vault_span!("create", key = %key);

        async {
            let mut record = secret.clone();
            record.stamp_identity(scope, org, secondary);
            self.validator.validate(scope, &record)?;

            self.write(&key, &record).await.map_err(|e| e.with_context(format!("create {}", key)))?;
            tracing::info!(key = %key, "Created secret");
            self.get(scope, org, secondary, &key.name).await
        }
        .instrument(span)
        .await
    }

    /// Read one secret.
    pub async fn get(
        &self,
        scope: SecretScope,
        org: &str,
        secondary: &str,
        name: &str,
    ) -> Result<Secret> {
        let key = SecretKey::new(scope, org, secondary, name);
        let span = crate::vault_span!("get", key = %key);

        async {
            let path = self.path_for(&key);
            let envelope = self
                .store
                .read(&path)
                .await
                .map_err(|e| e.with_context(format!("get {}", key)))?
                .ok_or_else(|| SecretsError::not_found(key.to_string()))?;

            tracing::debug!(key = %key, "Read secret");
            Ok(codec::from_envelope(&self.layout.unwrap(envelope)))
        }
        .instrument(span)
        .await
    }

    /// Read-modify-write: overlay the fields set on `secret` onto the stored one.
    pub async fn update(
        &self,
        scope: SecretScope,
        org: &str,
        secondary: &str,
        secret: &Secret,
    ) -> Result<Secret> {
        let key = SecretKey::new(scope, org, secondary, secret.name());
        let span = crate::vault_span!("update", key = %key);

        async {
            let mut record = self.get(scope, org, secondary, &key.name).await?;
            record.merge_from(secret);
            self.validator.validate(scope, &record)?;

            self.write(&key, &record).await.map_err(|e| e.with_context(format!("update {}", key)))?;
            tracing::info!(key = %key, "Updated secret");
            self.get(scope, org, secondary, &key.name).await
        }
        .instrument(span)
        .await
    }

    /// Remove a secret. The backend's own answer passes through unchanged.
    pub async fn delete(
        &self,
        scope: SecretScope,
        org: &str,
        secondary: &str,
        name: &str,
    ) -> Result<()> {
        let key = SecretKey::new(scope, org, secondary, name);
        let span = crate::vault_span!("delete", key = %key);

        async {
            self.store
                .delete(&self.path_for(&key))
                .await
                .map_err(|e| e.with_context(format!("delete {}", key)))?;
            tracing::info!(key = %key, "Deleted secret");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Every secret under (scope, org, secondary), one read per key.
    pub async fn list(
        &self,
        scope: SecretScope,
        org: &str,
        secondary: &str,
    ) -> Result<Vec<Secret>> {
        let span = crate::vault_span!("list", scope = %scope, org = %org, secondary = %secondary);

        async {
            let keys = self.keys(scope, org, secondary).await?;
            self.fetch_all(scope, org, secondary, &keys).await
        }
        .instrument(span)
        .await
    }

    /// One page of secrets, ordered by name. Only the page's keys are read.
    pub async fn list_page(
        &self,
        scope: SecretScope,
        org: &str,
        secondary: &str,
        options: ListOptions,
    ) -> Result<Vec<Secret>> {
        let (page, per_page) = options.normalized();
        let span = crate::vault_span!("list_page", scope = %scope, org = %org, page, per_page);

        async {
            let mut keys = self.keys(scope, org, secondary).await?;
            keys.sort();
            let start = (page - 1).saturating_mul(per_page);
            let page_keys: Vec<String> = keys.into_iter().skip(start).take(per_page).collect();
            self.fetch_all(scope, org, secondary, &page_keys).await
        }
        .instrument(span)
        .await
    }

    /// Number of secrets under (scope, org, secondary).
    pub async fn count(&self, scope: SecretScope, org: &str, secondary: &str) -> Result<i64> {
        let span = crate::vault_span!("count", scope = %scope, org = %org, secondary = %secondary);
        async { Ok(self.keys(scope, org, secondary).await?.len() as i64) }
            .instrument(span)
            .await
    }

    fn path_for(&self, key: &SecretKey) -> String {
        secret_path(self.layout.prefix(), key.scope, &key.org, &key.secondary, &key.name)
    }

    async fn write(&self, key: &SecretKey, record: &Secret) -> Result<()> {
        let payload = self.layout.wrap(codec::to_envelope(record));
        self.store.write(&self.path_for(key), payload).await
    }

    async fn fetch_all(
        &self,
        scope: SecretScope,
        org: &str,
        secondary: &str,
        keys: &[String],
    ) -> Result<Vec<Secret>> {
        let mut secrets = Vec::with_capacity(keys.len());
        for name in keys {
            secrets.push(self.get(scope, org, secondary, name).await?);
        }
        Ok(secrets)
    }

    /// Key names under a directory. An absent directory or an empty key list
    /// is `NotFound`.
    async fn keys(&self, scope: SecretScope, org: &str, secondary: &str) -> Result<Vec<String>> {
        let directory = format!("{}/{}/{}", scope, org, secondary);
        let base = directory_path(self.layout.prefix(), scope, org, secondary);
        let path = self.layout.list_path(&base);

        let listing = self
            .store
            .list(&path)
            .await
            .map_err(|e| e.with_context(format!("list {}", directory)))?
            .ok_or_else(|| SecretsError::not_found(directory.clone()))?;

        let keys = match listing.get(KEYS_FIELD) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        SecretsError::shape(format!(
                            "non-string entry in key list of {}",
                            directory
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(SecretsError::shape(format!(
                    "'{}' under {} is not a list",
                    KEYS_FIELD, directory
                )))
            }
        };

        if keys.is_empty() {
            return Err(SecretsError::not_found(directory));
        }
        tracing::debug!(directory = %directory, count = keys.len(), "Listed secret keys");
        Ok(keys)
    }
}
