//! Client for a Vault-style key/value secret backend.
//!
//! Layers, leaves first:
//!
//! - [`path`] builds storage paths from (scope, org, secondary, name).
//! - [`format`] adapts paths and payloads to KV v1 (flat) or v2 (`data`-wrapped).
//! - [`codec`] maps between [`Secret`](crate::domain::Secret) and the untyped payload.
//! - [`transport`] speaks the backend's HTTP read/write/list/delete API.
//! - [`auth`] holds the token and keeps it alive through AWS IAM login.
//! - [`vault`] is the operations facade tying them together.

pub mod auth;
pub mod codec;
pub mod error;
pub mod format;
pub mod path;
pub mod transport;
pub mod types;
pub mod vault;

pub use auth::{
    AuthMethod, Credential, CredentialStore, IdentitySigner, RenewalHandle, TokenManager,
};
pub use error::{Result, SecretsError};
pub use format::{KvLayout, KvVersion};
pub use transport::{HttpLogicalStore, LogicalStore, VaultHttp};
pub use types::SecretString;
pub use vault::{ListOptions, VaultSecretService, DRIVER_NAME};
