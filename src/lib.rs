//! # pipeline-vault
//!
//! External secret-store client for a continuous-integration server. Secrets
//! live in a Vault-style key/value backend under one of three scopes:
//!
//! ```text
//! org     secrets shared by every repository of an organization
//! repo    secrets of a single repository
//! shared  secrets owned by a team, optionally limited to listed repositories
//! ```
//!
//! The client speaks both the flat (KV v1) and the versioned (KV v2) wire
//! formats, tolerates payloads written by other clients, and can keep an
//! AWS IAM-issued token alive in the background.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pipeline_vault::config::VaultSettings;
//! use pipeline_vault::domain::SecretScope;
//! use pipeline_vault::secrets::{Result, VaultSecretService};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let service = VaultSecretService::new(VaultSettings::from_env()?).await?;
//!     let count = service.count(SecretScope::Org, "octocat", "*").await?;
//!     println!("{} org secrets", count);
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod observability;
pub mod secrets;

pub use config::VaultSettings;
pub use domain::{AllowEvents, Secret, SecretKey, SecretScope};
pub use secrets::{Result, SecretsError, VaultSecretService};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
