//! # Configuration
//!
//! Client settings for the secret backend, loaded from the environment or a
//! TOML file.

pub mod settings;

pub use settings::{parse_duration, VaultSettings, DEFAULT_RENEWAL, DEFAULT_TIMEOUT};
