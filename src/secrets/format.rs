//! KV wire-format adapter.
//!
//! The backend's key/value engine speaks two dialects:
//!
//! - **v1 (flat)**: a secret's fields are the top-level map at
//!   `secret/<path>`, listing happens at the same path.
//! - **v2 (versioned)**: fields are nested under `data` at
//!   `secret/data/<path>`, and listing is only available under
//!   `secret/metadata/<path>`.
//!
//! [`KvLayout`] hides the difference: everything above it deals in flat
//! payloads and data-namespace paths.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::error::SecretsError;

/// Mount prefix of the v1 engine.
pub const PREFIX_V1: &str = "secret";
/// Write/read prefix of the v2 engine.
pub const PREFIX_V2_DATA: &str = "secret/data";
/// Listing prefix of the v2 engine.
pub const PREFIX_V2_METADATA: &str = "secret/metadata";

/// Supported KV engine versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvVersion {
    V1,
    V2,
}

impl KvVersion {
    pub const ALLOWED: [&'static str; 2] = ["1", "2"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V2 => "2",
        }
    }

    /// Prefix secrets are read from and written to.
    pub fn system_prefix(&self) -> &'static str {
        match self {
            Self::V1 => PREFIX_V1,
            Self::V2 => PREFIX_V2_DATA,
        }
    }
}

impl FromStr for KvVersion {
    type Err = SecretsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::V1),
            "2" => Ok(Self::V2),
            "" => Err(SecretsError::config_error("no secret store version provided")),
            other => Err(SecretsError::config_error(format!(
                "invalid secret store version '{}', must be one of: {}",
                other,
                Self::ALLOWED.join(", ")
            ))),
        }
    }
}

impl fmt::Display for KvVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Addressing and envelope rules for one configured KV engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvLayout {
    version: KvVersion,
    prefix: String,
}

impl KvLayout {
    /// Combine the engine's system prefix with an optional mount prefix.
    pub fn new(version: KvVersion, mount_prefix: Option<&str>) -> Self {
        let system = version.system_prefix();
        let prefix = match mount_prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
            Some(mount) => format!("{}/{}", system, mount),
            None => system.to_string(),
        };
        Self { version, prefix }
    }

    pub fn version(&self) -> KvVersion {
        self.version
    }

    /// Fully combined prefix every secret path starts with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Path to issue a directory listing against.
    ///
    /// Versioned engines only list under the metadata namespace, so a path in
    /// the data namespace is moved there. Anything else is left untouched.
    pub fn list_path(&self, path: &str) -> String {
        match path.strip_prefix(PREFIX_V2_DATA) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                format!("{}{}", PREFIX_V2_METADATA, rest)
            }
            _ => path.to_string(),
        }
    }

    /// Wrap a flat payload in the envelope the engine expects on write.
    pub fn wrap(&self, payload: Map<String, Value>) -> Map<String, Value> {
        match self.version {
            KvVersion::V1 => payload,
            KvVersion::V2 => {
                let mut envelope = Map::new();
                envelope.insert("data".to_string(), Value::Object(payload));
                envelope
            }
        }
    }

    /// Extract the flat payload from an envelope returned on read.
    ///
    /// Descends into `data` whenever it holds an object, regardless of the
    /// configured version, so flat, versioned and legacy nested layouts all
    /// decode the same way.
    pub fn unwrap(&self, mut envelope: Map<String, Value>) -> Map<String, Value> {
        match envelope.remove("data") {
            Some(Value::Object(inner)) => inner,
            Some(other) => {
                envelope.insert("data".to_string(), other);
                envelope
            }
            None => envelope,
        }
    }
}
