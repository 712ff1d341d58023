//! # Secret Backend Settings
//!
//! Every setting can come from the environment as `PIPELINE_VAULT_<NAME>`,
//! falling back to the conventional `VAULT_<NAME>`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use crate::secrets::auth::AuthMethod;
use crate::secrets::error::{Result, SecretsError};
use crate::secrets::format::{KvLayout, KvVersion};
use crate::secrets::types::SecretString;

pub const DEFAULT_RENEWAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_PREFIX: &str = "PIPELINE_VAULT_";
const FALLBACK_PREFIX: &str = "VAULT_";

/// Connection and authentication settings for the secret backend.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VaultSettings {
    /// Backend base URL, e.g. `https://vault.example.com:8200`.
    #[validate(length(min = 1, message = "Secret store address is required"))]
    pub address: String,

    /// Empty for a static token, `aws` for IAM login.
    pub auth_method: String,

    /// Backend role to log in as when `auth_method` is `aws`.
    pub aws_role: Option<String>,

    /// Value for the signed `X-Vault-AWS-IAM-Server-ID` header.
    pub aws_server_id: Option<String>,

    /// Mount prefix appended to the system prefix.
    pub prefix: Option<String>,

    /// Static token for the default auth method.
    pub token: Option<SecretString>,

    /// Token renewal period.
    #[serde(with = "duration_text")]
    pub renewal: Duration,

    /// KV wire version, `"1"` or `"2"`.
    #[validate(length(min = 1, message = "Secret store version is required"))]
    pub version: String,

    pub namespace: Option<String>,

    /// Per-request HTTP timeout.
    #[serde(with = "duration_text")]
    pub timeout: Duration,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: String::new(),
            auth_method: String::new(),
            aws_role: None,
            aws_server_id: None,
            prefix: None,
            token: None,
            renewal: DEFAULT_RENEWAL,
            version: String::new(),
            namespace: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl VaultSettings {
    /// Settings for a static-token client.
    pub fn new(address: impl Into<String>, version: impl Into<String>) -> Self {
        Self { address: address.into(), version: version.into(), ..Default::default() }
    }

    pub fn with_token(mut self, token: impl Into<SecretString>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_aws(mut self, role: impl Into<String>) -> Self {
        self.auth_method = AuthMethod::Aws.as_str().to_string();
        self.aws_role = Some(role.into());
        self
    }

    /// Load from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let settings = Self {
            address: env_setting("ADDR").unwrap_or_default(),
            auth_method: env_setting("AUTH_METHOD").unwrap_or_default(),
            aws_role: env_setting("AWS_ROLE"),
            aws_server_id: env_setting("AWS_SERVER_ID"),
            prefix: env_setting("PREFIX"),
            token: env_setting("TOKEN").map(SecretString::new),
            renewal: match env_setting("RENEWAL") {
                Some(raw) => parse_duration(&raw)?,
                None => defaults.renewal,
            },
            version: env_setting("VERSION").unwrap_or_default(),
            namespace: env_setting("NAMESPACE"),
            timeout: match env_setting("TIMEOUT") {
                Some(raw) => parse_duration(&raw)?,
                None => defaults.timeout,
            },
        };
        Ok(settings)
    }

    /// Load from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SecretsError::config_error(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw).map_err(|e| {
            SecretsError::config_error(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Reject settings the client cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if let Err(errors) = Validate::validate(self) {
            let message = errors
                .field_errors()
                .into_values()
                .flatten()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .next()
                .unwrap_or_else(|| errors.to_string());
            return Err(SecretsError::config_error(message));
        }

        self.kv_version()?;
        if self.auth()? == AuthMethod::Aws {
            if self.aws_role.as_deref().map(str::is_empty).unwrap_or(true) {
                return Err(SecretsError::config_error("aws auth method requires a role"));
            }
            if self.renewal.is_zero() {
                return Err(SecretsError::config_error("Token renewal period must be positive"));
            }
        }
        Ok(())
    }

    pub fn kv_version(&self) -> Result<KvVersion> {
        self.version.parse()
    }

    pub fn auth(&self) -> Result<AuthMethod> {
        self.auth_method.parse()
    }

    pub fn layout(&self) -> Result<KvLayout> {
        Ok(KvLayout::new(self.kv_version()?, self.prefix.as_deref()))
    }
}

fn env_setting(name: &str) -> Option<String> {
    [ENV_PREFIX, FALLBACK_PREFIX]
        .iter()
        .filter_map(|prefix| std::env::var(format!("{}{}", prefix, name)).ok())
        .find(|v| !v.trim().is_empty())
}

/// Parse `300`, `300s`, `5m`, `1h` or compound forms like `1h30m`.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let invalid = || SecretsError::config_error(format!("Invalid duration '{}'", raw));
    if raw.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let amount: u64 = digits.parse().map_err(|_| invalid())?;
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            _ => return Err(invalid()),
        };
        total = amount
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(invalid());
    }
    Ok(Duration::from_secs(total))
}

mod duration_text {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}s", value.as_secs()))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => super::parse_duration(&text).map_err(de::Error::custom),
        }
    }
}
