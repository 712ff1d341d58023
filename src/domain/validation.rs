//! Validation of secrets before they are written to the backend.

use validator::Validate;

use super::secret::{Secret, SecretScope};
use crate::secrets::error::{Result, SecretsError};

/// Contract the operations facade calls before every write.
///
/// Callers with stricter rules (naming policies, value size limits) plug in
/// their own implementation.
pub trait SecretValidator: Send + Sync {
    fn validate(&self, scope: SecretScope, secret: &Secret) -> Result<()>;
}

/// Default rules: identity fields present for the scope, a value, sane lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardSecretValidator;

impl SecretValidator for StandardSecretValidator {
    fn validate(&self, scope: SecretScope, secret: &Secret) -> Result<()> {
        Validate::validate(secret).map_err(|errors| {
            let field = errors.field_errors().keys().next().map(|k| k.to_string());
            let message = errors.to_string();
            match field {
                Some(field) => SecretsError::validation_field(message, field),
                None => SecretsError::validation(message),
            }
        })?;

        require(&secret.org, "org")?;
        require(&secret.name, "name")?;
        match scope {
            SecretScope::Org => {}
            SecretScope::Repo => require(&secret.repo, "repo")?,
            SecretScope::Shared => require(&secret.team, "team")?,
        }
        require(&secret.value, "value")?;

        if let Some(images) = &secret.images {
            if images.iter().any(|image| image.trim().is_empty()) {
                return Err(SecretsError::validation_field(
                    "image patterns cannot be empty",
                    "images",
                ));
            }
        }

        if let Some(repos) = secret.repo_allowlist.as_ref().filter(|r| !r.is_empty()) {
            if scope != SecretScope::Shared {
                return Err(SecretsError::validation_field(
                    format!("repo allowlist is only supported for shared secrets, not {}", scope),
                    "repo_allowlist",
                ));
            }
            if repos.iter().any(|r| r.trim().is_empty()) {
                return Err(SecretsError::validation_field(
                    "repo allowlist entries cannot be empty",
                    "repo_allowlist",
                ));
            }
        }

        Ok(())
    }
}

fn require(field: &Option<String>, name: &str) -> Result<()> {
    match field.as_deref() {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(SecretsError::validation_field(format!("no secret {} provided", name), name)),
    }
}
