//! Storage path construction.
//!
//! Scope-specific shapes below the configured prefix:
//!
//! ```text
//! org     <prefix>/org/<org>/<name>
//! repo    <prefix>/repo/<org>/<repo>/<name>
//! shared  <prefix>/shared/<org>/<team>/<name>
//! ```
//!
//! Components are not validated; a malformed component yields a path the
//! backend rejects.

use crate::domain::SecretScope;

/// Path of a single secret.
pub fn secret_path(
    prefix: &str,
    scope: SecretScope,
    org: &str,
    secondary: &str,
    name: &str,
) -> String {
    format!("{}/{}", directory_path(prefix, scope, org, secondary), name)
}

/// Path of the directory holding every secret of one (scope, org, secondary).
pub fn directory_path(prefix: &str, scope: SecretScope, org: &str, secondary: &str) -> String {
    match scope {
        SecretScope::Org => format!("{}/org/{}", prefix, org),
        SecretScope::Repo => format!("{}/repo/{}/{}", prefix, org, secondary),
        SecretScope::Shared => format!("{}/shared/{}/{}", prefix, org, secondary),
    }
}
