//! Pipeline secret domain types.
//!
//! A secret belongs to exactly one [`SecretScope`]. The scope decides which
//! secondary key identifies it next to the organization:
//!
//! - **Org**: organization-wide, the secondary key is the `*` wildcard
//! - **Repo**: a single repository, the secondary key is the repository name
//! - **Shared**: a team inside the organization, the secondary key is the team name
//!
//! Every field of [`Secret`] is optional so that an unset field can be told
//! apart from a zero value. Writes omit unset fields and updates overlay only
//! the fields that were set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::events::AllowEvents;

/// Wildcard secondary key used by organization secrets.
pub const WILDCARD: &str = "*";

/// Secret scope enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretScope {
    /// Organization-wide secret
    Org,
    /// Repository secret
    Repo,
    /// Team secret shared across repositories
    Shared,
}

impl SecretScope {
    pub const ALL: [SecretScope; 3] = [Self::Org, Self::Repo, Self::Shared];

    /// Storage representation of this scope
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Org => "org",
            Self::Repo => "repo",
            Self::Shared => "shared",
        }
    }

    /// Human-readable meaning of the secondary key for this scope.
    pub fn secondary_label(&self) -> &'static str {
        match self {
            Self::Org => "wildcard",
            Self::Repo => "repo",
            Self::Shared => "team",
        }
    }
}

impl FromStr for SecretScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "org" => Ok(Self::Org),
            "repo" => Ok(Self::Repo),
            "shared" => Ok(Self::Shared),
            _ => Err(format!("Unknown secret type: {}", s)),
        }
    }
}

impl fmt::Display for SecretScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of a secret in the backend: (scope, org, secondary key, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretKey {
    pub scope: SecretScope,
    pub org: String,
    pub secondary: String,
    pub name: String,
}

impl SecretKey {
    pub fn new(
        scope: SecretScope,
        org: impl Into<String>,
        secondary: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self { scope, org: org.into(), secondary: secondary.into(), name: name.into() }
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.scope, self.org, self.secondary, self.name)
    }
}

/// A pipeline secret as stored in the external secret backend.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Secret {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<SecretScope>,

    #[validate(length(min = 1, max = 250, message = "org must be 1-250 characters"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,

    #[validate(length(min = 1, max = 250, message = "repo must be 1-250 characters"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    #[validate(length(min = 1, max = 250, message = "team must be 1-250 characters"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,

    #[validate(length(min = 1, max = 250, message = "name must be 1-250 characters"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Image patterns allowed to receive the secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_events: Option<AllowEvents>,

    /// Whether the secret may be used by steps with a `commands` block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_command: Option<bool>,

    /// Whether `${SECRET}` substitution is permitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_substitution: Option<bool>,

    /// Repositories allowed to use a shared secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_allowlist: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl Secret {
    /// Start a secret with just a name and value, the minimum a caller supplies.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: Some(name.into()), value: Some(value.into()), ..Default::default() }
    }

    pub fn with_scope(mut self, scope: SecretScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_images<I, S>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = Some(images.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_allow_events(mut self, events: AllowEvents) -> Self {
        self.allow_events = Some(events);
        self
    }

    pub fn with_allow_command(mut self, allow: bool) -> Self {
        self.allow_command = Some(allow);
        self
    }

    pub fn with_allow_substitution(mut self, allow: bool) -> Self {
        self.allow_substitution = Some(allow);
        self
    }

    pub fn with_repo_allowlist<I, S>(mut self, repos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.repo_allowlist = Some(repos.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn org(&self) -> &str {
        self.org.as_deref().unwrap_or_default()
    }

    pub fn repo(&self) -> &str {
        self.repo.as_deref().unwrap_or_default()
    }

    pub fn team(&self) -> &str {
        self.team.as_deref().unwrap_or_default()
    }

    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }

    pub fn events(&self) -> AllowEvents {
        self.allow_events.unwrap_or_default()
    }

    /// Fill in the identity fields implied by where the secret is stored.
    ///
    /// Org secrets get the `*` repo, repo secrets the repo name, shared
    /// secrets the team name and the `*` repo.
    pub fn stamp_identity(&mut self, scope: SecretScope, org: &str, secondary: &str) {
        self.scope = Some(scope);
        self.org = Some(org.to_string());
        match scope {
            SecretScope::Org => {
                self.repo = Some(WILDCARD.to_string());
            }
            SecretScope::Repo => {
                self.repo = Some(secondary.to_string());
            }
            SecretScope::Shared => {
                self.team = Some(secondary.to_string());
                self.repo = Some(WILDCARD.to_string());
            }
        }
    }

    /// Overlay the fields explicitly set on `incoming` onto `self`.
    ///
    /// The event mask is taken only when non-zero and the value only when
    /// non-empty; every other optional field is taken when present.
    pub fn merge_from(&mut self, incoming: &Secret) {
        if let Some(events) = incoming.allow_events.filter(|e| !e.is_empty()) {
            self.allow_events = Some(events);
        }
        if let Some(images) = &incoming.images {
            self.images = Some(images.clone());
        }
        if let Some(value) = incoming.value.as_ref().filter(|v| !v.is_empty()) {
            self.value = Some(value.clone());
        }
        if let Some(allow) = incoming.allow_command {
            self.allow_command = Some(allow);
        }
        if let Some(allow) = incoming.allow_substitution {
            self.allow_substitution = Some(allow);
        }
        if let Some(repos) = &incoming.repo_allowlist {
            self.repo_allowlist = Some(repos.clone());
        }
        if let Some(at) = incoming.updated_at.filter(|t| *t != 0) {
            self.updated_at = Some(at);
        }
        if let Some(by) = incoming.updated_by.as_ref().filter(|b| !b.is_empty()) {
            self.updated_by = Some(by.clone());
        }
    }

    /// Copy of the secret with the value blanked, for display.
    pub fn sanitize(&self) -> Self {
        let mut sanitized = self.clone();
        if sanitized.value.is_some() {
            sanitized.value = Some("[secure]".to_string());
        }
        sanitized
    }

    /// Whether the secret may be injected for `event`.
    ///
    /// A secret with no mask set is not exposed to any event.
    pub fn matches_event(&self, event: AllowEvents) -> bool {
        self.events().contains(event)
    }

    /// Whether `image` matches one of the allowed image patterns.
    ///
    /// No patterns means any image. A pattern matches the image exactly or
    /// as a prefix ignoring the tag (`alpine` matches `alpine:3.19`).
    pub fn allows_image(&self, image: &str) -> bool {
        let Some(images) = self.images.as_ref().filter(|i| !i.is_empty()) else {
            return true;
        };
        let untagged = image.split_once(':').map(|(name, _)| name).unwrap_or(image);
        images.iter().any(|pattern| pattern == image || pattern == untagged)
    }

    /// Whether a shared secret may be used by `repo` (`org/name`).
    pub fn allows_repo(&self, repo: &str) -> bool {
        match &self.repo_allowlist {
            Some(list) if !list.is_empty() => list.iter().any(|r| r == repo || r == WILDCARD),
            _ => true,
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("scope", &self.scope)
            .field("org", &self.org)
            .field("repo", &self.repo)
            .field("team", &self.team)
            .field("name", &self.name)
            .field("value", &self.value.as_ref().map(|_| "[REDACTED]"))
            .field("images", &self.images)
            .field("allow_events", &self.allow_events)
            .field("allow_command", &self.allow_command)
            .field("allow_substitution", &self.allow_substitution)
            .field("repo_allowlist", &self.repo_allowlist)
            .field("created_at", &self.created_at)
            .field("created_by", &self.created_by)
            .field("updated_at", &self.updated_at)
            .field("updated_by", &self.updated_by)
            .finish()
    }
}
