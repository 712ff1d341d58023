//! Trigger-event bitmask controlling which pipeline events may read a secret.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of pipeline events a secret is exposed to.
///
/// Stored in the backend as the integer under `allow_events`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowEvents(i64);

impl AllowEvents {
    pub const PUSH_BRANCH: Self = Self(1 << 0);
    pub const PUSH_TAG: Self = Self(1 << 1);
    pub const PUSH_DELETE_BRANCH: Self = Self(1 << 2);
    pub const PUSH_DELETE_TAG: Self = Self(1 << 3);
    pub const PULL_OPENED: Self = Self(1 << 4);
    pub const PULL_SYNCHRONIZE: Self = Self(1 << 5);
    pub const PULL_EDITED: Self = Self(1 << 6);
    pub const PULL_REOPENED: Self = Self(1 << 7);
    pub const PULL_LABELED: Self = Self(1 << 8);
    pub const PULL_UNLABELED: Self = Self(1 << 9);
    pub const COMMENT_CREATED: Self = Self(1 << 10);
    pub const COMMENT_EDITED: Self = Self(1 << 11);
    pub const DEPLOYMENT: Self = Self(1 << 12);
    pub const SCHEDULE: Self = Self(1 << 13);

    const NAMED: [(&'static str, Self); 14] = [
        ("push:branch", Self::PUSH_BRANCH),
        ("push:tag", Self::PUSH_TAG),
        ("delete:branch", Self::PUSH_DELETE_BRANCH),
        ("delete:tag", Self::PUSH_DELETE_TAG),
        ("pull_request:opened", Self::PULL_OPENED),
        ("pull_request:synchronize", Self::PULL_SYNCHRONIZE),
        ("pull_request:edited", Self::PULL_EDITED),
        ("pull_request:reopened", Self::PULL_REOPENED),
        ("pull_request:labeled", Self::PULL_LABELED),
        ("pull_request:unlabeled", Self::PULL_UNLABELED),
        ("comment:created", Self::COMMENT_CREATED),
        ("comment:edited", Self::COMMENT_EDITED),
        ("deployment", Self::DEPLOYMENT),
        ("schedule", Self::SCHEDULE),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: i64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> i64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Translate a legacy event name (the pre-bitmask `events` list) into flags.
    ///
    /// Unknown names map to an empty mask.
    pub fn from_legacy_event(event: &str) -> Self {
        match event {
            "push" => Self::PUSH_BRANCH,
            "tag" => Self::PUSH_TAG,
            "delete" => Self::PUSH_DELETE_BRANCH | Self::PUSH_DELETE_TAG,
            "pull_request" => Self::PULL_OPENED | Self::PULL_SYNCHRONIZE | Self::PULL_REOPENED,
            "comment" => Self::COMMENT_CREATED | Self::COMMENT_EDITED,
            "deployment" => Self::DEPLOYMENT,
            "schedule" => Self::SCHEDULE,
            _ => Self::empty(),
        }
    }

    /// Fold a legacy `events` list into a mask.
    pub fn from_legacy_events<'a>(events: impl IntoIterator<Item = &'a str>) -> Self {
        events.into_iter().fold(Self::empty(), |mask, event| mask | Self::from_legacy_event(event))
    }

    /// Flag for an `event:action` pair such as `pull_request:opened`.
    ///
    /// A bare event name resolves through the legacy mapping.
    pub fn from_event_name(name: &str) -> Self {
        Self::NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, flag)| *flag)
            .unwrap_or_else(|| Self::from_legacy_event(name))
    }

    /// Names of the flags set in this mask, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED.iter().filter(|(_, flag)| self.contains(*flag)).map(|(n, _)| *n).collect()
    }
}

impl BitOr for AllowEvents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AllowEvents {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<i64> for AllowEvents {
    fn from(bits: i64) -> Self {
        Self(bits)
    }
}

impl fmt::Display for AllowEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(","))
    }
}
