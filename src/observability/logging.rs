//! # Structured Logging
//!
//! Subscriber setup and span macros built on the tracing ecosystem. Every
//! backend operation runs inside a `vault_span!` carrying a fresh
//! `operation_id`, so the log lines of one facade call can be grouped.

use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Create a tracing span for a secret-store operation.
///
/// ```rust,ignore
/// let span = vault_span!("get", scope = "repo", org = "octocat");
/// ```
#[macro_export]
macro_rules! vault_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "vault_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "vault_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `debug` when verbose, `info` if not.
/// Returns `false` when a subscriber was already installed.
pub fn init_logging(verbose: bool, format: LogFormat) -> bool {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt().with_env_filter(filter).with_target(verbose);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.is_ok()
}
