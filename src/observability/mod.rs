//! # Observability
//!
//! Structured logging for the secret client and its binary.

pub mod logging;

pub use logging::{init_logging, LogFormat};
