//! # Domain Model
//!
//! Secret types shared by the secret-store client and the layers that
//! consume it (build orchestration, secret injection).

pub mod events;
pub mod secret;
pub mod validation;

pub use events::AllowEvents;
pub use secret::{Secret, SecretKey, SecretScope, WILDCARD};
pub use validation::{SecretValidator, StandardSecretValidator};
