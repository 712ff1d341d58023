//! Backend authentication: the shared credential, the AWS IAM identity
//! assertion and the token manager that keeps the credential alive.

pub mod aws;
pub mod credential;
pub mod manager;

use std::fmt;
use std::str::FromStr;

use crate::secrets::error::SecretsError;

pub use aws::{AwsCredentials, AwsIamSigner, IdentitySigner, SignedIdentityRequest};
pub use credential::{Credential, CredentialStore};
pub use manager::{RefreshOutcome, RenewalHandle, TokenManager};

/// How the client obtains its backend token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// A pre-supplied static token, never renewed.
    #[default]
    Token,
    /// AWS IAM login with background renewal.
    Aws,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Aws => "aws",
        }
    }
}

impl FromStr for AuthMethod {
    type Err = SecretsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "token" => Ok(Self::Token),
            "aws" => Ok(Self::Aws),
            other => Err(SecretsError::config_error(format!(
                "Unsupported auth method '{}', expected one of: aws",
                other
            ))),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_method_parsing() {
        assert_eq!("".parse::<AuthMethod>().unwrap(), AuthMethod::Token);
        assert_eq!("AWS".parse::<AuthMethod>().unwrap(), AuthMethod::Aws);
        assert!(matches!(
            "kubernetes".parse::<AuthMethod>(),
            Err(SecretsError::Config { .. })
        ));
    }
}
