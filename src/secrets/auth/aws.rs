//! AWS IAM identity assertion for the backend's `aws` auth method.
//!
//! The client never sends AWS credentials to the secret backend. It signs an
//! `sts:GetCallerIdentity` request with Signature Version 4 and hands the
//! signed method, URL, headers and body to the backend, which replays the
//! request against STS to learn who we are.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::secrets::error::{Result, SecretsError};
use crate::secrets::types::SecretString;

/// Body of the identity request, fixed by the STS API.
pub const GET_CALLER_IDENTITY_BODY: &str = "Action=GetCallerIdentity&Version=2011-06-15";
/// Global STS endpoint, signed for `us-east-1`.
pub const DEFAULT_STS_ENDPOINT: &str = "https://sts.amazonaws.com/";
pub const DEFAULT_REGION: &str = "us-east-1";
/// Header the backend checks against its configured server ID.
pub const SERVER_ID_HEADER: &str = "X-Vault-AWS-IAM-Server-ID";

const SERVICE: &str = "sts";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

type HmacSha256 = Hmac<Sha256>;

/// A signed request captured for replay by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIdentityRequest {
    pub method: String,
    pub url: String,
    /// Header name → values, the multi-valued shape the backend replays.
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: Vec<u8>,
}

impl SignedIdentityRequest {
    /// Body for the backend's `auth/aws/login` endpoint.
    ///
    /// Everything except the role and method is base64-encoded.
    pub fn login_payload(&self, role: &str) -> Result<Value> {
        let headers = serde_json::to_vec(&self.headers)?;
        Ok(json!({
            "role": role,
            "iam_http_request_method": self.method,
            "iam_request_url": STANDARD.encode(self.url.as_bytes()),
            "iam_request_headers": STANDARD.encode(headers),
            "iam_request_body": STANDARD.encode(&self.body),
        }))
    }
}

/// Produces a fresh identity assertion for each login attempt.
#[async_trait]
pub trait IdentitySigner: Send + Sync {
    async fn sign(&self) -> Result<SignedIdentityRequest>;
}

/// Static AWS credentials.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

impl AwsCredentials {
    /// Read `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and optional `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let access_key_id = non_empty_env("AWS_ACCESS_KEY_ID").ok_or_else(|| {
            SecretsError::authentication("AWS_ACCESS_KEY_ID is not set for aws authentication")
        })?;
        let secret_access_key = non_empty_env("AWS_SECRET_ACCESS_KEY").ok_or_else(|| {
            SecretsError::authentication("AWS_SECRET_ACCESS_KEY is not set for aws authentication")
        })?;
        Ok(Self {
            access_key_id,
            secret_access_key: SecretString::new(secret_access_key),
            session_token: non_empty_env("AWS_SESSION_TOKEN").map(SecretString::new),
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Signs `sts:GetCallerIdentity` with SigV4.
#[derive(Debug, Clone)]
pub struct AwsIamSigner {
    /// `None` re-reads the environment on every signature so rotated
    /// credentials are picked up.
    credentials: Option<AwsCredentials>,
    region: String,
    endpoint: String,
    server_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl AwsIamSigner {
    pub fn new(credentials: AwsCredentials, region: impl Into<String>) -> Self {
        Self {
            credentials: Some(credentials),
            region: region.into(),
            endpoint: DEFAULT_STS_ENDPOINT.to_string(),
            server_id: None,
            timestamp: None,
        }
    }

    /// Signer using environment credentials and `AWS_REGION` / `AWS_DEFAULT_REGION`.
    ///
    /// A non-default region switches to that region's STS endpoint.
    pub fn from_env() -> Self {
        let region = non_empty_env("AWS_REGION")
            .or_else(|| non_empty_env("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = if region == DEFAULT_REGION {
            DEFAULT_STS_ENDPOINT.to_string()
        } else {
            format!("https://sts.{}.amazonaws.com/", region)
        };
        Self { credentials: None, region, endpoint, server_id: None, timestamp: None }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_server_id(mut self, server_id: Option<String>) -> Self {
        self.server_id = server_id.filter(|s| !s.is_empty());
        self
    }

    /// Pin the signing time (for testing).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Build and sign the identity request.
    pub fn sign_request(&self, credentials: &AwsCredentials) -> Result<SignedIdentityRequest> {
        let url = url::Url::parse(&self.endpoint).map_err(|e| {
            SecretsError::config_error(format!("Invalid STS endpoint '{}': {}", self.endpoint, e))
        })?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(SecretsError::config_error(format!(
                    "STS endpoint '{}' has no host",
                    self.endpoint
                )))
            }
        };

        let now = self.timestamp.unwrap_or_else(Utc::now);
        let date_str = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let body = GET_CALLER_IDENTITY_BODY.as_bytes().to_vec();

        // lowercase name -> (wire name, value)
        let mut headers: BTreeMap<String, (String, String)> = BTreeMap::new();
        headers.insert("content-type".into(), ("Content-Type".into(), CONTENT_TYPE.into()));
        headers.insert("host".into(), ("Host".into(), host));
        headers.insert("x-amz-date".into(), ("X-Amz-Date".into(), amz_date.clone()));
        if let Some(token) = &credentials.session_token {
            headers.insert(
                "x-amz-security-token".into(),
                ("X-Amz-Security-Token".into(), token.expose_secret().to_string()),
            );
        }
        if let Some(server_id) = &self.server_id {
            headers.insert(
                SERVER_ID_HEADER.to_ascii_lowercase(),
                (SERVER_ID_HEADER.into(), server_id.clone()),
            );
        }

        let canonical_headers: String = headers
            .iter()
            .map(|(name, (_, value))| format!("{}:{}\n", name, value.trim()))
            .collect();
        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");
        let canonical_uri = match url.path() {
            "" => "/",
            path => path,
        };

        let canonical_request = format!(
            "POST\n{}\n{}\n{}\n{}\n{}",
            canonical_uri,
            url.query().unwrap_or(""),
            canonical_headers,
            signed_headers,
            hex_sha256(&body)
        );

        let credential_scope = format!("{}/{}/{}/aws4_request", date_str, self.region, SERVICE);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            credentials.secret_access_key.expose_secret(),
            &date_str,
            &self.region,
            SERVICE,
        )?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, credentials.access_key_id, credential_scope, signed_headers, signature
        );

        let mut wire_headers: BTreeMap<String, Vec<String>> =
            headers.into_values().map(|(name, value)| (name, vec![value])).collect();
        wire_headers.insert("Authorization".into(), vec![authorization]);

        Ok(SignedIdentityRequest {
            method: "POST".to_string(),
            url: url.to_string(),
            headers: wire_headers,
            body,
        })
    }
}

#[async_trait]
impl IdentitySigner for AwsIamSigner {
    async fn sign(&self) -> Result<SignedIdentityRequest> {
        match &self.credentials {
            Some(credentials) => self.sign_request(credentials),
            None => self.sign_request(&AwsCredentials::from_env()?),
        }
    }
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SecretsError::authentication(format!("invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}
