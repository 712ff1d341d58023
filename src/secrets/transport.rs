//! HTTP access to the backend's logical read/write/list/delete primitives.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use super::auth::CredentialStore;
use super::error::{Result, SecretsError};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// The backend's generic path-addressed storage primitives.
///
/// `read` and `list` return the response's `data` object, or `None` when the
/// backend has nothing at the path.
#[async_trait]
pub trait LogicalStore: Send + Sync {
    async fn read(&self, path: &str) -> Result<Option<Map<String, Value>>>;

    async fn write(&self, path: &str, data: Map<String, Value>) -> Result<()>;

    async fn list(&self, path: &str) -> Result<Option<Map<String, Value>>>;

    async fn delete(&self, path: &str) -> Result<()>;
}

/// Low-level HTTP client bound to one backend address.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct VaultHttp {
    client: Client,
    address: String,
    namespace: Option<String>,
}

impl VaultHttp {
    pub fn new(address: &str, namespace: Option<String>, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(address).map_err(|e| {
            SecretsError::config_error(format!("Invalid secret store address '{}': {}", address, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SecretsError::config_error(format!(
                "Secret store address must be http(s), got '{}'",
                parsed.scheme()
            )));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            SecretsError::config_error(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            address: address.trim_end_matches('/').to_string(),
            namespace: namespace.filter(|n| !n.is_empty()),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    /// Request against `/v1/<path>` carrying the namespace header, no token.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.namespace {
            Some(namespace) => builder.header(NAMESPACE_HEADER, namespace),
            None => builder,
        }
    }

    /// Request carrying the current token from `credentials`.
    pub async fn authed(
        &self,
        credentials: &CredentialStore,
        method: Method,
        path: &str,
    ) -> RequestBuilder {
        let token = credentials.token().await;
        let builder = self.request(method, path);
        if token.is_empty() {
            builder
        } else {
            builder.header(TOKEN_HEADER, token.expose_secret())
        }
    }
}

/// Decode a successful JSON body, or turn a failed response into an error.
pub async fn json_or_error<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let resp = error_for_status(resp).await?;
    Ok(resp.json::<T>().await?)
}

/// Pass a 2xx response through, otherwise build a transport error from the
/// backend's `errors` list.
pub async fn error_for_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let errors = parse_backend_errors(resp).await;
    let message = if errors.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        errors.join(", ")
    };
    Err(SecretsError::http_status(status.as_u16(), message))
}

async fn parse_backend_errors(resp: Response) -> Vec<String> {
    resp.json::<Value>()
        .await
        .ok()
        .and_then(|v| {
            v.get("errors")?
                .as_array()
                .map(|arr| arr.iter().filter_map(|e| e.as_str().map(String::from)).collect())
        })
        .unwrap_or_default()
}

/// [`LogicalStore`] over the backend's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpLogicalStore {
    http: VaultHttp,
    credentials: CredentialStore,
}

impl HttpLogicalStore {
    pub fn new(http: VaultHttp, credentials: CredentialStore) -> Self {
        Self { http, credentials }
    }

    pub fn http(&self) -> &VaultHttp {
        &self.http
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    async fn read_data(
        &self,
        method: Method,
        path: &str,
        list: bool,
    ) -> Result<Option<Map<String, Value>>> {
        let target = if list { format!("{}?list=true", path) } else { path.to_string() };
        let resp = self.http.authed(&self.credentials, method, &target).await.send().await?;

        match resp.status() {
            StatusCode::NOT_FOUND => {
                debug!(path = %path, list, "Nothing stored at path");
                return Ok(None);
            }
            StatusCode::NO_CONTENT => return Ok(None),
            _ => {}
        }

        let body: Value = json_or_error(resp).await?;
        match body.get("data") {
            Some(Value::Object(data)) => Ok(Some(data.clone())),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(SecretsError::shape(format!("'data' at {} is not an object", path))),
        }
    }
}

#[async_trait]
impl LogicalStore for HttpLogicalStore {
    async fn read(&self, path: &str) -> Result<Option<Map<String, Value>>> {
        self.read_data(Method::GET, path, false).await
    }

    async fn write(&self, path: &str, data: Map<String, Value>) -> Result<()> {
        let resp = self
            .http
            .authed(&self.credentials, Method::PUT, path)
            .await
            .json(&data)
            .send()
            .await?;
        error_for_status(resp).await?;
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Option<Map<String, Value>>> {
        self.read_data(Method::GET, path, true).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let resp = self.http.authed(&self.credentials, Method::DELETE, path).await.send().await?;
        error_for_status(resp).await?;
        Ok(())
    }
}
