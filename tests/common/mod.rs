//! Shared fixtures for integration tests: a stateful in-process Vault double
//! built on wiremock, and a canned AWS identity signer.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pipeline_vault::config::VaultSettings;
use pipeline_vault::secrets::auth::{IdentitySigner, SignedIdentityRequest};
use pipeline_vault::secrets::Result;
use serde_json::{json, Map, Value};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const ROOT_TOKEN: &str = "s.root";
pub const LOGIN_TOKEN: &str = "s.aws-login";
pub const RENEWED_TOKEN: &str = "s.renewed";

#[derive(Default)]
struct VaultState {
    /// logical path -> the `data` object returned on read
    entries: BTreeMap<String, Value>,
    /// list path -> forced `data` object returned on list
    listings: BTreeMap<String, Value>,
    tokens: BTreeSet<String>,
    logins: usize,
    renewals: usize,
    fail_logins: bool,
}

/// In-memory Vault answering the logical KV API, AWS login and renew-self.
///
/// Writes under `secret/data/...` behave like a KV v2 mount (the body's
/// `data` object is stored and reads return it next to `metadata`); every
/// other path behaves like KV v1.
pub struct MockVault {
    pub server: MockServer,
    state: Arc<Mutex<VaultState>>,
}

impl MockVault {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let mut state = VaultState::default();
        state.tokens.insert(ROOT_TOKEN.to_string());
        let state = Arc::new(Mutex::new(state));

        Mock::given(any())
            .respond_with(VaultResponder { state: state.clone() })
            .mount(&server)
            .await;

        Self { server, state }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Static-token settings pointing at this double.
    pub fn settings(&self, version: &str) -> VaultSettings {
        VaultSettings::new(self.uri(), version).with_token(ROOT_TOKEN)
    }

    /// Store the `data` object a read of `path` returns.
    pub fn seed(&self, path: &str, data: Value) {
        self.state.lock().unwrap().entries.insert(path.to_string(), data);
    }

    /// Force the `data` object a list of `path` returns.
    pub fn seed_listing(&self, path: &str, data: Value) {
        self.state.lock().unwrap().listings.insert(path.to_string(), data);
    }

    pub fn entry(&self, path: &str) -> Option<Value> {
        self.state.lock().unwrap().entries.get(path).cloned()
    }

    pub fn logins(&self) -> usize {
        self.state.lock().unwrap().logins
    }

    pub fn renewals(&self) -> usize {
        self.state.lock().unwrap().renewals
    }

    pub fn fail_logins(&self, fail: bool) {
        self.state.lock().unwrap().fail_logins = fail;
    }

    /// Paths (with query) of every request received so far, as `METHOD path?query`.
    pub async fn request_log(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|req| match req.url.query() {
                Some(query) => format!("{} {}?{}", req.method, req.url.path(), query),
                None => format!("{} {}", req.method, req.url.path()),
            })
            .collect()
    }
}

struct VaultResponder {
    state: Arc<Mutex<VaultState>>,
}

fn errors(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({ "errors": [message] }))
}

fn auth_block(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "auth": {"client_token": token, "lease_duration": 3600, "renewable": true}
    }))
}

impl Respond for VaultResponder {
    fn respond(&self, req: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let method = req.method.to_string();
        let logical = req.url.path().trim_start_matches("/v1/").to_string();
        let listing = req.url.query_pairs().any(|(k, v)| k == "list" && v == "true");

        if method == "POST" && logical == "auth/aws/login" {
            let body: Value = serde_json::from_slice(&req.body).unwrap_or(Value::Null);
            if state.fail_logins || body.get("role").and_then(Value::as_str).is_none() {
                return errors(400, "error validating identity");
            }
            state.logins += 1;
            state.tokens.insert(LOGIN_TOKEN.to_string());
            return auth_block(LOGIN_TOKEN);
        }

        let token = req
            .headers
            .get("x-vault-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !state.tokens.contains(&token) {
            return errors(403, "permission denied");
        }

        if method == "POST" && logical == "auth/token/renew-self" {
            state.renewals += 1;
            state.tokens.insert(RENEWED_TOKEN.to_string());
            return auth_block(RENEWED_TOKEN);
        }

        match method.as_str() {
            "GET" if listing => {
                if let Some(data) = state.listings.get(&logical) {
                    return ResponseTemplate::new(200).set_body_json(json!({ "data": data }));
                }
                let directory = match logical.strip_prefix("secret/metadata/") {
                    Some(rest) => format!("secret/data/{}/", rest),
                    None => format!("{}/", logical),
                };
                let keys: Vec<String> = state
                    .entries
                    .keys()
                    .filter_map(|k| k.strip_prefix(&directory))
                    .filter(|name| !name.contains('/'))
                    .map(str::to_string)
                    .collect();
                if keys.is_empty() {
                    return errors(404, "");
                }
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "keys": keys } }))
            }
            "GET" => match state.entries.get(&logical) {
                Some(data) => ResponseTemplate::new(200)
                    .set_body_json(json!({ "lease_duration": 2764800, "data": data })),
                None => errors(404, ""),
            },
            "PUT" | "POST" => {
                let body: Map<String, Value> = match serde_json::from_slice(&req.body) {
                    Ok(body) => body,
                    Err(_) => return errors(400, "failed to parse JSON input"),
                };
                if logical.starts_with("secret/data/") {
                    let Some(Value::Object(inner)) = body.get("data") else {
                        return errors(400, "no data provided");
                    };
                    let version = state
                        .entries
                        .get(&logical)
                        .and_then(|e| e.pointer("/metadata/version"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0)
                        + 1;
                    state.entries.insert(
                        logical,
                        json!({ "data": inner, "metadata": { "version": version } }),
                    );
                    ResponseTemplate::new(200)
                        .set_body_json(json!({ "data": { "version": version } }))
                } else {
                    state.entries.insert(logical, Value::Object(body));
                    ResponseTemplate::new(204)
                }
            }
            "DELETE" => {
                state.entries.remove(&logical);
                ResponseTemplate::new(204)
            }
            _ => errors(405, "unsupported operation"),
        }
    }
}

/// Identity signer returning a fixed, already "signed" STS request.
pub struct StaticSigner;

#[async_trait]
impl IdentitySigner for StaticSigner {
    async fn sign(&self) -> Result<SignedIdentityRequest> {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Authorization".to_string(),
            vec![
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240115/us-east-1/sts/aws4_request"
                    .to_string(),
            ],
        );
        Ok(SignedIdentityRequest {
            method: "POST".to_string(),
            url: "https://sts.amazonaws.com/".to_string(),
            headers,
            body: b"Action=GetCallerIdentity&Version=2011-06-15".to_vec(),
        })
    }
}
