//! Mapping between [`Secret`] and the backend's untyped key/value payload.
//!
//! Encoding omits every unset, empty or zero field so a write never clobbers
//! data with zero values. Decoding is tolerant: each known key is extracted
//! on its own and skipped if its type is unexpected, and unknown keys are
//! ignored. Numbers may arrive as integers, integral floats or numeric
//! strings depending on which client last wrote the secret.

use serde_json::{Map, Value};

use crate::domain::{AllowEvents, Secret, SecretScope};

pub const KEY_TYPE: &str = "type";
pub const KEY_ORG: &str = "org";
pub const KEY_REPO: &str = "repo";
pub const KEY_TEAM: &str = "team";
pub const KEY_NAME: &str = "name";
pub const KEY_VALUE: &str = "value";
pub const KEY_IMAGES: &str = "images";
pub const KEY_ALLOW_EVENTS: &str = "allow_events";
pub const KEY_ALLOW_COMMAND: &str = "allow_command";
pub const KEY_ALLOW_SUBSTITUTION: &str = "allow_substitution";
pub const KEY_REPO_ALLOWLIST: &str = "repo_allowlist";
pub const KEY_CREATED_AT: &str = "created_at";
pub const KEY_CREATED_BY: &str = "created_by";
pub const KEY_UPDATED_AT: &str = "updated_at";
pub const KEY_UPDATED_BY: &str = "updated_by";
/// Pre-bitmask list of event names, read but never written.
pub const KEY_LEGACY_EVENTS: &str = "events";

/// Encode a secret into a flat payload.
pub fn to_envelope(secret: &Secret) -> Map<String, Value> {
    let mut data = Map::new();

    if let Some(scope) = secret.scope {
        data.insert(KEY_TYPE.to_string(), Value::from(scope.as_str()));
    }
    put_str(&mut data, KEY_ORG, &secret.org);
    put_str(&mut data, KEY_REPO, &secret.repo);
    put_str(&mut data, KEY_TEAM, &secret.team);
    put_str(&mut data, KEY_NAME, &secret.name);
    put_str(&mut data, KEY_VALUE, &secret.value);
    put_list(&mut data, KEY_IMAGES, &secret.images);
    if let Some(events) = secret.allow_events.filter(|e| !e.is_empty()) {
        data.insert(KEY_ALLOW_EVENTS.to_string(), Value::from(events.bits()));
    }
    if let Some(allow) = secret.allow_command {
        data.insert(KEY_ALLOW_COMMAND.to_string(), Value::Bool(allow));
    }
    if let Some(allow) = secret.allow_substitution {
        data.insert(KEY_ALLOW_SUBSTITUTION.to_string(), Value::Bool(allow));
    }
    put_list(&mut data, KEY_REPO_ALLOWLIST, &secret.repo_allowlist);
    put_int(&mut data, KEY_CREATED_AT, secret.created_at);
    put_str(&mut data, KEY_CREATED_BY, &secret.created_by);
    put_int(&mut data, KEY_UPDATED_AT, secret.updated_at);
    put_str(&mut data, KEY_UPDATED_BY, &secret.updated_by);

    data
}

/// Decode a flat payload into a secret.
pub fn from_envelope(data: &Map<String, Value>) -> Secret {
    let allow_events = data
        .get(KEY_ALLOW_EVENTS)
        .and_then(as_i64)
        .map(AllowEvents::from_bits)
        .or_else(|| {
            data.get(KEY_LEGACY_EVENTS)
                .and_then(as_string_list)
                .map(|events| AllowEvents::from_legacy_events(events.iter().map(String::as_str)))
        });

    Secret {
        scope: data
            .get(KEY_TYPE)
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<SecretScope>().ok()),
        org: get_str(data, KEY_ORG),
        repo: get_str(data, KEY_REPO),
        team: get_str(data, KEY_TEAM),
        name: get_str(data, KEY_NAME),
        value: get_str(data, KEY_VALUE),
        images: data.get(KEY_IMAGES).and_then(as_string_list),
        allow_events,
        allow_command: data.get(KEY_ALLOW_COMMAND).and_then(as_bool),
        allow_substitution: data.get(KEY_ALLOW_SUBSTITUTION).and_then(as_bool),
        repo_allowlist: data.get(KEY_REPO_ALLOWLIST).and_then(as_string_list),
        created_at: data.get(KEY_CREATED_AT).and_then(as_i64),
        created_by: get_str(data, KEY_CREATED_BY),
        updated_at: data.get(KEY_UPDATED_AT).and_then(as_i64),
        updated_by: get_str(data, KEY_UPDATED_BY),
    }
}

fn put_str(data: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
        data.insert(key.to_string(), Value::from(v.as_str()));
    }
}

fn put_list(data: &mut Map<String, Value>, key: &str, value: &Option<Vec<String>>) {
    if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
        data.insert(key.to_string(), Value::from(v.clone()));
    }
}

fn put_int(data: &mut Map<String, Value>, key: &str, value: Option<i64>) {
    if let Some(v) = value.filter(|v| *v != 0) {
        data.insert(key.to_string(), Value::from(v));
    }
}

fn get_str(data: &Map<String, Value>, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64().filter(|f| f.fract() == 0.0 && f.is_finite()).map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse::<bool>().ok(),
        _ => None,
    }
}

fn as_string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
}
