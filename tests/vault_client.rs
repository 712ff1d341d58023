//! End-to-end behaviour of the secret service against an in-process Vault double.

mod common;

use common::MockVault;
use pipeline_vault::domain::{AllowEvents, Secret, SecretScope};
use pipeline_vault::secrets::{ListOptions, SecretsError, VaultSecretService};
use pipeline_vault::VaultSettings;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

async fn connect(vault: &MockVault, version: &str) -> VaultSecretService {
    VaultSecretService::new(vault.settings(version)).await.unwrap()
}

fn deploy_key() -> Secret {
    Secret::new("deploy_key", "ssh-ed25519 AAAA")
        .with_images(["alpine/git"])
        .with_allow_events(AllowEvents::PUSH_BRANCH | AllowEvents::DEPLOYMENT)
        .with_allow_command(true)
        .with_allow_substitution(false)
}

async fn lifecycle(version: &str) {
    let vault = MockVault::start().await;
    let service = connect(&vault, version).await;
    let (scope, org, repo) = (SecretScope::Repo, "octocat", "hello-world");

    let created = service.create(scope, org, repo, &deploy_key()).await.unwrap();
    assert_eq!(created.name(), "deploy_key");
    assert_eq!(created.value(), "ssh-ed25519 AAAA");
    assert_eq!(created.org(), org);
    assert_eq!(created.repo(), repo);
    assert_eq!(created.scope, Some(SecretScope::Repo));
    assert_eq!(created.events(), AllowEvents::PUSH_BRANCH | AllowEvents::DEPLOYMENT);
    assert_eq!(created.allow_substitution, Some(false));

    let fetched = service.get(scope, org, repo, "deploy_key").await.unwrap();
    assert_eq!(fetched, created);

    let listed = service.list(scope, org, repo).await.unwrap();
    assert_eq!(listed, vec![created.clone()]);
    assert_eq!(service.count(scope, org, repo).await.unwrap(), 1);

    assert_ok!(service.delete(scope, org, repo, "deploy_key").await);
    let err = assert_err!(service.get(scope, org, repo, "deploy_key").await);
    assert!(err.is_not_found());
    assert!(err.to_string().contains("repo/octocat/hello-world/deploy_key"));
}

#[tokio::test]
async fn test_lifecycle_v1() {
    lifecycle("1").await;
}

#[tokio::test]
async fn test_lifecycle_v2() {
    lifecycle("2").await;
}

async fn org_secret_listing_drops_deleted(version: &str) {
    let vault = MockVault::start().await;
    let service = connect(&vault, version).await;
    let (scope, org, repo) = (SecretScope::Org, "foo", "*");

    let created = service.create(scope, org, repo, &Secret::new("bar", "baz")).await.unwrap();
    assert_eq!(created.repo(), "*");
    service.create(scope, org, repo, &Secret::new("qux", "quux")).await.unwrap();

    let fetched = service.get(scope, org, repo, "bar").await.unwrap();
    assert_eq!(fetched.value(), "baz");
    assert_eq!(fetched.org(), "foo");
    assert_eq!(fetched.repo(), "*");

    let listed = service.list(scope, org, repo).await.unwrap();
    assert!(listed.iter().any(|s| s.name() == "bar"));

    service.delete(scope, org, repo, "bar").await.unwrap();

    let listed = service.list(scope, org, repo).await.unwrap();
    let names: Vec<&str> = listed.iter().map(|s| s.name()).collect();
    assert_eq!(names, ["qux"]);
    assert_eq!(service.count(scope, org, repo).await.unwrap(), 1);
}

#[tokio::test]
async fn test_org_secret_listing_drops_deleted_v1() {
    org_secret_listing_drops_deleted("1").await;
}

#[tokio::test]
async fn test_org_secret_listing_drops_deleted_v2() {
    org_secret_listing_drops_deleted("2").await;
}

#[tokio::test]
async fn test_v1_writes_flat_payloads() {
    let vault = MockVault::start().await;
    let service = connect(&vault, "1").await;
    service.create(SecretScope::Org, "octocat", "*", &deploy_key()).await.unwrap();

    let stored = vault.entry("secret/org/octocat/deploy_key").unwrap();
    assert_eq!(stored["value"], json!("ssh-ed25519 AAAA"));
    assert_eq!(stored["repo"], json!("*"));
    assert!(stored.get("data").is_none());
}

#[tokio::test]
async fn test_v2_wraps_payloads_and_lists_metadata() {
    let vault = MockVault::start().await;
    let service = connect(&vault, "2").await;
    service.create(SecretScope::Shared, "octocat", "admins", &deploy_key()).await.unwrap();
    service.count(SecretScope::Shared, "octocat", "admins").await.unwrap();

    let stored = vault.entry("secret/data/shared/octocat/admins/deploy_key").unwrap();
    assert_eq!(stored["data"]["team"], json!("admins"));
    assert_eq!(stored["metadata"]["version"], json!(1));

    let log = vault.request_log().await;
    assert!(log.contains(&"PUT /v1/secret/data/shared/octocat/admins/deploy_key".to_string()));
    assert!(log.contains(&"GET /v1/secret/metadata/shared/octocat/admins?list=true".to_string()));
}

#[tokio::test]
async fn test_mount_prefix_is_applied() {
    let vault = MockVault::start().await;
    let service = VaultSecretService::new(vault.settings("2").with_prefix("ci")).await.unwrap();
    service.create(SecretScope::Org, "octocat", "*", &deploy_key()).await.unwrap();

    assert!(vault.entry("secret/data/ci/org/octocat/deploy_key").is_some());
    assert_eq!(service.count(SecretScope::Org, "octocat", "*").await.unwrap(), 1);
}

#[tokio::test]
async fn test_reads_payloads_from_either_layout() {
    let vault = MockVault::start().await;
    // a flat payload at a v2 path and a wrapped payload at a v1 path
    vault.seed("secret/data/org/octocat/flat", json!({"name": "flat", "value": "one"}));
    vault.seed("secret/org/octocat/nested", json!({"data": {"name": "nested", "value": "two"}}));

    let v2 = connect(&vault, "2").await;
    assert_eq!(v2.get(SecretScope::Org, "octocat", "*", "flat").await.unwrap().value(), "one");

    let v1 = connect(&vault, "1").await;
    assert_eq!(v1.get(SecretScope::Org, "octocat", "*", "nested").await.unwrap().value(), "two");
}

#[tokio::test]
async fn test_tolerates_drifted_field_types() {
    let vault = MockVault::start().await;
    vault.seed(
        "secret/repo/octocat/hello-world/legacy",
        json!({
            "name": "legacy",
            "value": "v",
            "events": ["push", "tag"],
            "created_at": "1700000000",
            "updated_at": 1700000100.0,
            "allow_command": "false",
            "images": ["alpine", 7],
            "rotation": {"days": 30},
        }),
    );

    let service = connect(&vault, "1").await;
    let secret = service.get(SecretScope::Repo, "octocat", "hello-world", "legacy").await.unwrap();
    assert_eq!(secret.events(), AllowEvents::PUSH_BRANCH | AllowEvents::PUSH_TAG);
    assert_eq!(secret.created_at, Some(1_700_000_000));
    assert_eq!(secret.updated_at, Some(1_700_000_100));
    assert_eq!(secret.allow_command, Some(false));
    assert_eq!(secret.images, Some(vec!["alpine".to_string()]));
}

#[tokio::test]
async fn test_update_merges_onto_stored_secret() {
    let vault = MockVault::start().await;
    let service = connect(&vault, "2").await;
    let (scope, org, repo) = (SecretScope::Repo, "octocat", "hello-world");
    service.create(scope, org, repo, &deploy_key()).await.unwrap();

    let patch = Secret {
        name: Some("deploy_key".into()),
        value: Some(String::new()),
        allow_events: Some(AllowEvents::empty()),
        images: Some(vec!["golang".into()]),
        updated_at: Some(1_700_000_500),
        updated_by: Some("hubot".into()),
        ..Default::default()
    };
    let updated = service.update(scope, org, repo, &patch).await.unwrap();

    assert_eq!(updated.value(), "ssh-ed25519 AAAA");
    assert_eq!(updated.events(), AllowEvents::PUSH_BRANCH | AllowEvents::DEPLOYMENT);
    assert_eq!(updated.images, Some(vec!["golang".to_string()]));
    assert_eq!(updated.allow_command, Some(true));
    assert_eq!(updated.updated_by.as_deref(), Some("hubot"));

    let rotated = service
        .update(scope, org, repo, &Secret::new("deploy_key", "ssh-ed25519 BBBB"))
        .await
        .unwrap();
    assert_eq!(rotated.value(), "ssh-ed25519 BBBB");
    let stored = vault.entry("secret/data/repo/octocat/hello-world/deploy_key").unwrap();
    assert_eq!(stored["metadata"]["version"], json!(3));
}

#[tokio::test]
async fn test_update_of_missing_secret_is_not_found() {
    let vault = MockVault::start().await;
    let service = connect(&vault, "1").await;
    let err = service
        .update(SecretScope::Org, "octocat", "*", &Secret::new("ghost", "boo"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_absent_or_empty_directory_is_not_found() {
    let vault = MockVault::start().await;
    let service = connect(&vault, "1").await;
    assert!(service.list(SecretScope::Org, "nobody", "*").await.unwrap_err().is_not_found());

    vault.seed_listing("secret/org/octocat", json!({"keys": []}));
    assert!(service.count(SecretScope::Org, "octocat", "*").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_malformed_listing_is_shape_error() {
    let vault = MockVault::start().await;
    vault.seed_listing("secret/metadata/org/octocat", json!({"keys": {"a": 1}}));
    let service = connect(&vault, "2").await;

    let err = service.list(SecretScope::Org, "octocat", "*").await.unwrap_err();
    assert!(matches!(err, SecretsError::Shape { .. }));
}

#[tokio::test]
async fn test_list_page_reads_only_the_page() {
    let vault = MockVault::start().await;
    let service = connect(&vault, "2").await;
    for name in ["delta", "alpha", "charlie", "bravo"] {
        service
            .create(SecretScope::Org, "octocat", "*", &Secret::new(name, "v"))
            .await
            .unwrap();
    }

    let before = vault.request_log().await.len();
    let page = service
        .list_page(SecretScope::Org, "octocat", "*", ListOptions::new(2, 3))
        .await
        .unwrap();
    let names: Vec<&str> = page.iter().map(|s| s.name()).collect();
    assert_eq!(names, ["delta"]);
    // one list plus one read
    assert_eq!(vault.request_log().await.len() - before, 2);
}

#[tokio::test]
async fn test_invalid_secret_is_rejected_before_any_write() {
    let vault = MockVault::start().await;
    let service = connect(&vault, "1").await;

    let err = service
        .create(SecretScope::Org, "octocat", "*", &Secret::new("empty", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, SecretsError::Validation { .. }));

    let shared_only = Secret::new("token", "v").with_repo_allowlist(["octocat/api"]);
    let err = service
        .create(SecretScope::Repo, "octocat", "hello-world", &shared_only)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretsError::Validation { .. }));

    assert!(vault.request_log().await.iter().all(|r| !r.starts_with("PUT")));
}

#[tokio::test]
async fn test_backend_errors_carry_identity_and_status() {
    let vault = MockVault::start().await;
    let settings = VaultSettings::new(vault.uri(), "1").with_token("s.revoked");
    let service = VaultSecretService::new(settings).await.unwrap();

    let err = service
        .create(SecretScope::Repo, "octocat", "hello-world", &Secret::new("token", "v"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));
    let message = err.to_string();
    assert!(message.contains("create repo/octocat/hello-world/token"));
    assert!(message.contains("permission denied"));
    assert!(!message.contains("s.revoked"));
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let missing_address = VaultSecretService::new(VaultSettings::new("", "2")).await;
    assert!(matches!(missing_address, Err(SecretsError::Config { .. })));

    let missing_version =
        VaultSecretService::new(VaultSettings::new("http://127.0.0.1:8200", "")).await;
    assert!(matches!(missing_version, Err(SecretsError::Config { .. })));

    let unknown_version =
        VaultSecretService::new(VaultSettings::new("http://127.0.0.1:8200", "3")).await;
    assert!(matches!(unknown_version, Err(SecretsError::Config { .. })));

    let mut bad_method = VaultSettings::new("http://127.0.0.1:8200", "2");
    bad_method.auth_method = "github".into();
    assert!(matches!(VaultSecretService::new(bad_method).await, Err(SecretsError::Config { .. })));
}

#[tokio::test]
async fn test_driver_name() {
    let vault = MockVault::start().await;
    assert_eq!(connect(&vault, "1").await.driver(), "vault");
}
