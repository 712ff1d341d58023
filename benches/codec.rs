use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pipeline_vault::domain::{AllowEvents, Secret, SecretScope};
use pipeline_vault::secrets::codec::{from_envelope, to_envelope};
use pipeline_vault::secrets::format::{KvLayout, KvVersion};
use serde_json::{json, Value};
use std::time::Duration;

fn secret_with_images(count: usize) -> Secret {
    let mut secret = Secret::new("docker_password", "hunter2")
        .with_images((0..count).map(|i| format!("registry.example.com/team/image-{}:latest", i)))
        .with_allow_events(
            AllowEvents::PUSH_BRANCH | AllowEvents::PULL_OPENED | AllowEvents::DEPLOYMENT,
        )
        .with_allow_command(true)
        .with_allow_substitution(false);
    secret.stamp_identity(SecretScope::Repo, "octocat", "hello-world");
    secret.created_at = Some(1_700_000_000);
    secret.created_by = Some("octocat".into());
    secret
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.measurement_time(Duration::from_secs(5));

    for count in [0usize, 8, 64].iter() {
        let secret = secret_with_images(*count);
        let envelope = to_envelope(&secret);

        group.bench_with_input(BenchmarkId::new("to_envelope", count), &secret, |b, secret| {
            b.iter(|| to_envelope(black_box(secret)))
        });
        group.bench_with_input(BenchmarkId::new("from_envelope", count), &envelope, |b, envelope| {
            b.iter(|| from_envelope(black_box(envelope)))
        });
    }

    group.finish();
}

fn bench_drifted_payload(c: &mut Criterion) {
    // numbers as strings and floats, a legacy events list, unknown keys
    let drifted: Value = json!({
        "org": "octocat",
        "repo": "hello-world",
        "name": "docker_password",
        "value": "hunter2",
        "events": ["push", "pull_request", "deployment"],
        "created_at": "1700000000",
        "updated_at": 1700000100.0,
        "allow_command": "true",
        "rotation": {"days": 30},
    });
    let layout = KvLayout::new(KvVersion::V2, None);
    let wrapped = layout.wrap(drifted.as_object().cloned().unwrap_or_default());

    c.bench_function("codec/unwrap_and_decode_drifted", |b| {
        b.iter(|| from_envelope(&layout.unwrap(black_box(wrapped.clone()))))
    });
}

criterion_group!(benches, bench_codec, bench_drifted_payload);
criterion_main!(benches);
