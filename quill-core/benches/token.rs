//! Benchmarks for the per-request authentication path

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quill_core::auth::{AuthResolver, Ed25519Signer, TokenService};
use quill_core::test_utils::*;
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(1800);

fn bench_tokens(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokens");

    let services = [
        ("hs256", TokenService::hs256([7u8; 32]).unwrap()),
        ("eddsa", TokenService::new(Arc::new(Ed25519Signer::from_seed(&[7u8; 32]).unwrap()))),
    ];

    for (name, tokens) in services {
        let token = tokens.issue("42", TTL).unwrap();

        group.bench_function(format!("issue_{}", name), |b| {
            b.iter(|| black_box(tokens.issue(black_box("42"), TTL).unwrap()))
        });

        group.bench_function(format!("verify_{}", name), |b| {
            b.iter(|| black_box(tokens.verify(black_box(&token)).unwrap()))
        });
    }

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let tokens = TokenService::hs256([7u8; 32]).unwrap();
    let header = format!("Bearer {}", tokens.issue("1", TTL).unwrap());
    let resolver = AuthResolver::new(tokens);
    let principals = MemoryPrincipals::new();
    principals.add(test_principal(1, "bench"));

    c.bench_function("resolve_bearer", |b| {
        b.iter(|| black_box(resolver.resolve(&principals, Some(black_box(&header))).unwrap()))
    });
}

criterion_group!(benches, bench_tokens, bench_resolve);
criterion_main!(benches);
