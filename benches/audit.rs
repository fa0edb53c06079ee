//! Performance benchmarks for a3s-audit
//!
//! Run with: cargo bench

use a3s_audit::{
    AuditRecord, CacheConfig, CompiledTemplate, FieldRegistry, MemoryWhitelistStore, Permission,
    ResourceId, RoleAuditFilter, StaticRoleHierarchy, TimestampFormat, WhitelistCache,
    DEFAULT_LOG_FORMAT,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

fn record(resource: ResourceId) -> AuditRecord {
    AuditRecord::new(
        "loader",
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
        resource,
        [Permission::Select, Permission::Modify],
        "INSERT INTO warehouse.facts SELECT * FROM warehouse.staging",
    )
    .unwrap()
}

fn filter() -> RoleAuditFilter {
    let roles = Arc::new(StaticRoleHierarchy::new());
    roles.grant("loader", "etl").unwrap();
    roles.grant("etl", "reader").unwrap();

    let store = Arc::new(MemoryWhitelistStore::new());
    store
        .grant("reader", ResourceId::data(), [Permission::Select])
        .unwrap();
    store
        .grant("etl", ResourceId::keyspace("warehouse"), [Permission::Modify])
        .unwrap();

    let cache = Arc::new(WhitelistCache::new(store, &CacheConfig::default()));
    RoleAuditFilter::new(roles, cache)
}

fn bench_decide(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let hot = filter();
    let suppressed = record(ResourceId::table("warehouse", "facts"));
    let audited = record(ResourceId::table("sales", "orders"));
    rt.block_on(async { hot.decide(&suppressed).await.unwrap() });

    c.bench_function("decide (cached, suppressed)", |b| {
        b.to_async(&rt)
            .iter(|| async { hot.decide(&suppressed).await.unwrap() });
    });

    c.bench_function("decide (cached, audited)", |b| {
        b.to_async(&rt)
            .iter(|| async { hot.decide(&audited).await.unwrap() });
    });

    c.bench_function("decide (cold cache)", |b| {
        b.to_async(&rt).iter(|| async {
            let cold = filter();
            cold.decide(&suppressed).await.unwrap()
        });
    });
}

fn bench_render(c: &mut Criterion) {
    let record = record(ResourceId::table("warehouse", "facts"))
        .with_batch_id(uuid::Uuid::new_v4());

    let plain = CompiledTemplate::compile(
        DEFAULT_LOG_FORMAT,
        &FieldRegistry::standard(TimestampFormat::Raw),
    )
    .unwrap();
    c.bench_function("render (default format)", |b| {
        b.iter(|| plain.render(&record));
    });

    let timestamped = CompiledTemplate::compile(
        "${TIMESTAMP}|${USER}|${OPERATION}",
        &FieldRegistry::standard(TimestampFormat::new(Some("%Y-%m-%dT%H:%M:%S%.3f"), Some("UTC")).unwrap()),
    )
    .unwrap();
    c.bench_function("render (formatted timestamp)", |b| {
        b.iter(|| timestamped.render(&record));
    });

    c.bench_function("compile (default format)", |b| {
        let registry = FieldRegistry::standard(TimestampFormat::Raw);
        b.iter(|| CompiledTemplate::compile(DEFAULT_LOG_FORMAT, &registry).unwrap());
    });
}

criterion_group!(benches, bench_decide, bench_render);
criterion_main!(benches);
