//! Performance benchmarks for courier-engine

use courier_engine::{
    EntityKind, OpStatus, OperationKind, QueueEntry, QueuePolicy, SchemaSet,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

fn bench_payload_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload_validation");
    let schemas = SchemaSet::crm_default();

    let payload = json!({
        "phone": "9876543210",
        "email": "a@x.com",
        "name": "Asha",
        "source": "walk_in"
    });

    group.bench_function("lead_create_valid", |b| {
        b.iter(|| {
            schemas.validate(
                black_box(EntityKind::Lead),
                black_box(OperationKind::Create),
                black_box(&payload),
            )
        })
    });

    let invalid = json!({"phone": "9876543210"});
    group.bench_function("lead_create_invalid", |b| {
        b.iter(|| {
            let _ = schemas.validate(
                black_box(EntityKind::Lead),
                black_box(OperationKind::Create),
                black_box(&invalid),
            );
        })
    });

    group.finish();
}

fn bench_admission_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission_planning");

    for queue_len in [10usize, 100, 1000] {
        let policy = QueuePolicy {
            max_depth: queue_len,
        };
        let active: Vec<QueueEntry> = (0..queue_len)
            .map(|n| QueueEntry::new(format!("op-{n}"), OpStatus::Pending, n as i64))
            .collect();

        group.bench_with_input(
            BenchmarkId::new("full_queue", queue_len),
            &active,
            |b, active| b.iter(|| policy.plan_admission(black_box(active))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_payload_validation, bench_admission_planning);
criterion_main!(benches);
