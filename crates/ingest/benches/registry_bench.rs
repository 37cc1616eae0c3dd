//! Schema registry benchmarks.
//!
//! Measures validation throughput for the pass, quarantine, and
//! unregistered-source paths.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use sentrypipe_core::event::{NormalizedEvent, parse_timestamp};
use sentrypipe_ingest::registry::{SchemaRegistry, SourceSchema};

fn valid_event() -> NormalizedEvent {
    let ts = parse_timestamp("2026-01-15T12:00:00Z").unwrap();
    let mut event = NormalizedEvent::new("aws_cloudtrail", ts, "{}");
    event.source_ip = Some("203.0.113.5".to_owned());
    event.action = Some("ConsoleLogin".to_owned());
    event.user = Some("arn:aws:iam::123456789012:user/alice".to_owned());
    event
}

fn registry() -> SchemaRegistry {
    SchemaRegistry::with_schemas([SourceSchema::new(
        "aws_cloudtrail",
        ["timestamp", "source_ip", "action", "user"],
    )])
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_validate");
    group.throughput(Throughput::Elements(1));

    group.bench_function("valid", |b| {
        let mut registry = registry();
        let event = valid_event();
        b.iter(|| {
            let mut event = event.clone();
            black_box(registry.validate(&mut event))
        });
    });

    group.bench_function("quarantined", |b| {
        let mut registry = registry();
        let mut event = valid_event();
        event.user = None;
        b.iter(|| {
            let mut event = event.clone();
            black_box(registry.validate(&mut event))
        });
    });

    group.bench_function("unregistered", |b| {
        let mut registry = SchemaRegistry::new();
        let event = valid_event();
        b.iter(|| {
            let mut event = event.clone();
            black_box(registry.validate(&mut event))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_validate);
criterion_main!(benches);
