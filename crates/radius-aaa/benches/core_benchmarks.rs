//! Benchmarks for the hot paths of request handling
//!
//! Run with: cargo bench --bench core_benchmarks

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use radius_aaa::state::escape_tag_value;
use radius_aaa::{
    AvpSetting, MemoryCacheStore, MetricsAggregator, RequestStatus, RequestType, SessionTracker,
};
use radius_proto::{Attribute, Code, Packet};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

fn bench_escape_tag_value(c: &mut Criterion) {
    let mut group = c.benchmark_group("escape_tag_value");

    for value in ["subscriber42", "192.168.100.200", "2001:db8::1", "user@realm.example"] {
        group.bench_with_input(BenchmarkId::from_parameter(value), value, |b, value| {
            b.iter(|| escape_tag_value(black_box(value)));
        });
    }
    group.finish();
}

fn bench_avp_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("avp_extract");

    for num_attrs in [0, 10, 40] {
        let mut packet = Packet::new(Code::AccountingRequest, 1, [0u8; 16]);
        for i in 0..num_attrs {
            packet.add_attribute(Attribute::string(26, format!("vsa-{}", i)).unwrap());
        }
        packet.add_attribute(Attribute::string(44, "session-0001").unwrap());
        let setting = AvpSetting::parse(Some("44"));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_attrs", num_attrs)),
            &packet,
            |b, packet| {
                b.iter(|| setting.extract(black_box(packet), "session_id").unwrap());
            },
        );
    }
    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");

    let metrics = MetricsAggregator::new();
    group.bench_function("record", |b| {
        b.iter(|| {
            metrics.record(
                black_box(RequestType::InterimUpdate),
                RequestStatus::Success,
                Duration::from_micros(350),
            )
        });
    });

    for request_type in [
        RequestType::AccessRequest,
        RequestType::AccountingStart,
        RequestType::AccountingStop,
        RequestType::CoA,
    ] {
        metrics.record(request_type, RequestStatus::Failure, Duration::from_millis(3));
    }
    group.bench_function("render_prometheus", |b| {
        b.iter(|| black_box(metrics.render_prometheus()));
    });

    group.finish();
}

fn bench_session_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_tracker");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for preloaded in [0, 1_000] {
        let tracker = SessionTracker::new(Arc::new(MemoryCacheStore::new()));
        runtime.block_on(async {
            for i in 0..preloaded {
                let ip = format!("10.{}.{}.1", i / 256, i % 256);
                tracker
                    .start(&format!("sub-{}", i), &format!("sess-{}", i), &ip, None)
                    .await
                    .unwrap();
            }
        });

        group.bench_with_input(
            BenchmarkId::new("start_stop", preloaded),
            &tracker,
            |b, tracker| {
                b.iter(|| {
                    runtime.block_on(async {
                        tracker
                            .start("bench-sub", "bench-sess", "100.64.0.1", None)
                            .await
                            .unwrap();
                        tracker.stop("bench-sub", "100.64.0.1").await.unwrap()
                    })
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_escape_tag_value,
    bench_avp_extract,
    bench_metrics,
    bench_session_tracker
);
criterion_main!(benches);
