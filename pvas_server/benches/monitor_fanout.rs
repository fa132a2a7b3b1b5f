//! Monitor fan-out benchmarks

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pvas_common::pvdata::{ChangeMask, PvStructure, ScalarType, ScalarValue, Structure};
use pvas_server::{
    ChannelProvider, ChannelRequester, MonitorRequester, Requester, SharedMonitorFifo, SharedPv,
    StaticProvider,
};
use std::hint::black_box;
use std::sync::Arc;

struct Sink;

impl Requester for Sink {
    fn requester_name(&self) -> String {
        "bench".to_string()
    }
}

impl ChannelRequester for Sink {}

impl MonitorRequester for Sink {
    fn monitor_connect(
        &self,
        _status: pvas_common::pvdata::Status,
        _monitor: &Arc<SharedMonitorFifo>,
        _structure: Arc<Structure>,
    ) {
    }

    fn monitor_event(&self, monitor: &Arc<SharedMonitorFifo>) {
        while let Some(element) = monitor.poll() {
            black_box(element);
        }
    }

    fn unlisten(&self, _monitor: &Arc<SharedMonitorFifo>) {}
}

fn scalar(v: f64) -> PvStructure {
    PvStructure::new(Structure::scalar(ScalarType::Double))
        .with("value", ScalarValue::Double(v))
        .unwrap()
}

/// Benchmark one post delivered to N started monitors
fn bench_post_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_fanout");
    let mut changed = ChangeMask::new();
    changed.set(1);

    for monitors in [1usize, 10, 100] {
        let pv = SharedPv::build_mailbox("bench:fanout");
        pv.open_all(&scalar(0.0)).unwrap();
        let provider = StaticProvider::new("bench");
        provider.add("bench:fanout", pv.clone()).unwrap();

        let sink = Arc::new(Sink);
        let channel_req: Arc<dyn ChannelRequester> = sink.clone();
        let monitor_req: Arc<dyn MonitorRequester> = sink;
        let channel = provider.create_channel("bench:fanout", &channel_req).unwrap();
        let attached: Vec<_> = (0..monitors)
            .map(|_| {
                let m = channel.create_monitor(&monitor_req, PvStructure::empty());
                m.start();
                m
            })
            .collect();

        let value = scalar(1.0);
        group.bench_with_input(BenchmarkId::from_parameter(monitors), &monitors, |b, _| {
            b.iter(|| pv.post(black_box(&value), &changed).unwrap());
        });
        drop(attached);
    }
    group.finish();
}

/// Benchmark posts into a full queue nobody drains
fn bench_squash(c: &mut Criterion) {
    let pv = SharedPv::build_mailbox("bench:squash");
    pv.open_all(&scalar(0.0)).unwrap();
    let provider = StaticProvider::new("bench");
    provider.add("bench:squash", pv.clone()).unwrap();

    let channel_req: Arc<dyn ChannelRequester> = Arc::new(Sink);
    let channel = provider.create_channel("bench:squash", &channel_req).unwrap();
    // Never started, so the queue fills and squashes
    let monitor_req: Arc<dyn MonitorRequester> = Arc::new(Sink);
    let monitor = channel.create_monitor(&monitor_req, PvStructure::empty());

    let mut changed = ChangeMask::new();
    changed.set(1);
    let value = scalar(2.0);
    c.bench_function("post_into_full_queue", |b| {
        b.iter(|| pv.post(black_box(&value), &changed).unwrap());
    });
    black_box(monitor.len());
}

criterion_group!(benches, bench_post_fanout, bench_squash);
criterion_main!(benches);
