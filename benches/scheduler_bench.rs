use criterion::{criterion_group, criterion_main, Criterion};
use pingmon::{
    ManualClock, MonitorConfig, ProbeOutcome, ProbeRequest, ProbeScheduler, ProbeStats,
    ProbeTransport, Sample,
};
use std::hint::black_box;
use std::time::Duration;

/// Transport that answers on the first poll
struct Loopback;

impl ProbeTransport for Loopback {
    fn issue(&mut self, _host: &str, _request: &ProbeRequest) -> anyhow::Result<()> {
        Ok(())
    }

    fn poll(&mut self) -> Option<ProbeOutcome> {
        Some(ProbeOutcome::Reply {
            rtt_ms: 3,
            ttl: Some(64),
        })
    }
}

fn benchmark_stats(c: &mut Criterion) {
    let history = [
        Sample::reply(10, Some(60)),
        Sample::TimedOut,
        Sample::reply(30, Some(57)),
        Sample::reply(20, None),
    ];

    c.bench_function("stats_from_history", |b| {
        b.iter(|| ProbeStats::from_samples(black_box(&history)))
    });
}

fn benchmark_idle_tick(c: &mut Criterion) {
    let mut scheduler = ProbeScheduler::new(Loopback, ManualClock::new(), MonitorConfig::default());
    for i in 0..6 {
        scheduler
            .add_target(format!("t{i}"), format!("192.0.2.{i}"))
            .unwrap();
    }
    // Finish the first burst so every later tick finds nothing due
    for _ in 0..3 {
        scheduler.clock().advance(Duration::from_secs(1));
        scheduler.tick().unwrap();
    }

    c.bench_function("tick_idle_6_targets", |b| {
        b.iter(|| black_box(scheduler.tick().unwrap()))
    });
}

fn benchmark_probing_tick(c: &mut Criterion) {
    c.bench_function("tick_cold_6_targets", |b| {
        b.iter(|| {
            let mut scheduler =
                ProbeScheduler::new(Loopback, ManualClock::new(), MonitorConfig::default());
            for i in 0..6 {
                scheduler
                    .add_target(format!("t{i}"), format!("192.0.2.{i}"))
                    .unwrap();
            }
            black_box(scheduler.tick().unwrap())
        })
    });
}

criterion_group!(
    benches,
    benchmark_stats,
    benchmark_idle_tick,
    benchmark_probing_tick
);
criterion_main!(benches);
