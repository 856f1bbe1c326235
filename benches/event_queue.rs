//! Event queue and scenario throughput benchmarks.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use wlansim::clock::{Clock, SimTime};
use wlansim::{Scenario, ScenarioConfig};

fn bench_schedule_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule_and_drain");

    for count in [1_000u64, 10_000, 100_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut clock: Clock<u64> = Clock::new();
                for i in 0..count {
                    // scatter timestamps so the heap actually reorders
                    let at = SimTime::from_nanos(i.wrapping_mul(2_654_435_761) % 1_000_000);
                    let _ = clock.schedule(at, |_, n| {
                        *n += 1;
                        Ok(())
                    });
                }
                let mut fired = 0u64;
                let _ = clock.run_until(SimTime::from_secs(1), &mut fired);
                black_box(fired);
            });
        });
    }

    group.finish();
}

fn bench_cancel_half(c: &mut Criterion) {
    c.bench_function("cancel_half_of_10k", |b| {
        b.iter(|| {
            let mut clock: Clock<u64> = Clock::new();
            let handles: Vec<_> = (0..10_000u64)
                .filter_map(|i| {
                    clock
                        .schedule(SimTime::from_nanos(i), |_, n| {
                            *n += 1;
                            Ok(())
                        })
                        .ok()
                })
                .collect();
            for h in handles.iter().step_by(2) {
                let _ = clock.cancel(*h);
            }
            let mut fired = 0u64;
            let _ = clock.run_until(SimTime::from_secs(1), &mut fired);
            black_box(fired);
        });
    });
}

fn bench_reference_scenario(c: &mut Criterion) {
    let mut group = c.benchmark_group("wifi_lan");
    group.sample_size(10);

    group.bench_function("one_simulated_second", |b| {
        let config = ScenarioConfig::wifi_lan().with_duration(SimTime::from_secs(1));
        b.iter(|| {
            let summary = Scenario::build(black_box(config.clone())).and_then(|mut s| s.run());
            let _ = black_box(summary);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_schedule_and_drain,
    bench_cancel_half,
    bench_reference_scenario
);
criterion_main!(benches);
