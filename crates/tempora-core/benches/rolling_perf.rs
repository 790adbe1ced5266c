//! Throughput benchmark for the rolling engine, detector and forecaster.
//!
//! Run with: cargo bench --bench rolling_perf

use std::time::{Duration, Instant};
use tempora_core::{
    detect_anomalies, resample, rolling_stats, DetectorConfig, FillPolicy, ForecastConfig,
    ForecastMethod, Forecaster, Interval, RollingConfig, Series, Window,
};

fn generate_series(n: usize, gap_every: usize) -> Series {
    let pairs = (0..n)
        .filter(|i| gap_every == 0 || i % gap_every != gap_every - 1)
        .map(|i| {
            let trend = 0.01 * i as f64;
            let seasonal = 10.0 * (2.0 * std::f64::consts::PI * i as f64 / 24.0).sin();
            (i as i64 * 60_000_000, trend + seasonal + (i % 7) as f64 * 0.1)
        });
    Series::from_pairs(pairs).expect("generated series is ordered")
}

fn benchmark_fn<F, R>(name: &str, iterations: usize, mut f: F) -> Duration
where
    F: FnMut() -> R,
{
    // Warmup
    let _ = f();

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = std::hint::black_box(f());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "{}: total={:?}, per_iter={:?}, iters={}",
        name, elapsed, per_iter, iterations
    );
    elapsed
}

fn main() {
    println!("=== Rolling / Detection / Forecast Benchmark ===\n");

    let series_lengths = [1_000, 10_000, 100_000];
    let window_sizes = [10, 100, 1_000];

    println!("--- 1. Rolling statistics ---\n");

    for &n in &series_lengths {
        let series = generate_series(n, 0);
        let iters = if n <= 10_000 { 20 } else { 3 };
        for &w in &window_sizes {
            let config = RollingConfig::count(w);
            benchmark_fn(&format!("rolling_stats(n={}, w={})", n, w), iters, || {
                rolling_stats(&series, &config)
            });
        }
    }

    println!("\n--- 2. Duration window ---\n");

    for &n in &series_lengths {
        let series = generate_series(n, 0);
        let config = RollingConfig {
            window: Window::Duration(3_600_000_000),
            ..Default::default()
        };
        let iters = if n <= 10_000 { 20 } else { 3 };
        benchmark_fn(&format!("rolling_stats(n={}, 1h)", n), iters, || {
            rolling_stats(&series, &config)
        });
    }

    println!("\n--- 3. Resample + detect ---\n");

    for &n in &series_lengths {
        let gapped = generate_series(n, 13);
        let iters = if n <= 10_000 { 20 } else { 3 };
        benchmark_fn(&format!("resample(n={}, ffill)", n), iters, || {
            resample(&gapped, Interval::seconds(60), FillPolicy::ForwardFill)
        });

        let cleaned = match resample(&gapped, Interval::seconds(60), FillPolicy::ForwardFill) {
            Ok(s) => s,
            Err(e) => {
                println!("resample failed: {}", e);
                continue;
            }
        };
        let config = DetectorConfig {
            window: Window::Count(50),
            ..Default::default()
        };
        benchmark_fn(&format!("detect_anomalies(n={}, w=50)", n), iters, || {
            detect_anomalies(&cleaned, &config)
        });
    }

    println!("\n--- 4. Forecast fit and update ---\n");

    let methods = [
        ("holt", ForecastMethod::Holt),
        ("holt_winters", ForecastMethod::HoltWinters { period: 24 }),
        ("linear_trend", ForecastMethod::LinearTrend),
    ];

    for &n in &[500, 5_000] {
        let series = generate_series(n, 0);
        for (name, method) in &methods {
            let config = ForecastConfig {
                method: *method,
                ..Default::default()
            };
            benchmark_fn(&format!("  fit({}, n={})", name, n), 10, || {
                let mut f = Forecaster::new(config.clone())?;
                f.fit_with_fallback(&series)?;
                f.forecast()
            });
        }
    }

    let series = generate_series(1_000, 0);
    if let Ok(mut forecaster) = Forecaster::new(ForecastConfig::default()) {
        if forecaster.fit(&series).is_ok() {
            let mut t = 1_000 * 60_000_000i64;
            benchmark_fn("  update x100000", 1, || {
                for i in 0..100_000 {
                    let _ = forecaster.update(t, (i % 24) as f64);
                    t += 60_000_000;
                }
            });
        }
    }

    println!("\n=== Benchmark Complete ===");
}
