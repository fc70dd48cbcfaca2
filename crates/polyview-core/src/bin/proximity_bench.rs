use anyhow::{bail, Result};
use polyview_core::prelude::*;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// 带起伏的星形多边形，顶点数为 `verts`
fn build_star(verts: usize, center: Point2, radius: f64, phase: f64) -> Shape {
    let n = verts.max(3);
    Shape::polygon((0..n).map(|k| {
        let angle = std::f64::consts::TAU * k as f64 / n as f64;
        let wobble = 1.0 + 0.25 * (7.0 * angle + phase).sin() + 0.1 * (13.0 * angle).cos();
        center + Vector2::new(angle.cos(), angle.sin()) * radius * wobble
    }))
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn time_mode(query: ProximityQuery, a: &Shape, b: &Shape, iters: usize) -> Result<(f64, Vec<f64>)> {
    let mut times_ms = Vec::with_capacity(iters);
    let mut best = f64::INFINITY;
    for _ in 0..iters {
        let t0 = Instant::now();
        let closest = query.closest_pair(a, b)?;
        times_ms.push(t0.elapsed().as_secs_f64() * 1000.0);
        best = best.min(closest.distance);
    }
    times_ms.sort_by(|x, y| x.total_cmp(y));
    Ok((best, times_ms))
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut verts = 2000usize;
    let mut iters = 5usize;
    let mut level = Level::INFO;
    for a in &args[1..] {
        if let Some(val) = a.strip_prefix("--verts=") {
            if let Ok(v) = val.parse() {
                verts = v;
            }
        } else if let Some(val) = a.strip_prefix("--iters=") {
            if let Ok(v) = val.parse() {
                iters = v;
            }
        } else if let Some(val) = a.strip_prefix("--level=") {
            if let Ok(v) = val.parse() {
                level = v;
            }
        }
    }

    tracing::subscriber::set_global_default(FmtSubscriber::builder().with_max_level(level).finish())?;

    let a = build_star(verts, Point2::new(0.0, 0.0), 10.0, 0.0);
    let b = build_star(verts, Point2::new(27.0, 4.0), 12.0, 1.3);
    info!("Benchmarking proximity: {} + {} vertices, {} iterations", a.vertex_count(), b.vertex_count(), iters);

    let (indexed, indexed_ms) = time_mode(ProximityQuery::new(ProximityMode::Indexed), &a, &b, iters.max(1))?;
    let (brute, brute_ms) = time_mode(ProximityQuery::new(ProximityMode::BruteForce), &a, &b, iters.max(1))?;

    println!(
        "verts={} iters={} indexed_min={:.9} brute_min={:.9} indexed_median_ms={:.3} indexed_p90_ms={:.3} brute_median_ms={:.3} brute_p90_ms={:.3}",
        verts,
        iters,
        indexed,
        brute,
        percentile(&indexed_ms, 0.5),
        percentile(&indexed_ms, 0.9),
        percentile(&brute_ms, 0.5),
        percentile(&brute_ms, 0.9),
    );

    if (indexed - brute).abs() > 1e-9 * brute.max(1.0) {
        eprintln!("FAIL: indexed minimum {indexed} differs from brute-force minimum {brute}");
        std::process::exit(1);
    }
    if !indexed.is_finite() {
        bail!("no distance computed");
    }
    Ok(())
}
