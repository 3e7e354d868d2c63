use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;

use vortex_slm::hologram::{self, HologramParams, PanelGeometry};
use vortex_slm::sweep::{SweepPlan, SweepRange};

pub fn full_hd_hologram(c: &mut Criterion) {
    let geometry = PanelGeometry::new(1920, 1080);
    c.bench_function("generate 1920x1080", |b| {
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let params = HologramParams {
                l: rng.gen_range(-5..=5),
                nx: rng.gen_range(0..200),
                ny: rng.gen_range(0..200),
                x0: rng.gen_range(-100..=100),
                y0: rng.gen_range(-100..=100),
            };
            black_box(hologram::generate(&params, geometry));
        });
    });
}

pub fn default_sweep_plan(c: &mut Criterion) {
    c.bench_function("sweep plan 21x21", |b| {
        b.iter(|| {
            let range = SweepRange::new(-100, 100, 10).unwrap();
            let plan = SweepPlan::new(range, range);
            black_box(plan.iter().map(|(x, y)| i64::from(x) * i64::from(y)).sum::<i64>());
        });
    });
}

criterion_group!(benches, full_hd_hologram, default_sweep_plan);
criterion_main!(benches);
