//! # Control Cycle Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use bal_lib::{
    att_est::{AttEst, Params},
    bal_ctrl::BalCtrl,
    drive_map,
};

fn att_est_benchmark(c: &mut Criterion) {
    let mut est = AttEst::new(Params::default());
    est.set_angle(90.0);

    let mut t = 0.0;

    c.bench_function("att_est predict+correct", |b| b.iter(|| {
        t += 0.01;
        est.predict(5.0, 0.01).unwrap();
        est.correct(80.0 + 5.0 * t)
    }));
}

fn ctrl_chain_benchmark(c: &mut Criterion) {
    let mut est = AttEst::new(Params::default());
    let mut ctrl = BalCtrl::default();
    est.set_angle(90.0);

    c.bench_function("estimate, control and map", |b| b.iter(|| {
        est.predict(0.5, 0.01).unwrap();
        let angle = est.correct(88.0);
        drive_map::map(ctrl.update(90.0, angle))
    }));
}

criterion_group!(benches, att_est_benchmark, ctrl_chain_benchmark);
criterion_main!(benches);
