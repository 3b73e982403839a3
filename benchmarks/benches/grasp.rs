//! Grasp control-loop benchmarks (criterion - wall-clock time).
//!
//! Run all:    cargo bench --manifest-path benchmarks/Cargo.toml --bench grasp
//! Filter:     cargo bench --manifest-path benchmarks/Cargo.toml --bench grasp -- step

use criterion::{criterion_group, criterion_main, Criterion};
use glam::Vec3;
use talon::{ContactRequirement, PhysicsEngine};
use talon_bench::*;

// ---------------------------------------------------------------------------
// Step loop
// ---------------------------------------------------------------------------

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    let mut sim = setup_loaded_linkage();
    group.bench_function("coupled_gripper", |b| {
        b.iter(|| sim.step());
    });

    let (mut sim, _mount) = setup_mounted_parallel_jaw();
    group.bench_function("mounted_gripper", |b| {
        b.iter(|| sim.step());
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Inverse kinematics
// ---------------------------------------------------------------------------

fn bench_ik(c: &mut Criterion) {
    let (sim, mount) = setup_mounted_parallel_jaw();
    let target = mount.cartesian_pos(sim.engine()).unwrap() + Vec3::new(0.1, -0.1, 0.2);

    c.bench_function("ik/xyz_carriage", |b| {
        b.iter(|| {
            sim.engine()
                .solve_ik(mount.body(), mount.end_effector_link(), target)
                .unwrap()
        });
    });
}

// ---------------------------------------------------------------------------
// Contact evaluation
// ---------------------------------------------------------------------------

fn bench_contact(c: &mut Criterion) {
    let requirement = ContactRequirement::AllOf(vec![
        ContactRequirement::Link(1),
        ContactRequirement::AnyOf(vec![
            ContactRequirement::Link(3),
            ContactRequirement::Link(4),
        ]),
    ]);

    c.bench_function("contact/nested_requirement", |b| {
        b.iter(|| requirement.is_satisfied(&|link| link == 1 || link == 4));
    });
}

criterion_group!(benches, bench_step, bench_ik, bench_contact);
criterion_main!(benches);
