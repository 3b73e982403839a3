//! Shared setup helpers for talon benchmarks.

use glam::Vec3;
use talon::{Gripper, GripperModel, GripperSpec, KinematicEngine, Mount, Pose, Simulator};

/// A simulator with a loaded linkage gripper, ready to step.
pub fn setup_loaded_linkage() -> Simulator<KinematicEngine> {
    let mut sim = Simulator::new(KinematicEngine::new());
    let mut gripper = GripperModel::linkage(1.0);
    gripper
        .load(&mut sim, &Pose::from_translation(Vec3::new(0.0, 0.0, 0.3)), 1.0)
        .expect("load linkage gripper");
    sim
}

/// A simulator with a loaded, mounted parallel-jaw gripper.
pub fn setup_mounted_parallel_jaw() -> (Simulator<KinematicEngine>, Mount) {
    let mut sim = Simulator::new(KinematicEngine::new());
    let mut gripper = GripperModel::parallel_jaw(1.0);
    gripper
        .load(&mut sim, &Pose::from_translation(Vec3::new(0.0, 0.0, 0.3)), 1.0)
        .expect("load parallel-jaw gripper");
    let mount = Mount::attach(&mut sim, gripper.instance()).expect("attach mount");
    (sim, mount)
}
