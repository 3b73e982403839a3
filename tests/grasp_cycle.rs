//! Full grasp-cycle integration: grasp pose -> placement -> load -> mount ->
//! closed-loop positioning -> close -> contact judgement.

#![cfg(feature = "kinematic")]

use glam::Vec3;
use talon::{
    grasp_center_pose, Gripper, GripperSpec, KinematicEngine, LinkId, LinkageGripper, Mount,
    PhysicsEngine, Pose, Simulator,
};

fn downward_grasp_at(position: Vec3) -> Pose {
    Pose::from_translation(position)
}

#[test]
fn test_full_grasp_cycle() {
    let mut sim = Simulator::new(KinematicEngine::new());
    let mut gripper = LinkageGripper::new(1.0);
    let grasp_pose = downward_grasp_at(Vec3::new(0.4, 0.1, 0.2));

    gripper.load(&mut sim, &grasp_pose, 1.0).unwrap();
    let body = gripper.instance().body().unwrap();

    // The body was placed at the transformed base pose; recovering the grasp
    // center from it reproduces the requested grasp pose.
    let base = sim.engine().link_world_pose(body, LinkId::Base).unwrap();
    let recovered = grasp_center_pose(&base, gripper.pos_offset(), gripper.orn_offset());
    assert!(recovered.position.distance(grasp_pose.position) < 1e-5);

    // Mass was normalized at load: base 0.4 plus 0.1 across the fingers.
    let mass = gripper.instance().mass(sim.engine()).unwrap();
    assert!((mass - 0.5).abs() < 1e-5, "total mass {mass}");

    // Position the gripper above the object with the mount.
    let mount = Mount::attach(&mut sim, gripper.instance()).unwrap();
    let approach = mount.cartesian_pos(sim.engine()).unwrap() + Vec3::new(-0.05, 0.04, 0.15);
    assert!(mount
        .go_to_cartesian_pos(&mut sim, approach, 5.0, 0.001)
        .unwrap());
    assert!(mount.cartesian_pos(sim.engine()).unwrap().distance(approach) < 0.001);

    // The gripper rode along: its base sits at the carriage end-effector.
    let base_after = sim.engine().link_world_pose(body, LinkId::Base).unwrap();
    assert!(base_after.position.distance(approach) < 1e-3);

    // Execute the grasp. The driver runs to its closed travel while the
    // per-step coupling keeps the followers mirrored.
    gripper.close(&mut sim).unwrap();
    let driver = sim.engine().joint_position(body, 0).unwrap();
    assert!(driver > 0.69, "driver at {driver}");

    // Contact on both pads satisfies the requirement; one pad alone does not.
    let requirement = gripper.contact_requirement().clone();
    assert!(!requirement.evaluate(sim.engine(), body).unwrap());

    sim.engine_mut()
        .set_link_contact(body, LinkId::Link(3), true)
        .unwrap();
    assert!(!requirement.evaluate(sim.engine(), body).unwrap());

    sim.engine_mut()
        .set_link_contact(body, LinkId::Link(8), true)
        .unwrap();
    assert!(requirement.evaluate(sim.engine(), body).unwrap());
}

#[test]
fn test_mount_timeout_is_soft() {
    let mut sim = Simulator::new(KinematicEngine::new());
    let mut gripper = LinkageGripper::new(1.0);
    gripper
        .load(&mut sim, &downward_grasp_at(Vec3::ZERO), 1.0)
        .unwrap();
    let mount = Mount::attach(&mut sim, gripper.instance()).unwrap();

    let start = sim.simulated_seconds();
    let reached = mount
        .go_to_cartesian_pos(&mut sim, Vec3::new(10.0, 0.0, 0.0), 1.0, 0.001)
        .unwrap();
    assert!(!reached);

    let elapsed = sim.simulated_seconds() - start;
    let dt = f64::from(sim.timestep());
    assert!(elapsed >= 1.0 && elapsed <= 1.0 + 2.0 * dt, "elapsed {elapsed}");
}
