//! Kinematic mount: a positionable carriage for a loaded gripper.
//!
//! The mount is a dummy robot that can translate in x/y/z but not rotate. It
//! attaches rigidly to the *base* of a loaded gripper (which differs from the
//! grasp-center frame) and drives it to cartesian targets with a closed-loop
//! controller: termination is decided by measured end-effector state against
//! the live simulation clock, not by a fixed step count.

use glam::Vec3;
use tracing::{debug, warn};

use crate::asset::ModelDescription;
use crate::engine::{LinkId, MotorCommand, PhysicsEngine, PositionControl};
use crate::error::{Error, Result};
use crate::gripper::GripperInstance;
use crate::pose::Pose;
use crate::sim::Simulator;

const ASSET_FILE: &str = "xyz_mount.urdf";
const END_EFFECTOR_LINK: &str = "end_effector_link";

/// Force holding the carriage still while the gripper's own joints move.
const HOLD_FORCE: f32 = 1000.0;

const MOVE_FORCE: f32 = 500.0;
const MOVE_GAIN: f32 = 0.2;
const MOVE_MAX_VELOCITY: f32 = 0.2;

/// A 3-DOF translation-only carriage rigidly attached to one gripper for its
/// lifetime.
#[derive(Debug)]
pub struct Mount {
    body: crate::engine::BodyHandle,
    ee_link: usize,
    movable_joints: Vec<usize>,
}

impl Mount {
    /// The body handle of the carriage.
    pub fn body(&self) -> crate::engine::BodyHandle {
        self.body
    }

    /// The link id of the carriage end-effector frame.
    pub fn end_effector_link(&self) -> LinkId {
        LinkId::Link(self.ee_link)
    }

    /// Spawn a carriage at the gripper's current base pose, constrain its
    /// end-effector frame to the gripper base (zero relative offset), and
    /// hold every carriage joint at zero with high force.
    pub fn attach<E: PhysicsEngine>(
        sim: &mut Simulator<E>,
        gripper: &GripperInstance,
    ) -> Result<Self> {
        let gripper_body = gripper.body()?;
        let base_pose = sim.engine().link_world_pose(gripper_body, LinkId::Base)?;

        let model = ModelDescription::from_urdf(crate::gripper::asset_path(ASSET_FILE))
            .map_err(Error::Asset)?;
        let ee_link = model
            .link_index(END_EFFECTOR_LINK)
            .ok_or_else(|| Error::Asset(anyhow::anyhow!("mount asset has no end-effector link")))?;
        let movable_joints: Vec<usize> = model.movable_joints().collect();

        let engine = sim.engine_mut();
        let body = engine.load_model(&model, &base_pose, 1.0, false)?;
        engine.create_fixed_constraint(
            body,
            LinkId::Link(ee_link),
            gripper_body,
            LinkId::Base,
            Pose::IDENTITY,
            Pose::IDENTITY,
        )?;

        for &joint in &movable_joints {
            engine.set_motor(
                body,
                joint,
                MotorCommand::Position(PositionControl::new(0.0).max_force(HOLD_FORCE)),
            )?;
        }

        debug!(?body, "mount attached at gripper base");
        Ok(Self {
            body,
            ee_link,
            movable_joints,
        })
    }

    /// Current carriage joint positions, in joint order.
    pub fn joint_positions<E: PhysicsEngine>(&self, engine: &E) -> Result<Vec<f32>> {
        let mut positions = Vec::with_capacity(self.movable_joints.len());
        for &joint in &self.movable_joints {
            positions.push(engine.joint_position(self.body, joint)?);
        }
        Ok(positions)
    }

    /// Current cartesian position of the carriage end-effector.
    pub fn cartesian_pos<E: PhysicsEngine>(&self, engine: &E) -> Result<Vec3> {
        Ok(engine
            .link_world_pose(self.body, LinkId::Link(self.ee_link))?
            .position)
    }

    /// Drive the carriage end-effector to `target_pos`.
    ///
    /// Solves inverse kinematics once, commands every carriage joint toward
    /// the solved targets, then advances simulated time re-checking the
    /// Euclidean distance to the target. Returns `true` once the distance
    /// drops below `tolerance`; returns `false` when simulated time exceeds
    /// `timeout` seconds first — a soft outcome, not an error. Re-entrant:
    /// each call re-solves and re-enters the loop.
    pub fn go_to_cartesian_pos<E: PhysicsEngine>(
        &self,
        sim: &mut Simulator<E>,
        target_pos: Vec3,
        timeout: f32,
        tolerance: f32,
    ) -> Result<bool> {
        debug!(?target_pos, timeout, tolerance, "moving mount");
        let start = sim.simulated_seconds();
        let deadline = start + f64::from(timeout);

        let joint_targets =
            sim.engine()
                .solve_ik(self.body, LinkId::Link(self.ee_link), target_pos)?;
        let engine = sim.engine_mut();
        for (&joint, &target) in self.movable_joints.iter().zip(&joint_targets) {
            engine.set_motor(
                self.body,
                joint,
                MotorCommand::Position(
                    PositionControl::new(target)
                        .max_force(MOVE_FORCE)
                        .position_gain(MOVE_GAIN)
                        .max_velocity(MOVE_MAX_VELOCITY),
                ),
            )?;
        }

        while !self.point_reached(sim.engine(), target_pos, tolerance)?
            && sim.simulated_seconds() < deadline
        {
            sim.step();
        }

        debug!(
            elapsed = sim.simulated_seconds() - start,
            "mount motion finished"
        );
        if self.point_reached(sim.engine(), target_pos, tolerance)? {
            debug!("goal position reached");
            return Ok(true);
        }
        let residual = self.cartesian_pos(sim.engine())?.distance(target_pos);
        warn!(residual, "mount timed out before attaining goal position");
        Ok(false)
    }

    fn point_reached<E: PhysicsEngine>(
        &self,
        engine: &E,
        target_pos: Vec3,
        tolerance: f32,
    ) -> Result<bool> {
        Ok(self.cartesian_pos(engine)?.distance(target_pos) < tolerance)
    }
}

#[cfg(all(test, feature = "kinematic"))]
mod tests {
    use super::*;
    use crate::engine::kinematic::KinematicEngine;
    use crate::gripper::{Gripper, GripperSpec, ParallelJawGripper};

    fn mounted() -> (Simulator<KinematicEngine>, ParallelJawGripper, Mount) {
        let mut sim = Simulator::new(KinematicEngine::new());
        let mut gripper = ParallelJawGripper::new(1.0);
        let grasp_pose = Pose::from_translation(Vec3::new(0.0, 0.0, 0.3));
        gripper.load(&mut sim, &grasp_pose, 1.0).unwrap();
        let mount = Mount::attach(&mut sim, gripper.instance()).unwrap();
        (sim, gripper, mount)
    }

    #[test]
    fn test_attach_spawns_at_gripper_base() {
        let (sim, gripper, mount) = mounted();
        let gripper_base = sim
            .engine()
            .link_world_pose(gripper.instance().body().unwrap(), LinkId::Base)
            .unwrap();
        // End-effector frame coincides with the gripper base at attach time.
        let ee = mount.cartesian_pos(sim.engine()).unwrap();
        assert!(ee.distance(gripper_base.position) < 1e-5);

        let joints = mount.joint_positions(sim.engine()).unwrap();
        assert_eq!(joints.len(), 3);
        assert!(joints.iter().all(|q| q.abs() < 1e-6));
    }

    #[test]
    fn test_reachable_target_converges_within_tolerance() {
        let (mut sim, _gripper, mount) = mounted();
        let start = mount.cartesian_pos(sim.engine()).unwrap();
        let target = start + Vec3::new(0.05, -0.04, 0.08);

        let reached = mount
            .go_to_cartesian_pos(&mut sim, target, 5.0, 0.001)
            .unwrap();
        assert!(reached);
        let end = mount.cartesian_pos(sim.engine()).unwrap();
        assert!(end.distance(target) < 0.001);
    }

    #[test]
    fn test_unreachable_target_times_out_softly() {
        let (mut sim, _gripper, mount) = mounted();
        let before = sim.simulated_seconds();

        let target = Vec3::new(5.0, 5.0, 5.0);
        let reached = mount
            .go_to_cartesian_pos(&mut sim, target, 1.0, 0.001)
            .unwrap();
        assert!(!reached);

        // The loop consumed (approximately) the whole timeout and no more.
        let elapsed = sim.simulated_seconds() - before;
        let dt = f64::from(sim.timestep());
        assert!(elapsed >= 1.0, "elapsed {elapsed}");
        assert!(elapsed <= 1.0 + 2.0 * dt, "elapsed {elapsed}");
    }

    #[test]
    fn test_gripper_follows_mount() {
        let (mut sim, gripper, mount) = mounted();
        let body = gripper.instance().body().unwrap();
        let base_before = sim.engine().link_world_pose(body, LinkId::Base).unwrap();

        let target = mount.cartesian_pos(sim.engine()).unwrap() + Vec3::new(0.0, 0.0, 0.1);
        assert!(mount
            .go_to_cartesian_pos(&mut sim, target, 5.0, 0.001)
            .unwrap());

        let base_after = sim.engine().link_world_pose(body, LinkId::Base).unwrap();
        let motion = base_after.position - base_before.position;
        assert!((motion.z - 0.1).abs() < 2e-3, "gripper moved {motion:?}");
    }

    #[test]
    fn test_go_to_is_reentrant() {
        let (mut sim, _gripper, mount) = mounted();
        let start = mount.cartesian_pos(sim.engine()).unwrap();

        let first = start + Vec3::new(0.05, 0.0, 0.0);
        let second = start + Vec3::new(0.05, 0.05, 0.0);
        assert!(mount.go_to_cartesian_pos(&mut sim, first, 5.0, 0.001).unwrap());
        assert!(mount.go_to_cartesian_pos(&mut sim, second, 5.0, 0.001).unwrap());
        let end = mount.cartesian_pos(sim.engine()).unwrap();
        assert!(end.distance(second) < 0.001);
    }
}
