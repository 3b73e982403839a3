//! Prismatic parallel-jaw gripper.
//!
//! Two sliding fingers, one driven. At setup the open amount is written by
//! direct joint reset; during a grasp the driver switches to velocity control
//! while the follower keeps mirroring the driver position with a feedforward
//! assist, so the control mode differs between setup and active grasping.

use glam::{Quat, Vec2, Vec3};
use std::f32::consts::{FRAC_PI_2, PI};
use tracing::debug;

use super::{
    asset_path, validate_open_scale, ContactRequirement, Follower, Gripper, GripperInstance,
    GripperSpec, JointCoupling, MassConfig,
};
use crate::asset::ModelDescription;
use crate::engine::{FrictionConfig, MotorCommand, PhysicsEngine, VelocityControl};
use crate::error::{Error, Result};
use crate::pose::Pose;
use crate::sim::Simulator;

const ASSET_FILE: &str = "parallel_jaw.urdf";

const DRIVER_JOINT: usize = 0;
const FOLLOWER_JOINT: usize = 2;
const PAD_LINKS: [usize; 2] = [1, 3];

/// Finger travel from the centerline at open scale 1.0, before scaling.
const FINGER_OPEN_DISTANCE: f32 = 0.028;

const GRASP_FORCE: f32 = 100.0;
const GRASP_SPEED: f32 = 0.1;
const FOLLOWER_GAIN: f32 = 1.8;
const SETTLE_SECONDS: f32 = 2.0;

const BODY_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 1.0];

/// Prismatic two-finger gripper (one driver, one mirrored follower).
#[derive(Debug)]
pub struct ParallelJawGripper {
    instance: GripperInstance,
    contact: ContactRequirement,
}

impl ParallelJawGripper {
    /// An unloaded gripper at the given uniform scale.
    pub fn new(scale: f32) -> Self {
        Self {
            instance: GripperInstance::new(scale),
            contact: ContactRequirement::AllOf(
                PAD_LINKS.iter().map(|&l| ContactRequirement::Link(l)).collect(),
            ),
        }
    }

    fn open_distance(&self) -> f32 {
        FINGER_OPEN_DISTANCE * self.instance.scale()
    }

    fn coupling(&self) -> JointCoupling {
        JointCoupling::new(
            DRIVER_JOINT,
            vec![Follower {
                joint: FOLLOWER_JOINT,
                sign: -1.0,
            }],
        )
        .max_force(GRASP_FORCE)
        .position_gain(FOLLOWER_GAIN)
        .assist_velocity(2.0 * GRASP_SPEED)
    }

    fn reset_joints<E: PhysicsEngine>(&self, sim: &mut Simulator<E>, open_scale: f32) -> Result<()> {
        let body = self.instance.body()?;
        let travel = self.open_distance() * open_scale;
        let engine = sim.engine_mut();
        engine.reset_joint_position(body, DRIVER_JOINT, -travel)?;
        engine.reset_joint_position(body, FOLLOWER_JOINT, travel)?;
        Ok(())
    }
}

impl GripperSpec for ParallelJawGripper {
    fn pos_offset(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, 0.136 * self.instance.scale())
    }

    fn orn_offset(&self) -> Quat {
        Quat::from_euler(glam::EulerRot::XYZ, PI, 0.0, FRAC_PI_2)
    }

    fn contact_requirement(&self) -> &ContactRequirement {
        &self.contact
    }

    fn vis_points(&self, open_scale: f32) -> [Vec2; 2] {
        let travel = self.open_distance() * open_scale;
        [Vec2::new(travel, 0.0), Vec2::new(-travel, 0.0)]
    }

    fn instance(&self) -> &GripperInstance {
        &self.instance
    }
}

impl<E: PhysicsEngine> Gripper<E> for ParallelJawGripper {
    fn load(&mut self, sim: &mut Simulator<E>, grasp_pose: &Pose, open_scale: f32) -> Result<()> {
        validate_open_scale(open_scale)?;
        if self.instance.is_loaded() {
            return Err(Error::AlreadyLoaded);
        }

        let base_pose = self.base_pose(grasp_pose);
        let model = ModelDescription::from_urdf(asset_path(ASSET_FILE)).map_err(Error::Asset)?;
        let body = sim
            .engine_mut()
            .load_model(&model, &base_pose, self.instance.scale(), true)?;
        self.instance.mark_loaded(body)?;
        debug!(?body, "loaded parallel-jaw gripper");

        self.instance.set_color(sim.engine_mut(), BODY_COLOR)?;
        self.instance
            .configure_friction(sim.engine_mut(), &FrictionConfig::default())?;
        self.instance
            .configure_mass(sim.engine_mut(), &MassConfig::default())?;
        self.reset_joints(sim, open_scale)?;

        sim.register_step_callback(self.coupling().into_step_callback(body));
        Ok(())
    }

    fn set_open_scale(&mut self, sim: &mut Simulator<E>, open_scale: f32) -> Result<()> {
        validate_open_scale(open_scale)?;
        self.reset_joints(sim, open_scale)
    }

    fn close(&mut self, sim: &mut Simulator<E>) -> Result<()> {
        let body = self.instance.body()?;
        sim.engine_mut().set_motor(
            body,
            DRIVER_JOINT,
            MotorCommand::Velocity(VelocityControl::new(GRASP_SPEED, GRASP_FORCE)),
        )?;
        sim.step_for(SETTLE_SECONDS);
        Ok(())
    }
}

#[cfg(all(test, feature = "kinematic"))]
mod tests {
    use super::*;
    use crate::engine::kinematic::KinematicEngine;

    fn loaded_gripper(scale: f32) -> (Simulator<KinematicEngine>, ParallelJawGripper) {
        let mut sim = Simulator::new(KinematicEngine::new());
        let mut gripper = ParallelJawGripper::new(scale);
        gripper.load(&mut sim, &Pose::IDENTITY, 1.0).unwrap();
        (sim, gripper)
    }

    #[test]
    fn test_set_open_scale_rejects_out_of_range() {
        let (mut sim, mut gripper) = loaded_gripper(1.0);
        let before = gripper.instance.joint_positions(sim.engine()).unwrap();

        assert!(matches!(
            gripper.set_open_scale(&mut sim, 1.5),
            Err(Error::InvalidOpenScale(_))
        ));
        // Rejected argument leaves the joint state untouched.
        let after = gripper.instance.joint_positions(sim.engine()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_open_scale_positions_fingers_symmetrically() {
        let (mut sim, mut gripper) = loaded_gripper(1.0);

        for open_scale in [0.1f32, 0.5, 1.0] {
            gripper.set_open_scale(&mut sim, open_scale).unwrap();
            let travel = FINGER_OPEN_DISTANCE * open_scale;
            let positions = gripper.instance.joint_positions(sim.engine()).unwrap();
            assert!((positions[DRIVER_JOINT] + travel).abs() < 1e-6);
            assert!((positions[FOLLOWER_JOINT] - travel).abs() < 1e-6);
        }
    }

    #[test]
    fn test_scale_factor_shrinks_travel() {
        let (mut sim, mut gripper) = loaded_gripper(0.5);
        gripper.set_open_scale(&mut sim, 1.0).unwrap();
        let positions = gripper.instance.joint_positions(sim.engine()).unwrap();
        assert!((positions[DRIVER_JOINT] + 0.014).abs() < 1e-6);
    }

    #[test]
    fn test_close_mirrors_follower_throughout() {
        let (mut sim, mut gripper) = loaded_gripper(1.0);
        gripper.close(&mut sim).unwrap();

        let body = gripper.instance.body().unwrap();
        let driver = sim.engine().joint_position(body, DRIVER_JOINT).unwrap();
        let follower = sim.engine().joint_position(body, FOLLOWER_JOINT).unwrap();
        // Driver has moved off its open position and the follower mirrors it.
        assert!(driver > -FINGER_OPEN_DISTANCE);
        assert!((follower + driver).abs() < 1e-3, "follower {follower} vs driver {driver}");
    }

    #[test]
    fn test_default_color_applied() {
        let (sim, gripper) = loaded_gripper(1.0);
        let body = gripper.instance.body().unwrap();
        let color = sim
            .engine()
            .link_color(body, crate::engine::LinkId::Link(1))
            .unwrap();
        assert_eq!(color, BODY_COLOR);
    }
}
