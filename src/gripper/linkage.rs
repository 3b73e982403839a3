//! Linkage-driven two-finger gripper.
//!
//! One revolute driver joint actuates both fingers through a linkage; five
//! passive joints follow the driver through fixed sign relationships so the
//! mechanism behaves as a single-DOF actuator from the outside.

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

const ASSET_FILE: &str = "linkage_gripper.urdf";

const DRIVER_JOINT: usize = 0;
const FOLLOWER_JOINTS: [(usize, f32); 5] =
    [(5, -1.0), (2, 1.0), (7, 1.0), (4, -1.0), (9, -1.0)];
const PAD_LINKS: [usize; 2] = [3, 8];

/// Driver travel: lower = fully open, upper = fully closed.
const DRIVER_LOWER: f32 = 0.0;
const DRIVER_UPPER: f32 = 0.7;

const GRASP_FORCE: f32 = 50.0;
const GRASP_SPEED: f32 = 0.8;
const FOLLOWER_GAIN: f32 = 1.5;
const SETTLE_SECONDS: f32 = 2.0;

/// Linkage-driven two-finger gripper (one driver, five mirrored followers).
#[derive(Debug)]
pub struct LinkageGripper {
    instance: GripperInstance,
    contact: ContactRequirement,
}

impl LinkageGripper {
    /// An unloaded gripper at the given uniform scale.
    pub fn new(scale: f32) -> Self {
        Self {
            instance: GripperInstance::new(scale),
            contact: ContactRequirement::AllOf(
                PAD_LINKS.iter().map(|&l| ContactRequirement::Link(l)).collect(),
            ),
        }
    }

    fn coupling(&self) -> JointCoupling {
        JointCoupling::new(
            DRIVER_JOINT,
            FOLLOWER_JOINTS
                .iter()
                .map(|&(joint, sign)| Follower { joint, sign })
                .collect(),
        )
        .max_force(GRASP_FORCE)
        .position_gain(FOLLOWER_GAIN)
    }

    /// Driver position for an open amount (1.0 = fully open).
    fn driver_position(open_scale: f32) -> f32 {
        open_scale * DRIVER_LOWER + (1.0 - open_scale) * DRIVER_UPPER
    }

    fn reset_joints<E: PhysicsEngine>(&self, sim: &mut Simulator<E>, open_scale: f32) -> Result<()> {
        let body = self.instance.body()?;
        let driver_position = Self::driver_position(open_scale);
        let engine = sim.engine_mut();
        engine.reset_joint_position(body, DRIVER_JOINT, driver_position)?;
        for (joint, sign) in FOLLOWER_JOINTS {
            engine.reset_joint_position(body, joint, driver_position * sign)?;
        }
        Ok(())
    }
}

impl GripperSpec for LinkageGripper {
    fn pos_offset(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, 0.235 * self.instance.scale())
    }

    fn orn_offset(&self) -> Quat {
        Quat::from_euler(glam::EulerRot::XYZ, PI, 0.0, FRAC_PI_2)
    }

    fn contact_requirement(&self) -> &ContactRequirement {
        &self.contact
    }

    fn vis_points(&self, open_scale: f32) -> [Vec2; 2] {
        let width = 0.075 * open_scale.sin() * self.instance.scale();
        [Vec2::new(-width, 0.0), Vec2::new(width, 0.0)]
    }

    fn instance(&self) -> &GripperInstance {
        &self.instance
    }
}

impl<E: PhysicsEngine> Gripper<E> for LinkageGripper {
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
        debug!(?body, "loaded linkage gripper");

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
