//! Narrow capability interface to the rigid-body engine.
//!
//! The control layer never talks to a concrete physics implementation
//! directly; everything it needs is expressed by the [`PhysicsEngine`] trait.
//! A backend only has to support model loading, joint state and motor
//! commands, per-link dynamics info, link poses, fixed constraints, and
//! point inverse kinematics for an end-effector.

#[cfg(feature = "kinematic")]
pub mod kinematic;

use glam::Vec3;

use crate::asset::ModelDescription;
use crate::pose::Pose;

/// Handle to a body loaded in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u32);

/// Handle to a rigid constraint between two bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintHandle(pub u32);

/// Identifies a link of a body: the base frame, or the child link of the
/// joint with the same index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkId {
    /// The body's base frame.
    Base,
    /// The child link of joint `i`.
    Link(usize),
}

/// Parameters for a position-controlled joint motor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionControl {
    /// Target joint position.
    pub target: f32,
    /// Force limit for the motor.
    pub max_force: f32,
    /// Proportional gain on the position error.
    pub position_gain: f32,
    /// Feedforward velocity keeping the joint from lagging behind a moving
    /// target. Zero disables the assist.
    pub target_velocity: f32,
    /// Velocity cap for the controlled motion, if any.
    pub max_velocity: Option<f32>,
}

impl PositionControl {
    /// Position control toward `target` with default force and gain.
    pub fn new(target: f32) -> Self {
        Self {
            target,
            max_force: 100.0,
            position_gain: 1.0,
            target_velocity: 0.0,
            max_velocity: None,
        }
    }

    /// Set the force limit.
    pub fn max_force(mut self, force: f32) -> Self {
        self.max_force = force;
        self
    }

    /// Set the proportional position gain.
    pub fn position_gain(mut self, gain: f32) -> Self {
        self.position_gain = gain;
        self
    }

    /// Set the feedforward target velocity.
    pub fn target_velocity(mut self, velocity: f32) -> Self {
        self.target_velocity = velocity;
        self
    }

    /// Cap the velocity of the controlled motion.
    pub fn max_velocity(mut self, velocity: f32) -> Self {
        self.max_velocity = Some(velocity);
        self
    }
}

/// Parameters for a velocity-controlled joint motor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityControl {
    /// Target joint velocity.
    pub target_velocity: f32,
    /// Force limit for the motor.
    pub max_force: f32,
}

impl VelocityControl {
    /// Velocity control toward `target_velocity` with the given force limit.
    pub fn new(target_velocity: f32, max_force: f32) -> Self {
        Self {
            target_velocity,
            max_force,
        }
    }
}

/// A per-joint motor command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorCommand {
    /// Drive the joint toward a target position.
    Position(PositionControl),
    /// Drive the joint at a target velocity.
    Velocity(VelocityControl),
}

/// Friction parameters applied to a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionConfig {
    /// Lateral (sliding) friction coefficient.
    pub lateral: f32,
    /// Spinning friction coefficient.
    pub spinning: f32,
    /// Rolling friction coefficient.
    pub rolling: f32,
    /// Whether to anchor friction at the contact point.
    pub anchor: bool,
}

impl Default for FrictionConfig {
    fn default() -> Self {
        Self {
            lateral: 1.0,
            spinning: 1.0,
            rolling: 1e-4,
            anchor: true,
        }
    }
}

/// Faults reported by an engine backend.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The body handle does not refer to a loaded body.
    #[error("unknown body handle")]
    UnknownBody,

    /// A joint index was out of range for the body.
    #[error("joint index {0} is out of range")]
    InvalidJoint(usize),

    /// A link id was out of range for the body.
    #[error("link index {0} is out of range")]
    InvalidLink(usize),

    /// A motor command or joint reset targeted a fixed joint.
    #[error("joint {0} is fixed and cannot be actuated")]
    FixedJoint(usize),

    /// The backend cannot solve inverse kinematics for this chain.
    #[error("inverse kinematics is not supported for this kinematic chain")]
    IkUnsupported,
}

/// The capability set the control layer consumes from a rigid-body engine.
///
/// Implementations own the process-wide body/joint table; the control layer
/// only ever mutates bodies it created through this interface.
pub trait PhysicsEngine {
    /// Load a body from a model description at a global scale and pose.
    fn load_model(
        &mut self,
        model: &ModelDescription,
        pose: &Pose,
        scale: f32,
        self_collision: bool,
    ) -> Result<BodyHandle, EngineError>;

    /// Number of joints of a body (movable and fixed).
    fn num_joints(&self, body: BodyHandle) -> Result<usize, EngineError>;

    /// Current measured position of a joint.
    fn joint_position(&self, body: BodyHandle, joint: usize) -> Result<f32, EngineError>;

    /// Directly reset a joint position, bypassing motor dynamics. Intended
    /// for setup, not for use while the simulation is advancing.
    fn reset_joint_position(
        &mut self,
        body: BodyHandle,
        joint: usize,
        position: f32,
    ) -> Result<(), EngineError>;

    /// Issue a motor command for a joint. The command stays in effect until
    /// replaced.
    fn set_motor(
        &mut self,
        body: BodyHandle,
        joint: usize,
        command: MotorCommand,
    ) -> Result<(), EngineError>;

    /// Mass of a link.
    fn link_mass(&self, body: BodyHandle, link: LinkId) -> Result<f32, EngineError>;

    /// Override the mass of a link.
    fn set_link_mass(&mut self, body: BodyHandle, link: LinkId, mass: f32)
        -> Result<(), EngineError>;

    /// Configure friction of a link.
    fn set_link_friction(
        &mut self,
        body: BodyHandle,
        link: LinkId,
        friction: &FrictionConfig,
    ) -> Result<(), EngineError>;

    /// Current friction configuration of a link.
    fn link_friction(&self, body: BodyHandle, link: LinkId) -> Result<FrictionConfig, EngineError>;

    /// Set the visual color of a link.
    fn set_link_color(
        &mut self,
        body: BodyHandle,
        link: LinkId,
        rgba: [f32; 4],
    ) -> Result<(), EngineError>;

    /// Current visual color of a link.
    fn link_color(&self, body: BodyHandle, link: LinkId) -> Result<[f32; 4], EngineError>;

    /// World pose of a link.
    fn link_world_pose(&self, body: BodyHandle, link: LinkId) -> Result<Pose, EngineError>;

    /// Whether a link is currently in contact with any other body.
    fn link_in_contact(&self, body: BodyHandle, link: LinkId) -> Result<bool, EngineError>;

    /// Create a fixed rigid constraint between two bodies' frames.
    fn create_fixed_constraint(
        &mut self,
        parent: BodyHandle,
        parent_link: LinkId,
        child: BodyHandle,
        child_link: LinkId,
        parent_frame: Pose,
        child_frame: Pose,
    ) -> Result<ConstraintHandle, EngineError>;

    /// Solve inverse kinematics for `ee_link` reaching `target` in world
    /// coordinates. Returns one target position per movable joint, in joint
    /// order.
    fn solve_ik(
        &self,
        body: BodyHandle,
        ee_link: LinkId,
        target: Vec3,
    ) -> Result<Vec<f32>, EngineError>;

    /// Advance the simulation by `dt` seconds.
    fn step(&mut self, dt: f32);
}
