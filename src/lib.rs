//! Talon — gripper actuation and mount control
//!
//! A control layer for interchangeable robotic grippers inside a rigid-body
//! simulation: heterogeneous mechanical designs hide behind one gripper
//! contract, underactuated mechanisms are driven through per-step joint
//! coupling, and a kinematic mount positions a loaded gripper with a
//! closed-loop cartesian controller.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **pose** - Rigid transforms and grasp-center ↔ base placement
//! 2. **asset** - URDF-backed model descriptions (joint topology, masses)
//! 3. **engine** - Narrow capability trait over the rigid-body engine
//! 4. **engine::kinematic** - Reference backend without dynamics (feature = "kinematic")
//! 5. **sim** - Simulation context: clock, stepping, per-step callbacks
//! 6. **gripper** - Gripper contract, joint coupling, contact requirements, variants
//! 7. **mount** - 3-DOF carriage with IK-seeded closed-loop positioning
//!
//! The physics engine itself (dynamics integration, collision detection, IK
//! solving) is an external collaborator consumed through the
//! [`PhysicsEngine`] trait; the shipped kinematic backend is enough to
//! exercise the control layer.

pub mod asset;
pub mod engine;
pub mod error;
pub mod gripper;
pub mod mount;
pub mod pose;
pub mod sim;

// Re-export commonly used types
pub use asset::{JointDescription, JointKind, JointLimits, LinkDescription, ModelDescription};

pub use engine::{
    BodyHandle, ConstraintHandle, EngineError, FrictionConfig, LinkId, MotorCommand,
    PhysicsEngine, PositionControl, VelocityControl,
};

#[cfg(feature = "kinematic")]
pub use engine::kinematic::KinematicEngine;

pub use error::{Error, Result};

pub use gripper::{
    ContactRequirement, Follower, Gripper, GripperInstance, GripperModel, GripperSpec,
    JointCoupling, LinkageGripper, MassConfig, ParallelJawGripper,
};

pub use mount::Mount;

pub use pose::{gripper_base_pose, grasp_center_pose, Pose};

pub use sim::{SimConfig, Simulator, StepCallback};

// Re-export glam for convenience
pub use glam;
