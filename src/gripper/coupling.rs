//! Joint coupling: driving follower joints from one measured driver.
//!
//! Underactuated grippers expose a single driver joint; the remaining
//! mechanically linked joints are followers whose targets are recomputed from
//! the driver's *measured* position every simulation step. The coupling is
//! never assumed to hold without re-assertion.

use crate::engine::{BodyHandle, EngineError, MotorCommand, PhysicsEngine, PositionControl};
use crate::sim::StepCallback;

/// A follower joint mirroring the driver through a fixed sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Follower {
    /// Follower joint index.
    pub joint: usize,
    /// Sign relating the follower target to the driver position.
    pub sign: f32,
}

/// Mapping from one driver joint to its follower joints, plus the shared
/// control parameters used to hold the coupling.
#[derive(Debug, Clone, PartialEq)]
pub struct JointCoupling {
    /// The externally commanded joint.
    pub driver: usize,
    /// Followers, each tracking `driver_position * sign`.
    pub followers: Vec<Follower>,
    /// Force limit shared by all follower motors.
    pub max_force: f32,
    /// Position gain shared by all follower motors.
    pub position_gain: f32,
    /// Feedforward velocity keeping followers from lagging during a dynamic
    /// close. Zero disables the assist.
    pub assist_velocity: f32,
}

impl JointCoupling {
    /// A coupling with the given driver and follower set.
    pub fn new(driver: usize, followers: Vec<Follower>) -> Self {
        Self {
            driver,
            followers,
            max_force: 100.0,
            position_gain: 1.0,
            assist_velocity: 0.0,
        }
    }

    /// Set the shared follower force limit.
    pub fn max_force(mut self, force: f32) -> Self {
        self.max_force = force;
        self
    }

    /// Set the shared follower position gain.
    pub fn position_gain(mut self, gain: f32) -> Self {
        self.position_gain = gain;
        self
    }

    /// Set the follower feedforward velocity.
    pub fn assist_velocity(mut self, velocity: f32) -> Self {
        self.assist_velocity = velocity;
        self
    }

    /// Read the driver's measured position and command every follower to
    /// `position * sign`. Returns the driver position.
    ///
    /// Idempotent within a step: issuing the same commands twice has no
    /// further effect.
    pub fn apply<E: PhysicsEngine>(
        &self,
        engine: &mut E,
        body: BodyHandle,
    ) -> Result<f32, EngineError> {
        let position = engine.joint_position(body, self.driver)?;
        for follower in &self.followers {
            engine.set_motor(
                body,
                follower.joint,
                MotorCommand::Position(
                    PositionControl::new(position * follower.sign)
                        .max_force(self.max_force)
                        .position_gain(self.position_gain)
                        .target_velocity(self.assist_velocity),
                ),
            )?;
        }
        Ok(position)
    }

    /// Package the coupling as a per-step callback for `body`.
    ///
    /// Registered once at load time; engine faults at this point would mean
    /// the body vanished mid-simulation, so they only surface as a trace.
    pub fn into_step_callback<E: PhysicsEngine>(self, body: BodyHandle) -> StepCallback<E> {
        Box::new(move |engine| {
            if let Err(error) = self.apply(engine, body) {
                tracing::error!(%error, "joint coupling failed");
            }
        })
    }
}
