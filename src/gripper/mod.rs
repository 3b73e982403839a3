//! The gripper contract and shared per-instance behavior.
//!
//! Every gripper variant implements [`GripperSpec`] (its fixed, engine-free
//! properties) and [`Gripper`] (the engine-touching operations), so
//! heterogeneous mechanical designs — single vs. multi-joint, mirrored vs.
//! independent fingers — hide behind one contract and the rest of the system
//! can position, actuate, and query them uniformly. Shared state and the
//! non-overridable behaviors (mass memo, friction/mass configuration, color)
//! live in [`GripperInstance`].

pub mod contact;
pub mod coupling;
mod linkage;
mod parallel_jaw;

pub use contact::ContactRequirement;
pub use coupling::{Follower, JointCoupling};
pub use linkage::LinkageGripper;
pub use parallel_jaw::ParallelJawGripper;

use glam::{Quat, Vec2, Vec3};
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use crate::engine::{BodyHandle, FrictionConfig, LinkId, PhysicsEngine};
use crate::error::{Error, Result};
use crate::pose::Pose;
use crate::sim::Simulator;

/// Valid range for open-scale arguments.
pub const OPEN_SCALE_RANGE: (f32, f32) = (0.1, 1.0);

pub(crate) fn validate_open_scale(open_scale: f32) -> Result<()> {
    let (lo, hi) = OPEN_SCALE_RANGE;
    if (lo..=hi).contains(&open_scale) {
        Ok(())
    } else {
        Err(Error::InvalidOpenScale(open_scale))
    }
}

/// Full path to a shipped gripper/mount asset.
pub(crate) fn asset_path(file: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("assets")
        .join(file)
}

/// Fixed, engine-independent properties of a gripper variant.
pub trait GripperSpec {
    /// Position of the grasp center relative to the base frame.
    fn pos_offset(&self) -> Vec3;

    /// Orientation of the grasp center relative to the base frame.
    fn orn_offset(&self) -> Quat;

    /// The links that must register contact for a successful grasp.
    fn contact_requirement(&self) -> &ContactRequirement;

    /// Two 2D reference points as a function of the open amount, for
    /// external visualization. Purely derived, no side effects.
    fn vis_points(&self, open_scale: f32) -> [Vec2; 2];

    /// Shared per-instance state.
    fn instance(&self) -> &GripperInstance;

    /// The base placement pose for a grasp-center pose, using this variant's
    /// fixed offsets.
    fn base_pose(&self, grasp_pose: &Pose) -> Pose {
        crate::pose::gripper_base_pose(grasp_pose, self.pos_offset(), self.orn_offset())
    }
}

/// The engine-touching operations every gripper variant implements.
pub trait Gripper<E: PhysicsEngine>: GripperSpec {
    /// Place the gripper in the simulation at the base pose computed from
    /// `grasp_pose`, configure friction and normalized mass, set the initial
    /// joint state for `open_scale`, and register the variant's joint
    /// coupling to run once per simulation step.
    ///
    /// Fails with [`Error::InvalidOpenScale`] for an open scale outside
    /// [0.1, 1.0] and [`Error::AlreadyLoaded`] if the gripper was loaded
    /// before; neither leaves partial state behind.
    fn load(&mut self, sim: &mut Simulator<E>, grasp_pose: &Pose, open_scale: f32) -> Result<()>;

    /// Reset joint positions to reflect `open_scale` without stepping the
    /// simulation. Intended before or shortly after loading, not mid-grasp.
    fn set_open_scale(&mut self, sim: &mut Simulator<E>, open_scale: f32) -> Result<()>;

    /// Command the driver joint toward closure and block in simulated time
    /// for the settling duration. Success is judged externally via the
    /// contact requirement.
    fn close(&mut self, sim: &mut Simulator<E>) -> Result<()>;
}

/// Mass normalization applied to every variant at load time, so different
/// gripper topologies present uniform inertia to the grasped object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassConfig {
    /// Mass assigned to the base link.
    pub base_mass: f32,
    /// Total mass distributed evenly across all non-base links.
    pub combined_finger_mass: f32,
}

impl Default for MassConfig {
    fn default() -> Self {
        Self {
            base_mass: 0.4,
            combined_finger_mass: 0.1,
        }
    }
}

/// Shared state of a loaded (or not yet loaded) gripper.
///
/// Created uninitialized; becomes loaded exactly once. Every accessor that
/// requires simulation state fails with [`Error::NotLoaded`] before that.
#[derive(Debug)]
pub struct GripperInstance {
    body: Option<BodyHandle>,
    scale: f32,
    mass: OnceCell<f32>,
}

impl GripperInstance {
    /// An unloaded instance with a uniform geometry scale factor.
    pub fn new(scale: f32) -> Self {
        Self {
            body: None,
            scale,
            mass: OnceCell::new(),
        }
    }

    /// Whether the instance has been added to a simulation.
    pub fn is_loaded(&self) -> bool {
        self.body.is_some()
    }

    /// The body handle of the loaded gripper.
    pub fn body(&self) -> Result<BodyHandle> {
        self.body.ok_or(Error::NotLoaded)
    }

    /// The uniform scale factor applied to geometry and offsets.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub(crate) fn mark_loaded(&mut self, body: BodyHandle) -> Result<()> {
        if self.body.is_some() {
            return Err(Error::AlreadyLoaded);
        }
        self.body = Some(body);
        Ok(())
    }

    /// Number of joints of the loaded body.
    pub fn num_joints<E: PhysicsEngine>(&self, engine: &E) -> Result<usize> {
        Ok(engine.num_joints(self.body()?)?)
    }

    /// Total mass of base plus all links, computed once and memoized.
    /// Re-load is disallowed, so the memo never needs invalidation.
    pub fn mass<E: PhysicsEngine>(&self, engine: &E) -> Result<f32> {
        if let Some(mass) = self.mass.get() {
            return Ok(*mass);
        }
        let body = self.body()?;
        let mut total = engine.link_mass(body, LinkId::Base)?;
        for joint in 0..engine.num_joints(body)? {
            total += engine.link_mass(body, LinkId::Link(joint))?;
        }
        let _ = self.mass.set(total);
        Ok(total)
    }

    /// Current joint positions, one entry per joint index.
    pub fn joint_positions<E: PhysicsEngine>(&self, engine: &E) -> Result<Vec<f32>> {
        let body = self.body()?;
        let num_joints = engine.num_joints(body)?;
        let mut positions = Vec::with_capacity(num_joints);
        for joint in 0..num_joints {
            positions.push(engine.joint_position(body, joint)?);
        }
        Ok(positions)
    }

    /// Configure friction of every link.
    pub fn configure_friction<E: PhysicsEngine>(
        &self,
        engine: &mut E,
        friction: &FrictionConfig,
    ) -> Result<()> {
        let body = self.body()?;
        for joint in 0..engine.num_joints(body)? {
            engine.set_link_friction(body, LinkId::Link(joint), friction)?;
        }
        Ok(())
    }

    /// Distribute [`MassConfig`] over the body: `base_mass` on the base,
    /// `combined_finger_mass / k` on each of the `k` non-base links.
    pub fn configure_mass<E: PhysicsEngine>(
        &self,
        engine: &mut E,
        mass: &MassConfig,
    ) -> Result<()> {
        let body = self.body()?;
        engine.set_link_mass(body, LinkId::Base, mass.base_mass)?;
        let num_joints = engine.num_joints(body)?;
        let per_link = mass.combined_finger_mass / num_joints as f32;
        for joint in 0..num_joints {
            engine.set_link_mass(body, LinkId::Link(joint), per_link)?;
        }
        Ok(())
    }

    /// Color the base and every link.
    pub fn set_color<E: PhysicsEngine>(&self, engine: &mut E, rgba: [f32; 4]) -> Result<()> {
        let body = self.body()?;
        engine.set_link_color(body, LinkId::Base, rgba)?;
        for joint in 0..engine.num_joints(body)? {
            engine.set_link_color(body, LinkId::Link(joint), rgba)?;
        }
        Ok(())
    }
}

/// The shipped gripper variants behind one owning type.
///
/// The variant set is closed, so dispatch is an enum rather than a trait
/// object.
#[derive(Debug)]
pub enum GripperModel {
    /// Linkage-driven two-finger gripper (one driver, five followers).
    Linkage(LinkageGripper),
    /// Prismatic two-finger gripper (one driver, one mirrored follower).
    ParallelJaw(ParallelJawGripper),
}

impl GripperModel {
    /// A linkage-driven gripper at the given scale.
    pub fn linkage(scale: f32) -> Self {
        Self::Linkage(LinkageGripper::new(scale))
    }

    /// A parallel-jaw gripper at the given scale.
    pub fn parallel_jaw(scale: f32) -> Self {
        Self::ParallelJaw(ParallelJawGripper::new(scale))
    }
}

impl GripperSpec for GripperModel {
    fn pos_offset(&self) -> Vec3 {
        match self {
            Self::Linkage(g) => g.pos_offset(),
            Self::ParallelJaw(g) => g.pos_offset(),
        }
    }

    fn orn_offset(&self) -> Quat {
        match self {
            Self::Linkage(g) => g.orn_offset(),
            Self::ParallelJaw(g) => g.orn_offset(),
        }
    }

    fn contact_requirement(&self) -> &ContactRequirement {
        match self {
            Self::Linkage(g) => g.contact_requirement(),
            Self::ParallelJaw(g) => g.contact_requirement(),
        }
    }

    fn vis_points(&self, open_scale: f32) -> [Vec2; 2] {
        match self {
            Self::Linkage(g) => g.vis_points(open_scale),
            Self::ParallelJaw(g) => g.vis_points(open_scale),
        }
    }

    fn instance(&self) -> &GripperInstance {
        match self {
            Self::Linkage(g) => g.instance(),
            Self::ParallelJaw(g) => g.instance(),
        }
    }
}

impl<E: PhysicsEngine> Gripper<E> for GripperModel {
    fn load(&mut self, sim: &mut Simulator<E>, grasp_pose: &Pose, open_scale: f32) -> Result<()> {
        match self {
            Self::Linkage(g) => g.load(sim, grasp_pose, open_scale),
            Self::ParallelJaw(g) => g.load(sim, grasp_pose, open_scale),
        }
    }

    fn set_open_scale(&mut self, sim: &mut Simulator<E>, open_scale: f32) -> Result<()> {
        match self {
            Self::Linkage(g) => g.set_open_scale(sim, open_scale),
            Self::ParallelJaw(g) => g.set_open_scale(sim, open_scale),
        }
    }

    fn close(&mut self, sim: &mut Simulator<E>) -> Result<()> {
        match self {
            Self::Linkage(g) => g.close(sim),
            Self::ParallelJaw(g) => g.close(sim),
        }
    }
}
