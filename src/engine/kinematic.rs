//! Kinematic reference backend.
//!
//! Implements [`PhysicsEngine`] without dynamics: motors integrate joint
//! positions directly, fixed constraints snap child bodies to their parent
//! frames after integration, and forward kinematics walks the joint tree.
//! There is no collision detection — contact state is injected by the
//! embedding application (or test) through [`KinematicEngine::set_link_contact`].
//!
//! Bodies live in a [`hecs::World`]; a handle table maps [`BodyHandle`] to
//! entities.

use glam::{Quat, Vec3};
use tracing::debug;

use super::{
    BodyHandle, ConstraintHandle, EngineError, FrictionConfig, LinkId, MotorCommand,
    PhysicsEngine,
};
use crate::asset::{JointDescription, JointKind, ModelDescription};
use crate::pose::Pose;

const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Base pose of a body.
struct BaseState {
    pose: Pose,
}

/// Per-joint simulation state.
struct JointSim {
    desc: JointDescription,
    position: f32,
    motor: Option<MotorCommand>,
}

/// All joints of a body, in joint-index order.
struct JointStates {
    joints: Vec<JointSim>,
}

/// Dynamics info carried per link.
#[derive(Clone)]
struct LinkState {
    mass: f32,
    friction: FrictionConfig,
    color: [f32; 4],
    in_contact: bool,
}

impl LinkState {
    fn new(mass: f32) -> Self {
        Self {
            mass,
            friction: FrictionConfig::default(),
            color: DEFAULT_COLOR,
            in_contact: false,
        }
    }
}

/// Link states of a body: the base plus one entry per joint's child link.
struct LinkStates {
    base: LinkState,
    links: Vec<LinkState>,
}

/// A fixed rigid attachment between two bodies' frames.
struct FixedConstraint {
    parent: BodyHandle,
    parent_link: LinkId,
    child: BodyHandle,
    child_base_in_parent_link: Pose,
}

/// The kinematic engine backend.
pub struct KinematicEngine {
    world: hecs::World,
    bodies: Vec<hecs::Entity>,
    constraints: Vec<FixedConstraint>,
}

impl KinematicEngine {
    /// An empty engine.
    pub fn new() -> Self {
        Self {
            world: hecs::World::new(),
            bodies: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Inject contact state for a link. The kinematic backend performs no
    /// collision detection, so contacts are supplied by the embedding
    /// application or test.
    pub fn set_link_contact(
        &mut self,
        body: BodyHandle,
        link: LinkId,
        in_contact: bool,
    ) -> Result<(), EngineError> {
        self.with_link_mut(body, link, |state| state.in_contact = in_contact)
    }

    /// The motor command currently in effect for a joint.
    pub fn motor_command(
        &self,
        body: BodyHandle,
        joint: usize,
    ) -> Result<Option<MotorCommand>, EngineError> {
        let entity = self.entity(body)?;
        let joints = self
            .world
            .get::<&JointStates>(entity)
            .map_err(|_| EngineError::UnknownBody)?;
        let sim = joints
            .joints
            .get(joint)
            .ok_or(EngineError::InvalidJoint(joint))?;
        Ok(sim.motor)
    }

    fn entity(&self, body: BodyHandle) -> Result<hecs::Entity, EngineError> {
        self.bodies
            .get(body.0 as usize)
            .copied()
            .ok_or(EngineError::UnknownBody)
    }

    fn with_link<T>(
        &self,
        body: BodyHandle,
        link: LinkId,
        read: impl FnOnce(&LinkState) -> T,
    ) -> Result<T, EngineError> {
        let entity = self.entity(body)?;
        let states = self
            .world
            .get::<&LinkStates>(entity)
            .map_err(|_| EngineError::UnknownBody)?;
        match link {
            LinkId::Base => Ok(read(&states.base)),
            LinkId::Link(i) => states
                .links
                .get(i)
                .map(read)
                .ok_or(EngineError::InvalidLink(i)),
        }
    }

    fn with_link_mut(
        &mut self,
        body: BodyHandle,
        link: LinkId,
        write: impl FnOnce(&mut LinkState),
    ) -> Result<(), EngineError> {
        let entity = self.entity(body)?;
        let mut states = self
            .world
            .get::<&mut LinkStates>(entity)
            .map_err(|_| EngineError::UnknownBody)?;
        match link {
            LinkId::Base => {
                write(&mut states.base);
                Ok(())
            }
            LinkId::Link(i) => {
                let state = states.links.get_mut(i).ok_or(EngineError::InvalidLink(i))?;
                write(state);
                Ok(())
            }
        }
    }

    fn with_joint_mut(
        &mut self,
        body: BodyHandle,
        joint: usize,
        write: impl FnOnce(&mut JointSim),
    ) -> Result<(), EngineError> {
        let entity = self.entity(body)?;
        let mut joints = self
            .world
            .get::<&mut JointStates>(entity)
            .map_err(|_| EngineError::UnknownBody)?;
        let sim = joints
            .joints
            .get_mut(joint)
            .ok_or(EngineError::InvalidJoint(joint))?;
        if sim.desc.kind == JointKind::Fixed {
            return Err(EngineError::FixedJoint(joint));
        }
        write(sim);
        Ok(())
    }
}

impl Default for KinematicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsEngine for KinematicEngine {
    fn load_model(
        &mut self,
        model: &ModelDescription,
        pose: &Pose,
        scale: f32,
        _self_collision: bool,
    ) -> Result<BodyHandle, EngineError> {
        let joints: Vec<JointSim> = model
            .joints
            .iter()
            .map(|desc| JointSim {
                desc: scale_joint(desc, scale),
                position: 0.0,
                motor: None,
            })
            .collect();
        let links = model
            .joints
            .iter()
            .map(|j| LinkState::new(j.child.mass))
            .collect();

        let entity = self.world.spawn((
            BaseState { pose: *pose },
            JointStates { joints },
            LinkStates {
                base: LinkState::new(model.base.mass),
                links,
            },
        ));
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(entity);
        debug!(model = %model.name, ?handle, "loaded body");
        Ok(handle)
    }

    fn num_joints(&self, body: BodyHandle) -> Result<usize, EngineError> {
        let entity = self.entity(body)?;
        let joints = self
            .world
            .get::<&JointStates>(entity)
            .map_err(|_| EngineError::UnknownBody)?;
        Ok(joints.joints.len())
    }

    fn joint_position(&self, body: BodyHandle, joint: usize) -> Result<f32, EngineError> {
        let entity = self.entity(body)?;
        let joints = self
            .world
            .get::<&JointStates>(entity)
            .map_err(|_| EngineError::UnknownBody)?;
        joints
            .joints
            .get(joint)
            .map(|j| j.position)
            .ok_or(EngineError::InvalidJoint(joint))
    }

    fn reset_joint_position(
        &mut self,
        body: BodyHandle,
        joint: usize,
        position: f32,
    ) -> Result<(), EngineError> {
        self.with_joint_mut(body, joint, |sim| sim.position = position)
    }

    fn set_motor(
        &mut self,
        body: BodyHandle,
        joint: usize,
        command: MotorCommand,
    ) -> Result<(), EngineError> {
        self.with_joint_mut(body, joint, |sim| sim.motor = Some(command))
    }

    fn link_mass(&self, body: BodyHandle, link: LinkId) -> Result<f32, EngineError> {
        self.with_link(body, link, |state| state.mass)
    }

    fn set_link_mass(
        &mut self,
        body: BodyHandle,
        link: LinkId,
        mass: f32,
    ) -> Result<(), EngineError> {
        self.with_link_mut(body, link, |state| state.mass = mass)
    }

    fn set_link_friction(
        &mut self,
        body: BodyHandle,
        link: LinkId,
        friction: &FrictionConfig,
    ) -> Result<(), EngineError> {
        let friction = *friction;
        self.with_link_mut(body, link, move |state| state.friction = friction)
    }

    fn link_friction(&self, body: BodyHandle, link: LinkId) -> Result<FrictionConfig, EngineError> {
        self.with_link(body, link, |state| state.friction)
    }

    fn set_link_color(
        &mut self,
        body: BodyHandle,
        link: LinkId,
        rgba: [f32; 4],
    ) -> Result<(), EngineError> {
        self.with_link_mut(body, link, move |state| state.color = rgba)
    }

    fn link_color(&self, body: BodyHandle, link: LinkId) -> Result<[f32; 4], EngineError> {
        self.with_link(body, link, |state| state.color)
    }

    fn link_world_pose(&self, body: BodyHandle, link: LinkId) -> Result<Pose, EngineError> {
        let entity = self.entity(body)?;
        let base = self
            .world
            .get::<&BaseState>(entity)
            .map_err(|_| EngineError::UnknownBody)?;
        match link {
            LinkId::Base => Ok(base.pose),
            LinkId::Link(i) => {
                let joints = self
                    .world
                    .get::<&JointStates>(entity)
                    .map_err(|_| EngineError::UnknownBody)?;
                if i >= joints.joints.len() {
                    return Err(EngineError::InvalidLink(i));
                }
                Ok(link_pose(&joints.joints, &base.pose, i))
            }
        }
    }

    fn link_in_contact(&self, body: BodyHandle, link: LinkId) -> Result<bool, EngineError> {
        self.with_link(body, link, |state| state.in_contact)
    }

    fn create_fixed_constraint(
        &mut self,
        parent: BodyHandle,
        parent_link: LinkId,
        child: BodyHandle,
        child_link: LinkId,
        parent_frame: Pose,
        child_frame: Pose,
    ) -> Result<ConstraintHandle, EngineError> {
        // Attachment moves the child as a whole, so the child frame must be
        // expressed relative to its base.
        if let LinkId::Link(index) = child_link {
            return Err(EngineError::InvalidLink(index));
        }
        // Validate both endpoints up front.
        self.link_world_pose(parent, parent_link)?;
        self.link_world_pose(child, child_link)?;

        let child_base_in_parent_link = parent_frame.compose(&child_frame.inverse());
        self.constraints.push(FixedConstraint {
            parent,
            parent_link,
            child,
            child_base_in_parent_link,
        });
        Ok(ConstraintHandle(self.constraints.len() as u32 - 1))
    }

    fn solve_ik(
        &self,
        body: BodyHandle,
        ee_link: LinkId,
        target: Vec3,
    ) -> Result<Vec<f32>, EngineError> {
        let LinkId::Link(ee) = ee_link else {
            return Err(EngineError::IkUnsupported);
        };
        let entity = self.entity(body)?;
        let base = self
            .world
            .get::<&BaseState>(entity)
            .map_err(|_| EngineError::UnknownBody)?;
        let joints = self
            .world
            .get::<&JointStates>(entity)
            .map_err(|_| EngineError::UnknownBody)?;
        if ee >= joints.joints.len() {
            return Err(EngineError::InvalidLink(ee));
        }

        // Chain from the base down to the end effector.
        let mut chain = Vec::new();
        let mut current = Some(ee);
        while let Some(index) = current {
            chain.push(index);
            current = joints.joints[index].desc.parent;
        }
        chain.reverse();

        // Supported: translation-only chains whose joint frames are not
        // rotated against the base and whose prismatic axes are orthogonal.
        let mut fixed_offset = Vec3::ZERO;
        let mut prismatic: Vec<(usize, Vec3)> = Vec::new();
        for &index in &chain {
            let desc = &joints.joints[index].desc;
            if desc.origin.rotation.dot(Quat::IDENTITY).abs() < 1.0 - 1e-5 {
                return Err(EngineError::IkUnsupported);
            }
            fixed_offset += desc.origin.position;
            match desc.kind {
                JointKind::Prismatic => {
                    let axis = desc.axis.try_normalize().ok_or(EngineError::IkUnsupported)?;
                    prismatic.push((index, axis));
                }
                JointKind::Fixed => {}
                JointKind::Revolute => return Err(EngineError::IkUnsupported),
            }
        }
        for (a, (_, axis_a)) in prismatic.iter().enumerate() {
            for (_, axis_b) in prismatic.iter().skip(a + 1) {
                if axis_a.dot(*axis_b).abs() > 1e-5 {
                    return Err(EngineError::IkUnsupported);
                }
            }
        }

        let local_target = base.pose.rotation.inverse() * (target - base.pose.position);
        let reach = local_target - fixed_offset;

        // One entry per movable joint, in joint order; joints outside the
        // chain hold their current position.
        let mut targets = Vec::new();
        for (index, sim) in joints.joints.iter().enumerate() {
            if sim.desc.kind == JointKind::Fixed {
                continue;
            }
            let solved = prismatic
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, axis)| axis.dot(reach));
            targets.push(solved.unwrap_or(sim.position));
        }
        Ok(targets)
    }

    fn step(&mut self, dt: f32) {
        for (_, joints) in self.world.query_mut::<&mut JointStates>() {
            for joint in &mut joints.joints {
                integrate_joint(joint, dt);
            }
        }

        // Snap constrained children to their parent frames.
        let updates: Vec<(hecs::Entity, Pose)> = self
            .constraints
            .iter()
            .filter_map(|constraint| {
                let parent_pose = self
                    .link_world_pose(constraint.parent, constraint.parent_link)
                    .ok()?;
                let child_base = parent_pose.compose(&constraint.child_base_in_parent_link);
                let entity = self.bodies.get(constraint.child.0 as usize).copied()?;
                Some((entity, child_base))
            })
            .collect();
        for (entity, pose) in updates {
            if let Ok(mut base) = self.world.get::<&mut BaseState>(entity) {
                base.pose = pose;
            }
        }
    }
}

fn scale_joint(desc: &JointDescription, scale: f32) -> JointDescription {
    let mut scaled = desc.clone();
    scaled.origin.position *= scale;
    if scaled.kind == JointKind::Prismatic {
        if let Some(limits) = &mut scaled.limits {
            limits.lower *= scale;
            limits.upper *= scale;
        }
    }
    scaled
}

fn integrate_joint(joint: &mut JointSim, dt: f32) {
    let Some(command) = joint.motor else {
        return;
    };
    let dq = match command {
        MotorCommand::Velocity(control) => control.target_velocity * dt,
        MotorCommand::Position(control) => {
            let error = control.target - joint.position;
            if error == 0.0 {
                0.0
            } else {
                let mut dq = control.position_gain * error;
                // Feedforward assist: a floor on tracking speed.
                let assist = control.target_velocity.abs() * dt;
                if dq.abs() < assist {
                    dq = error.signum() * assist;
                }
                if let Some(max_velocity) = control.max_velocity {
                    let cap = max_velocity.abs() * dt;
                    dq = dq.clamp(-cap, cap);
                }
                // Position control never moves past its target.
                dq.clamp(-error.abs(), error.abs())
            }
        }
    };
    joint.position += dq;
    if let Some(limits) = joint.desc.limits {
        joint.position = joint.position.clamp(limits.lower, limits.upper);
    }
}

fn link_pose(joints: &[JointSim], base: &Pose, index: usize) -> Pose {
    let joint = &joints[index];
    let parent = match joint.desc.parent {
        None => *base,
        Some(p) => link_pose(joints, base, p),
    };
    parent.compose(&joint.desc.origin).compose(&joint_motion(joint))
}

fn joint_motion(joint: &JointSim) -> Pose {
    match joint.desc.kind {
        JointKind::Revolute => {
            let axis = joint.desc.axis.try_normalize().unwrap_or(Vec3::Z);
            Pose::from_rotation(Quat::from_axis_angle(axis, joint.position))
        }
        JointKind::Prismatic => Pose::from_translation(joint.desc.axis * joint.position),
        JointKind::Fixed => Pose::IDENTITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{JointLimits, LinkDescription};
    use crate::engine::{PositionControl, VelocityControl};

    fn prismatic_joint(name: &str, parent: Option<usize>, axis: Vec3) -> JointDescription {
        JointDescription {
            name: name.into(),
            kind: JointKind::Prismatic,
            parent,
            origin: Pose::IDENTITY,
            axis,
            limits: Some(JointLimits {
                lower: -1.0,
                upper: 1.0,
                effort: 1000.0,
                velocity: 1.0,
            }),
            child: LinkDescription {
                name: format!("{name}_link"),
                mass: 0.1,
            },
        }
    }

    /// Three orthogonal sliders plus a fixed end-effector link.
    fn carriage_model() -> ModelDescription {
        ModelDescription {
            name: "carriage".into(),
            base: LinkDescription {
                name: "base_link".into(),
                mass: 10.0,
            },
            joints: vec![
                prismatic_joint("slide_x", None, Vec3::X),
                prismatic_joint("slide_y", Some(0), Vec3::Y),
                prismatic_joint("slide_z", Some(1), Vec3::Z),
                JointDescription {
                    name: "ee_joint".into(),
                    kind: JointKind::Fixed,
                    parent: Some(2),
                    origin: Pose::IDENTITY,
                    axis: Vec3::Z,
                    limits: None,
                    child: LinkDescription {
                        name: "end_effector_link".into(),
                        mass: 0.01,
                    },
                },
            ],
        }
    }

    #[test]
    fn test_velocity_motor_integrates_and_clamps() {
        let mut engine = KinematicEngine::new();
        let body = engine
            .load_model(&carriage_model(), &Pose::IDENTITY, 1.0, false)
            .unwrap();

        engine
            .set_motor(body, 0, MotorCommand::Velocity(VelocityControl::new(0.5, 100.0)))
            .unwrap();
        for _ in 0..240 {
            engine.step(1.0 / 240.0);
        }
        let position = engine.joint_position(body, 0).unwrap();
        assert!((position - 0.5).abs() < 1e-4);

        // Keeps integrating until the limit, then clamps.
        for _ in 0..480 {
            engine.step(1.0 / 240.0);
        }
        assert!((engine.joint_position(body, 0).unwrap() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_position_motor_respects_velocity_cap() {
        let mut engine = KinematicEngine::new();
        let body = engine
            .load_model(&carriage_model(), &Pose::IDENTITY, 1.0, false)
            .unwrap();

        engine
            .set_motor(
                body,
                1,
                MotorCommand::Position(
                    PositionControl::new(0.5)
                        .position_gain(0.2)
                        .max_velocity(0.2),
                ),
            )
            .unwrap();

        // After a quarter second at a 0.2 cap the joint cannot have moved
        // more than 0.05.
        for _ in 0..60 {
            engine.step(1.0 / 240.0);
        }
        let early = engine.joint_position(body, 1).unwrap();
        assert!(early <= 0.05 + 1e-5, "moved too fast: {early}");

        // It converges without overshoot.
        for _ in 0..(240 * 5) {
            engine.step(1.0 / 240.0);
        }
        let settled = engine.joint_position(body, 1).unwrap();
        assert!((settled - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_fk_composes_joint_translations() {
        let mut engine = KinematicEngine::new();
        let pose = Pose::from_translation(Vec3::new(0.1, 0.2, 0.3));
        let body = engine.load_model(&carriage_model(), &pose, 1.0, false).unwrap();

        engine.reset_joint_position(body, 0, 0.25).unwrap();
        engine.reset_joint_position(body, 2, -0.5).unwrap();

        let ee = engine.link_world_pose(body, LinkId::Link(3)).unwrap();
        assert!(ee
            .position
            .distance(Vec3::new(0.35, 0.2, -0.2))
            < 1e-6);
    }

    #[test]
    fn test_ik_round_trip_through_motors() {
        let mut engine = KinematicEngine::new();
        let body = engine
            .load_model(&carriage_model(), &Pose::IDENTITY, 1.0, false)
            .unwrap();

        let target = Vec3::new(0.3, -0.2, 0.4);
        let solution = engine.solve_ik(body, LinkId::Link(3), target).unwrap();
        assert_eq!(solution.len(), 3);
        for (joint, q) in solution.iter().enumerate() {
            engine.reset_joint_position(body, joint, *q).unwrap();
        }
        let ee = engine.link_world_pose(body, LinkId::Link(3)).unwrap();
        assert!(ee.position.distance(target) < 1e-5);
    }

    #[test]
    fn test_ik_rejects_revolute_chains() {
        let mut engine = KinematicEngine::new();
        let mut model = carriage_model();
        model.joints[1].kind = JointKind::Revolute;
        let body = engine.load_model(&model, &Pose::IDENTITY, 1.0, false).unwrap();

        assert!(matches!(
            engine.solve_ik(body, LinkId::Link(3), Vec3::ZERO),
            Err(EngineError::IkUnsupported)
        ));
    }

    #[test]
    fn test_fixed_constraint_carries_child_body() {
        let mut engine = KinematicEngine::new();
        let parent = engine
            .load_model(&carriage_model(), &Pose::IDENTITY, 1.0, false)
            .unwrap();
        let child = engine
            .load_model(&carriage_model(), &Pose::IDENTITY, 1.0, false)
            .unwrap();

        engine
            .create_fixed_constraint(
                parent,
                LinkId::Link(3),
                child,
                LinkId::Base,
                Pose::IDENTITY,
                Pose::IDENTITY,
            )
            .unwrap();

        engine
            .set_motor(
                parent,
                2,
                MotorCommand::Position(PositionControl::new(0.4).position_gain(1.0)),
            )
            .unwrap();
        for _ in 0..10 {
            engine.step(1.0 / 240.0);
        }

        let child_base = engine.link_world_pose(child, LinkId::Base).unwrap();
        assert!((child_base.position.z - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_prismatic_limits_scale_with_model() {
        let mut engine = KinematicEngine::new();
        let body = engine
            .load_model(&carriage_model(), &Pose::IDENTITY, 0.5, false)
            .unwrap();

        engine
            .set_motor(body, 0, MotorCommand::Velocity(VelocityControl::new(1.0, 100.0)))
            .unwrap();
        for _ in 0..480 {
            engine.step(1.0 / 240.0);
        }
        assert!((engine.joint_position(body, 0).unwrap() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_contact_flags_are_injected() {
        let mut engine = KinematicEngine::new();
        let body = engine
            .load_model(&carriage_model(), &Pose::IDENTITY, 1.0, false)
            .unwrap();

        assert!(!engine.link_in_contact(body, LinkId::Link(3)).unwrap());
        engine.set_link_contact(body, LinkId::Link(3), true).unwrap();
        assert!(engine.link_in_contact(body, LinkId::Link(3)).unwrap());
    }

    #[test]
    fn test_engine_faults() {
        let mut engine = KinematicEngine::new();
        let body = engine
            .load_model(&carriage_model(), &Pose::IDENTITY, 1.0, false)
            .unwrap();

        assert!(matches!(
            engine.joint_position(BodyHandle(42), 0),
            Err(EngineError::UnknownBody)
        ));
        assert!(matches!(
            engine.joint_position(body, 99),
            Err(EngineError::InvalidJoint(99))
        ));
        assert!(matches!(
            engine.set_motor(
                body,
                3,
                MotorCommand::Position(PositionControl::new(0.0))
            ),
            Err(EngineError::FixedJoint(3))
        ));
        assert!(matches!(
            engine.link_mass(body, LinkId::Link(17)),
            Err(EngineError::InvalidLink(17))
        ));
    }
}
