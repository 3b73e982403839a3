//! Model descriptions consumed by engine backends.
//!
//! A [`ModelDescription`] is the geometry-free joint topology of a body:
//! which joints exist, how they connect, their kinds, axes, limits, and the
//! masses of the links they carry. Gripper and mount assets ship as URDF
//! files and are parsed into descriptions in document order, so joint indices
//! match the order of `<joint>` elements in the file.

use anyhow::{bail, Context, Result};
use glam::{Quat, Vec3};
use std::path::Path;
use tracing::info;

use crate::pose::Pose;

/// Kind of a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    /// Rotation about the joint axis.
    Revolute,
    /// Translation along the joint axis.
    Prismatic,
    /// No relative motion; carries a link.
    Fixed,
}

/// Position limits of a movable joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    /// Lower position bound.
    pub lower: f32,
    /// Upper position bound.
    pub upper: f32,
    /// Maximum actuation effort.
    pub effort: f32,
    /// Maximum actuation velocity.
    pub velocity: f32,
}

/// A link carried by the base or by a joint.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkDescription {
    /// Link name.
    pub name: String,
    /// Link mass.
    pub mass: f32,
}

/// One joint of a body, together with the link it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct JointDescription {
    /// Joint name.
    pub name: String,
    /// Joint kind.
    pub kind: JointKind,
    /// Parent link: `None` for the base, `Some(i)` for the child link of
    /// joint `i`.
    pub parent: Option<usize>,
    /// Transform from the parent link frame to the joint frame.
    pub origin: Pose,
    /// Motion axis in the joint frame.
    pub axis: Vec3,
    /// Position limits; `None` for fixed or continuous joints.
    pub limits: Option<JointLimits>,
    /// The link this joint carries.
    pub child: LinkDescription,
}

/// Joint topology and link masses of a body.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescription {
    /// Model name.
    pub name: String,
    /// The base link.
    pub base: LinkDescription,
    /// Joints in index order; the child link of joint `i` is link `i`.
    pub joints: Vec<JointDescription>,
}

impl ModelDescription {
    /// Parse a URDF file into a model description.
    ///
    /// Joints are taken in document order. Only revolute, continuous,
    /// prismatic, and fixed joints are supported.
    pub fn from_urdf<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let robot = urdf_rs::read_file(path)
            .with_context(|| format!("failed to read URDF from {path:?}"))?;

        // The base is the one link that is no joint's child.
        let base_link = robot
            .links
            .iter()
            .find(|link| robot.joints.iter().all(|j| j.child.link != link.name))
            .with_context(|| format!("URDF {:?} has no root link", robot.name))?;

        let base = LinkDescription {
            name: base_link.name.clone(),
            mass: base_link.inertial.mass.value as f32,
        };

        let mut joints: Vec<JointDescription> = Vec::with_capacity(robot.joints.len());
        for joint in &robot.joints {
            let (kind, limits) = match joint.joint_type {
                urdf_rs::JointType::Revolute => (
                    JointKind::Revolute,
                    Some(limits_from_urdf(&joint.limit)),
                ),
                urdf_rs::JointType::Continuous => (JointKind::Revolute, None),
                urdf_rs::JointType::Prismatic => (
                    JointKind::Prismatic,
                    Some(limits_from_urdf(&joint.limit)),
                ),
                urdf_rs::JointType::Fixed => (JointKind::Fixed, None),
                ref other => bail!(
                    "unsupported joint type {other:?} for joint {:?}",
                    joint.name
                ),
            };

            let parent = if joint.parent.link == base.name {
                None
            } else {
                let index = joints
                    .iter()
                    .position(|j| j.child.name == joint.parent.link)
                    .with_context(|| {
                        format!(
                            "joint {:?} references unknown parent link {:?}",
                            joint.name, joint.parent.link
                        )
                    })?;
                Some(index)
            };

            let child_link = robot
                .links
                .iter()
                .find(|link| link.name == joint.child.link)
                .with_context(|| {
                    format!(
                        "joint {:?} references unknown child link {:?}",
                        joint.name, joint.child.link
                    )
                })?;

            joints.push(JointDescription {
                name: joint.name.clone(),
                kind,
                parent,
                origin: pose_from_urdf(&joint.origin),
                axis: Vec3::new(
                    joint.axis.xyz[0] as f32,
                    joint.axis.xyz[1] as f32,
                    joint.axis.xyz[2] as f32,
                ),
                limits,
                child: LinkDescription {
                    name: child_link.name.clone(),
                    mass: child_link.inertial.mass.value as f32,
                },
            });
        }

        info!(
            model = %robot.name,
            joints = joints.len(),
            "loaded model description"
        );

        Ok(Self {
            name: robot.name.clone(),
            base,
            joints,
        })
    }

    /// Indices of the movable (non-fixed) joints, in joint order.
    pub fn movable_joints(&self) -> impl Iterator<Item = usize> + '_ {
        self.joints
            .iter()
            .enumerate()
            .filter(|(_, j)| j.kind != JointKind::Fixed)
            .map(|(i, _)| i)
    }

    /// Index of the link with the given name, if present.
    pub fn link_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.child.name == name)
    }
}

fn limits_from_urdf(limit: &urdf_rs::JointLimit) -> JointLimits {
    JointLimits {
        lower: limit.lower as f32,
        upper: limit.upper as f32,
        effort: limit.effort as f32,
        velocity: limit.velocity as f32,
    }
}

fn pose_from_urdf(pose: &urdf_rs::Pose) -> Pose {
    let translation = Vec3::new(pose.xyz[0] as f32, pose.xyz[1] as f32, pose.xyz[2] as f32);

    // URDF uses RPY (roll, pitch, yaw)
    let rotation = Quat::from_euler(
        glam::EulerRot::XYZ,
        pose.rpy[0] as f32,
        pose.rpy[1] as f32,
        pose.rpy[2] as f32,
    );

    Pose::new(translation, rotation)
}
