//! Rigid transforms and grasp-pose placement.
//!
//! A grasp pose denotes the desired pose of a gripper's *grasp center*, which
//! is offset from the gripper's physical base frame. The functions here
//! convert between the two so that callers can always think in grasp-center
//! coordinates.

use glam::{Quat, Vec3};

/// A rigid transform: position plus orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Translation in world (or parent-frame) coordinates.
    pub position: Vec3,
    /// Orientation as a unit quaternion.
    pub rotation: Quat,
}

impl Pose {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Create a pose from a position and an orientation.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Create a pure translation.
    pub fn from_translation(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Create a pure rotation.
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation,
        }
    }

    /// Compose two transforms: `self` applied first, then `other` in the
    /// local frame of `self` (matrix convention `self * other`).
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            position: self.position + self.rotation * other.position,
            rotation: self.rotation * other.rotation,
        }
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Pose {
        let inv_rotation = self.rotation.inverse();
        Pose {
            position: -(inv_rotation * self.position),
            rotation: inv_rotation,
        }
    }

    /// Transform a point from the local frame into the parent frame.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Compute the placement pose for a gripper base from a grasp-center pose.
///
/// `pos_offset`/`orn_offset` are the gripper's fixed grasp-center offset,
/// expressed relative to its base frame. The base placement is the grasp pose
/// composed with the offset transform.
pub fn gripper_base_pose(grasp_pose: &Pose, pos_offset: Vec3, orn_offset: Quat) -> Pose {
    grasp_pose.compose(&Pose::new(pos_offset, orn_offset))
}

/// Recover the grasp-center pose from a gripper base pose and its offset.
///
/// Exact inverse of [`gripper_base_pose`].
pub fn grasp_center_pose(base_pose: &Pose, pos_offset: Vec3, orn_offset: Quat) -> Pose {
    base_pose.compose(&Pose::new(pos_offset, orn_offset).inverse())
}
