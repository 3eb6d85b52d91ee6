//! SE(3) rigid body transform.
//!
//! Poses are stored as a rotation quaternion plus a translation vector.
//! A keyframe pose is T_wb (body-to-world); composing with a camera
//! extrinsic T_bc gives the camera-to-world transform used to move
//! landmark positions between world and camera frames.

use nalgebra::{UnitQuaternion, Vector3};

/// A rigid body transform in SE(3).
///
/// Convention: `transform_point` maps a point from the source frame of
/// the transform into its target frame, i.e. for a pose T_wc,
/// `p_world = pose.transform_point(&p_cam)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    /// Rotation component.
    pub rotation: UnitQuaternion<f64>,

    /// Translation component.
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Create a transform from rotation and translation.
    pub fn from_parts(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Create a pure translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Compose two transforms: `self * other`.
    ///
    /// If `self` is T_ab and `other` is T_bc, the result is T_ac.
    pub fn compose(&self, other: &SE3) -> SE3 {
        SE3 {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// The inverse transform.
    pub fn inverse(&self) -> SE3 {
        let rot_inv = self.rotation.inverse();
        SE3 {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }

    /// Transform a point from the source frame to the target frame.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}
