//! Landmark store configuration.
//!
//! All thresholds live in an explicit config struct handed to the store at
//! construction; there is no global parameter state.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::geometry::SE3;

/// Depths and inverse depths at or below this magnitude are treated as
/// degenerate: initialization falls back to the provisional path and
/// synchronization leaves the previous estimate in place.
pub const MIN_DEPTH: f64 = 1e-6;

/// How landmarks are parameterized in the solver's state buffers.
///
/// Chosen once at configuration time and applied uniformly to every
/// landmark. Each variant supplies its own block size, seeding,
/// warm-start and recovery math, so the choice is resolved here instead
/// of being re-tested in every store method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parameterization {
    /// One scalar: reciprocal of the depth along the anchor camera's
    /// bearing ray.
    InverseDepth,
    /// Three scalars: Euclidean position in world frame.
    Position,
}

impl Parameterization {
    /// Size of a raw state block under this parameterization.
    pub fn block_size(&self) -> usize {
        match self {
            Parameterization::InverseDepth => 1,
            Parameterization::Position => 3,
        }
    }

    /// Seed a state block from a known depth along the anchor bearing and
    /// the corresponding world position.
    pub fn seed(&self, state: &mut [f64], depth: f64, position: &Vector3<f64>) {
        match self {
            Parameterization::InverseDepth => {
                state[0] = 1.0 / depth;
            }
            Parameterization::Position => {
                state.copy_from_slice(position.as_slice());
            }
        }
    }

    /// Re-derive a warm-start block value from an already-estimated world
    /// position, so the solver starts from the latest consistent estimate.
    ///
    /// `anchor_cam_pose` is the anchor camera's camera-to-world transform
    /// (keyframe pose composed with the camera extrinsic). Returns false
    /// if the position projects to a degenerate depth and the block was
    /// left untouched.
    pub fn warm_start(
        &self,
        state: &mut [f64],
        position: &Vector3<f64>,
        anchor_cam_pose: &SE3,
    ) -> bool {
        match self {
            Parameterization::InverseDepth => {
                let pos_cam = anchor_cam_pose.inverse().transform_point(position);
                if pos_cam.z.abs() <= MIN_DEPTH {
                    return false;
                }
                state[0] = 1.0 / pos_cam.z;
                true
            }
            Parameterization::Position => {
                state.copy_from_slice(position.as_slice());
                true
            }
        }
    }

    /// Recover the world position from a solved state block.
    ///
    /// Returns None if the block holds a degenerate inverse depth.
    pub fn recover(
        &self,
        state: &[f64],
        bearing: &Vector3<f64>,
        anchor_cam_pose: &SE3,
    ) -> Option<Vector3<f64>> {
        match self {
            Parameterization::InverseDepth => {
                let inv_depth = state[0];
                if inv_depth.abs() <= MIN_DEPTH {
                    return None;
                }
                Some(anchor_cam_pose.transform_point(&(bearing / inv_depth)))
            }
            Parameterization::Position => Some(Vector3::new(state[0], state[1], state[2])),
        }
    }
}

/// Configuration for the landmark store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkConfig {
    /// State-block parameterization applied to every landmark.
    pub parameterization: Parameterization,

    /// Minimum observation count for a landmark to contribute factors.
    pub min_track_length: usize,

    /// Outlier rejection is skipped while fewer landmarks than this have
    /// been estimated; the test is unreliable on a thin map.
    pub min_estimated_for_rejection: usize,

    /// Mean reprojection error above this many pixels marks a landmark
    /// as outlier.
    pub outlier_pixel_threshold: f64,

    /// Focal length used to convert normalized residuals to pixels.
    pub focal_length: f64,

    /// Provisional range along the anchor bearing for landmarks without a
    /// depth measurement, pending refinement by the optimizer.
    pub initial_depth: f64,

    /// Log per-landmark state updates during synchronization.
    pub debug_log: bool,
}

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            parameterization: Parameterization::InverseDepth,
            min_track_length: 4,
            min_estimated_for_rejection: 50,
            outlier_pixel_threshold: 10.0,
            focal_length: 460.0,
            initial_depth: 10.0,
            debug_log: false,
        }
    }
}
