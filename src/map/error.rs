//! Store error taxonomy.

use thiserror::Error;

use super::types::{CameraId, KeyframeId, LandmarkId};

/// Failures surfaced by the landmark store.
///
/// Lookups for unknown identities fail loudly instead of defaulting;
/// a silently fabricated state block or base frame would corrupt factor
/// construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown landmark {0}")]
    LandmarkNotFound(LandmarkId),

    #[error("no pose for keyframe {0}")]
    KeyframeNotFound(KeyframeId),

    #[error("no extrinsic for camera {0}")]
    CameraNotFound(CameraId),
}
