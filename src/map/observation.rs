//! Observation - one sighting of a landmark in one camera at one keyframe.

use nalgebra::{Vector2, Vector3};

use super::types::{AgentId, CameraId, KeyframeId, LandmarkFlag, LandmarkId, TrackMethod};

/// A single observation of a landmark.
///
/// Produced by the frontend and immutable once ingested, except for
/// `time_offset` which is stamped by the store at ingestion. The
/// frontend-supplied `point_frontend` is read-only to the estimator;
/// only the track's own position estimate is updated by the solver.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Landmark this observation belongs to. Negative ids mark unmatched
    /// detections and are discarded at ingestion.
    pub landmark_id: LandmarkId,

    /// Keyframe in which the landmark was seen.
    pub keyframe_id: KeyframeId,

    /// How the frontend tracked this feature.
    pub method: TrackMethod,

    /// Capture timestamp in seconds.
    pub stamp: f64,

    /// Slot of the camera within the keyframe bundle.
    pub camera_index: usize,

    /// Physical camera; indexes the extrinsic table.
    pub camera_id: CameraId,

    /// Agent that produced the observation.
    pub agent_id: AgentId,

    /// Lifecycle state carried with the observation.
    pub flag: LandmarkFlag,

    /// Raw pixel coordinate.
    pub pixel: Vector2<f64>,

    /// Normalized bearing, always of the form (x, y, 1).
    pub bearing: Vector3<f64>,

    /// 3D point supplied by the frontend. Never mutated by the estimator.
    pub point_frontend: Vector3<f64>,

    /// Optical-flow velocity estimate in the normalized plane.
    pub velocity: Vector3<f64>,

    /// Depth measurement along the bearing, in meters.
    pub depth: f64,

    /// Whether `depth` holds a valid measurement.
    pub depth_measured: bool,

    /// Camera-IMU time offset correction, stamped at ingestion.
    pub time_offset: f64,

    /// Color sample at the pixel (RGB).
    pub color: [u8; 3],
}

impl Observation {
    /// Create an observation as the frontend does: geometry only, no depth,
    /// flag uninitialized.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        landmark_id: LandmarkId,
        keyframe_id: KeyframeId,
        stamp: f64,
        method: TrackMethod,
        agent_id: AgentId,
        camera_index: usize,
        camera_id: CameraId,
        pixel: Vector2<f64>,
        bearing: Vector3<f64>,
    ) -> Self {
        Self {
            landmark_id,
            keyframe_id,
            method,
            stamp,
            camera_index,
            camera_id,
            agent_id,
            flag: LandmarkFlag::Uninitialized,
            pixel,
            bearing,
            point_frontend: Vector3::zeros(),
            velocity: Vector3::zeros(),
            depth: -1.0,
            depth_measured: false,
            time_offset: 0.0,
            color: [0, 0, 0],
        }
    }

    /// Attach a depth measurement (e.g. from stereo or a depth camera).
    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = depth;
        self.depth_measured = true;
        self
    }

    /// The normalized-bearing measurement used to build projection factors.
    pub fn measurement(&self) -> Vector3<f64> {
        self.bearing
    }
}

/// All observations of one keyframe, grouped per camera in slot order, as
/// handed over by the frontend (or received from a remote agent).
#[derive(Debug, Clone)]
pub struct KeyframeBundle {
    /// Keyframe these observations belong to.
    pub keyframe_id: KeyframeId,

    /// Agent that captured the keyframe.
    pub agent_id: AgentId,

    /// Capture timestamp in seconds.
    pub stamp: f64,

    /// Per-camera observation lists, indexed by camera slot.
    pub cameras: Vec<Vec<Observation>>,
}

impl KeyframeBundle {
    /// Create an empty bundle for a keyframe.
    pub fn new(keyframe_id: KeyframeId, agent_id: AgentId, stamp: f64) -> Self {
        Self {
            keyframe_id,
            agent_id,
            stamp,
            cameras: Vec::new(),
        }
    }

    /// Append one camera's observation list.
    pub fn push_camera(&mut self, observations: Vec<Observation>) {
        self.cameras.push(observations);
    }

    /// Iterate over every observation in the bundle, across all cameras.
    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.cameras.iter().flatten()
    }

    /// Total number of observations across all cameras.
    pub fn len(&self) -> usize {
        self.cameras.iter().map(|c| c.len()).sum()
    }

    /// Whether the bundle carries no observations.
    pub fn is_empty(&self) -> bool {
        self.cameras.iter().all(|c| c.is_empty())
    }
}
