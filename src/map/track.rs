//! LandmarkTrack - the full observation history of one landmark.

use nalgebra::Vector3;

use super::observation::Observation;
use super::types::{AgentId, KeyframeId, LandmarkFlag, LandmarkId, SolverFlag};

/// A landmark's observation track plus its current 3D estimate.
///
/// Invariant: whenever the track is non-empty, `base_keyframe` equals the
/// keyframe id of the first observation. The base (anchor) keyframe is the
/// reference for inverse-depth parameterization. An empty track is no
/// longer valid and must be removed from the store by the caller.
#[derive(Debug, Clone)]
pub struct LandmarkTrack {
    /// Landmark identity.
    pub landmark_id: LandmarkId,

    /// Agent that first observed the landmark.
    pub agent_id: AgentId,

    /// Anchor keyframe: always the keyframe of the first observation.
    pub base_keyframe: KeyframeId,

    /// Ordered observation sequence, oldest first.
    pub observations: Vec<Observation>,

    /// Current 3D position estimate in world frame. Written only by
    /// `LandmarkStore::initial_landmarks` and `LandmarkStore::sync_state`.
    pub position: Vector3<f64>,

    /// Lifecycle state.
    pub flag: LandmarkFlag,

    /// Whether the solver has produced a value for this landmark.
    pub solver_flag: SolverFlag,

    /// Color sample inherited from the first observation.
    pub color: [u8; 3],
}

impl LandmarkTrack {
    /// Start a track from its first observation.
    ///
    /// The frontend-supplied 3D point becomes the initial position guess
    /// and the observation's keyframe becomes the anchor.
    pub fn from_first_observation(observation: Observation) -> Self {
        let mut track = Self {
            landmark_id: observation.landmark_id,
            agent_id: observation.agent_id,
            base_keyframe: observation.keyframe_id,
            observations: Vec::new(),
            position: observation.point_frontend,
            flag: observation.flag,
            solver_flag: SolverFlag::Unsolved,
            color: observation.color,
        };
        track.add(observation);
        track
    }

    /// Append an observation to the track.
    ///
    /// No reordering and no deduplication; the caller must not
    /// double-insert the same keyframe/camera sighting.
    pub fn add(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Number of observations in the track.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the track has no observations left.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// The anchor observation, if the track is non-empty.
    pub fn anchor(&self) -> Option<&Observation> {
        self.observations.first()
    }

    /// Remove every observation taken at `keyframe_id`.
    ///
    /// A keyframe can contribute several observations of the same landmark
    /// (one per camera), so all matches are removed. If observations
    /// remain, the base keyframe is recomputed from the new first element.
    /// Returns the remaining track length; 0 means the track is dead and
    /// the caller must delete it.
    pub fn pop_frame(&mut self, keyframe_id: KeyframeId) -> usize {
        if self.observations.is_empty() {
            return 0;
        }
        self.observations.retain(|o| o.keyframe_id != keyframe_id);
        if let Some(first) = self.observations.first() {
            self.base_keyframe = first.keyframe_id;
        }
        self.observations.len()
    }

    /// Remove all observations taken at the current anchor keyframe.
    ///
    /// No-op returning 0 if the track is already empty.
    pub fn pop_base_frame(&mut self) -> usize {
        if self.observations.is_empty() {
            return 0;
        }
        self.pop_frame(self.base_keyframe)
    }
}
