//! LandmarkStore - owner of landmark tracks and raw solver state.
//!
//! The store holds three structures that must stay consistent:
//! - the track database (landmark id → track)
//! - the state arena (landmark id → raw solver block)
//! - the reverse index (keyframe id → landmarks seen there)
//!
//! The reverse index makes sliding-window eviction proportional to the
//! observations of the evicted keyframe rather than to the whole map.
//!
//! The store is single-writer: the estimator drives it through one
//! quiesce → initialize → solve → sync → reject → evict cycle per
//! keyframe, and no state block is allocated or freed inside that cycle
//! while the solver holds views into the arena.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::config::{LandmarkConfig, MIN_DEPTH};
use crate::geometry::SE3;

use super::error::StoreError;
use super::observation::KeyframeBundle;
use super::track::LandmarkTrack;
use super::types::{CameraId, KeyframeId, LandmarkFlag, LandmarkId, SolverFlag};

/// World poses of the keyframes currently in the sliding window.
pub type KeyframePoses = HashMap<KeyframeId, SE3>;

/// Camera-to-world transform of a track's anchor camera: the anchor
/// keyframe pose composed with the camera extrinsic.
fn anchor_camera_pose(
    frames: &KeyframePoses,
    extrinsics: &[SE3],
    keyframe_id: KeyframeId,
    camera_id: CameraId,
) -> Result<SE3, StoreError> {
    let frame_pose = frames
        .get(&keyframe_id)
        .ok_or(StoreError::KeyframeNotFound(keyframe_id))?;
    let extrinsic = extrinsics
        .get(camera_id.0)
        .ok_or(StoreError::CameraNotFound(camera_id))?;
    Ok(frame_pose.compose(extrinsic))
}

/// The landmark database and solver state arena.
pub struct LandmarkStore {
    config: LandmarkConfig,

    /// All live tracks.
    tracks: HashMap<LandmarkId, LandmarkTrack>,

    /// Raw solver state blocks, one per track, sized by the active
    /// parameterization. Allocated lazily at first sighting and never
    /// resized for the lifetime of the track.
    states: HashMap<LandmarkId, Vec<f64>>,

    /// Reverse index: landmarks observed in each keyframe.
    related: HashMap<KeyframeId, HashSet<LandmarkId>>,

    /// Number of landmarks flagged Estimated by the last sync; gates
    /// outlier rejection.
    estimated_count: usize,
}

impl LandmarkStore {
    /// Create an empty store with the given configuration.
    pub fn new(config: LandmarkConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
            states: HashMap::new(),
            related: HashMap::new(),
            estimated_count: 0,
        }
    }

    /// The store's configuration.
    pub fn config(&self) -> &LandmarkConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ingestion / Eviction
    // ─────────────────────────────────────────────────────────────────────

    /// Ingest every observation of a keyframe bundle.
    ///
    /// Observations with an unmatched (negative) landmark id are dropped.
    /// New landmarks get a track anchored at this keyframe and a lazily
    /// allocated state block; known landmarks get the observation
    /// appended. `time_offset` is stamped onto every ingested observation.
    pub fn add_keyframe(&mut self, bundle: &KeyframeBundle, time_offset: f64) {
        let block_size = self.config.parameterization.block_size();
        for observation in bundle.observations() {
            if !observation.landmark_id.is_matched() {
                continue;
            }
            let landmark_id = observation.landmark_id;
            self.related
                .entry(bundle.keyframe_id)
                .or_default()
                .insert(landmark_id);

            let mut observation = observation.clone();
            observation.time_offset = time_offset;
            match self.tracks.entry(landmark_id) {
                Entry::Occupied(mut entry) => entry.get_mut().add(observation),
                Entry::Vacant(entry) => {
                    entry.insert(LandmarkTrack::from_first_observation(observation));
                }
            }
            self.states
                .entry(landmark_id)
                .or_insert_with(|| vec![0.0; block_size]);
        }
        debug!(
            keyframe = %bundle.keyframe_id,
            observations = bundle.len(),
            tracked = self.tracks.len(),
            "ingested keyframe"
        );
    }

    /// Evict a keyframe from every track that observed it.
    ///
    /// Tracks left empty are deleted together with their state blocks;
    /// the keyframe's reverse-index entry is removed last. No-op if the
    /// keyframe was never ingested.
    pub fn pop_frame(&mut self, keyframe_id: KeyframeId) {
        let Some(landmark_ids) = self.related.remove(&keyframe_id) else {
            return;
        };
        for landmark_id in landmark_ids {
            let remaining = self
                .tracks
                .get_mut(&landmark_id)
                .map(|track| track.pop_frame(keyframe_id));
            if remaining == Some(0) {
                self.tracks.remove(&landmark_id);
                self.states.remove(&landmark_id);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Selection / Lookup
    // ─────────────────────────────────────────────────────────────────────

    /// Tracks eligible to contribute factors: long enough and in a usable
    /// lifecycle state (initialized or estimated, never outlier).
    pub fn available_measurements(&self) -> Vec<&LandmarkTrack> {
        self.tracks
            .values()
            .filter(|track| {
                track.len() >= self.config.min_track_length && track.flag.is_usable()
            })
            .collect()
    }

    /// Tracks with any estimate at all, including outliers; for reporting
    /// and visualization, not for the factor graph.
    pub fn initialized_landmarks(&self) -> Vec<&LandmarkTrack> {
        self.tracks
            .values()
            .filter(|track| {
                track.len() >= self.config.min_track_length
                    && track.flag != LandmarkFlag::Uninitialized
            })
            .collect()
    }

    /// Whether a landmark is currently tracked.
    pub fn has_landmark(&self, landmark_id: LandmarkId) -> bool {
        self.tracks.contains_key(&landmark_id)
    }

    /// Get a landmark's track.
    pub fn get_landmark(&self, landmark_id: LandmarkId) -> Result<&LandmarkTrack, StoreError> {
        self.tracks
            .get(&landmark_id)
            .ok_or(StoreError::LandmarkNotFound(landmark_id))
    }

    /// Get a landmark's track mutably.
    pub fn get_landmark_mut(
        &mut self,
        landmark_id: LandmarkId,
    ) -> Result<&mut LandmarkTrack, StoreError> {
        self.tracks
            .get_mut(&landmark_id)
            .ok_or(StoreError::LandmarkNotFound(landmark_id))
    }

    /// Borrow a landmark's raw solver state block.
    pub fn landmark_state(&self, landmark_id: LandmarkId) -> Result<&[f64], StoreError> {
        self.states
            .get(&landmark_id)
            .map(Vec::as_slice)
            .ok_or(StoreError::LandmarkNotFound(landmark_id))
    }

    /// Borrow a landmark's raw solver state block mutably, for in-place
    /// optimization. Holding this borrow keeps the store from evicting
    /// or reallocating any block.
    pub fn landmark_state_mut(
        &mut self,
        landmark_id: LandmarkId,
    ) -> Result<&mut [f64], StoreError> {
        self.states
            .get_mut(&landmark_id)
            .map(Vec::as_mut_slice)
            .ok_or(StoreError::LandmarkNotFound(landmark_id))
    }

    /// The anchor (base) keyframe of a landmark's track.
    pub fn landmark_base_frame(&self, landmark_id: LandmarkId) -> Result<KeyframeId, StoreError> {
        self.get_landmark(landmark_id).map(|track| track.base_keyframe)
    }

    /// Ids of all live landmarks.
    pub fn landmark_ids(&self) -> impl Iterator<Item = &LandmarkId> {
        self.tracks.keys()
    }

    /// Number of live landmarks.
    pub fn num_landmarks(&self) -> usize {
        self.tracks.len()
    }

    /// Number of landmarks flagged Estimated by the last `sync_state`.
    pub fn estimated_count(&self) -> usize {
        self.estimated_count
    }

    // ─────────────────────────────────────────────────────────────────────
    // Initialization
    // ─────────────────────────────────────────────────────────────────────

    /// Seed state blocks before a solve.
    ///
    /// Uninitialized landmarks with a measured anchor depth are
    /// triangulated directly; those without, but with a long enough
    /// track, get a provisional position `initial_depth` meters along
    /// the anchor bearing, to be refined by the optimizer. Landmarks
    /// already estimated get their block warm-started from the current
    /// position so every solve begins from the latest consistent state.
    ///
    /// Must run before every solve.
    pub fn initial_landmarks(
        &mut self,
        frames: &KeyframePoses,
        extrinsics: &[SE3],
    ) -> Result<(), StoreError> {
        for (landmark_id, track) in self.tracks.iter_mut() {
            let Some(anchor) = track.anchor() else {
                continue;
            };
            let bearing = anchor.bearing;
            let depth = anchor.depth;
            let depth_measured = anchor.depth_measured && depth > MIN_DEPTH;
            let anchor_keyframe = anchor.keyframe_id;
            let anchor_camera = anchor.camera_id;

            match track.flag {
                LandmarkFlag::Uninitialized => {
                    let state = self
                        .states
                        .get_mut(landmark_id)
                        .ok_or(StoreError::LandmarkNotFound(*landmark_id))?;
                    if depth_measured {
                        let cam_pose =
                            anchor_camera_pose(frames, extrinsics, anchor_keyframe, anchor_camera)?;
                        track.position = cam_pose.transform_point(&(bearing * depth));
                        self.config.parameterization.seed(state, depth, &track.position);
                        track.flag = LandmarkFlag::Initialized;
                    } else if track.len() >= self.config.min_track_length {
                        // No depth measurement: park the landmark at a fixed
                        // range along the anchor ray and let the solver pull
                        // it into place.
                        let cam_pose =
                            anchor_camera_pose(frames, extrinsics, anchor_keyframe, anchor_camera)?;
                        track.position =
                            cam_pose.transform_point(&(bearing * self.config.initial_depth));
                        self.config.parameterization.seed(
                            state,
                            self.config.initial_depth,
                            &track.position,
                        );
                        track.flag = LandmarkFlag::Initialized;
                    }
                }
                LandmarkFlag::Estimated => {
                    let cam_pose =
                        anchor_camera_pose(frames, extrinsics, anchor_keyframe, anchor_camera)?;
                    let state = self
                        .states
                        .get_mut(landmark_id)
                        .ok_or(StoreError::LandmarkNotFound(*landmark_id))?;
                    if !self
                        .config
                        .parameterization
                        .warm_start(state, &track.position, &cam_pose)
                    {
                        warn!(landmark = %landmark_id, "degenerate anchor depth, keeping stale warm start");
                    }
                }
                LandmarkFlag::Initialized | LandmarkFlag::Outlier => {}
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Outlier Rejection
    // ─────────────────────────────────────────────────────────────────────

    /// Flag estimated landmarks whose mean reprojection error exceeds the
    /// pixel threshold.
    ///
    /// Skipped while the estimated population is below the configured
    /// minimum. The track's position is reprojected into every non-anchor
    /// observation's camera; the mean normalized residual is converted to
    /// pixels via the focal length. Outliers stay in the store (excluded
    /// from `available_measurements`) until aged out of the window.
    pub fn outlier_rejection(
        &mut self,
        frames: &KeyframePoses,
        extrinsics: &[SE3],
    ) -> Result<(), StoreError> {
        if self.estimated_count < self.config.min_estimated_for_rejection {
            return Ok(());
        }
        let mut removed = 0usize;
        let mut total = 0usize;
        for track in self.tracks.values_mut() {
            if track.flag != LandmarkFlag::Estimated {
                continue;
            }
            total += 1;
            let mut err_sum = 0.0;
            let mut err_count = 0usize;
            for observation in track.observations.iter().skip(1) {
                let cam_pose = anchor_camera_pose(
                    frames,
                    extrinsics,
                    observation.keyframe_id,
                    observation.camera_id,
                )?;
                let pos_cam = cam_pose.inverse().transform_point(&track.position);
                if pos_cam.z.abs() <= MIN_DEPTH {
                    // Behind or on the image plane of this camera; the
                    // residual is meaningless.
                    continue;
                }
                let projected = pos_cam / pos_cam.z;
                let residual: Vector3<f64> = observation.bearing - projected;
                err_sum += residual.xy().norm();
                err_count += 1;
            }
            if err_count > 0 {
                let mean_err = err_sum / err_count as f64;
                if mean_err * self.config.focal_length > self.config.outlier_pixel_threshold {
                    track.flag = LandmarkFlag::Outlier;
                    removed += 1;
                }
            }
        }
        info!(removed, total, "outlier rejection");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // State Synchronization
    // ─────────────────────────────────────────────────────────────────────

    /// Pull solved state blocks back into track positions.
    ///
    /// The single place where optimizer output becomes authoritative
    /// landmark state. Every landmark whose track still meets the
    /// minimum length has its position recovered from its block, its
    /// flag set to Estimated and the estimated population recounted.
    pub fn sync_state(
        &mut self,
        extrinsics: &[SE3],
        frames: &KeyframePoses,
    ) -> Result<(), StoreError> {
        self.estimated_count = 0;
        for (landmark_id, state) in self.states.iter() {
            let track = self
                .tracks
                .get_mut(landmark_id)
                .ok_or(StoreError::LandmarkNotFound(*landmark_id))?;
            if track.len() < self.config.min_track_length {
                continue;
            }
            let Some(anchor) = track.anchor() else {
                continue;
            };
            let cam_pose =
                anchor_camera_pose(frames, extrinsics, anchor.keyframe_id, anchor.camera_id)?;
            let bearing = anchor.bearing;
            match self.config.parameterization.recover(state, &bearing, &cam_pose) {
                Some(position) => {
                    track.position = position;
                    track.flag = LandmarkFlag::Estimated;
                    track.solver_flag = SolverFlag::Solved;
                    self.estimated_count += 1;
                    if self.config.debug_log {
                        debug!(
                            landmark = %landmark_id,
                            x = position.x,
                            y = position.y,
                            z = position.z,
                            "synced landmark state"
                        );
                    }
                }
                None => {
                    warn!(landmark = %landmark_id, "degenerate solved depth, keeping previous position");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parameterization;
    use crate::map::observation::Observation;
    use crate::map::types::{AgentId, TrackMethod};
    use approx::assert_relative_eq;
    use nalgebra::{Vector2, Vector3};

    fn test_config() -> LandmarkConfig {
        LandmarkConfig {
            parameterization: Parameterization::InverseDepth,
            min_track_length: 1,
            min_estimated_for_rejection: 0,
            outlier_pixel_threshold: 5.0,
            focal_length: 500.0,
            initial_depth: 10.0,
            debug_log: false,
        }
    }

    fn obs(landmark_id: i64, keyframe_id: i64, bearing: Vector3<f64>) -> Observation {
        Observation::new(
            LandmarkId::new(landmark_id),
            KeyframeId::new(keyframe_id),
            keyframe_id as f64 * 0.05,
            TrackMethod::PointFeature,
            AgentId::LOCAL,
            0,
            CameraId::new(0),
            Vector2::zeros(),
            bearing,
        )
    }

    fn bundle(keyframe_id: i64, observations: Vec<Observation>) -> KeyframeBundle {
        let mut b = KeyframeBundle::new(
            KeyframeId::new(keyframe_id),
            AgentId::LOCAL,
            keyframe_id as f64 * 0.05,
        );
        b.push_camera(observations);
        b
    }

    fn identity_setup(keyframes: &[i64]) -> (KeyframePoses, Vec<SE3>) {
        let frames = keyframes
            .iter()
            .map(|&id| (KeyframeId::new(id), SE3::identity()))
            .collect();
        (frames, vec![SE3::identity()])
    }

    #[test]
    fn test_unmatched_observations_are_dropped() {
        let mut store = LandmarkStore::new(test_config());
        store.add_keyframe(
            &bundle(0, vec![obs(-1, 0, Vector3::new(0.0, 0.0, 1.0))]),
            0.0,
        );
        assert_eq!(store.num_landmarks(), 0);
    }

    #[test]
    fn test_ingestion_builds_tracks_and_states() {
        let mut store = LandmarkStore::new(test_config());
        store.add_keyframe(
            &bundle(0, vec![obs(1, 0, Vector3::new(0.0, 0.0, 1.0))]),
            0.003,
        );
        store.add_keyframe(
            &bundle(1, vec![obs(1, 1, Vector3::new(0.0, 0.0, 1.0))]),
            0.004,
        );

        assert!(store.has_landmark(LandmarkId::new(1)));
        let track = store.get_landmark(LandmarkId::new(1)).unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track.base_keyframe, KeyframeId::new(0));
        // Time offset is stamped at ingestion.
        assert_eq!(track.observations[0].time_offset, 0.003);
        assert_eq!(track.observations[1].time_offset, 0.004);
        // Inverse-depth blocks hold one scalar.
        assert_eq!(store.landmark_state(LandmarkId::new(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_store_consistency_between_tracks_and_states() {
        let mut store = LandmarkStore::new(test_config());
        store.add_keyframe(
            &bundle(
                0,
                vec![
                    obs(1, 0, Vector3::new(0.0, 0.0, 1.0)),
                    obs(2, 0, Vector3::new(0.1, 0.0, 1.0)),
                ],
            ),
            0.0,
        );
        store.add_keyframe(&bundle(1, vec![obs(1, 1, Vector3::new(0.0, 0.0, 1.0))]), 0.0);
        store.pop_frame(KeyframeId::new(0));

        let ids: Vec<LandmarkId> = store.landmark_ids().copied().collect();
        for id in &ids {
            assert!(store.landmark_state(*id).is_ok());
        }
        assert_eq!(ids.len(), store.num_landmarks());
    }

    #[test]
    fn test_scenario_depth_initialization() {
        // Landmark 5, depth 2.0 m, identity poses, bearing (0,0,1).
        let mut store = LandmarkStore::new(test_config());
        store.add_keyframe(
            &bundle(0, vec![obs(5, 0, Vector3::new(0.0, 0.0, 1.0)).with_depth(2.0)]),
            0.0,
        );
        let (frames, extrinsics) = identity_setup(&[0]);
        store.initial_landmarks(&frames, &extrinsics).unwrap();

        let track = store.get_landmark(LandmarkId::new(5)).unwrap();
        assert_eq!(track.flag, LandmarkFlag::Initialized);
        assert_relative_eq!(track.position, Vector3::new(0.0, 0.0, 2.0), epsilon = 1e-12);
        // Inverse depth seeded as 1/depth.
        assert_relative_eq!(
            store.landmark_state(LandmarkId::new(5)).unwrap()[0],
            0.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_provisional_initialization_without_depth() {
        let mut config = test_config();
        config.min_track_length = 2;
        let mut store = LandmarkStore::new(config);
        store.add_keyframe(&bundle(0, vec![obs(3, 0, Vector3::new(0.0, 0.0, 1.0))]), 0.0);
        let (frames, extrinsics) = identity_setup(&[0, 1]);

        // One observation is not enough: stays uninitialized.
        store.initial_landmarks(&frames, &extrinsics).unwrap();
        assert_eq!(
            store.get_landmark(LandmarkId::new(3)).unwrap().flag,
            LandmarkFlag::Uninitialized
        );

        store.add_keyframe(&bundle(1, vec![obs(3, 1, Vector3::new(0.0, 0.0, 1.0))]), 0.0);
        store.initial_landmarks(&frames, &extrinsics).unwrap();

        let track = store.get_landmark(LandmarkId::new(3)).unwrap();
        assert_eq!(track.flag, LandmarkFlag::Initialized);
        assert_relative_eq!(track.position, Vector3::new(0.0, 0.0, 10.0), epsilon = 1e-12);
        assert_relative_eq!(
            store.landmark_state(LandmarkId::new(3)).unwrap()[0],
            0.1,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_degenerate_measured_depth_falls_back_to_provisional() {
        let mut config = test_config();
        config.min_track_length = 2;
        let mut store = LandmarkStore::new(config);
        store.add_keyframe(
            &bundle(0, vec![obs(6, 0, Vector3::new(0.0, 0.0, 1.0)).with_depth(0.0)]),
            0.0,
        );
        let (frames, extrinsics) = identity_setup(&[0, 1]);

        // A zero measured depth is unusable; with a short track the
        // landmark stays put.
        store.initial_landmarks(&frames, &extrinsics).unwrap();
        assert_eq!(
            store.get_landmark(LandmarkId::new(6)).unwrap().flag,
            LandmarkFlag::Uninitialized
        );

        // Once the track is long enough the provisional path takes over,
        // exactly as if no depth had been measured at all.
        store.add_keyframe(&bundle(1, vec![obs(6, 1, Vector3::new(0.0, 0.0, 1.0))]), 0.0);
        store.initial_landmarks(&frames, &extrinsics).unwrap();
        let track = store.get_landmark(LandmarkId::new(6)).unwrap();
        assert_eq!(track.flag, LandmarkFlag::Initialized);
        assert_relative_eq!(track.position, Vector3::new(0.0, 0.0, 10.0), epsilon = 1e-12);
        assert_relative_eq!(
            store.landmark_state(LandmarkId::new(6)).unwrap()[0],
            0.1,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_sync_keeps_position_on_degenerate_solved_depth() {
        let mut store = LandmarkStore::new(test_config());
        store.add_keyframe(
            &bundle(0, vec![obs(1, 0, Vector3::new(0.0, 0.0, 1.0)).with_depth(2.0)]),
            0.0,
        );
        let (frames, extrinsics) = identity_setup(&[0]);
        store.initial_landmarks(&frames, &extrinsics).unwrap();
        store.sync_state(&extrinsics, &frames).unwrap();
        let before = store.get_landmark(LandmarkId::new(1)).unwrap().position;

        // A solve that collapses the inverse depth to zero must not
        // poison the position.
        store.landmark_state_mut(LandmarkId::new(1)).unwrap()[0] = 0.0;
        store.sync_state(&extrinsics, &frames).unwrap();
        let track = store.get_landmark(LandmarkId::new(1)).unwrap();
        assert_relative_eq!(track.position, before, epsilon = 1e-12);
        assert_eq!(track.flag, LandmarkFlag::Estimated);
        // The degenerate landmark is not counted as estimated this round.
        assert_eq!(store.estimated_count(), 0);
    }

    #[test]
    fn test_parameterization_round_trip_through_store() {
        for param in [Parameterization::InverseDepth, Parameterization::Position] {
            let mut config = test_config();
            config.parameterization = param;
            let mut store = LandmarkStore::new(config);
            store.add_keyframe(
                &bundle(7, vec![obs(9, 7, Vector3::new(0.2, -0.1, 1.0)).with_depth(3.0)]),
                0.0,
            );
            let (frames, extrinsics) = identity_setup(&[7]);

            store.initial_landmarks(&frames, &extrinsics).unwrap();
            let seeded = store.get_landmark(LandmarkId::new(9)).unwrap().position;

            store.sync_state(&extrinsics, &frames).unwrap();
            let track = store.get_landmark(LandmarkId::new(9)).unwrap();
            assert_eq!(track.flag, LandmarkFlag::Estimated);
            assert_eq!(track.solver_flag, SolverFlag::Solved);
            assert_relative_eq!(track.position, seeded, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_sync_counts_estimated_landmarks() {
        let mut store = LandmarkStore::new(test_config());
        store.add_keyframe(
            &bundle(0, vec![obs(1, 0, Vector3::new(0.0, 0.0, 1.0)).with_depth(2.0)]),
            0.0,
        );
        let (frames, extrinsics) = identity_setup(&[0]);
        store.initial_landmarks(&frames, &extrinsics).unwrap();
        assert_eq!(store.estimated_count(), 0);
        store.sync_state(&extrinsics, &frames).unwrap();
        assert_eq!(store.estimated_count(), 1);
    }

    #[test]
    fn test_warm_start_refreshes_estimated_blocks() {
        let mut store = LandmarkStore::new(test_config());
        store.add_keyframe(
            &bundle(0, vec![obs(1, 0, Vector3::new(0.0, 0.0, 1.0)).with_depth(2.0)]),
            0.0,
        );
        let (frames, extrinsics) = identity_setup(&[0]);
        store.initial_landmarks(&frames, &extrinsics).unwrap();
        store.sync_state(&extrinsics, &frames).unwrap();

        // Pretend a later update moved the landmark to depth 4.
        store.get_landmark_mut(LandmarkId::new(1)).unwrap().position =
            Vector3::new(0.0, 0.0, 4.0);
        store.initial_landmarks(&frames, &extrinsics).unwrap();
        assert_relative_eq!(
            store.landmark_state(LandmarkId::new(1)).unwrap()[0],
            0.25,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_available_measurements_filters_flags() {
        let mut config = test_config();
        config.min_track_length = 2;
        let mut store = LandmarkStore::new(config);
        for kf in 0..2 {
            store.add_keyframe(
                &bundle(
                    kf,
                    vec![
                        obs(1, kf, Vector3::new(0.0, 0.0, 1.0)),
                        obs(2, kf, Vector3::new(0.1, 0.0, 1.0)),
                        obs(3, kf, Vector3::new(0.2, 0.0, 1.0)),
                    ],
                ),
                0.0,
            );
        }
        // Short track: never eligible.
        store.add_keyframe(&bundle(2, vec![obs(4, 2, Vector3::new(0.0, 0.1, 1.0))]), 0.0);

        store.get_landmark_mut(LandmarkId::new(1)).unwrap().flag = LandmarkFlag::Initialized;
        store.get_landmark_mut(LandmarkId::new(2)).unwrap().flag = LandmarkFlag::Estimated;
        store.get_landmark_mut(LandmarkId::new(3)).unwrap().flag = LandmarkFlag::Outlier;

        let mut available: Vec<i64> = store
            .available_measurements()
            .iter()
            .map(|t| t.landmark_id.0)
            .collect();
        available.sort();
        assert_eq!(available, vec![1, 2]);

        // Outliers still show up in the reporting view.
        let mut initialized: Vec<i64> = store
            .initialized_landmarks()
            .iter()
            .map(|t| t.landmark_id.0)
            .collect();
        initialized.sort();
        assert_eq!(initialized, vec![1, 2, 3]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let mut store = LandmarkStore::new(test_config());
        store.add_keyframe(
            &bundle(0, vec![obs(1, 0, Vector3::new(0.0, 0.0, 1.0)).with_depth(2.0)]),
            0.0,
        );
        let (frames, extrinsics) = identity_setup(&[0]);
        store.initial_landmarks(&frames, &extrinsics).unwrap();

        let first: Vec<LandmarkId> = store
            .available_measurements()
            .iter()
            .map(|t| t.landmark_id)
            .collect();
        let second: Vec<LandmarkId> = store
            .available_measurements()
            .iter()
            .map(|t| t.landmark_id)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_outlier_rejection_thresholds() {
        // Mean residual 0.02 at focal 500 is 10 px > 5 px: outlier.
        // Mean residual 0.005 is 2.5 px <= 5 px: kept.
        for (offset, expected) in [
            (0.02, LandmarkFlag::Outlier),
            (0.005, LandmarkFlag::Estimated),
        ] {
            let mut store = LandmarkStore::new(test_config());
            store.add_keyframe(&bundle(0, vec![obs(1, 0, Vector3::new(0.0, 0.0, 1.0))]), 0.0);
            store.add_keyframe(
                &bundle(1, vec![obs(1, 1, Vector3::new(offset, 0.0, 1.0))]),
                0.0,
            );
            store.add_keyframe(
                &bundle(2, vec![obs(1, 2, Vector3::new(offset, 0.0, 1.0))]),
                0.0,
            );

            {
                let track = store.get_landmark_mut(LandmarkId::new(1)).unwrap();
                track.flag = LandmarkFlag::Estimated;
                track.position = Vector3::new(0.0, 0.0, 1.0);
            }
            let (frames, extrinsics) = identity_setup(&[0, 1, 2]);
            store.outlier_rejection(&frames, &extrinsics).unwrap();
            assert_eq!(store.get_landmark(LandmarkId::new(1)).unwrap().flag, expected);
        }
    }

    #[test]
    fn test_outlier_rejection_gated_on_thin_map() {
        let mut config = test_config();
        config.min_estimated_for_rejection = 10;
        let mut store = LandmarkStore::new(config);
        store.add_keyframe(&bundle(0, vec![obs(1, 0, Vector3::new(0.0, 0.0, 1.0))]), 0.0);
        store.add_keyframe(&bundle(1, vec![obs(1, 1, Vector3::new(0.5, 0.5, 1.0))]), 0.0);
        {
            let track = store.get_landmark_mut(LandmarkId::new(1)).unwrap();
            track.flag = LandmarkFlag::Estimated;
            track.position = Vector3::new(0.0, 0.0, 1.0);
        }
        // estimated_count is 0 < 10, so even a wild residual is not tested.
        let (frames, extrinsics) = identity_setup(&[0, 1]);
        store.outlier_rejection(&frames, &extrinsics).unwrap();
        assert_eq!(
            store.get_landmark(LandmarkId::new(1)).unwrap().flag,
            LandmarkFlag::Estimated
        );
    }

    #[test]
    fn test_pop_frame_evicts_completely() {
        let mut store = LandmarkStore::new(test_config());
        store.add_keyframe(
            &bundle(
                0,
                vec![
                    obs(1, 0, Vector3::new(0.0, 0.0, 1.0)),
                    obs(2, 0, Vector3::new(0.1, 0.0, 1.0)),
                ],
            ),
            0.0,
        );
        store.add_keyframe(&bundle(1, vec![obs(1, 1, Vector3::new(0.0, 0.0, 1.0))]), 0.0);

        store.pop_frame(KeyframeId::new(0));

        // Landmark 2 had its only observation there: gone, buffer and all.
        assert!(!store.has_landmark(LandmarkId::new(2)));
        assert_eq!(
            store.landmark_state(LandmarkId::new(2)),
            Err(StoreError::LandmarkNotFound(LandmarkId::new(2)))
        );
        // Landmark 1 survives, re-anchored at keyframe 1.
        let track = store.get_landmark(LandmarkId::new(1)).unwrap();
        assert_eq!(track.base_keyframe, KeyframeId::new(1));
        assert!(track.observations.iter().all(|o| o.keyframe_id != KeyframeId::new(0)));
        // Popping the same frame again is a no-op.
        store.pop_frame(KeyframeId::new(0));
        assert_eq!(store.num_landmarks(), 1);
    }

    #[test]
    fn test_scenario_single_observation_eviction() {
        let mut store = LandmarkStore::new(test_config());
        store.add_keyframe(&bundle(7, vec![obs(11, 7, Vector3::new(0.0, 0.0, 1.0))]), 0.0);
        assert!(store.has_landmark(LandmarkId::new(11)));

        store.pop_frame(KeyframeId::new(7));
        assert!(!store.has_landmark(LandmarkId::new(11)));
        assert!(store.landmark_state(LandmarkId::new(11)).is_err());
    }

    #[test]
    fn test_unknown_landmark_lookups_fail() {
        let store = LandmarkStore::new(test_config());
        let unknown = LandmarkId::new(99);
        assert_eq!(
            store.get_landmark(unknown).unwrap_err(),
            StoreError::LandmarkNotFound(unknown)
        );
        assert_eq!(
            store.landmark_state(unknown).unwrap_err(),
            StoreError::LandmarkNotFound(unknown)
        );
        assert_eq!(
            store.landmark_base_frame(unknown).unwrap_err(),
            StoreError::LandmarkNotFound(unknown)
        );
    }

    #[test]
    fn test_missing_frame_pose_is_an_error() {
        let mut store = LandmarkStore::new(test_config());
        store.add_keyframe(
            &bundle(0, vec![obs(1, 0, Vector3::new(0.0, 0.0, 1.0)).with_depth(2.0)]),
            0.0,
        );
        let frames = KeyframePoses::new();
        let result = store.initial_landmarks(&frames, &[SE3::identity()]);
        assert_eq!(result, Err(StoreError::KeyframeNotFound(KeyframeId::new(0))));
    }
}
