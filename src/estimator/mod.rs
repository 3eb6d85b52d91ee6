//! Estimation-cycle orchestration around the landmark store.
//!
//! The store itself takes no locks and assumes a single writer. Local
//! keyframes are ingested directly; keyframes from other agents arrive on
//! a channel and are drained on the owner thread before each cycle, so
//! every mutation of the store happens inside one serialized
//! quiesce → initialize → solve → sync → reject → evict transaction.

pub mod window;

pub use window::SlidingWindow;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing::debug;

use crate::config::LandmarkConfig;
use crate::geometry::SE3;
use crate::map::{KeyframeBundle, KeyframeId, LandmarkStore};

/// A keyframe received from another agent: its observations plus the
/// sender's pose estimate for it.
pub struct RemoteKeyframe {
    pub bundle: KeyframeBundle,
    pub pose: SE3,
}

/// Drives the landmark store through the per-keyframe estimation cycle.
pub struct Estimator {
    store: LandmarkStore,
    window: SlidingWindow,
    extrinsics: Vec<SE3>,
    time_offset: f64,
    remote_tx: Sender<RemoteKeyframe>,
    remote_rx: Receiver<RemoteKeyframe>,
}

impl Estimator {
    /// Create an estimator with the given landmark configuration, camera
    /// extrinsics (indexed by camera id) and sliding-window bound.
    pub fn new(config: LandmarkConfig, extrinsics: Vec<SE3>, max_frames: usize) -> Self {
        let (remote_tx, remote_rx) = unbounded();
        Self {
            store: LandmarkStore::new(config),
            window: SlidingWindow::new(max_frames),
            extrinsics,
            time_offset: 0.0,
            remote_tx,
            remote_rx,
        }
    }

    /// Sender for keyframes arriving from other agents. Clone freely;
    /// the receive side is drained on the estimator's own thread.
    pub fn remote_sender(&self) -> Sender<RemoteKeyframe> {
        self.remote_tx.clone()
    }

    /// The landmark store.
    pub fn store(&self) -> &LandmarkStore {
        &self.store
    }

    /// The landmark store, mutable (solver access between cycles).
    pub fn store_mut(&mut self) -> &mut LandmarkStore {
        &mut self.store
    }

    /// The sliding window.
    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// The sliding window, mutable (pose updates after a solve).
    pub fn window_mut(&mut self) -> &mut SlidingWindow {
        &mut self.window
    }

    /// Set the camera-IMU time offset stamped onto ingested observations.
    pub fn set_time_offset(&mut self, time_offset: f64) {
        self.time_offset = time_offset;
    }

    /// Admit a local keyframe with its current pose estimate.
    pub fn add_keyframe(&mut self, bundle: &KeyframeBundle, pose: SE3) {
        self.window.push(bundle.keyframe_id, pose);
        self.store.add_keyframe(bundle, self.time_offset);
    }

    /// Drain queued remote keyframes into the store. Returns how many
    /// were ingested.
    pub fn ingest_remote(&mut self) -> usize {
        let mut count = 0;
        loop {
            match self.remote_rx.try_recv() {
                Ok(remote) => {
                    self.add_keyframe(&remote.bundle, remote.pose);
                    count += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if count > 0 {
            debug!(count, "ingested remote keyframes");
        }
        count
    }

    /// Run one estimation cycle: seed state blocks, hand the store to the
    /// external solver, pull solved state back, reject outliers, then
    /// evict keyframes that fell out of the window.
    ///
    /// Ingestion is quiesced for the whole call; the solver closure is
    /// the only code that touches the state blocks while they are live.
    pub fn solve_cycle<F>(&mut self, solver: F) -> Result<Vec<KeyframeId>>
    where
        F: FnOnce(&mut LandmarkStore) -> Result<()>,
    {
        self.store
            .initial_landmarks(self.window.poses(), &self.extrinsics)?;
        solver(&mut self.store)?;
        self.store
            .sync_state(&self.extrinsics, self.window.poses())?;
        self.store
            .outlier_rejection(self.window.poses(), &self.extrinsics)?;
        let evicted = self.window.slide(&mut self.store);
        debug!(
            frames = self.window.len(),
            landmarks = self.store.num_landmarks(),
            estimated = self.store.estimated_count(),
            evicted = evicted.len(),
            "estimation cycle done"
        );
        Ok(evicted)
    }
}
