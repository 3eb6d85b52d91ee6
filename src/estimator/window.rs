//! Sliding window of keyframes.

use std::collections::VecDeque;

use crate::geometry::SE3;
use crate::map::{KeyframeId, KeyframePoses, LandmarkStore};

/// The bounded set of keyframes kept for joint optimization.
///
/// Keeps insertion order so the oldest keyframe can be evicted in O(1),
/// and a pose table the store's initialization/synchronization math reads.
pub struct SlidingWindow {
    max_frames: usize,
    order: VecDeque<KeyframeId>,
    poses: KeyframePoses,
}

impl SlidingWindow {
    /// Create an empty window holding at most `max_frames` keyframes.
    pub fn new(max_frames: usize) -> Self {
        Self {
            max_frames,
            order: VecDeque::new(),
            poses: KeyframePoses::new(),
        }
    }

    /// Admit a keyframe with its world pose.
    pub fn push(&mut self, keyframe_id: KeyframeId, pose: SE3) {
        if self.poses.insert(keyframe_id, pose).is_none() {
            self.order.push_back(keyframe_id);
        }
    }

    /// Update a keyframe's pose (after a solve). Returns false if the
    /// keyframe is not in the window.
    pub fn set_pose(&mut self, keyframe_id: KeyframeId, pose: SE3) -> bool {
        match self.poses.get_mut(&keyframe_id) {
            Some(slot) => {
                *slot = pose;
                true
            }
            None => false,
        }
    }

    /// World poses of all keyframes in the window.
    pub fn poses(&self) -> &KeyframePoses {
        &self.poses
    }

    /// Keyframe ids oldest-first.
    pub fn frame_ids(&self) -> impl Iterator<Item = &KeyframeId> {
        self.order.iter()
    }

    /// Oldest keyframe in the window.
    pub fn oldest(&self) -> Option<KeyframeId> {
        self.order.front().copied()
    }

    /// Number of keyframes in the window.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the window holds no keyframes.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether a keyframe is currently in the window.
    pub fn contains(&self, keyframe_id: KeyframeId) -> bool {
        self.poses.contains_key(&keyframe_id)
    }

    /// Evict oldest keyframes until the window fits its bound, removing
    /// their observations from the store as well. Returns the evicted ids.
    pub fn slide(&mut self, store: &mut LandmarkStore) -> Vec<KeyframeId> {
        let mut evicted = Vec::new();
        while self.order.len() > self.max_frames {
            let keyframe_id = self.order.pop_front().expect("window not empty");
            self.poses.remove(&keyframe_id);
            store.pop_frame(keyframe_id);
            evicted.push(keyframe_id);
        }
        evicted
    }
}
