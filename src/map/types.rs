//! Core ID types and lifecycle flags for the landmark store.

/// Unique identifier for a landmark.
///
/// Landmark ids are assigned by the frontend when a detection is matched
/// into a track. Unmatched detections carry a negative id and are dropped
/// at ingestion, so the id is signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LandmarkId(pub i64);

impl LandmarkId {
    /// Create a new LandmarkId with the given value.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Whether this id refers to a matched landmark.
    ///
    /// The frontend marks unmatched detections with a negative id; those
    /// observations never enter the store.
    pub fn is_matched(&self) -> bool {
        self.0 >= 0
    }
}

impl std::fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LM{}", self.0)
    }
}

/// Unique identifier for a keyframe in the sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyframeId(pub i64);

impl KeyframeId {
    /// Create a new KeyframeId with the given value.
    pub fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for KeyframeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KF{}", self.0)
    }
}

/// Identifier of a physical camera; indexes the extrinsic calibration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraId(pub usize);

impl CameraId {
    /// Create a new CameraId with the given value.
    pub fn new(id: usize) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CameraId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CAM{}", self.0)
    }
}

/// Identifier of the agent (drone) that owns an observation or track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId(pub i32);

impl AgentId {
    /// Sentinel for observations produced by the local agent itself.
    pub const LOCAL: AgentId = AgentId(-1);

    /// Create a new AgentId with the given value.
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    /// Whether this observation came from the local agent.
    pub fn is_local(&self) -> bool {
        *self == Self::LOCAL
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_local() {
            write!(f, "local")
        } else {
            write!(f, "drone{}", self.0)
        }
    }
}

/// Lifecycle state of a landmark.
///
/// The states are not totally ordered: `Outlier` is a terminal branch, not
/// an upper bound of the progression `Uninitialized → Initialized →
/// Estimated`. Always test membership via [`LandmarkFlag::is_usable`] or
/// explicit `matches!`, never via ordinal comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkFlag {
    /// No 3D estimate yet.
    Uninitialized,
    /// Seeded by depth measurement or provisional bootstrap.
    Initialized,
    /// Refined by at least one solve.
    Estimated,
    /// Failed the reprojection test; kept for diagnostics until evicted.
    Outlier,
}

impl LandmarkFlag {
    /// Whether a landmark in this state may contribute factors to the
    /// optimization.
    pub fn is_usable(&self) -> bool {
        matches!(self, LandmarkFlag::Initialized | LandmarkFlag::Estimated)
    }
}

/// Whether the solver has produced a value for this landmark yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverFlag {
    Unsolved,
    Solved,
}

/// How the frontend tracked this observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackMethod {
    /// Point-feature descriptor match (e.g. SuperPoint).
    PointFeature,
    /// LK optical-flow track.
    OpticalFlow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_id_matched() {
        assert!(LandmarkId::new(0).is_matched());
        assert!(LandmarkId::new(42).is_matched());
        assert!(!LandmarkId::new(-1).is_matched());
    }

    #[test]
    fn test_agent_id_local_sentinel() {
        assert!(AgentId::LOCAL.is_local());
        assert!(!AgentId::new(3).is_local());
        assert_eq!(format!("{}", AgentId::LOCAL), "local");
        assert_eq!(format!("{}", AgentId::new(2)), "drone2");
    }

    #[test]
    fn test_flag_usability_is_set_membership() {
        assert!(!LandmarkFlag::Uninitialized.is_usable());
        assert!(LandmarkFlag::Initialized.is_usable());
        assert!(LandmarkFlag::Estimated.is_usable());
        // Outlier is terminal, not "beyond Estimated".
        assert!(!LandmarkFlag::Outlier.is_usable());
    }

    #[test]
    fn test_id_as_hashmap_key() {
        use std::collections::HashMap;

        let mut map: HashMap<LandmarkId, &str> = HashMap::new();
        map.insert(LandmarkId::new(1), "first");
        assert_eq!(map.get(&LandmarkId::new(1)), Some(&"first"));
        assert_eq!(map.get(&LandmarkId::new(2)), None);
    }
}
