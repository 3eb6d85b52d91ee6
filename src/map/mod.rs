//! Landmark data model and store.
//!
//! An [`Observation`] is one sighting of a landmark in one camera at one
//! keyframe; a [`LandmarkTrack`] is the ordered history of those sightings
//! plus the landmark's current 3D estimate; the [`LandmarkStore`] owns all
//! tracks, the raw solver state blocks, and the keyframe reverse index.

pub mod error;
pub mod observation;
pub mod store;
pub mod track;
pub mod types;

pub use error::StoreError;
pub use observation::{KeyframeBundle, Observation};
pub use store::{KeyframePoses, LandmarkStore};
pub use track::LandmarkTrack;
pub use types::{AgentId, CameraId, KeyframeId, LandmarkFlag, LandmarkId, SolverFlag, TrackMethod};
