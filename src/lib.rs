//! Landmark and state management core for a multi-agent visual-inertial
//! estimator.
//!
//! Each agent tracks visual landmarks across a sliding window of keyframes
//! and periodically solves a bundle adjustment over them. This crate owns
//! the landmark side of that loop: the observation/track data model, the
//! store with the solver's raw state blocks, landmark initialization,
//! outlier rejection and sliding-window eviction.

pub mod config;
pub mod estimator;
pub mod geometry;
pub mod map;
