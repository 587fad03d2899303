//! Quota and uniqueness tracking.
//!
//! The tracker is the only race-sensitive state in the registry; every
//! claim on it is made before the first store suspension of an exercise.

pub mod tracker;
