//! Monitor modules
//!
//! Each monitor watches one log source and forwards its lines to the detector.

pub mod follower;

pub use follower::{FollowError, LogFollower};
