//! Kinematic controllers: step participants that place bodies directly
//! instead of leaving them to the physics engine.
//!
//! # Invariants
//! - A controller only touches the world from inside a step.
//! - `is_done` is only ever set by a step, never by a command call.

pub mod trajectory;

pub use trajectory::{ControlError, Trajectory, TrajectoryController, Waypoint};
