//! Shared types used across the tickworks crates.

pub mod types;

pub use types::{BodyId, Transform};
