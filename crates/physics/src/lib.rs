//! Physics engines and the name-keyed engine registry.
//!
//! Engines plug into the kernel through [`tickworks_kernel::PhysicsEngine`];
//! the registry resolves an engine name once, when the engine is selected.

pub mod ballistic;
pub mod registry;

pub use ballistic::BallisticEngine;
pub use registry::{EngineError, EngineFactory, EngineRegistry};
