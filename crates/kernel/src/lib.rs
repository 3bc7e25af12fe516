//! World Kernel: authoritative world state and the fixed-step simulation clock.
//!
//! # Invariants
//! - Simulated time advances only in whole timestep increments, never with wall-clock drift.
//! - While the simulation is stopped, simulated time does not change.
//! - World state is only reachable through a [`WorldGuard`] or from inside a step,
//!   so no step ever overlaps an external mutation.
//! - A step is atomic: either every participant succeeds and time advances,
//!   or the world is rolled back and the failure is reported.

pub mod clock;
pub mod environment;
pub mod error;
pub mod participant;
pub mod rng;
pub mod world;

pub use clock::{
    ClockConfig, MAX_ELAPSED, MAX_TIMESTEP, RestartPolicy, SimulationState, StepMode,
    timestep_from_secs,
};
pub use environment::{Environment, ParticipantId, WorldGuard};
pub use error::{SimError, StepError, WorldError};
pub use participant::{NullEngine, PhysicsEngine, StepCtx, StepParticipant};
pub use rng::SplitMix64;
pub use world::{Body, Checkpoint, Geometry, World, WorldEvent};
