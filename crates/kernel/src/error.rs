use std::time::Duration;
use tickworks_common::BodyId;

/// Errors from body registry operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("a body named `{0}` already exists")]
    DuplicateName(String),
    #[error("body {0} not found")]
    BodyNotFound(BodyId),
    #[error("body {0} was given a non-finite transform")]
    NonFiniteTransform(BodyId),
}

/// Errors raised by a step participant (physics engine or controller).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("body {body} diverged to a non-finite state")]
    Diverged { body: BodyId },
    #[error("{0}")]
    Failed(String),
}

/// Errors from the simulation clock and environment.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("step {tick} failed in `{participant}`: {source}")]
    StepFailure {
        participant: String,
        tick: u64,
        #[source]
        source: StepError,
    },
    #[error("simulated time {elapsed:?} cannot advance by {timestep:?} without overflowing")]
    ClockOverflow {
        elapsed: Duration,
        timestep: Duration,
    },
    #[error("timed out after {0:?} waiting for the world lock")]
    Timeout(Duration),
    #[error("failed to spawn the stepping thread: {0}")]
    Thread(#[from] std::io::Error),
}
