//! Simulation clock state and configuration.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::SimError;

/// Who drives the steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepMode {
    /// A dedicated stepping thread paces steps on its own.
    #[default]
    Background,
    /// Steps only happen when the owner calls `Environment::advance`.
    Manual,
}

/// What happens to elapsed simulated time when a stopped simulation is started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RestartPolicy {
    /// Continue from the previous elapsed time.
    #[default]
    Resume,
    /// Start counting from zero again.
    Reset,
}

/// Clock configuration fixed at environment construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    pub mode: StepMode,
    /// Pace background steps one timestep of wall time apart. When false the
    /// stepper runs steps back to back.
    pub realtime: bool,
    pub restart: RestartPolicy,
    /// How many steps the stepper may fall behind the wall clock before it
    /// re-anchors its schedule instead of bursting to catch up.
    pub max_catch_up_steps: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            mode: StepMode::Background,
            realtime: true,
            restart: RestartPolicy::Resume,
            max_catch_up_steps: 10,
        }
    }
}

impl ClockConfig {
    /// Configuration for an externally driven clock.
    pub fn manual() -> Self {
        Self {
            mode: StepMode::Manual,
            ..Self::default()
        }
    }
}

/// Largest accepted timestep.
pub const MAX_TIMESTEP: Duration = Duration::from_secs(24 * 60 * 60);

/// Largest simulated time the clock can reach. Elapsed time is mirrored as
/// whole nanoseconds in a `u64`, so it stops here rather than wrapping.
pub const MAX_ELAPSED: Duration = Duration::from_nanos(u64::MAX);

/// Parse a timestep given in seconds.
pub fn timestep_from_secs(secs: f64) -> Result<Duration, SimError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(SimError::InvalidArgument(format!(
            "timestep must be a positive number of seconds, got {secs}"
        )));
    }
    let step = Duration::try_from_secs_f64(secs)
        .map_err(|e| SimError::InvalidArgument(format!("timestep {secs}s: {e}")))?;
    validate_timestep(step)?;
    Ok(step)
}

pub(crate) fn validate_timestep(timestep: Duration) -> Result<(), SimError> {
    if timestep.is_zero() {
        return Err(SimError::InvalidArgument(
            "timestep must be greater than zero".into(),
        ));
    }
    if timestep > MAX_TIMESTEP {
        return Err(SimError::InvalidArgument(format!(
            "timestep {timestep:?} exceeds the maximum of {MAX_TIMESTEP:?}"
        )));
    }
    Ok(())
}

/// Clock state owned by the stepper. Only mutated while the world lock is held.
#[derive(Debug, Clone)]
pub struct SimulationState {
    running: bool,
    timestep: Duration,
    elapsed: Duration,
    realtime: bool,
    /// Wall-clock instant the most recent step was scheduled for.
    last_wall_clock_mark: Option<Instant>,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            running: false,
            timestep: Duration::from_millis(10),
            elapsed: Duration::ZERO,
            realtime: true,
            last_wall_clock_mark: None,
        }
    }
}

impl SimulationState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn timestep(&self) -> Duration {
        self.timestep
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn realtime(&self) -> bool {
        self.realtime
    }

    pub(crate) fn start(&mut self, timestep: Duration, realtime: bool, now: Instant) {
        self.timestep = timestep;
        self.realtime = realtime;
        if !self.running {
            self.running = true;
            self.last_wall_clock_mark = Some(now);
        }
    }

    /// Returns true if the state changed.
    pub(crate) fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub(crate) fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    /// Elapsed time once the next step commits, or `None` past [`MAX_ELAPSED`].
    pub(crate) fn next_elapsed(&self) -> Option<Duration> {
        self.elapsed
            .checked_add(self.timestep)
            .filter(|next| *next <= MAX_ELAPSED)
    }

    pub(crate) fn commit(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    /// When the next step is due on the wall clock, if pacing applies.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        if !self.realtime {
            return None;
        }
        self.last_wall_clock_mark
            .and_then(|mark| mark.checked_add(self.timestep))
    }

    #[cfg(test)]
    pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    /// Move the wall-clock schedule forward by one step, re-anchoring at `now`
    /// if it has fallen more than `max_catch_up` steps behind.
    pub(crate) fn advance_schedule(&mut self, now: Instant, max_catch_up: u32) {
        let mark = self
            .last_wall_clock_mark
            .and_then(|mark| mark.checked_add(self.timestep))
            .unwrap_or(now);
        let lag = now.saturating_duration_since(mark);
        self.last_wall_clock_mark = if lag > self.timestep.saturating_mul(max_catch_up) {
            tracing::debug!(?lag, "stepper fell behind, re-anchoring schedule");
            Some(now)
        } else {
            Some(mark)
        };
    }
}
