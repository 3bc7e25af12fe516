//! Per-step participants: the physics engine and any registered controllers.

use glam::Vec3;
use std::any::Any;
use std::time::Duration;

use crate::error::StepError;
use crate::world::World;

/// Per-step context handed to every participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCtx {
    /// Tick this step will commit as.
    pub tick: u64,
    /// Fixed step size.
    pub dt: Duration,
    /// Simulated time after this step commits.
    pub time: Duration,
}

impl StepCtx {
    pub fn dt_secs(&self) -> f32 {
        self.dt.as_secs_f32()
    }
}

/// Downcasting support for boxed participants.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Something that runs once per step with exclusive access to the world.
///
/// Participants run while the stepper already holds the world lock and must
/// not try to acquire it again.
pub trait StepParticipant: AsAny + Send {
    fn name(&self) -> &str;

    fn step(&mut self, world: &mut World, ctx: &StepCtx) -> Result<(), StepError>;
}

/// Capability set every physics engine exposes to the stepper.
pub trait PhysicsEngine: Send {
    fn name(&self) -> &str;

    fn gravity(&self) -> Vec3;

    fn set_gravity(&mut self, gravity: Vec3);

    /// Integrate the world forward by `ctx.dt`.
    fn simulate(&mut self, world: &mut World, ctx: &StepCtx) -> Result<(), StepError>;
}

/// Engine that records gravity but never moves anything. Installed in every
/// new environment until a real engine is selected.
#[derive(Debug, Clone, Default)]
pub struct NullEngine {
    gravity: Vec3,
}

impl NullEngine {
    pub const NAME: &'static str = "null";

    pub fn new() -> Self {
        Self::default()
    }
}

impl PhysicsEngine for NullEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn simulate(&mut self, _world: &mut World, _ctx: &StepCtx) -> Result<(), StepError> {
        Ok(())
    }
}
