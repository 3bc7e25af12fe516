use glam::Vec3;
use serde::{Deserialize, Serialize};
use tickworks_common::{BodyId, Transform};
use tickworks_kernel::{StepCtx, StepError, StepParticipant, World, WorldError};

/// Errors from building trajectories or configuring controllers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("trajectory has no waypoints")]
    EmptyTrajectory,
    #[error("waypoint {index} is out of time order or not finite")]
    BadWaypoint { index: usize },
    #[error("playback speed must be finite and non-negative, got {0}")]
    InvalidSpeed(f32),
}

/// A transform to reach at a given time (seconds from trajectory start).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub time: f32,
    pub transform: Transform,
}

/// Timed waypoints, interpolated linearly on position and spherically on rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    waypoints: Vec<Waypoint>,
}

impl Trajectory {
    pub fn new(waypoints: Vec<Waypoint>) -> Result<Self, ControlError> {
        if waypoints.is_empty() {
            return Err(ControlError::EmptyTrajectory);
        }
        let mut last = 0.0_f32;
        for (index, wp) in waypoints.iter().enumerate() {
            if !wp.time.is_finite() || wp.time < last || !wp.transform.is_finite() {
                return Err(ControlError::BadWaypoint { index });
            }
            last = wp.time;
        }
        Ok(Self { waypoints })
    }

    pub fn duration(&self) -> f32 {
        self.waypoints.last().map_or(0.0, |wp| wp.time)
    }

    /// Transform at time `t`, clamped to the first and last waypoint.
    pub fn sample(&self, t: f32) -> Transform {
        let next = self.waypoints.partition_point(|wp| wp.time <= t);
        if next == 0 {
            return self.waypoints[0].transform;
        }
        if next == self.waypoints.len() {
            return self.waypoints[next - 1].transform;
        }
        let (a, b) = (&self.waypoints[next - 1], &self.waypoints[next]);
        let span = b.time - a.time;
        let alpha = if span > 0.0 { (t - a.time) / span } else { 1.0 };
        a.transform.lerp(&b.transform, alpha)
    }
}

/// Drives one body along a trajectory, or pins it to a desired transform.
///
/// Forces exact placement each step and zeroes the body's velocity, so the
/// body ignores the physics engine while controlled.
#[derive(Debug, Clone)]
pub struct TrajectoryController {
    name: String,
    body: BodyId,
    trajectory: Option<Trajectory>,
    desired: Option<Transform>,
    time: f32,
    speed: f32,
    paused: bool,
    done: bool,
}

impl TrajectoryController {
    pub fn new(name: impl Into<String>, body: BodyId) -> Self {
        Self {
            name: name.into(),
            body,
            trajectory: None,
            desired: None,
            time: 0.0,
            speed: 1.0,
            paused: false,
            done: true,
        }
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Play a trajectory from its start. Refused while paused.
    pub fn set_path(&mut self, trajectory: Trajectory) -> bool {
        if self.paused {
            tracing::debug!(controller = %self.name, "cannot play trajectories while paused");
            self.trajectory = None;
            self.done = true;
            return false;
        }
        self.trajectory = Some(trajectory);
        self.desired = None;
        self.time = 0.0;
        self.done = false;
        true
    }

    /// Pin the body to `transform` from the next step on.
    pub fn hold(&mut self, transform: Transform) {
        self.trajectory = None;
        self.time = 0.0;
        if !self.paused {
            self.desired = Some(transform);
            self.done = false;
        }
    }

    pub fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<(), ControlError> {
        if !speed.is_finite() || speed < 0.0 {
            return Err(ControlError::InvalidSpeed(speed));
        }
        self.speed = speed;
        Ok(())
    }

    /// Playback time into the current trajectory.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Drop any trajectory or hold target.
    pub fn reset(&mut self) {
        self.trajectory = None;
        self.desired = None;
        self.time = 0.0;
        self.done = true;
    }

    fn place(&self, world: &mut World, transform: Transform) -> Result<(), StepError> {
        let body = world
            .get_mut(self.body)
            .ok_or(WorldError::BodyNotFound(self.body))?;
        body.transform = transform;
        body.linear_velocity = Vec3::ZERO;
        Ok(())
    }
}

impl StepParticipant for TrajectoryController {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, world: &mut World, ctx: &StepCtx) -> Result<(), StepError> {
        if self.paused {
            return Ok(());
        }
        if let Some(trajectory) = &self.trajectory {
            let duration = trajectory.duration();
            self.place(world, trajectory.sample(self.time))?;
            if self.time > duration {
                self.time = duration;
                self.done = true;
            }
            self.time += self.speed * ctx.dt_secs();
        }
        if let Some(desired) = self.desired {
            self.place(world, desired)?;
            self.done = true;
        }
        Ok(())
    }
}
