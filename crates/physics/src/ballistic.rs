use glam::Vec3;
use tickworks_kernel::{PhysicsEngine, StepCtx, StepError, World};

/// Gravity-only engine: semi-implicit Euler on every non-static body, with an
/// optional ground plane at a fixed height. No collisions between bodies.
#[derive(Debug, Clone)]
pub struct BallisticEngine {
    gravity: Vec3,
    ground_height: Option<f32>,
}

impl Default for BallisticEngine {
    fn default() -> Self {
        Self {
            gravity: Vec3::ZERO,
            ground_height: Some(0.0),
        }
    }
}

impl BallisticEngine {
    pub const NAME: &'static str = "ballistic";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ground(mut self, height: Option<f32>) -> Self {
        self.ground_height = height;
        self
    }

    pub fn ground_height(&self) -> Option<f32> {
        self.ground_height
    }
}

impl PhysicsEngine for BallisticEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn simulate(&mut self, world: &mut World, ctx: &StepCtx) -> Result<(), StepError> {
        let dt = ctx.dt_secs();
        for (id, body) in world.bodies_mut() {
            if body.is_static {
                continue;
            }
            body.linear_velocity += self.gravity * dt;
            body.transform.position += body.linear_velocity * dt;

            if let Some(ground) = self.ground_height {
                let floor = ground + body.extent_below();
                if body.transform.position.z < floor {
                    body.transform.position.z = floor;
                    body.linear_velocity.z = body.linear_velocity.z.max(0.0);
                }
            }

            if !body.transform.position.is_finite() || !body.linear_velocity.is_finite() {
                return Err(StepError::Diverged { body: *id });
            }
        }
        Ok(())
    }
}
