use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tickworks_common::{BodyId, Transform};

use crate::error::WorldError;

/// An event record produced by every registry mutation and every committed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// Body was added with the given name and transform.
    BodyAdded {
        id: BodyId,
        name: String,
        transform: Transform,
    },
    /// Body was removed.
    BodyRemoved { id: BodyId, name: String },
    /// Body transform was set from outside the physics step.
    TransformUpdated {
        id: BodyId,
        old: Transform,
        new: Transform,
    },
    /// A step committed, bringing simulated time to `time`.
    Stepped { tick: u64, time: Duration },
}

/// Collision/extent geometry attached to a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
}

impl Geometry {
    /// Distance from the body origin to the lowest point along -z, ignoring rotation.
    pub fn extent_below(&self) -> f32 {
        match self {
            Self::Box { half_extents } => half_extents.z,
            Self::Sphere { radius } => *radius,
        }
    }
}

/// A simulated body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub name: String,
    pub transform: Transform,
    pub linear_velocity: Vec3,
    pub mass: f32,
    /// Static bodies (floors, fixtures) are never moved by physics.
    pub is_static: bool,
    pub geometry: Vec<Geometry>,
}

impl Body {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            linear_velocity: Vec3::ZERO,
            mass: 1.0,
            is_static: false,
            geometry: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry.push(geometry);
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Largest downward extent over all geometry (0 for a body without geometry).
    pub fn extent_below(&self) -> f32 {
        self.geometry
            .iter()
            .map(Geometry::extent_below)
            .fold(0.0, f32::max)
    }
}

/// Saved registry state used to roll back a failed step.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    bodies: BTreeMap<BodyId, Body>,
    names: BTreeMap<String, BodyId>,
    events_len: usize,
}

/// The shared world state: every body, its transform and geometry.
///
/// Reachable only while holding the environment's world lock, or from inside
/// a step participant. The stepper is the only writer of `tick`.
///
/// Uses BTreeMap for deterministic iteration order across all platforms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    bodies: BTreeMap<BodyId, Body>,
    names: BTreeMap<String, BodyId>,
    tick: u64,
    /// Append-only event log of all mutations.
    #[serde(skip)]
    event_log: Vec<WorldEvent>,
}

impl World {
    /// Create an empty world at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed steps.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    /// Read-only access to all bodies (BTreeMap for deterministic iteration).
    pub fn bodies(&self) -> &BTreeMap<BodyId, Body> {
        &self.bodies
    }

    /// Mutable iteration over all bodies, in id order. Used by physics engines;
    /// does not log events.
    pub fn bodies_mut(&mut self) -> impl Iterator<Item = (&BodyId, &mut Body)> {
        self.bodies.iter_mut()
    }

    /// Add a body. Names must be unique within the world.
    pub fn add_body(&mut self, body: Body) -> Result<BodyId, WorldError> {
        let id = BodyId::new();
        self.add_body_with_id(id, body)?;
        Ok(id)
    }

    /// Add a body under a caller-chosen id.
    pub fn add_body_with_id(&mut self, id: BodyId, body: Body) -> Result<(), WorldError> {
        if self.names.contains_key(&body.name) {
            return Err(WorldError::DuplicateName(body.name));
        }
        if !body.transform.is_finite() {
            return Err(WorldError::NonFiniteTransform(id));
        }
        self.names.insert(body.name.clone(), id);
        self.event_log.push(WorldEvent::BodyAdded {
            id,
            name: body.name.clone(),
            transform: body.transform,
        });
        self.bodies.insert(id, body);
        Ok(())
    }

    /// Remove a body. Returns it if it existed.
    pub fn remove_body(&mut self, id: BodyId) -> Option<Body> {
        let body = self.bodies.remove(&id)?;
        self.names.remove(&body.name);
        self.event_log.push(WorldEvent::BodyRemoved {
            id,
            name: body.name.clone(),
        });
        Some(body)
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    /// Mutable access to a body. Renaming through this reference is not
    /// reflected in the name index; use [`World::rename`].
    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(&id)
    }

    pub fn body_by_name(&self, name: &str) -> Option<BodyId> {
        self.names.get(name).copied()
    }

    pub fn rename(&mut self, id: BodyId, name: impl Into<String>) -> Result<(), WorldError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(WorldError::DuplicateName(name));
        }
        let body = self.bodies.get_mut(&id).ok_or(WorldError::BodyNotFound(id))?;
        self.names.remove(&body.name);
        self.names.insert(name.clone(), id);
        body.name = name;
        Ok(())
    }

    /// Set a body's transform and log the change.
    pub fn set_transform(&mut self, id: BodyId, new: Transform) -> Result<(), WorldError> {
        if !new.is_finite() {
            return Err(WorldError::NonFiniteTransform(id));
        }
        let body = self.bodies.get_mut(&id).ok_or(WorldError::BodyNotFound(id))?;
        let old = body.transform;
        body.transform = new;
        self.event_log
            .push(WorldEvent::TransformUpdated { id, old, new });
        Ok(())
    }

    pub fn set_velocity(&mut self, id: BodyId, velocity: Vec3) -> Result<(), WorldError> {
        let body = self.bodies.get_mut(&id).ok_or(WorldError::BodyNotFound(id))?;
        body.linear_velocity = velocity;
        Ok(())
    }

    /// Capture the registry so a failed step can be undone.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            bodies: self.bodies.clone(),
            names: self.names.clone(),
            events_len: self.event_log.len(),
        }
    }

    /// Restore a checkpoint taken earlier in the same step. Events logged
    /// since the checkpoint are discarded.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.bodies = checkpoint.bodies;
        self.names = checkpoint.names;
        self.event_log.truncate(checkpoint.events_len);
    }

    pub(crate) fn commit_step(&mut self, tick: u64, time: Duration) {
        self.tick = tick;
        self.event_log.push(WorldEvent::Stepped { tick, time });
    }

    pub(crate) fn reset_tick(&mut self) {
        self.tick = 0;
    }

    /// Compute a deterministic hash of the world state for comparison.
    /// Uses canonical (BTreeMap) iteration order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.tick.to_le_bytes());
        for (id, body) in &self.bodies {
            mix(&mut h, id.0.as_bytes());
            mix(&mut h, body.name.as_bytes());
            let t = &body.transform;
            for v in [t.position.x, t.position.y, t.position.z] {
                mix(&mut h, &v.to_le_bytes());
            }
            for v in [t.rotation.x, t.rotation.y, t.rotation.z, t.rotation.w] {
                mix(&mut h, &v.to_le_bytes());
            }
            for v in body.linear_velocity.to_array() {
                mix(&mut h, &v.to_le_bytes());
            }
        }
        h
    }
}
