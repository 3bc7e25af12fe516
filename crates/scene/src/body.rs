use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tickworks_common::Transform;
use tickworks_kernel::{Body, Geometry};

use crate::error::SceneError;

fn default_mass() -> f32 {
    1.0
}

fn identity_rotation() -> Quat {
    Quat::IDENTITY
}

/// A body as written in a body file or inline in a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDefinition {
    pub name: String,
    #[serde(default = "default_mass")]
    pub mass: f32,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub geometry: Vec<Geometry>,
    #[serde(default)]
    pub position: Vec3,
    /// Quaternion as `[x, y, z, w]`.
    #[serde(default = "identity_rotation")]
    pub rotation: Quat,
}

impl BodyDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mass: default_mass(),
            is_static: false,
            geometry: Vec::new(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn transform(&self) -> Transform {
        Transform {
            position: self.position,
            rotation: self.rotation.normalize(),
        }
    }

    /// Build a fresh body ready to be added to a world.
    pub fn to_body(&self) -> Body {
        let mut body = Body::new(self.name.clone())
            .with_transform(self.transform())
            .with_mass(self.mass);
        body.is_static = self.is_static;
        body.geometry = self.geometry.clone();
        body
    }
}

/// Read a standalone body file.
pub fn read_body_definition(path: impl AsRef<Path>) -> Result<BodyDefinition, SceneError> {
    let path = path.as_ref();
    let def: BodyDefinition = crate::read_file(path)?;
    tracing::debug!(path = %path.display(), name = %def.name, "body definition read");
    Ok(def)
}
