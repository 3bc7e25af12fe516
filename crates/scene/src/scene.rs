use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tickworks_common::BodyId;
use tickworks_kernel::{Environment, Geometry};
use tickworks_physics::EngineRegistry;

use crate::body::{BodyDefinition, read_body_definition};
use crate::error::SceneError;

/// Physics settings declared by a scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsSection {
    /// Engine name, resolved through an [`EngineRegistry`].
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub gravity: Option<Vec3>,
}

/// One body entry in a scene file: either inline, or a `file` reference with
/// optional overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SceneBody {
    #[serde(default)]
    file: Option<PathBuf>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mass: Option<f32>,
    #[serde(default, rename = "static")]
    is_static: Option<bool>,
    #[serde(default)]
    geometry: Option<Vec<Geometry>>,
    #[serde(default)]
    position: Option<Vec3>,
    #[serde(default)]
    rotation: Option<Quat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SceneFile {
    #[serde(default)]
    physics: Option<PhysicsSection>,
    #[serde(default)]
    bodies: Vec<SceneBody>,
}

impl SceneBody {
    fn resolve(self, scene_path: &Path, index: usize) -> Result<BodyDefinition, SceneError> {
        let mut def = match (&self.file, &self.name) {
            (Some(file), _) => {
                let base = scene_path.parent().unwrap_or_else(|| Path::new(""));
                read_body_definition(base.join(file))?
            }
            (None, Some(name)) => BodyDefinition::new(name.clone()),
            (None, None) => {
                return Err(SceneError::Parse {
                    path: scene_path.to_path_buf(),
                    message: format!("body entry {index} has neither `file` nor `name`"),
                });
            }
        };
        if let Some(name) = self.name {
            def.name = name;
        }
        if let Some(mass) = self.mass {
            def.mass = mass;
        }
        if let Some(is_static) = self.is_static {
            def.is_static = is_static;
        }
        if let Some(geometry) = self.geometry {
            def.geometry = geometry;
        }
        if let Some(position) = self.position {
            def.position = position;
        }
        if let Some(rotation) = self.rotation {
            def.rotation = rotation;
        }
        Ok(def)
    }
}

/// A loaded scene with every body file already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub path: PathBuf,
    pub physics: Option<PhysicsSection>,
    pub bodies: Vec<BodyDefinition>,
}

/// Load a scene file and the body files it references.
pub fn load_scene(path: impl AsRef<Path>) -> Result<Scene, SceneError> {
    Scene::load(path)
}

impl Scene {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let _span = tracing::info_span!("load_scene", path = %path.display()).entered();
        let file: SceneFile = crate::read_file(path)?;
        let bodies = file
            .bodies
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.resolve(path, index))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(bodies = bodies.len(), "scene loaded");
        Ok(Self {
            path: path.to_path_buf(),
            physics: file.physics,
            bodies,
        })
    }

    /// Engine name declared by the scene, if any.
    pub fn engine_name(&self) -> Option<&str> {
        self.physics.as_ref()?.engine.as_deref()
    }

    pub fn gravity(&self) -> Option<Vec3> {
        self.physics.as_ref()?.gravity
    }

    /// Select the scene's engine and gravity, then add every body, all under
    /// one world lock. Nothing is changed if the engine is unknown or any body
    /// fails to add.
    pub fn instantiate(
        &self,
        env: &Environment,
        registry: &EngineRegistry,
    ) -> Result<Vec<BodyId>, SceneError> {
        let engine = self
            .engine_name()
            .map(|name| registry.create(name))
            .transpose()?;

        let mut world = env.lock();
        let checkpoint = world.checkpoint();
        let mut ids = Vec::with_capacity(self.bodies.len());
        for def in &self.bodies {
            match world.add_body(def.to_body()) {
                Ok(id) => ids.push(id),
                Err(err) => {
                    world.restore(checkpoint);
                    return Err(err.into());
                }
            }
        }
        if let Some(engine) = engine {
            world.set_physics_engine(engine);
        }
        if let Some(gravity) = self.gravity() {
            world.physics_mut().set_gravity(gravity);
        }
        tracing::info!(
            path = %self.path.display(),
            bodies = ids.len(),
            engine = world.physics().name(),
            "scene instantiated"
        );
        Ok(ids)
    }
}
