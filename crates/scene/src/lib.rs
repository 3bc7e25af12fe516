//! Scene and body definition files.
//!
//! Files are YAML (`.yaml`, `.yml`, or anything else) or JSON (`.json`).
//! Body file paths inside a scene are resolved relative to the scene file.

pub mod body;
pub mod error;
pub mod scene;

pub use body::{BodyDefinition, read_body_definition};
pub use error::SceneError;
pub use scene::{PhysicsSection, Scene, load_scene};

use serde::de::DeserializeOwned;
use std::path::Path;

/// Read and deserialize a YAML or JSON file, choosing by extension.
pub(crate) fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T, SceneError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SceneError::NotFound(path.to_path_buf())
        } else {
            SceneError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str(&text).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&text).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| SceneError::Parse {
        path: path.to_path_buf(),
        message,
    })
}
