use std::path::PathBuf;
use tickworks_kernel::WorldError;
use tickworks_physics::EngineError;

/// Errors from loading or instantiating scenes.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    World(#[from] WorldError),
}
