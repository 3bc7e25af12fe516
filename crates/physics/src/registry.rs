use std::collections::BTreeMap;
use tickworks_kernel::{NullEngine, PhysicsEngine};

use crate::ballistic::BallisticEngine;

/// Builds a fresh engine instance.
pub type EngineFactory = Box<dyn Fn() -> Box<dyn PhysicsEngine> + Send + Sync>;

/// Errors from engine lookup and registration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("unknown physics engine type `{0}`")]
    UnknownEngineType(String),
    #[error("physics engine `{0}` is already registered")]
    AlreadyRegistered(String),
}

/// Engine factories keyed by case-insensitive name.
pub struct EngineRegistry {
    factories: BTreeMap<String, EngineFactory>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl EngineRegistry {
    /// A registry with no engines at all.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry with the bundled `null` and `ballistic` engines.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.factories.insert(
            NullEngine::NAME.into(),
            Box::new(|| -> Box<dyn PhysicsEngine> { Box::new(NullEngine::new()) }),
        );
        registry.factories.insert(
            BallisticEngine::NAME.into(),
            Box::new(|| -> Box<dyn PhysicsEngine> { Box::new(BallisticEngine::new()) }),
        );
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), EngineError>
    where
        F: Fn() -> Box<dyn PhysicsEngine> + Send + Sync + 'static,
    {
        let key = name.to_lowercase();
        if self.factories.contains_key(&key) {
            return Err(EngineError::AlreadyRegistered(key));
        }
        tracing::debug!(engine = %key, "physics engine registered");
        self.factories.insert(key, Box::new(factory));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    /// Instantiate the engine registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn PhysicsEngine>, EngineError> {
        let factory = self
            .factories
            .get(&name.to_lowercase())
            .ok_or_else(|| EngineError::UnknownEngineType(name.to_string()))?;
        Ok(factory())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
