//! The map-lookup collaborator.
//!
//! Maps live in an external document store; the orchestrator only ever
//! reads geometry by name. The [`MapStore`] trait keeps that dependency a
//! hook (the same shape as the session layer's `Authenticator`):
//! production wires it to the real store, tests and the demo binary use
//! [`MemoryMapStore`].

use std::collections::HashMap;

use gridlock_engine::GameMap;

use crate::GameError;

/// Reads map geometry by name.
pub trait MapStore: Send + Sync + 'static {
    /// Loads the named map.
    ///
    /// # Errors
    /// [`GameError::MapNotFound`] when no map has that name.
    fn load(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<GameMap, GameError>> + Send;
}

/// An in-memory [`MapStore`] for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryMapStore {
    maps: HashMap<String, GameMap>,
}

impl MemoryMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a map under its own name, replacing any previous one.
    pub fn insert(&mut self, map: GameMap) {
        self.maps.insert(map.name().to_string(), map);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, map: GameMap) -> Self {
        self.insert(map);
        self
    }
}

impl MapStore for MemoryMapStore {
    async fn load(&self, name: &str) -> Result<GameMap, GameError> {
        self.maps
            .get(name)
            .cloned()
            .ok_or_else(|| GameError::MapNotFound(name.to_string()))
    }
}
