use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::ComponentRepository;
use crate::component::Component;
use crate::error::RepositoryError;

/// Process-local component store keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    components: RwLock<BTreeMap<String, Component>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all stored components ordered by id.
    pub fn list(&self) -> Vec<Component> {
        self.components
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.components
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ComponentRepository for InMemoryRepository {
    async fn get_component_by_identifier(&self, id: &str) -> Result<Component, RepositoryError> {
        self.components
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn create_component(&self, component: &Component) -> Result<(), RepositoryError> {
        let mut components = self.components.write().unwrap_or_else(|e| e.into_inner());
        if components.contains_key(&component.id) {
            return Err(RepositoryError::AlreadyExists(component.id.clone()));
        }
        components.insert(component.id.clone(), component.clone());
        Ok(())
    }
}
