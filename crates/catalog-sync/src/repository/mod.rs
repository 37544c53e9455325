//! Catalog storage seen from the sync engine.
//!
//! The engine only ever looks components up and creates them. Storage
//! engines implement [`ComponentRepository`]; [`InMemoryRepository`] is the
//! bundled implementation.

pub mod memory;

use async_trait::async_trait;

use crate::component::Component;
use crate::error::RepositoryError;

pub use memory::InMemoryRepository;

/// Component storage consumed by the sync service.
///
/// Implementations must be safe to call from several sync passes at once.
#[async_trait]
pub trait ComponentRepository: Send + Sync {
    /// Looks a component up. Returns [`RepositoryError::NotFound`] when absent.
    async fn get_component_by_identifier(&self, id: &str) -> Result<Component, RepositoryError>;

    /// Stores a new component.
    async fn create_component(&self, component: &Component) -> Result<(), RepositoryError>;
}
