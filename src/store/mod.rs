//! Persistence contract for project documents.
//!
//! The platform owns durable storage; this crate only states what it needs
//! from it. [`MemoryStore`] is the embedded reference backend used by tests
//! and single-process deployments.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Application, Project};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    /// An optimistic write lost the race. The message describes the
    /// version mismatch and is surfaced to callers unchanged.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Source of truth for project documents plus a read-only view of the
/// applications referencing them.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_project(&self, name: &str) -> StoreResult<Project>;

    /// All projects, ordered by name.
    async fn list_projects(&self) -> StoreResult<Vec<Project>>;

    async fn create_project(&self, project: Project) -> StoreResult<Project>;

    /// Optimistic write: a nonzero `resource_version` must match the
    /// stored document's, and the stored version advances on success.
    async fn update_project(&self, project: Project) -> StoreResult<Project>;

    async fn delete_project(&self, name: &str) -> StoreResult<()>;

    /// Applications owned by `project`, unassigned ones counting toward
    /// the default project.
    async fn list_applications(&self, project: &str) -> StoreResult<Vec<Application>>;
}
