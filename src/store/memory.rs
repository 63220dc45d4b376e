//! In-memory reference store.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{ResourceStore, StoreError, StoreResult};
use crate::models::{Application, Project};

/// Dashmap-backed store with per-document optimistic versioning. Suitable
/// for tests and single-process embeddings; anything durable lives with
/// the platform.
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: DashMap<String, Project>,
    applications: DashMap<String, Application>,
    version_counter: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an application. Applications are read-only through the store
    /// contract, so tests and embeddings register them directly.
    pub fn add_application(&self, app: Application) {
        self.applications.insert(app.name.clone(), app);
    }

    fn next_version(&self) -> u64 {
        self.version_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get_project(&self, name: &str) -> StoreResult<Project> {
        self.projects
            .get(name)
            .map(|entry| entry.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .projects
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    async fn create_project(&self, mut project: Project) -> StoreResult<Project> {
        use dashmap::mapref::entry::Entry;

        match self.projects.entry(project.name.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            Entry::Vacant(vacant) => {
                project.resource_version = self.next_version();
                vacant.insert(project.clone());
                Ok(project)
            }
        }
    }

    async fn update_project(&self, mut project: Project) -> StoreResult<Project> {
        let mut stored = self
            .projects
            .get_mut(&project.name)
            .ok_or(StoreError::NotFound)?;

        if project.resource_version != 0 && project.resource_version != stored.resource_version {
            return Err(StoreError::Conflict(format!(
                "project '{}' has been modified: resource version {} does not match {}",
                project.name, project.resource_version, stored.resource_version
            )));
        }

        project.resource_version = self.next_version();
        *stored = project.clone();
        Ok(project)
    }

    async fn delete_project(&self, name: &str) -> StoreResult<()> {
        self.projects
            .remove(name)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list_applications(&self, project: &str) -> StoreResult<Vec<Application>> {
        let mut apps: Vec<Application> = self
            .applications
            .iter()
            .filter(|entry| entry.value().project_name() == project)
            .map(|entry| entry.value().clone())
            .collect();
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apps)
    }
}
