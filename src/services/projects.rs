//! Caller-facing project operations.
//!
//! [`ProjectService`] stitches the governance pieces together. Every
//! mutation runs the same pipeline: grant check, policy normalization,
//! admission validation, then a per-project critical section around the
//! read-mutate-persist span. Reads take no lock. The service keeps no
//! state of its own beyond the lock registry, so clones share everything.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::authz::{self, Action, Enforcer, Identity, ResourceKind, cascade};
use crate::error::{Error, Result};
use crate::lock::KeyLock;
use crate::models::{Application, DEFAULT_PROJECT, Project, ProjectRole};
use crate::store::{ResourceStore, StoreError};
use crate::tokens::{self, CredentialIssuer};
use crate::validation::{self, policy};
use crate::windows::{self, ScheduleResolver, SyncWindowsState};

/// Store write attempts per project during the corrective normalize pass.
const NORMALIZE_ATTEMPTS: usize = 3;

/// Request to mint a credential for a project role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreateRequest {
    pub project: String,
    pub role: String,
    /// Requested lifetime in seconds. Zero means the credential never
    /// expires.
    #[serde(default)]
    pub expires_in: i64,
    /// Client-chosen token id. Omitted ids are generated server side.
    #[serde(default)]
    pub id: Option<String>,
}

/// Request to revoke a previously minted credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDeleteRequest {
    pub project: String,
    pub role: String,
    /// Issue time of the token to revoke; ignored when `id` matches a
    /// record.
    #[serde(default)]
    pub issued_at: i64,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The signed credential.
    pub token: String,
}

/// Service layer for project governance operations.
#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn ResourceStore>,
    enforcer: Arc<dyn Enforcer>,
    issuer: Arc<dyn CredentialIssuer>,
    schedules: Arc<dyn ScheduleResolver>,
    locks: Arc<KeyLock>,
}

impl ProjectService {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        enforcer: Arc<dyn Enforcer>,
        issuer: Arc<dyn CredentialIssuer>,
        schedules: Arc<dyn ScheduleResolver>,
    ) -> Self {
        Self {
            store,
            enforcer,
            issuer,
            schedules,
            locks: Arc::new(KeyLock::new()),
        }
    }

    /// Fetch a project by name.
    pub async fn get(&self, identity: &Identity, name: &str) -> Result<Project> {
        let project = self.fetch(name).await?;
        authz::ensure(
            self.enforcer.as_ref(),
            identity,
            ResourceKind::Projects,
            Action::Get,
            &project.name,
        )?;
        Ok(project)
    }

    /// Admit and persist a new project.
    ///
    /// Re-creating a project whose spec deeply equals the stored one is
    /// treated as idempotent and returns the stored document unchanged.
    pub async fn create(&self, identity: &Identity, mut project: Project) -> Result<Project> {
        authz::ensure(
            self.enforcer.as_ref(),
            identity,
            ResourceKind::Projects,
            Action::Create,
            &project.name,
        )?;
        policy::normalize_policies(&mut project.spec);
        validation::validate_project(&project, self.schedules.as_ref())?;

        match self.store.create_project(project.clone()).await {
            Ok(created) => Ok(created),
            Err(StoreError::AlreadyExists) => {
                let existing = self.fetch(&project.name).await?;
                if existing.spec == project.spec {
                    Ok(existing)
                } else {
                    Err(Error::AlreadyExists(format!(
                        "project '{}' already exists",
                        project.name
                    )))
                }
            }
            Err(err) => Err(project_error(&project.name, err)),
        }
    }

    /// Replace a project's spec.
    ///
    /// Boundary changes additionally need `clusters:update` /
    /// `repositories:update` grants on every affected target, and must not
    /// strand applications the old spec covered. Any rejection leaves the
    /// stored document untouched.
    pub async fn update(&self, identity: &Identity, mut project: Project) -> Result<Project> {
        authz::ensure(
            self.enforcer.as_ref(),
            identity,
            ResourceKind::Projects,
            Action::Update,
            &project.name,
        )?;
        policy::normalize_policies(&mut project.spec);
        validation::validate_project(&project, self.schedules.as_ref())?;

        let _guard = self.locks.lock(&project.name).await;

        let old = self.fetch(&project.name).await?;

        let checks = cascade::update_checks(&old.spec, &project.spec);
        cascade::authorize(self.enforcer.as_ref(), identity, &checks)?;

        if old.spec.destinations != project.spec.destinations
            || old.spec.source_repos != project.spec.source_repos
        {
            let apps = self.applications(&project.name).await?;
            validation::impact::assess(&old.spec, &project.spec, &apps).into_result()?;
        }

        self.store
            .update_project(project)
            .await
            .map_err(|err| project_error(&old.name, err))
    }

    /// Delete a project that no application references.
    pub async fn delete(&self, identity: &Identity, name: &str) -> Result<()> {
        if name == DEFAULT_PROJECT {
            return Err(Error::InvalidArgument(format!(
                "name '{name}' is reserved and cannot be deleted"
            )));
        }
        authz::ensure(
            self.enforcer.as_ref(),
            identity,
            ResourceKind::Projects,
            Action::Delete,
            name,
        )?;

        let _guard = self.locks.lock(name).await;

        let project = self.fetch(name).await?;
        let apps = self.applications(&project.name).await?;
        if !apps.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "project is referenced by {} applications",
                apps.len()
            )));
        }

        self.store
            .delete_project(name)
            .await
            .map_err(|err| project_error(name, err))
    }

    /// Mint a credential for a project role and return it signed.
    pub async fn create_token(
        &self,
        identity: &Identity,
        request: &TokenCreateRequest,
    ) -> Result<TokenResponse> {
        let project = self.fetch(&request.project).await?;
        let role = project.role(&request.role)?;
        self.ensure_token_access(identity, &project, role)?;

        let _guard = self.locks.lock(&request.project).await;

        // Re-read under the lock; the copy used for the access decision
        // may already be stale.
        let mut project = self.fetch(&request.project).await?;
        let record = tokens::mint(
            &mut project,
            &request.role,
            request.id.as_deref(),
            request.expires_in,
            Utc::now(),
        )?;

        self.store
            .update_project(project)
            .await
            .map_err(|err| project_error(&request.project, err))?;

        let subject = tokens::token_subject(&request.project, &request.role);
        let token = self
            .issuer
            .sign(&subject, &record)
            .await
            .map_err(|err| Error::Internal(err.to_string()))?;

        Ok(TokenResponse { token })
    }

    /// Revoke a minted credential.
    ///
    /// Revoking a token, or a whole role, that is already gone succeeds
    /// without a write.
    pub async fn delete_token(
        &self,
        identity: &Identity,
        request: &TokenDeleteRequest,
    ) -> Result<()> {
        let project = self.fetch(&request.project).await?;
        let Ok(role) = project.role(&request.role) else {
            return Ok(());
        };
        self.ensure_token_access(identity, &project, role)?;

        let _guard = self.locks.lock(&request.project).await;

        let mut project = self.fetch(&request.project).await?;
        if !tokens::remove(
            &mut project,
            &request.role,
            request.issued_at,
            request.id.as_deref(),
        ) {
            return Ok(());
        }

        self.store
            .update_project(project)
            .await
            .map_err(|err| project_error(&request.project, err))?;
        Ok(())
    }

    /// Report which of a project's sync windows are active right now.
    pub async fn sync_windows_state(
        &self,
        identity: &Identity,
        name: &str,
    ) -> Result<SyncWindowsState> {
        let project = self.fetch(name).await?;
        authz::ensure(
            self.enforcer.as_ref(),
            identity,
            ResourceKind::Projects,
            Action::Get,
            &project.name,
        )?;
        Ok(windows::active(
            &project.spec.sync_windows,
            self.schedules.as_ref(),
            Utc::now(),
        ))
    }

    /// Corrective pass run at startup: re-mirror every project's token
    /// projection and persist the ones that drifted.
    ///
    /// A conflicted write is retried with a fresh read; exhausting the
    /// attempts fails the pass. Any other store failure skips just that
    /// project.
    pub async fn normalize_projects(&self) -> Result<()> {
        let projects = self
            .store
            .list_projects()
            .await
            .map_err(|err| Error::Internal(err.to_string()))?;

        for project in projects {
            let name = project.name.clone();
            match self.normalize_one(project).await {
                Ok(()) => {}
                Err(error @ Error::Conflict(_)) => return Err(error),
                Err(error) => {
                    warn!(project = %name, %error, "skipping project that failed to normalize");
                }
            }
        }
        Ok(())
    }

    async fn normalize_one(&self, mut project: Project) -> Result<()> {
        let name = project.name.clone();
        let mut attempts = NORMALIZE_ATTEMPTS;
        loop {
            if !tokens::normalize(&mut project) {
                return Ok(());
            }
            match self.store.update_project(project.clone()).await {
                Ok(_) => {
                    info!(project = %name, "repaired token projection");
                    return Ok(());
                }
                Err(StoreError::Conflict(message)) => {
                    attempts -= 1;
                    if attempts == 0 {
                        return Err(Error::Conflict(message));
                    }
                    // The write lost a race; redo the projection on top of
                    // the winner.
                    debug!(project = %name, attempts, "normalize write conflicted, retrying");
                    project = self.fetch(&name).await?;
                }
                Err(err) => return Err(project_error(&name, err)),
            }
        }
    }

    /// Token management needs `projects:update`; failing that, members of
    /// the role's bound groups may still manage that role's own tokens.
    fn ensure_token_access(
        &self,
        identity: &Identity,
        project: &Project,
        role: &ProjectRole,
    ) -> Result<()> {
        let check = authz::ensure(
            self.enforcer.as_ref(),
            identity,
            ResourceKind::Projects,
            Action::Update,
            &project.name,
        );
        if check.is_err() && identity.is_member_of(&role.groups) {
            return Ok(());
        }
        check
    }

    async fn fetch(&self, name: &str) -> Result<Project> {
        self.store
            .get_project(name)
            .await
            .map_err(|err| project_error(name, err))
    }

    async fn applications(&self, project: &str) -> Result<Vec<Application>> {
        self.store
            .list_applications(project)
            .await
            .map_err(|err| project_error(project, err))
    }
}

/// Map a store failure to the caller-facing taxonomy, naming the project
/// for the lookups that missed.
fn project_error(name: &str, err: StoreError) -> Error {
    match err {
        StoreError::NotFound => Error::NotFound(format!("project '{name}' not found")),
        StoreError::AlreadyExists => {
            Error::AlreadyExists(format!("project '{name}' already exists"))
        }
        StoreError::Conflict(message) => Error::Conflict(message),
        StoreError::Internal(message) => Error::Internal(message),
    }
}
