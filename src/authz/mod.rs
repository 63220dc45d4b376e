//! Authorization primitives for project governance.
//!
//! Decisions run in two layers:
//! 1. A base grant on the project itself (`projects:<action>`), evaluated
//!    through the caller-supplied [`Enforcer`].
//! 2. For updates, escalated per-target grants derived from what the new
//!    spec actually changes (see [`cascade`]).
//!
//! Policy storage and evaluation live with the platform; this crate only
//! states which checks must pass and in which order.

pub mod cascade;

use std::fmt;

use crate::error::{Error, Result};

/// The caller on whose behalf an operation runs.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    /// Authenticated subject, `None` for anonymous callers.
    pub subject: Option<String>,
    /// Group claims carried by the caller's credential.
    pub groups: Vec<String>,
}

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// Whether the caller carries at least one of `groups`.
    pub fn is_member_of(&self, groups: &[String]) -> bool {
        self.groups.iter().any(|group| groups.contains(group))
    }
}

/// Resource classes grant checks run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Projects,
    Clusters,
    Repositories,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Projects => "projects",
            ResourceKind::Clusters => "clusters",
            ResourceKind::Repositories => "repositories",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Get,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Get => "get",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        })
    }
}

/// Grant evaluator supplied by the embedding platform.
///
/// Evaluation is synchronous; policy material is expected to already be in
/// memory when an operation runs.
pub trait Enforcer: Send + Sync {
    fn enforce(
        &self,
        identity: &Identity,
        resource: ResourceKind,
        action: Action,
        object: &str,
    ) -> bool;
}

/// Run one grant check, converting a refusal into `PermissionDenied`.
pub fn ensure(
    enforcer: &dyn Enforcer,
    identity: &Identity,
    resource: ResourceKind,
    action: Action,
    object: &str,
) -> Result<()> {
    if enforcer.enforce(identity, resource, action, object) {
        Ok(())
    } else {
        Err(Error::denied(resource, action, object))
    }
}
