//! Crate-wide error taxonomy for project governance operations.
//!
//! Every public operation funnels its failures into [`Error`]. The variants
//! mirror the status classes an RPC layer would map them to; the display
//! strings are part of the public contract and are matched verbatim by
//! clients and tests.

use thiserror::Error;

use crate::authz::{Action, ResourceKind};

#[derive(Debug, Error)]
pub enum Error {
    /// The caller lacks the required grant on a resource.
    #[error("permission denied: {resource}, {action}, {object}")]
    PermissionDenied {
        resource: ResourceKind,
        action: Action,
        object: String,
    },

    /// The request is structurally or semantically invalid.
    #[error("{0}")]
    InvalidArgument(String),

    /// The named project, role, or token does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("{0}")]
    AlreadyExists(String),

    /// An optimistic-concurrency precondition failed.
    #[error("{0}")]
    Conflict(String),

    /// A collaborator failed in a way the caller cannot correct.
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Build a `PermissionDenied` for a failed grant check.
    pub fn denied(resource: ResourceKind, action: Action, object: impl Into<String>) -> Self {
        Error::PermissionDenied {
            resource,
            action,
            object: object.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
