//! Project governance for GitOps continuous delivery.
//!
//! A *project* groups applications and draws their deploy boundaries:
//! which clusters and namespaces they may target, which repositories they
//! may draw sources from, which roles may act on them, and when syncs may
//! run. This crate owns the admission, authorization and token-lifecycle
//! rules around those documents. Durable storage, cron evaluation and
//! grant evaluation stay with the embedding platform, behind the
//! [`store::ResourceStore`], [`windows::ScheduleResolver`] and
//! [`authz::Enforcer`] seams.
//!
//! [`ProjectService`] is the front door; everything else backs it.

pub mod authz;
pub mod cache;
pub mod config;
pub mod error;
pub mod glob;
pub mod lock;
pub mod models;
pub mod services;
pub mod store;
pub mod tokens;
pub mod validation;
pub mod windows;

pub use error::{Error, Result};
pub use services::{ProjectService, TokenCreateRequest, TokenDeleteRequest, TokenResponse};
