//! Admission validation for project documents.
//!
//! Every create and update passes through [`validate_project`] before
//! anything is persisted. Validation walks the spec in document order and
//! stops at the first offence:
//!
//! 1. Duplicate destinations (`server/namespace` key)
//! 2. Duplicate source repositories
//! 3. Roles: duplicate names, name charset, per-role duplicate policies,
//!    policy grammar (see [`policy`])
//! 4. Sync windows: duplicate `kind:schedule:duration` triples, schedule
//!    and duration parseability
//!
//! Rejections report the offending value verbatim; nothing is mutated.

pub mod impact;
pub mod policy;

use std::collections::HashSet;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::Project;
use crate::windows::ScheduleResolver;

static ROLE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([-_a-zA-Z0-9]*[a-zA-Z0-9])?$").unwrap()
});

/// Check a project document for admission.
///
/// # Errors
///
/// `InvalidArgument` or `AlreadyExists` naming the first offending value.
pub fn validate_project(project: &Project, schedules: &dyn ScheduleResolver) -> Result<()> {
    let mut destinations = HashSet::new();
    for dest in &project.spec.destinations {
        let key = format!("{}/{}", dest.server, dest.namespace);
        if !destinations.insert(key.clone()) {
            return Err(Error::InvalidArgument(format!(
                "destination '{key}' already added"
            )));
        }
    }

    let mut repos = HashSet::new();
    for repo in &project.spec.source_repos {
        if !repos.insert(repo.as_str()) {
            return Err(Error::InvalidArgument(format!(
                "source repository '{repo}' already added"
            )));
        }
    }

    let mut role_names = HashSet::new();
    for role in &project.spec.roles {
        if !role_names.insert(role.name.as_str()) {
            return Err(Error::AlreadyExists(format!(
                "role '{}' already exists",
                role.name
            )));
        }
        validate_role_name(&role.name)?;

        let mut policies = HashSet::new();
        for rule in &role.policies {
            if !policies.insert(rule.as_str()) {
                return Err(Error::AlreadyExists(format!(
                    "policy '{rule}' already exists for role '{}'",
                    role.name
                )));
            }
            policy::validate(&project.name, &role.name, rule)?;
        }
    }

    let mut windows = HashSet::new();
    let now = Utc::now();
    for window in &project.spec.sync_windows {
        let key = format!("{}:{}:{}", window.kind, window.schedule, window.duration);
        if !windows.insert(key) {
            return Err(Error::AlreadyExists(format!(
                "window '{}':'{}':'{}' already exists",
                window.kind, window.schedule, window.duration
            )));
        }
        if let Err(err) = schedules.next_occurrence(&window.schedule, now) {
            return Err(Error::InvalidArgument(err.to_string()));
        }
        if let Err(err) = humantime::parse_duration(&window.duration) {
            return Err(Error::InvalidArgument(format!(
                "cannot parse duration '{}': {err}",
                window.duration
            )));
        }
    }

    Ok(())
}

fn validate_role_name(name: &str) -> Result<()> {
    if ROLE_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "invalid role name '{name}'. Must consist of alphanumeric characters, '-' or '_' \
             and must start and end with an alphanumeric character"
        )))
    }
}
