//! Delta-driven escalation for project updates.
//!
//! Holding `projects:update` is not enough to widen a project's reach. When
//! an update changes where applications may deploy, the caller must also
//! hold `clusters:update` on every destination target the change touches;
//! when it changes where sources may come from, `repositories:update` on
//! every repository URL involved. Checks cover the union of old and new
//! values so that narrowing a boundary is gated exactly like widening it.

use super::{Action, Enforcer, Identity, ResourceKind};
use crate::error::{Error, Result};
use crate::models::ProjectSpec;

/// One escalated grant an update must pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCheck {
    pub resource: ResourceKind,
    pub action: Action,
    pub object: String,
}

/// Derive the escalated checks an update from `old` to `new` requires.
///
/// Cluster checks come first, one per destination target in the union of
/// both specs, old entries before new, duplicates dropped. Repository
/// checks follow in the same order scheme. An update that changes neither
/// deploy reach nor source reach yields no checks.
pub fn update_checks(old: &ProjectSpec, new: &ProjectSpec) -> Vec<AccessCheck> {
    let mut checks = Vec::new();

    if cluster_reach_changed(old, new) {
        let old_targets = old.destinations.iter().map(|dest| dest.target());
        let new_targets = new.destinations.iter().map(|dest| dest.target());
        for target in ordered_union(old_targets, new_targets) {
            checks.push(AccessCheck {
                resource: ResourceKind::Clusters,
                action: Action::Update,
                object: target,
            });
        }
    }

    if old.source_repos != new.source_repos {
        let old_repos = old.source_repos.iter().map(String::as_str);
        let new_repos = new.source_repos.iter().map(String::as_str);
        for repo in ordered_union(old_repos, new_repos) {
            checks.push(AccessCheck {
                resource: ResourceKind::Repositories,
                action: Action::Update,
                object: repo,
            });
        }
    }

    checks
}

/// Evaluate `checks` in order, stopping at the first refusal.
pub fn authorize(
    enforcer: &dyn Enforcer,
    identity: &Identity,
    checks: &[AccessCheck],
) -> Result<()> {
    for check in checks {
        if !enforcer.enforce(identity, check.resource, check.action, &check.object) {
            return Err(Error::denied(
                check.resource,
                check.action,
                check.object.clone(),
            ));
        }
    }
    Ok(())
}

/// Resource allow and deny lists count as deploy-reach changes even though
/// their contents never appear in a check object.
fn cluster_reach_changed(old: &ProjectSpec, new: &ProjectSpec) -> bool {
    old.destinations != new.destinations
        || old.cluster_resource_whitelist != new.cluster_resource_whitelist
        || old.namespace_resource_blacklist != new.namespace_resource_blacklist
}

fn ordered_union<'a>(
    old: impl Iterator<Item = &'a str>,
    new: impl Iterator<Item = &'a str>,
) -> Vec<String> {
    let mut union: Vec<String> = Vec::new();
    for item in old.chain(new) {
        if !union.iter().any(|existing| existing == item) {
            union.push(item.to_string());
        }
    }
    union
}
