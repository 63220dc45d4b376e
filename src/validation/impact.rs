//! Blast-radius check for project updates.
//!
//! After an update clears the authorization cascade it must not strand
//! applications that were in good standing. Coverage is assessed twice per
//! application, once under the old spec and once under the new one; only
//! applications the old spec covered can count against the update.

use crate::error::{Error, Result};
use crate::glob;
use crate::models::{AppDestination, Application, ApplicationSource, ProjectSpec};

/// Applications stranded by a prospective update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImpactSummary {
    pub invalid_destinations: usize,
    pub invalid_sources: usize,
}

impl ImpactSummary {
    /// Convert a non-empty impact into the update-blocking rejection.
    /// Stranded destinations win over stranded sources; at most one
    /// message is ever produced.
    pub fn into_result(self) -> Result<()> {
        if self.invalid_destinations > 0 {
            return Err(Error::InvalidArgument(format!(
                "as a result of project update {} applications destination became invalid",
                self.invalid_destinations
            )));
        }
        if self.invalid_sources > 0 {
            return Err(Error::InvalidArgument(format!(
                "as a result of project update {} applications source became invalid",
                self.invalid_sources
            )));
        }
        Ok(())
    }
}

/// Count the applications that moving from `old` to `new` would strand.
pub fn assess(old: &ProjectSpec, new: &ProjectSpec, apps: &[Application]) -> ImpactSummary {
    let mut summary = ImpactSummary::default();

    for app in apps {
        if destination_permitted(old, &app.destination)
            && !destination_permitted(new, &app.destination)
        {
            summary.invalid_destinations += 1;
        }
        if sources_permitted(old, &app.sources) && !sources_permitted(new, &app.sources) {
            summary.invalid_sources += 1;
        }
    }

    summary
}

/// A destination is covered when some entry matches the namespace and the
/// axis the application actually uses, server URL or cluster name.
fn destination_permitted(spec: &ProjectSpec, dest: &AppDestination) -> bool {
    spec.destinations.iter().any(|pattern| {
        let server_matched = !dest.server.is_empty() && glob::matches(&pattern.server, &dest.server);
        let name_matched = !dest.name.is_empty() && glob::matches(&pattern.name, &dest.name);
        (server_matched || name_matched) && glob::matches(&pattern.namespace, &dest.namespace)
    })
}

/// Every source repository must match at least one pattern.
fn sources_permitted(spec: &ProjectSpec, sources: &[ApplicationSource]) -> bool {
    sources.iter().all(|source| {
        spec.source_repos
            .iter()
            .any(|pattern| glob::matches(pattern, &source.repo_url))
    })
}
