//! Role token lifecycle.
//!
//! Tokens are not stored server-side as opaque secrets; the project
//! document itself records `{iat, exp?, id?}` for every credential minted
//! against a role, and `status.jwt_tokens_by_role` mirrors those records
//! for read-side consumers. Signing and verification live behind
//! [`CredentialIssuer`].

mod issuer;

pub use issuer::{CredentialIssuer, IssuerError, JwtIssuer, TokenClaims};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{JwtToken, Project};

/// Subject naming a project role: `proj:<project>:<role>`. The same string
/// serves as the policy-rule subject and the token `sub` claim.
pub fn token_subject(project: &str, role: &str) -> String {
    format!("proj:{project}:{role}")
}

/// Record a new token against `role_name`.
///
/// A caller-supplied id must be unused within the role; without one a v4
/// uuid is generated. `expires_in` is in seconds, with zero or negative
/// values minting a non-expiring token.
///
/// # Errors
///
/// `NotFound` when the role does not exist, `InvalidArgument` when the
/// supplied id collides.
pub fn mint(
    project: &mut Project,
    role_name: &str,
    id: Option<&str>,
    expires_in: i64,
    now: DateTime<Utc>,
) -> Result<JwtToken> {
    let role = project.role_mut(role_name)?;

    let id = match id {
        Some(id) => {
            let used = role
                .jwt_tokens
                .iter()
                .any(|token| token.id.as_deref() == Some(id));
            if used {
                return Err(Error::InvalidArgument(format!(
                    "token id '{id}' has been used"
                )));
            }
            id.to_string()
        }
        None => Uuid::new_v4().to_string(),
    };

    let issued_at = now.timestamp();
    let token = JwtToken {
        issued_at,
        expires_at: (expires_in > 0).then(|| issued_at + expires_in),
        id: Some(id),
    };

    role.jwt_tokens.push(token.clone());
    mirror_role(project, role_name);
    Ok(token)
}

/// Remove one token record, returning whether anything was removed.
///
/// An id match wins over the issue timestamp; the timestamp is the
/// fallback for records minted before ids existed. Removal swaps the last
/// entry into the vacated slot. A missing role or token is not an error.
pub fn remove(project: &mut Project, role_name: &str, issued_at: i64, id: Option<&str>) -> bool {
    let Ok(role) = project.role_mut(role_name) else {
        return false;
    };
    let Some(index) = role.token_index(issued_at, id) else {
        return false;
    };

    role.jwt_tokens.swap_remove(index);
    mirror_role(project, role_name);
    true
}

/// Rebuild the status projection from spec, dropping entries for roles
/// that no longer exist. Returns whether the document changed.
pub fn normalize(project: &mut Project) -> bool {
    let projection: std::collections::BTreeMap<_, _> = project
        .spec
        .roles
        .iter()
        .map(|role| (role.name.clone(), role.jwt_tokens.clone()))
        .collect();

    if projection == project.status.jwt_tokens_by_role {
        return false;
    }
    project.status.jwt_tokens_by_role = projection;
    true
}

fn mirror_role(project: &mut Project, role_name: &str) {
    if let Ok(role) = project.role(role_name) {
        let tokens = role.jwt_tokens.clone();
        project
            .status
            .jwt_tokens_by_role
            .insert(role_name.to_string(), tokens);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::ProjectRole;

    fn project_with_role(name: &str) -> Project {
        let mut project = Project::new("alpha");
        project.spec.roles.push(ProjectRole {
            name: name.to_string(),
            ..ProjectRole::default()
        });
        project
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, 10, 0, 0).unwrap()
    }

    #[test]
    fn minting_records_spec_entry_and_projection() {
        let mut project = project_with_role("ci");
        let token = mint(&mut project, "ci", None, 0, now()).unwrap();

        assert_eq!(token.issued_at, now().timestamp());
        assert_eq!(token.expires_at, None);
        // Server-generated ids are uuids.
        let id = token.id.as_deref().unwrap();
        assert!(Uuid::parse_str(id).is_ok());

        assert_eq!(project.spec.roles[0].jwt_tokens, vec![token.clone()]);
        assert_eq!(project.status.jwt_tokens_by_role["ci"], vec![token]);
    }

    #[test]
    fn positive_expiry_sets_expiration() {
        let mut project = project_with_role("ci");
        let token = mint(&mut project, "ci", None, 3600, now()).unwrap();
        assert_eq!(token.expires_at, Some(now().timestamp() + 3600));
    }

    #[test]
    fn supplied_id_is_kept_and_guarded_against_reuse() {
        let mut project = project_with_role("ci");
        let token = mint(&mut project, "ci", Some("release-1"), 0, now()).unwrap();
        assert_eq!(token.id.as_deref(), Some("release-1"));

        let err = mint(&mut project, "ci", Some("release-1"), 0, now()).unwrap_err();
        assert_eq!(err.to_string(), "token id 'release-1' has been used");
    }

    #[test]
    fn same_id_on_another_role_is_allowed() {
        let mut project = project_with_role("ci");
        project.spec.roles.push(ProjectRole {
            name: "ops".to_string(),
            ..ProjectRole::default()
        });

        mint(&mut project, "ci", Some("shared"), 0, now()).unwrap();
        assert!(mint(&mut project, "ops", Some("shared"), 0, now()).is_ok());
    }

    #[test]
    fn minting_against_unknown_role_fails() {
        let mut project = project_with_role("ci");
        let err = mint(&mut project, "ops", None, 0, now()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "role 'ops' does not exist in project 'alpha'"
        );
    }

    #[test]
    fn removal_prefers_id_and_swaps_the_last_entry_in() {
        let mut project = project_with_role("ci");
        let first = mint(&mut project, "ci", Some("a"), 0, now()).unwrap();
        let second = mint(&mut project, "ci", Some("b"), 0, now()).unwrap();
        let third = mint(&mut project, "ci", Some("c"), 0, now()).unwrap();

        // All three share the same iat; only the id can select "a".
        assert!(remove(&mut project, "ci", first.issued_at, Some("a")));

        let remaining = &project.spec.roles[0].jwt_tokens;
        assert_eq!(remaining, &vec![third, second]);
        assert_eq!(project.status.jwt_tokens_by_role["ci"], *remaining);
    }

    #[test]
    fn removal_falls_back_to_issue_time() {
        let mut project = project_with_role("ci");
        let token = mint(&mut project, "ci", None, 0, now()).unwrap();

        assert!(remove(
            &mut project,
            "ci",
            token.issued_at,
            Some("no-such-id")
        ));
        assert!(project.spec.roles[0].jwt_tokens.is_empty());
    }

    #[test]
    fn removal_of_absent_token_or_role_is_a_noop() {
        let mut project = project_with_role("ci");
        mint(&mut project, "ci", Some("a"), 0, now()).unwrap();

        assert!(!remove(&mut project, "ci", 12345, Some("zzz")));
        assert!(!remove(&mut project, "ops", 12345, None));
        assert_eq!(project.spec.roles[0].jwt_tokens.len(), 1);
    }

    #[test]
    fn normalize_overwrites_stale_projection_entries() {
        let mut project = project_with_role("ci");
        mint(&mut project, "ci", Some("a"), 0, now()).unwrap();

        // Simulate drift: a stale list and an orphaned role entry.
        project
            .status
            .jwt_tokens_by_role
            .insert("ci".to_string(), Vec::new());
        project
            .status
            .jwt_tokens_by_role
            .insert("removed-role".to_string(), Vec::new());

        assert!(normalize(&mut project));
        assert_eq!(
            project.status.jwt_tokens_by_role.keys().collect::<Vec<_>>(),
            vec!["ci"]
        );
        assert_eq!(
            project.status.jwt_tokens_by_role["ci"],
            project.spec.roles[0].jwt_tokens
        );

        // Converged documents report no change.
        assert!(!normalize(&mut project));
    }
}
