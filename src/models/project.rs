use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the implicit project that adopts otherwise unassigned
/// applications. It cannot be deleted.
pub const DEFAULT_PROJECT: &str = "default";

/// A governed grouping of applications with its own deploy boundaries,
/// roles, and sync windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    /// Optimistic-concurrency token maintained by the store. `0` on a fresh
    /// object means "no precondition".
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub spec: ProjectSpec,
    #[serde(default)]
    pub status: ProjectStatus,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_version: 0,
            spec: ProjectSpec::default(),
            status: ProjectStatus::default(),
        }
    }

    /// Look up a role by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the project declares no such role.
    pub fn role(&self, role_name: &str) -> Result<&ProjectRole> {
        self.spec
            .roles
            .iter()
            .find(|role| role.name == role_name)
            .ok_or_else(|| Error::NotFound(self.missing_role(role_name)))
    }

    pub fn role_mut(&mut self, role_name: &str) -> Result<&mut ProjectRole> {
        let message = self.missing_role(role_name);
        self.spec
            .roles
            .iter_mut()
            .find(|role| role.name == role_name)
            .ok_or(Error::NotFound(message))
    }

    fn missing_role(&self, role_name: &str) -> String {
        format!(
            "role '{role_name}' does not exist in project '{}'",
            self.name
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    /// Deploy-target patterns applications in this project may use.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<Destination>,
    /// Repository URL patterns applications may draw sources from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_repos: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<ProjectRole>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_resource_whitelist: Vec<GroupKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespace_resource_blacklist: Vec<GroupKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sync_windows: Vec<SyncWindow>,
}

/// A deploy-target pattern. Any field may hold a glob; empty fields are
/// treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

impl Destination {
    /// The cluster this destination addresses, for grant checks: the server
    /// URL when set, the cluster name otherwise.
    pub fn target(&self) -> &str {
        if self.server.is_empty() {
            &self.name
        } else {
            &self.server
        }
    }
}

/// Kubernetes group/kind pair used in resource allow and deny lists. The
/// contents are opaque here; changing a list is what matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupKind {
    #[serde(default)]
    pub group: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRole {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Access rules in the `p, subject, resource, action, object, effect`
    /// grammar.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
    /// External identity groups allowed to manage this role's own tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jwt_tokens: Vec<JwtToken>,
}

impl ProjectRole {
    /// Position of a token, preferring an id match and falling back to the
    /// issue timestamp for tokens minted before ids existed.
    pub fn token_index(&self, issued_at: i64, id: Option<&str>) -> Option<usize> {
        if let Some(id) = id
            && let Some(index) = self
                .jwt_tokens
                .iter()
                .position(|token| token.id.as_deref() == Some(id))
        {
            return Some(index);
        }
        self.jwt_tokens
            .iter()
            .position(|token| token.issued_at == issued_at)
    }
}

/// Record of one credential minted for a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtToken {
    /// Issue time in unix seconds. Doubles as the token key for clients
    /// that predate ids.
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    /// Read-side projection of `spec.roles[*].jwt_tokens`, keyed by role
    /// name. Maintained on every token mutation and by the normalize pass.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub jwt_tokens_by_role: BTreeMap<String, Vec<JwtToken>>,
}

/// Recurring allow or deny span controlling when syncs may run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncWindow {
    #[serde(default)]
    pub kind: SyncWindowKind,
    /// Cron expression for the window's start.
    pub schedule: String,
    /// Window length in `humantime` form, e.g. `1h` or `30m`.
    pub duration: String,
    #[serde(default)]
    pub manual_sync: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncWindowKind {
    #[default]
    Allow,
    Deny,
}

impl std::fmt::Display for SyncWindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncWindowKind::Allow => write!(f, "allow"),
            SyncWindowKind::Deny => write!(f, "deny"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role_with_tokens(tokens: Vec<JwtToken>) -> ProjectRole {
        ProjectRole {
            name: "ci".to_string(),
            jwt_tokens: tokens,
            ..ProjectRole::default()
        }
    }

    #[test]
    fn role_lookup_reports_project_and_role() {
        let project = Project::new("alpha");
        let err = project.role("deployer").unwrap_err();
        assert_eq!(
            err.to_string(),
            "role 'deployer' does not exist in project 'alpha'"
        );
    }

    #[test]
    fn token_index_prefers_id_over_timestamp() {
        let role = role_with_tokens(vec![
            JwtToken {
                issued_at: 100,
                expires_at: None,
                id: Some("a".to_string()),
            },
            JwtToken {
                issued_at: 200,
                expires_at: None,
                id: Some("b".to_string()),
            },
        ]);

        // The id wins even when the timestamp points at another entry.
        assert_eq!(role.token_index(100, Some("b")), Some(1));
        assert_eq!(role.token_index(200, None), Some(1));
    }

    #[test]
    fn token_index_falls_back_to_timestamp_for_unknown_id() {
        let role = role_with_tokens(vec![JwtToken {
            issued_at: 100,
            expires_at: None,
            id: None,
        }]);

        assert_eq!(role.token_index(100, Some("missing")), Some(0));
        assert_eq!(role.token_index(999, Some("missing")), None);
    }

    #[test]
    fn destination_target_prefers_server() {
        let by_server = Destination {
            server: "https://server1".to_string(),
            name: "in-cluster".to_string(),
            namespace: "*".to_string(),
        };
        assert_eq!(by_server.target(), "https://server1");

        let by_name = Destination {
            server: String::new(),
            name: "in-cluster".to_string(),
            namespace: "*".to_string(),
        };
        assert_eq!(by_name.target(), "in-cluster");
    }

    #[test]
    fn wire_format_uses_camel_case_and_claim_names() {
        let project = Project {
            name: "alpha".to_string(),
            resource_version: 3,
            spec: ProjectSpec {
                source_repos: vec!["https://github.com/org/*".to_string()],
                roles: vec![role_with_tokens(vec![JwtToken {
                    issued_at: 100,
                    expires_at: Some(200),
                    id: Some("t1".to_string()),
                }])],
                ..ProjectSpec::default()
            },
            status: ProjectStatus::default(),
        };

        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["resourceVersion"], 3);
        assert_eq!(json["spec"]["sourceRepos"][0], "https://github.com/org/*");
        assert_eq!(json["spec"]["roles"][0]["jwtTokens"][0]["iat"], 100);
        assert_eq!(json["spec"]["roles"][0]["jwtTokens"][0]["exp"], 200);
        // Empty collections stay off the wire.
        assert!(json["spec"].get("destinations").is_none());
        assert!(json["status"].get("jwtTokensByRole").is_none());
    }

    #[test]
    fn sync_window_kind_defaults_to_allow() {
        let window: SyncWindow = serde_json::from_value(serde_json::json!({
            "schedule": "* * * * *",
            "duration": "1h",
        }))
        .unwrap();
        assert_eq!(window.kind, SyncWindowKind::Allow);
        assert!(!window.manual_sync);
    }
}
