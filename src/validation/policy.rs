//! Role policy grammar.
//!
//! A policy is a six-field CSV rule:
//!
//! ```text
//! p, proj:<project>:<role>, applications, get, <project>/*, allow
//! ```
//!
//! Rules are stored in canonical spacing (see [`normalize`]) so that
//! textual equality doubles as semantic equality for duplicate detection.
//! Resource and action fields are free-form; the consuming policy engine
//! owns their vocabulary.

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::ProjectSpec;
use crate::tokens::token_subject;

/// Canonicalize a rule's spacing: the marker field is kept verbatim, every
/// later field is trimmed, and fields are joined with a comma and a single
/// space.
pub fn normalize(policy: &str) -> String {
    let mut fields = policy.split(',');
    let mut normalized = fields.next().unwrap_or_default().to_string();
    for field in fields {
        normalized.push_str(", ");
        normalized.push_str(field.trim());
    }
    normalized
}

/// Canonicalize every role policy in place.
pub fn normalize_policies(spec: &mut ProjectSpec) {
    for role in &mut spec.roles {
        for policy in &mut role.policies {
            *policy = normalize(policy);
        }
    }
}

/// Check one rule against the grammar for `role` in `project`.
///
/// # Errors
///
/// `InvalidArgument` quoting the rule and the first violated constraint.
pub fn validate(project: &str, role: &str, policy: &str) -> Result<()> {
    let fields: Vec<&str> = policy.split(',').collect();
    if fields.len() != 6 || fields[0].trim() != "p" {
        return Err(invalid(
            policy,
            "must be of the form: 'p, sub, res, act, obj, eft'",
        ));
    }

    let subject = fields[1].trim();
    let expected_subject = token_subject(project, role);
    if subject != expected_subject {
        return Err(invalid(
            policy,
            format!("policy subject must be: '{expected_subject}'"),
        ));
    }

    let object = fields[4].trim();
    if !object_permitted(project, object) {
        return Err(invalid(
            policy,
            format!(
                "object must be of form '{project}/*', '{project}[/<NAMESPACE>]/<APPNAME>' \
                 or '{project}/<APPNAME>'"
            ),
        ));
    }

    let effect = fields[5].trim();
    if effect != "allow" && effect != "deny" {
        return Err(invalid(policy, "effect must be: 'allow' or 'deny'"));
    }

    Ok(())
}

/// Objects are scoped to the owning project: `<project>/<app>` with an
/// optional namespace segment, where segments allow `*`, word characters,
/// dots, and dashes. The project name is taken literally.
fn object_permitted(project: &str, object: &str) -> bool {
    let pattern = format!(r"^{}/[*\w.-]+(/[*\w.-]+)?$", regex::escape(project));
    match Regex::new(&pattern) {
        Ok(regex) => regex.is_match(object),
        Err(_) => false,
    }
}

fn invalid(policy: &str, reason: impl std::fmt::Display) -> Error {
    Error::InvalidArgument(format!("invalid policy rule '{policy}': {reason}"))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::models::ProjectRole;

    #[rstest]
    #[case::already_canonical(
        "p, proj:alpha:ci, applications, get, alpha/*, allow",
        "p, proj:alpha:ci, applications, get, alpha/*, allow"
    )]
    #[case::crushed(
        "p,proj:alpha:ci,applications,get,alpha/*,allow",
        "p, proj:alpha:ci, applications, get, alpha/*, allow"
    )]
    #[case::ragged(
        "p ,  proj:alpha:ci ,applications,   get,alpha/* ,allow ",
        "p , proj:alpha:ci, applications, get, alpha/*, allow"
    )]
    #[case::no_commas("p", "p")]
    fn normalization_is_spacing_insensitive(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn normalization_is_idempotent() {
        let canonical = normalize("p,proj:alpha:ci,applications,get,alpha/*,allow");
        assert_eq!(normalize(&canonical), canonical);
    }

    #[test]
    fn normalize_policies_covers_every_role() {
        let mut spec = ProjectSpec {
            roles: vec![
                ProjectRole {
                    name: "ci".to_string(),
                    policies: vec!["p,proj:alpha:ci,applications,get,alpha/*,allow".to_string()],
                    ..ProjectRole::default()
                },
                ProjectRole {
                    name: "ops".to_string(),
                    policies: vec![
                        "p,  proj:alpha:ops, applications, sync,alpha/*,allow".to_string(),
                    ],
                    ..ProjectRole::default()
                },
            ],
            ..ProjectSpec::default()
        };

        normalize_policies(&mut spec);

        assert_eq!(
            spec.roles[0].policies[0],
            "p, proj:alpha:ci, applications, get, alpha/*, allow"
        );
        assert_eq!(
            spec.roles[1].policies[0],
            "p, proj:alpha:ops, applications, sync, alpha/*, allow"
        );
    }

    #[rstest]
    #[case::wildcard("alpha/*")]
    #[case::app("alpha/guestbook")]
    #[case::namespaced("alpha/prod/guestbook")]
    #[case::dotted("alpha/team.app-v2")]
    #[case::wildcard_namespace("alpha/*/guestbook")]
    fn accepts_well_formed_rules(#[case] object: &str) {
        let policy = format!("p, proj:alpha:ci, applications, get, {object}, allow");
        assert!(validate("alpha", "ci", &policy).is_ok());
    }

    #[test]
    fn accepts_unnormalized_spacing() {
        assert!(validate("alpha", "ci", "p,proj:alpha:ci,applications,get,alpha/*,allow").is_ok());
    }

    #[rstest]
    #[case::five_fields(
        "p, proj:alpha:ci, applications, get, allow",
        "must be of the form: 'p, sub, res, act, obj, eft'"
    )]
    #[case::seven_fields(
        "p, proj:alpha:ci, applications, get, alpha/*, allow, extra",
        "must be of the form: 'p, sub, res, act, obj, eft'"
    )]
    #[case::wrong_marker(
        "g, proj:alpha:ci, applications, get, alpha/*, allow",
        "must be of the form: 'p, sub, res, act, obj, eft'"
    )]
    #[case::foreign_subject(
        "p, proj:alpha:other, applications, get, alpha/*, allow",
        "policy subject must be: 'proj:alpha:ci'"
    )]
    #[case::foreign_project_subject(
        "p, proj:beta:ci, applications, get, alpha/*, allow",
        "policy subject must be: 'proj:alpha:ci'"
    )]
    #[case::foreign_object(
        "p, proj:alpha:ci, applications, get, beta/*, allow",
        "object must be of form 'alpha/*', 'alpha[/<NAMESPACE>]/<APPNAME>' or 'alpha/<APPNAME>'"
    )]
    #[case::bare_project_object(
        "p, proj:alpha:ci, applications, get, alpha, allow",
        "object must be of form 'alpha/*', 'alpha[/<NAMESPACE>]/<APPNAME>' or 'alpha/<APPNAME>'"
    )]
    #[case::too_deep_object(
        "p, proj:alpha:ci, applications, get, alpha/a/b/c, allow",
        "object must be of form 'alpha/*', 'alpha[/<NAMESPACE>]/<APPNAME>' or 'alpha/<APPNAME>'"
    )]
    #[case::bad_effect(
        "p, proj:alpha:ci, applications, get, alpha/*, always",
        "effect must be: 'allow' or 'deny'"
    )]
    fn rejects_malformed_rules(#[case] policy: &str, #[case] reason: &str) {
        let err = validate("alpha", "ci", policy).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("invalid policy rule '{policy}': {reason}")
        );
    }

    #[test]
    fn project_names_with_regex_metacharacters_are_literal() {
        // "alpha.beta" must not match "alphaXbeta" via an unescaped dot.
        assert!(validate(
            "alpha.beta",
            "ci",
            "p, proj:alpha.beta:ci, applications, get, alpha.beta/*, allow"
        )
        .is_ok());

        let err = validate(
            "alpha.beta",
            "ci",
            "p, proj:alpha.beta:ci, applications, get, alphaXbeta/app, allow",
        )
        .unwrap_err();
        assert!(err.to_string().contains("object must be of form"));
    }
}
