//! Anchored glob matching for destination, repository, and project patterns.

use globset::GlobBuilder;
use tracing::warn;

/// Match `value` against `pattern` over the full string.
///
/// A lone `*` matches everything, including the empty string. Any other
/// pattern is compiled with `*` spanning arbitrary runs (separators
/// included) and `?` matching exactly one character. A pattern that fails
/// to compile matches nothing.
pub fn matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let glob = match GlobBuilder::new(pattern).literal_separator(false).build() {
        Ok(glob) => glob,
        Err(error) => {
            warn!(pattern, %error, "skipping unparseable pattern");
            return false;
        }
    };

    glob.compile_matcher().is_match(value)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::wildcard_any("*", "https://kubernetes.default.svc", true)]
    #[case::wildcard_empty("*", "", true)]
    #[case::exact("https://server1", "https://server1", true)]
    #[case::exact_mismatch("https://server1", "https://server2", false)]
    #[case::prefix("https://*", "https://team.example.com", true)]
    #[case::star_spans_separators("https://*", "https://host/cluster/path", true)]
    #[case::infix("https://*.example.com", "https://cd.example.com", true)]
    #[case::infix_mismatch("https://*.example.com", "https://example.org", false)]
    #[case::anchored_prefix("server1", "https://server1", false)]
    #[case::anchored_suffix("https://server1", "https://server1/extra", false)]
    #[case::question_mark("team-?", "team-a", true)]
    #[case::question_mark_two_chars("team-?", "team-ab", false)]
    #[case::empty_pattern("", "", true)]
    #[case::empty_pattern_nonempty_value("", "x", false)]
    fn pattern_matching(#[case] pattern: &str, #[case] value: &str, #[case] expected: bool) {
        assert_eq!(matches(pattern, value), expected);
    }

    #[test]
    fn unparseable_pattern_matches_nothing() {
        assert!(!matches("[invalid", "[invalid"));
        assert!(!matches("[invalid", "anything"));
    }
}
