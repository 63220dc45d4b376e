pub struct CacheKeys;

impl CacheKeys {
    /// Cached project document: project:{name}
    pub fn project(name: &str) -> String {
        format!("project:{name}")
    }

    /// Computed sync-window state for a project: project:{name}:windows
    pub fn sync_windows_state(name: &str) -> String {
        format!("project:{name}:windows")
    }

    /// Revocation marker for a minted role token: token:revoked:{id}
    ///
    /// Presence of this key means the token was deleted before its expiry
    /// and must be rejected during verification.
    pub fn token_revoked(id: &str) -> String {
        format!("token:revoked:{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_key_format() {
        assert_eq!(CacheKeys::project("test"), "project:test");
    }

    #[test]
    fn test_sync_windows_key_format() {
        assert_eq!(
            CacheKeys::sync_windows_state("test"),
            "project:test:windows"
        );
    }

    #[test]
    fn test_token_revoked_key_format() {
        assert_eq!(
            CacheKeys::token_revoked("a9e464a7-1b0c-4df2-895b-f0f3f6c2b260"),
            "token:revoked:a9e464a7-1b0c-4df2-895b-f0f3f6c2b260"
        );
    }
}
