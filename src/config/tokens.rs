use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Token signing configuration.
///
/// Role tokens are signed with a symmetric key (HS256) shared by every
/// replica that mints or verifies credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSigningConfig {
    /// Symmetric signing key.
    /// Should be stored in a secrets manager and referenced via
    /// environment variable, e.g. `secret = "${BOSUN_SIGNING_SECRET}"`.
    #[serde(default)]
    pub secret: String,

    /// Value written to (and required in) the `iss` claim.
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

impl std::fmt::Debug for TokenSigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigningConfig")
            .field("secret", &"****")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl Default for TokenSigningConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: default_issuer(),
        }
    }
}

impl TokenSigningConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::Validation(
                "Token signing secret cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_issuer() -> String {
    "bosun".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let config = TokenSigningConfig {
            secret: "super-secret-signing-key".to_string(),
            issuer: default_issuer(),
        };

        let debug_output = format!("{config:?}");
        assert!(
            !debug_output.contains("super-secret-signing-key"),
            "Debug output must NOT contain the signing secret"
        );
        assert!(debug_output.contains("****"));
    }

    #[test]
    fn validate_rejects_empty_secret() {
        let config = TokenSigningConfig::default();
        assert!(config.validate().is_err());

        let config = TokenSigningConfig {
            secret: "k".to_string(),
            ..TokenSigningConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
