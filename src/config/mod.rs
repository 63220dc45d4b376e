//! Configuration module for the governance engine.
//!
//! The engine is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [signing]
//! secret = "${BOSUN_SIGNING_SECRET}"
//! issuer = "bosun"
//!
//! [cache]
//! type = "redis"
//! url = "redis://localhost:6379/0"
//! ```

mod cache;
mod tokens;

use std::path::Path;

pub use cache::*;
use serde::{Deserialize, Serialize};
pub use tokens::*;

/// Root configuration for the governance engine.
///
/// This struct represents the complete configuration file. All sections
/// have defaults, but a signing secret must be supplied before the engine
/// can mint role tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BosunConfig {
    /// Role-token signing configuration.
    #[serde(default)]
    pub signing: TokenSigningConfig,

    /// Cache configuration for shared state and invalidation fan-out.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl BosunConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        // Expand environment variables
        let expanded = expand_env_vars(contents)?;

        // Pre-check: detect feature-gated config values before typed deserialization
        // to provide helpful error messages instead of cryptic serde "unknown variant" errors
        let raw: toml::Value = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        check_disabled_features(&raw)?;

        // Parse TOML
        let config: BosunConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        // Validate
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.signing.validate()?;
        self.cache.validate()?;

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Check for feature-gated configuration values before typed deserialization.
///
/// When a user configures a cache backend that requires a cargo feature not
/// compiled into this build, serde produces cryptic "unknown variant" errors.
/// This function inspects the raw TOML to detect such cases and produce
/// actionable error messages telling the user exactly which features to enable.
fn check_disabled_features(raw: &toml::Value) -> Result<(), ConfigError> {
    let mut issues: Vec<(String, &str)> = Vec::new();

    // Check cache type
    if let Some(type_val) = raw
        .get("cache")
        .and_then(|v| v.get("type"))
        .and_then(|v| v.as_str())
    {
        check_cache_feature(type_val, &mut issues);
    }

    if issues.is_empty() {
        return Ok(());
    }

    let details = issues
        .iter()
        .map(|(msg, _)| msg.as_str())
        .collect::<Vec<_>>()
        .join("\n  - ");
    let features = issues
        .iter()
        .map(|(_, feat)| *feat)
        .collect::<Vec<_>>()
        .join(",");

    Err(ConfigError::Validation(format!(
        "Configuration requires features not compiled in this build:\n  \
         - {details}\n\n\
         Rebuild with: cargo build --features {features}"
    )))
}

fn check_cache_feature(type_val: &str, _issues: &mut Vec<(String, &str)>) {
    match type_val {
        #[cfg(not(feature = "redis"))]
        "redis" => _issues.push((
            "cache type 'redis' requires the 'redis' feature".into(),
            "redis",
        )),
        _ => {}
    }
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        // Find if there's a comment on this line
        let comment_pos = line.find('#');

        // Process the line, only expanding variables that appear before any comment
        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let match_start = cap.get(0).unwrap().start();

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && match_start >= pos
            {
                continue;
            }

            // Add text before this match
            line_result.push_str(&line[last_end..match_start]);

            // Expand the variable
            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = cap.get(0).unwrap().end();
        }

        // Add remaining text after last match
        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
