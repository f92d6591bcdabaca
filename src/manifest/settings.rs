//! Repository settings reader
//!
//! Reads defaults from `<root>/.recipe-bump.toml`. Every key is optional;
//! command-line flags take precedence over anything set here.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Settings file name at the repository root
pub const SETTINGS_FILENAME: &str = ".recipe-bump.toml";

/// Repository-level defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoSettings {
    /// Prefix for update branches
    pub branch_prefix: Option<String>,
    /// Remote to push to
    pub remote: Option<String>,
    /// Test command with `{name}` and `{version}` placeholders
    pub test_command: Option<Vec<String>>,
    /// Maximum number of concurrent test runs
    pub test_concurrency: Option<usize>,
    /// Whether the newest line follows newer major lines (default true)
    pub follow_new_lines: Option<bool>,
}

impl RepoSettings {
    /// Read settings from a repository root
    ///
    /// A missing file yields the defaults.
    pub fn from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(SETTINGS_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::InvalidSettings {
                    path,
                    message: e.to_string(),
                })
            }
        };

        let settings: RepoSettings =
            toml::from_str(&content).map_err(|e| ConfigError::InvalidSettings {
                path: path.clone(),
                message: e.to_string(),
            })?;

        if settings.test_concurrency == Some(0) {
            return Err(ConfigError::InvalidSettings {
                path,
                message: "test_concurrency must be at least 1".to_string(),
            });
        }
        if settings.test_command.as_ref().is_some_and(|c| c.is_empty()) {
            return Err(ConfigError::InvalidSettings {
                path,
                message: "test_command must not be empty".to_string(),
            });
        }

        tracing::debug!(path = %path.display(), "loaded repository settings");
        Ok(settings)
    }
}
