//! config.yml typed view
//!
//! Text edits go through `MappingLayout` on the `versions` section; this view
//! is validated with serde_yaml and cross-checked against the blocks.

use crate::error::ManifestError;
use serde::Deserialize;
use std::path::Path;

/// Section of config.yml holding the pins
pub(crate) const VERSIONS_SECTION: &str = "versions";

/// Typed view of config.yml
#[derive(Debug, Deserialize)]
pub(crate) struct RawConfig {
    /// Optional upstream identity overriding the conanfile homepage
    #[serde(default)]
    pub upstream: Option<String>,
    /// Pinned versions; keys may be strings or bare numbers
    #[serde(default)]
    versions: Option<serde_yaml::Mapping>,
}

/// Typed view of one version entry
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawVersion {
    pub folder: String,
}

impl RawConfig {
    /// Parse the typed view
    pub fn parse(path: &Path, content: &str) -> Result<Self, ManifestError> {
        serde_yaml::from_str(content)
            .map_err(|e| ManifestError::yaml_parse_error(path, e.to_string()))
    }

    /// Version entries in file order, keys as YAML scalars
    pub fn entries(&self, path: &Path) -> Result<Vec<(YamlKey, RawVersion)>, ManifestError> {
        let Some(versions) = &self.versions else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::with_capacity(versions.len());
        for (key, value) in versions {
            let key = YamlKey::from_value(key).ok_or_else(|| {
                ManifestError::yaml_parse_error(path, format!("unsupported version key {:?}", key))
            })?;
            let entry: RawVersion = serde_yaml::from_value(value.clone()).map_err(|e| {
                ManifestError::yaml_parse_error(path, format!("version '{}': {}", key, e))
            })?;
            let folder = Path::new(&entry.folder);
            if entry.folder.trim().is_empty()
                || folder.is_absolute()
                || folder.components().any(|c| c.as_os_str() == "..")
            {
                return Err(ManifestError::yaml_parse_error(
                    path,
                    format!("version '{}' has invalid folder '{}'", key, entry.folder),
                ));
            }
            entries.push((key, entry));
        }
        Ok(entries)
    }
}

/// A version key as YAML typed it
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum YamlKey {
    Text(String),
    Number(f64),
}

impl YamlKey {
    pub fn from_value(value: &serde_yaml::Value) -> Option<Self> {
        match value {
            serde_yaml::Value::String(s) => Some(YamlKey::Text(s.clone())),
            serde_yaml::Value::Number(n) => n.as_f64().map(YamlKey::Number),
            _ => None,
        }
    }

    /// Whether the text form of a key denotes this YAML key
    pub fn matches(&self, text: &str) -> bool {
        match self {
            YamlKey::Text(s) => s == text,
            YamlKey::Number(n) => text.parse::<f64>().is_ok_and(|t| t == *n),
        }
    }
}

impl std::fmt::Display for YamlKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YamlKey::Text(s) => write!(f, "{}", s),
            YamlKey::Number(n) => write!(f, "{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> &'static Path {
        Path::new("config.yml")
    }

    #[test]
    fn test_raw_config_rejects_bad_folder() {
        let raw = RawConfig::parse(path(), "versions:\n  \"1.0\":\n    folder: ../x\n").unwrap();
        let err = raw.entries(path()).unwrap_err();
        assert!(matches!(err, ManifestError::YamlParseError { .. }));
    }

    #[test]
    fn test_raw_config_requires_folder() {
        let raw = RawConfig::parse(path(), "versions:\n  \"1.0\":\n    url: x\n").unwrap();
        let err = raw.entries(path()).unwrap_err();
        assert!(matches!(err, ManifestError::YamlParseError { .. }));
    }

    #[test]
    fn test_raw_config_numeric_keys() {
        let raw = RawConfig::parse(path(), "versions:\n  1.10:\n    folder: all\n").unwrap();
        let entries = raw.entries(path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].0.matches("1.10"));
        assert!(!entries[0].0.matches("1.2"));
        assert_eq!(entries[0].1.folder, "all");
    }

    #[test]
    fn test_raw_config_invalid_yaml() {
        let err = RawConfig::parse(path(), "versions: [unclosed\n").unwrap_err();
        assert!(matches!(err, ManifestError::YamlParseError { .. }));
    }
}
