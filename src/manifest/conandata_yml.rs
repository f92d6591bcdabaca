//! conandata.yml model
//!
//! Each recipe folder lists the source archive of every version it builds
//! under `sources:` and optional per-version patch lists under `patches:`.
//! Edits go through `MappingLayout` so the rest of the file keeps its bytes.

use super::config_yml::YamlKey;
use super::layout::MappingLayout;
use super::writer::read_manifest;
use crate::domain::SourceRef;
use crate::error::ManifestError;
use crate::version::Version;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const SOURCES_SECTION: &str = "sources";
const PATCHES_SECTION: &str = "patches";

#[derive(Debug, Default, Deserialize)]
struct RawConandata {
    #[serde(default)]
    sources: Option<serde_yaml::Mapping>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawUrl {
    One(String),
    Mirrors(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    url: Option<RawUrl>,
    #[serde(default)]
    sha256: Option<String>,
}

impl RawSource {
    fn into_source(self) -> SourceRef {
        let url = match self.url {
            Some(RawUrl::One(url)) => Some(url),
            Some(RawUrl::Mirrors(urls)) => urls.into_iter().next(),
            None => None,
        };
        SourceRef {
            url,
            sha256: self.sha256,
        }
    }
}

/// A folder's conandata.yml, kept as text
#[derive(Debug, Clone)]
pub(crate) struct Conandata {
    path: PathBuf,
    content: String,
    sources: Vec<(YamlKey, SourceRef)>,
    changed: bool,
}

impl Conandata {
    /// Load `path`; a missing file yields None
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        match read_manifest(path) {
            Ok(content) => Self::parse(path, content).map(Some),
            Err(ManifestError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn parse(path: &Path, content: String) -> Result<Self, ManifestError> {
        let raw: RawConandata = if content.trim().is_empty() {
            RawConandata::default()
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| ManifestError::yaml_parse_error(path, e.to_string()))?
        };

        let mut sources = Vec::new();
        for (key, value) in raw.sources.iter().flatten() {
            let Some(key) = YamlKey::from_value(key) else {
                continue;
            };
            // multi-archive versions list their sources in a sequence
            let first = match value {
                serde_yaml::Value::Sequence(items) => items.first().cloned(),
                other => Some(other.clone()),
            };
            let source = first
                .and_then(|v| serde_yaml::from_value::<RawSource>(v).ok())
                .map(RawSource::into_source)
                .unwrap_or_default();
            sources.push((key, source));
        }

        Ok(Self {
            path: path.to_path_buf(),
            content,
            sources,
            changed: false,
        })
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether edits are pending
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Current text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Source recorded for the version key `key`
    pub fn source(&self, key: &str) -> Option<&SourceRef> {
        self.sources
            .iter()
            .find(|(k, _)| k.matches(key))
            .map(|(_, source)| source)
    }

    /// Record the sources of `key` and give it the patches of `patches_from`
    pub fn add_version(
        &mut self,
        key: &str,
        source: &SourceRef,
        patches_from: &str,
    ) -> Result<(), ManifestError> {
        let version = Version::parse(key);

        let mut sources = MappingLayout::parse(&self.path, &self.content, SOURCES_SECTION)?;
        if sources.contains(key) {
            return Err(ManifestError::unsupported_layout(
                &self.path,
                format!("sources of '{}' are already listed", key),
            ));
        }
        let mut fields = Vec::new();
        if let Some(url) = &source.url {
            fields.push(("url", format!("\"{}\"", url)));
        }
        if let Some(sha256) = &source.sha256 {
            fields.push(("sha256", format!("\"{}\"", sha256)));
        }
        let body = sources.render_entry(key, &fields);
        sources.insert(sources.position_for(&version), key, body);
        self.content = sources.render();

        if let Some(mut patches) = MappingLayout::find(&self.path, &self.content, PATCHES_SECTION)? {
            if let Some(block) = patches.block(patches_from) {
                if !patches.contains(key) {
                    let body = patches.rekey(block, key);
                    patches.insert(patches.position_for(&version), key, body);
                    self.content = patches.render();
                }
            }
        }

        self.sources.push((YamlKey::Text(key.to_string()), source.clone()));
        self.changed = true;
        Ok(())
    }
}
