//! Recipe manifest loading, editing and saving
//!
//! This module provides functionality to:
//! - List the recipes of a recipe repository
//! - Parse `config.yml` and the folders' `conandata.yml` into a typed,
//!   text-preserving RecipeManifest
//! - Pin an upstream release next to the existing pins
//! - Save manifests atomically and roll them back on failure

mod conandata_yml;
mod config_yml;
mod detector;
mod layout;
mod settings;
mod writer;

pub use detector::{list_recipes, recipe_dir, RECIPES_DIR};
pub use settings::{RepoSettings, SETTINGS_FILENAME};
pub use writer::{read_manifest, write_manifest, ManifestRollback};

use crate::domain::{PinnedVersionEntry, RecipeName, UpstreamRelease};
use crate::error::ManifestError;
use crate::version::{LineId, Version};
use conandata_yml::Conandata;
use config_yml::{RawConfig, VERSIONS_SECTION};
use layout::MappingLayout;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Manifest file name inside a recipe directory
pub const CONFIG_FILENAME: &str = "config.yml";

/// Recipe source file expected inside each version folder
pub const SOURCE_FILENAME: &str = "conanfile.py";

/// Per-folder source list and patches
pub const CONANDATA_FILENAME: &str = "conandata.yml";

static HOMEPAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*homepage\s*=\s*["']([^"']+)["']"#).expect("valid homepage regex")
});

static DEPRECATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*deprecated\s*=\s*([^#\r\n]*?)\s*(?:#.*)?$").expect("valid deprecated regex")
});

/// A tracked line with its newest pin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedLine {
    /// Line identifier
    pub line: LineId,
    /// Newest pinned entry of the line
    pub latest: PinnedVersionEntry,
    /// Number of pins on the line
    pub count: usize,
}

/// Parsed, mutable form of a recipe's `config.yml`
#[derive(Debug, Clone)]
pub struct RecipeManifest {
    name: RecipeName,
    dir: PathBuf,
    path: PathBuf,
    upstream: Option<String>,
    deprecated: bool,
    layout: MappingLayout,
    entries: Vec<PinnedVersionEntry>,
    /// conandata.yml per folder, for folders that have one
    conandata: BTreeMap<String, Conandata>,
}

impl RecipeManifest {
    /// Load the manifest of the recipe stored in `recipe_dir`
    pub fn load(recipe_dir: &Path) -> Result<Self, ManifestError> {
        let path = recipe_dir.join(CONFIG_FILENAME);
        let content = read_manifest(&path)?;
        Self::parse(recipe_dir, &content)
    }

    fn parse(recipe_dir: &Path, content: &str) -> Result<Self, ManifestError> {
        let path = recipe_dir.join(CONFIG_FILENAME);
        let name = recipe_dir
            .file_name()
            .map(|n| RecipeName::new(n.to_string_lossy()))
            .ok_or_else(|| ManifestError::unsupported_layout(&path, "recipe directory has no name"))?;

        let raw = RawConfig::parse(&path, content)?;
        if !content.lines().any(|l| l.starts_with("versions:")) {
            return Err(ManifestError::yaml_parse_error(
                &path,
                "missing `versions` mapping",
            ));
        }
        let raw_entries = raw.entries(&path)?;
        let layout = MappingLayout::parse(&path, content, VERSIONS_SECTION)?;

        if raw_entries.len() != layout.blocks.len() {
            return Err(ManifestError::unsupported_layout(
                &path,
                format!(
                    "found {} version entries in text but {} in YAML",
                    layout.blocks.len(),
                    raw_entries.len()
                ),
            ));
        }

        let mut conandata = BTreeMap::new();
        let mut entries = Vec::with_capacity(raw_entries.len());
        for (block, (key, raw_version)) in layout.blocks.iter().zip(raw_entries) {
            if !key.matches(&block.key) {
                return Err(ManifestError::unsupported_layout(
                    &path,
                    format!("version key '{}' does not match '{}'", block.key, key),
                ));
            }

            let source_file = recipe_dir.join(&raw_version.folder).join(SOURCE_FILENAME);
            if !source_file.is_file() {
                return Err(ManifestError::MissingSource {
                    path: path.clone(),
                    version: block.key.clone(),
                    missing: source_file,
                });
            }

            if !conandata.contains_key(&raw_version.folder) {
                let data_path = recipe_dir.join(&raw_version.folder).join(CONANDATA_FILENAME);
                if let Some(data) = Conandata::load(&data_path)? {
                    conandata.insert(raw_version.folder.clone(), data);
                }
            }
            let source = conandata
                .get(&raw_version.folder)
                .and_then(|data| data.source(&block.key))
                .cloned()
                .unwrap_or_default();

            entries.push(PinnedVersionEntry {
                version: Version::parse(&block.key),
                folder: raw_version.folder,
                source,
            });
        }

        if entries.is_empty() {
            return Err(ManifestError::yaml_parse_error(&path, "no pinned versions"));
        }

        let conanfile = entries
            .iter()
            .max_by(|a, b| a.version.cmp(&b.version))
            .and_then(|newest| {
                std::fs::read_to_string(recipe_dir.join(&newest.folder).join(SOURCE_FILENAME)).ok()
            })
            .unwrap_or_default();

        let upstream = match raw.upstream.filter(|u| !u.trim().is_empty()) {
            Some(upstream) => Some(upstream.trim().to_string()),
            None => homepage(&conanfile),
        };
        let deprecated = is_deprecated(&conanfile);

        tracing::debug!(
            recipe = %name,
            pins = entries.len(),
            upstream = upstream.as_deref().unwrap_or("-"),
            deprecated,
            "loaded manifest"
        );

        Ok(Self {
            name,
            dir: recipe_dir.to_path_buf(),
            path,
            upstream,
            deprecated,
            layout,
            entries,
            conandata,
        })
    }

    /// Recipe name (the directory name)
    pub fn name(&self) -> &RecipeName {
        &self.name
    }

    /// Recipe directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the `config.yml` file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Upstream identity, if one is declared
    pub fn upstream(&self) -> Option<&str> {
        self.upstream.as_deref()
    }

    /// Whether the newest conanfile marks the recipe deprecated
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// Files written by `save`: config.yml and every edited conandata.yml
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.path.clone()];
        files.extend(
            self.conandata
                .values()
                .filter(|data| data.changed())
                .map(|data| data.path().to_path_buf()),
        );
        files
    }

    /// Pinned entries in file order
    pub fn entries(&self) -> &[PinnedVersionEntry] {
        &self.entries
    }

    /// Tracked lines, ascending by version
    pub fn pinned_lines(&self) -> Vec<PinnedLine> {
        let mut lines: Vec<(Version, PinnedLine)> = Vec::new();
        for entry in &self.entries {
            let line = entry.line();
            match lines.iter_mut().find(|(_, l)| l.line == line) {
                Some((first, pinned)) => {
                    if entry.version < *first {
                        *first = entry.version.clone();
                    }
                    if entry.version > pinned.latest.version {
                        pinned.latest = entry.clone();
                    }
                    pinned.count += 1;
                }
                None => lines.push((
                    entry.version.clone(),
                    PinnedLine {
                        line,
                        latest: entry.clone(),
                        count: 1,
                    },
                )),
            }
        }
        lines.sort_by(|a, b| a.0.cmp(&b.0));
        lines.into_iter().map(|(_, line)| line).collect()
    }

    /// Return a new manifest with `release` pinned for `line`
    ///
    /// Existing pins are kept. The new entry reuses the folder of the line's
    /// newest pin (the recipe's newest pin for a new line), is placed in the
    /// file's sort direction, and gets its sources and a copy of that pin's
    /// patches in the folder's conandata.yml.
    pub fn apply_update(
        &self,
        line: &LineId,
        release: &UpstreamRelease,
    ) -> Result<RecipeManifest, ManifestError> {
        let key = release.pin();
        if self.layout.contains(key) {
            return Err(ManifestError::unsupported_layout(
                &self.path,
                format!("version '{}' is already pinned", key),
            ));
        }

        let newest = |on_line: bool| {
            self.entries
                .iter()
                .filter(|e| !on_line || e.line() == *line)
                .max_by(|a, b| a.version.cmp(&b.version))
        };
        let reference = newest(release.version.line() == *line)
            .or_else(|| newest(false))
            .ok_or_else(|| ManifestError::yaml_parse_error(&self.path, "no pinned versions"))?;
        let folder = reference.folder.clone();

        let mut updated = self.clone();
        let data = updated.conandata.get_mut(&folder).ok_or_else(|| {
            ManifestError::unsupported_layout(
                &self.path,
                format!("no {} in {}", CONANDATA_FILENAME, folder),
            )
        })?;
        data.add_version(key, &release.source, reference.version.raw())?;

        let version = Version::parse(key);
        let index = self.layout.position_for(&version);
        let body = self
            .layout
            .render_entry(key, &[("folder", folder.clone())]);
        updated.layout.insert(index, key, body);
        updated.entries.insert(
            index,
            PinnedVersionEntry {
                version,
                folder,
                source: release.source.clone(),
            },
        );

        Ok(updated)
    }

    /// Exact serialized bytes of this manifest
    pub fn to_yaml_string(&self) -> String {
        self.layout.render()
    }

    /// Save config.yml and every edited conandata.yml in place
    pub fn save(&self) -> Result<(), ManifestError> {
        for data in self.conandata.values().filter(|data| data.changed()) {
            write_manifest(data.path(), data.content().as_bytes())?;
        }
        self.save_to(&self.path)
    }

    /// Save config.yml atomically to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ManifestError> {
        write_manifest(path, self.to_yaml_string().as_bytes())
    }
}

/// `homepage` attribute of a conanfile
fn homepage(conanfile: &str) -> Option<String> {
    HOMEPAGE
        .captures(conanfile)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether a conanfile sets a truthy `deprecated` attribute
fn is_deprecated(conanfile: &str) -> bool {
    DEPRECATED
        .captures(conanfile)
        .and_then(|caps| caps.get(1))
        .is_some_and(|value| !matches!(value.as_str(), "" | "False" | "None" | "\"\"" | "''"))
}
