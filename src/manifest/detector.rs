//! Recipe detection inside a recipe repository
//!
//! A recipe is a directory under `<root>/recipes/` that holds a `config.yml`.

use super::CONFIG_FILENAME;
use crate::domain::RecipeName;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Directory holding the recipes, relative to the repository root
pub const RECIPES_DIR: &str = "recipes";

/// Directory of the recipe `name`
pub fn recipe_dir(root: &Path, name: &RecipeName) -> PathBuf {
    root.join(RECIPES_DIR).join(name.as_str())
}

/// List all recipes in the repository at `root`, sorted by name
///
/// Directories without a `config.yml` are not recipes and are skipped.
pub fn list_recipes(root: &Path) -> Result<Vec<RecipeName>, ConfigError> {
    let recipes_dir = root.join(RECIPES_DIR);
    let entries = std::fs::read_dir(&recipes_dir).map_err(|_| ConfigError::RepositoryNotFound {
        path: root.to_path_buf(),
    })?;

    let mut names: Vec<RecipeName> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().join(CONFIG_FILENAME).is_file())
        .map(|entry| RecipeName::new(entry.file_name().to_string_lossy()))
        .collect();
    names.sort();

    tracing::debug!(root = %root.display(), count = names.len(), "listed recipes");
    Ok(names)
}
