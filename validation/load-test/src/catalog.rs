//! Fixture corpus discovery.
//!
//! The corpus is a directory tree of images where the immediate parent
//! directory of each file names its category, e.g. `data/cats/a.jpg`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LoadTestError, Result};

/// File extensions accepted as fixtures.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "gif", "png"];

/// One image from the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub path: PathBuf,
    pub category: String,
}

/// Immutable set of fixtures loaded once per run.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    fixtures: Vec<Fixture>,
}

impl Catalog {
    /// Recursively scan `root` for image files.
    ///
    /// Fails with `NoFixturesFound` if the scan succeeds but matches
    /// nothing; walk errors are returned as they occur.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut fixtures = Vec::new();

        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext))
                .unwrap_or(false);
            if !is_image {
                continue;
            }

            let category = path
                .parent()
                .and_then(|dir| dir.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            debug!(path = %path.display(), category = %category, "Found fixture");
            fixtures.push(Fixture {
                path: path.to_path_buf(),
                category,
            });
        }

        if fixtures.is_empty() {
            return Err(LoadTestError::NoFixturesFound {
                path: root.to_path_buf(),
            });
        }

        Ok(Self {
            root: root.to_path_buf(),
            fixtures,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Distinct categories in discovery order, preceded by `""` (no filter).
    pub fn categories(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut categories = vec![String::new()];
        for fixture in &self.fixtures {
            if seen.insert(fixture.category.as_str()) {
                categories.push(fixture.category.clone());
            }
        }
        categories
    }

    /// Number of fixtures per category.
    pub fn count_by_category(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for fixture in &self.fixtures {
            *counts.entry(fixture.category.as_str()).or_insert(0) += 1;
        }
        counts
    }
}
