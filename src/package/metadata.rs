// src/package/metadata.rs

//! `pantry-package.json`: what a package exports to its consumers
//!
//! Paths are stored relative to the package root so the record does not
//! depend on where the store lives. The JSON is produced from sorted
//! maps and vectors in recipe order, so the same build always writes
//! the same bytes.

use crate::error::{Error, Result};
use crate::recipe::ResolvedRecipe;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the metadata record inside a package
pub const METADATA_FILE: &str = "pantry-package.json";

/// Metadata record of a finished package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub release: String,
    pub package_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    pub settings: BTreeMap<String, String>,
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub requires: Vec<String>,

    /// Libraries to link, in link order
    #[serde(default)]
    pub libs: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,

    #[serde(default)]
    pub include_dirs: Vec<String>,
    #[serde(default)]
    pub lib_dirs: Vec<String>,
    #[serde(default)]
    pub bin_dirs: Vec<String>,

    /// Environment variable to package-relative paths appended to it
    #[serde(default)]
    pub env_append: BTreeMap<String, Vec<String>>,
}

impl PackageInfo {
    /// Build the record for an assembled package tree
    ///
    /// `include`, `lib` and `bin` are listed only when present in
    /// `package_root`; conditional frameworks are filtered here.
    pub fn from_resolved(resolved: &ResolvedRecipe, package_root: &Path) -> Self {
        let recipe = resolved.recipe();
        let present = |dir: &str| -> Vec<String> {
            if package_root.join(dir).is_dir() {
                vec![dir.to_string()]
            } else {
                Vec::new()
            }
        };

        Self {
            name: recipe.package.name.clone(),
            version: recipe.package.version.clone(),
            release: recipe.package.release.clone(),
            package_id: resolved.package_id(),
            summary: recipe
                .package
                .summary
                .clone()
                .or_else(|| recipe.package.description.clone()),
            license: recipe.package.license.clone(),
            homepage: recipe.package.homepage.clone(),
            settings: resolved.settings().to_map(),
            options: resolved
                .options()
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
            requires: resolved.requirements().iter().map(|r| r.to_string()).collect(),
            libs: recipe.info.libs.clone(),
            frameworks: recipe
                .info
                .frameworks
                .iter()
                .filter(|f| resolved.applies(f.when.as_ref()))
                .map(|f| f.name.clone())
                .collect(),
            include_dirs: present("include"),
            lib_dirs: present("lib"),
            bin_dirs: present("bin"),
            env_append: recipe.info.env_append.clone(),
        }
    }

    /// Canonical JSON encoding (pretty, trailing newline)
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::PackageError(format!("Failed to encode metadata: {}", e)))?;
        json.push('\n');
        Ok(json)
    }

    pub fn write_to(&self, package_root: &Path) -> Result<PathBuf> {
        let path = package_root.join(METADATA_FILE);
        fs::write(&path, self.to_json()?)?;
        Ok(path)
    }

    pub fn read_from(package_root: &Path) -> Result<Self> {
        let path = package_root.join(METADATA_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::Filesystem(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::ParseError(format!("Invalid {}: {}", path.display(), e)))
    }
}

/// A published package: its metadata plus where it lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub root: PathBuf,
    pub info: PackageInfo,
}

impl InstalledPackage {
    pub fn load(root: &Path) -> Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            info: PackageInfo::read_from(root)?,
        })
    }

    fn absolute(&self, dirs: &[String]) -> Vec<PathBuf> {
        dirs.iter().map(|d| self.root.join(d)).collect()
    }

    pub fn include_paths(&self) -> Vec<PathBuf> {
        self.absolute(&self.info.include_dirs)
    }

    pub fn lib_paths(&self) -> Vec<PathBuf> {
        self.absolute(&self.info.lib_dirs)
    }

    pub fn bin_paths(&self) -> Vec<PathBuf> {
        self.absolute(&self.info.bin_dirs)
    }

    /// `env_append` with paths made absolute
    pub fn env_appends(&self) -> BTreeMap<String, Vec<PathBuf>> {
        self.info
            .env_append
            .iter()
            .map(|(var, paths)| (var.clone(), self.absolute(paths)))
            .collect()
    }
}
