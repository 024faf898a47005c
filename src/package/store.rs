// src/package/store.rs

//! The package store: `<root>/<name>/<version>/<package_id>/`
//!
//! Finished packages are published here and later builds find their
//! dependencies here. A package directory only appears once it is
//! complete: packages are assembled in a hidden staging directory inside
//! the store and renamed into place.

use crate::error::{Error, Result};
use crate::recipe::Requirement;
use crate::settings::Settings;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::metadata::{InstalledPackage, PackageInfo, METADATA_FILE};

/// Settings that must agree between a consumer and a dependency
const MATCHED_SETTINGS: &[&str] = &["os", "arch", "compiler", "build_type"];

/// Directory tree of published packages
#[derive(Debug, Clone)]
pub struct PackageStore {
    root: PathBuf,
}

impl PackageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a package with this identity lives (or would live)
    pub fn package_dir(&self, name: &str, version: &str, package_id: &str) -> PathBuf {
        self.root.join(name).join(version).join(package_id)
    }

    /// All published packages, sorted by name, version, then id
    pub fn list(&self) -> Result<Vec<InstalledPackage>> {
        let mut packages = Vec::new();
        if !self.root.is_dir() {
            return Ok(packages);
        }

        for name in sorted_subdirs(&self.root)? {
            for version in sorted_subdirs(&name)? {
                for id in sorted_subdirs(&version)? {
                    if !id.join(METADATA_FILE).is_file() {
                        continue;
                    }
                    match InstalledPackage::load(&id) {
                        Ok(pkg) => packages.push(pkg),
                        Err(e) => warn!("Skipping {}: {}", id.display(), e),
                    }
                }
            }
        }

        Ok(packages)
    }

    /// Published packages with the requirement's name and version
    pub fn candidates(&self, req: &Requirement) -> Result<Vec<InstalledPackage>> {
        let dir = self.root.join(&req.name).join(&req.version);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for id in sorted_subdirs(&dir)? {
            if id.join(METADATA_FILE).is_file() {
                found.push(InstalledPackage::load(&id)?);
            }
        }
        Ok(found)
    }

    /// Pick the package satisfying `req` for a consumer built with `settings`
    ///
    /// Candidates must agree on os, arch, compiler and build type. When
    /// several do (different option sets), the lowest package id wins.
    pub fn find(&self, req: &Requirement, settings: &Settings) -> Result<InstalledPackage> {
        let wanted = settings.to_map();
        let candidates = self.candidates(req)?;
        let total = candidates.len();

        let mut matching: Vec<InstalledPackage> = candidates
            .into_iter()
            .filter(|pkg| {
                MATCHED_SETTINGS
                    .iter()
                    .all(|key| pkg.info.settings.get(*key) == wanted.get(*key))
            })
            .collect();

        if matching.is_empty() {
            return Err(Error::ResolutionError(format!(
                "No package for {} in {} matches {} ({} candidate(s) with other settings)",
                req,
                self.root.display(),
                MATCHED_SETTINGS
                    .iter()
                    .filter_map(|k| wanted.get(*k).map(|v| format!("{}={}", k, v)))
                    .collect::<Vec<_>>()
                    .join(" "),
                total
            )));
        }

        matching.sort_by(|a, b| a.info.package_id.cmp(&b.info.package_id));
        if matching.len() > 1 {
            warn!(
                "{} packages match {}, using {}",
                matching.len(),
                req,
                matching[0].info.package_id
            );
        }

        let chosen = matching.swap_remove(0);
        debug!("Using {} from {}", req, chosen.root.display());
        Ok(chosen)
    }

    /// Fresh staging directory inside the store
    pub fn staging_dir(&self) -> Result<TempDir> {
        fs::create_dir_all(&self.root)?;
        tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .map_err(|e| Error::Filesystem(format!("Failed to create staging directory: {}", e)))
    }

    /// Move a fully assembled staging directory to its final place
    ///
    /// An existing package with the same id is replaced. The old tree is
    /// moved aside first and only deleted once the new one is in place.
    pub fn publish(&self, staging: TempDir, info: &PackageInfo) -> Result<PathBuf> {
        let dest = self.package_dir(&info.name, &info.version, &info.package_id);
        let parent = dest
            .parent()
            .ok_or_else(|| Error::PackageError(format!("Invalid package path {}", dest.display())))?;
        fs::create_dir_all(parent)?;

        let trash = tempfile::Builder::new()
            .prefix(".replaced-")
            .tempdir_in(&self.root)?;
        let previous = trash.path().join("package");
        let replacing = dest.exists();
        if replacing {
            fs::rename(&dest, &previous)?;
        }

        if let Err(e) = fs::rename(staging.path(), &dest) {
            if replacing {
                let _ = fs::rename(&previous, &dest);
            }
            return Err(Error::PackageError(format!(
                "Failed to publish {}: {}",
                dest.display(),
                e
            )));
        }
        let _ = staging.keep();

        if replacing {
            info!("Replaced existing package at {}", dest.display());
        }
        Ok(dest)
    }
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}
