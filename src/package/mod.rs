// src/package/mod.rs

//! Packaging stage: from a finished build to a published package
//!
//! The install tree and any extra files named by the recipe are laid out
//! in a staging directory inside the store, filtered down to the declared
//! output dirs (`include/`, `lib/`, `bin/`, `licenses/` by default) and
//! described by `pantry-package.json`. Only then is the staging directory
//! renamed to `<store>/<name>/<version>/<package_id>/`. A failure at any
//! point drops the staging directory, so a partial package is never
//! visible in the store.

mod layout;
mod metadata;
mod store;

pub use layout::{assemble, summarize, Assembled};
pub use metadata::{InstalledPackage, PackageInfo, METADATA_FILE};
pub use store::PackageStore;

use crate::error::Result;
use crate::recipe::{BuildResult, ResolvedRecipe};
use std::path::PathBuf;
use tracing::info;

/// A package that made it into the store
#[derive(Debug)]
pub struct Published {
    pub path: PathBuf,
    pub info: PackageInfo,
    pub warnings: Vec<String>,
}

/// Assemble `build` into a package and publish it atomically
pub fn package(store: &PackageStore, resolved: &ResolvedRecipe, build: &BuildResult) -> Result<Published> {
    let staging = store.staging_dir()?;
    let assembled = assemble(resolved, build, staging.path())?;
    let path = store.publish(staging, &assembled.info)?;

    info!("Published {}", path.display());
    Ok(Published {
        path,
        info: assembled.info,
        warnings: assembled.warnings,
    })
}
