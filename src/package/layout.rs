// src/package/layout.rs

//! Assembling a package tree from a finished build
//!
//! Order of operations, all inside the staging directory:
//! 1. Copy the install tree
//! 2. Apply `[[layout.copy]]` rules (from the source or install tree)
//! 3. Apply `[[layout.rename]]` rules
//! 4. Delete `layout.remove` globs
//! 5. Drop every top-level entry that is not a declared dir
//! 6. Prune empty directories and write `pantry-package.json`

use crate::error::{Error, Result};
use crate::recipe::kitchen::archive::{copy_entry, copy_tree};
use crate::recipe::{BuildResult, CopyRule, CopySource, RenameRule, ResolvedRecipe};
use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::metadata::PackageInfo;

/// Outcome of assembling a package tree
#[derive(Debug)]
pub struct Assembled {
    pub info: PackageInfo,
    /// Files present in the final tree, package-relative, sorted
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

const PATH_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Lay out `build`'s output in `staging` and write the metadata record
pub fn assemble(resolved: &ResolvedRecipe, build: &BuildResult, staging: &Path) -> Result<Assembled> {
    let layout = &resolved.recipe().layout;
    let vars = &build.environment.template_vars;
    let mut warnings = Vec::new();

    if build.install_dir.is_dir() {
        let copied = copy_tree(&build.install_dir, staging)?;
        debug!("Copied {} installed file(s)", copied);
    }

    for rule in layout.copy.iter().filter(|r| resolved.applies(r.when.as_ref())) {
        let root = match rule.src {
            CopySource::Source => &build.source_dir,
            CopySource::Install => &build.install_dir,
        };
        let pattern = resolved.recipe().substitute(&rule.pattern, vars);
        let count = apply_copy(rule, &pattern, root, staging)?;
        if count == 0 {
            let msg = format!("copy rule '{}' matched no files", pattern);
            warn!("{}", msg);
            warnings.push(msg);
        }
    }

    for rule in layout.rename.iter().filter(|r| resolved.applies(r.when.as_ref())) {
        apply_rename(rule, staging, |s| resolved.recipe().substitute(s, vars))?;
    }

    for pattern in &layout.remove {
        let pattern = resolved.recipe().substitute(pattern, vars);
        apply_remove(&pattern, staging)?;
    }

    warnings.extend(filter_to_layout(staging, &layout.dirs)?);
    prune_empty_dirs(staging)?;

    let info = PackageInfo::from_resolved(resolved, staging);
    let files = list_files(staging)?;
    info.write_to(staging)?;

    info!(
        "Assembled {}/{} ({} files)",
        info.name,
        info.version,
        files.len()
    );

    Ok(Assembled {
        info,
        files,
        warnings,
    })
}

/// Copy files under `root` matching `pattern` into `staging/<dst>`
///
/// Patterns without a `/` match a file name at any depth; others match the
/// path relative to `root`.
fn apply_copy(rule: &CopyRule, pattern: &str, root: &Path, staging: &Path) -> Result<usize> {
    if !root.is_dir() {
        return Ok(0);
    }

    let matcher = Pattern::new(pattern)
        .map_err(|e| Error::PackageError(format!("Invalid copy pattern '{}': {}", pattern, e)))?;
    let by_name = !pattern.contains('/');
    let dst_root = staging.join(&rule.dst);
    let mut count = 0;

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Filesystem(format!("Failed to walk {}: {}", root.display(), e)))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::Filesystem(e.to_string()))?;

        let matched = if by_name {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| matcher.matches_with(name, PATH_MATCH))
        } else {
            matcher.matches_path_with(rel, PATH_MATCH)
        };
        if !matched {
            continue;
        }

        let target = if rule.keep_path {
            dst_root.join(rel)
        } else {
            dst_root.join(entry.file_name())
        };
        copy_entry(entry.path(), &target)?;
        count += 1;
    }

    debug!("copy '{}' -> {}: {} file(s)", pattern, rule.dst, count);
    Ok(count)
}

fn apply_rename(rule: &RenameRule, staging: &Path, substitute: impl Fn(&str) -> String) -> Result<()> {
    let from = staging.join(substitute(&rule.from));
    let to = staging.join(substitute(&rule.to));

    if fs::symlink_metadata(&from).is_err() {
        if rule.optional {
            debug!("Optional rename source {} missing", rule.from);
            return Ok(());
        }
        return Err(Error::PackageError(format!(
            "rename source '{}' does not exist",
            rule.from
        )));
    }
    if fs::symlink_metadata(&to).is_ok() {
        return Err(Error::PackageError(format!(
            "rename target '{}' already exists",
            rule.to
        )));
    }

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(&from, &to)?;
    debug!("rename {} -> {}", rule.from, rule.to);
    Ok(())
}

fn apply_remove(pattern: &str, staging: &Path) -> Result<()> {
    let base = staging
        .to_str()
        .ok_or_else(|| Error::PackageError(format!("Non UTF-8 path {}", staging.display())))?;
    let full = format!("{}/{}", Pattern::escape(base), pattern);

    // Matches are collected before anything is removed; parents sort first
    let mut matches = glob::glob_with(&full, PATH_MATCH)
        .map_err(|e| Error::PackageError(format!("Invalid remove pattern '{}': {}", pattern, e)))?
        .collect::<std::result::Result<Vec<PathBuf>, _>>()
        .map_err(|e| Error::PackageError(format!("Remove pattern '{}': {}", pattern, e)))?;
    matches.sort();

    let mut removed: Vec<PathBuf> = Vec::new();
    for path in matches {
        if removed.iter().any(|dir| path.starts_with(dir)) {
            continue;
        }
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            fs::remove_dir_all(&path)?;
            removed.push(path.clone());
        } else {
            fs::remove_file(&path)?;
        }
        debug!("removed {}", path.display());
    }
    Ok(())
}

/// Delete top-level entries that are not declared dirs
fn filter_to_layout(staging: &Path, dirs: &[String]) -> Result<Vec<String>> {
    let mut warnings = Vec::new();
    let mut entries: Vec<_> = fs::read_dir(staging)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let declared = dirs.iter().any(|d| *d == name) && entry.file_type()?.is_dir();
        if declared {
            continue;
        }
        let msg = format!("dropping '{}': not part of the package layout", name);
        debug!("{}", msg);
        warnings.push(msg);
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }

    Ok(warnings)
}

fn prune_empty_dirs(staging: &Path) -> Result<()> {
    for entry in WalkDir::new(staging).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|e| Error::Filesystem(e.to_string()))?;
        if entry.file_type().is_dir() && fs::read_dir(entry.path())?.next().is_none() {
            fs::remove_dir(entry.path())?;
        }
    }
    Ok(())
}

fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Filesystem(e.to_string()))?;
        if !entry.file_type().is_dir()
            && let Ok(rel) = entry.path().strip_prefix(root)
        {
            files.push(rel.to_path_buf());
        }
    }
    Ok(files)
}

/// File counts per top-level directory, for `pantry info`
pub fn summarize(root: &Path) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for file in list_files(root)? {
        if let Some(top) = file.components().next()
            && file.components().count() > 1
        {
            *counts
                .entry(top.as_os_str().to_string_lossy().into_owned())
                .or_insert(0) += 1;
        }
    }
    Ok(counts)
}
