// src/recipe/kitchen/archive.rs

//! Source handling for the Kitchen: download, extract, copy, patch
//!
//! Downloading, extraction and patching are delegated to `curl`, `tar`
//! and `patch`.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use std::process::Command;
use walkdir::WalkDir;

/// Download a file from a URL
///
/// `file://` URLs are copied directly; everything else goes through curl.
pub fn download_file(url: &str, dest: &Path) -> Result<()> {
    if let Some(local) = url.strip_prefix("file://") {
        fs::copy(local, dest)
            .map_err(|e| Error::DownloadError(format!("Failed to copy {}: {}", local, e)))?;
        return Ok(());
    }

    let output = Command::new("curl")
        .args(["-fsSL", "-o"])
        .arg(dest)
        .arg(url)
        .output()
        .map_err(|e| Error::DownloadError(format!("curl failed: {}", e)))?;

    if !output.status.success() {
        return Err(Error::DownloadError(format!(
            "Failed to download {}: {}",
            url,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(())
}

/// Extract an archive to a destination directory
///
/// Supports: .tar.gz, .tgz, .tar.xz, .txz, .tar.bz2, .tbz2, .tar.zst, .tar
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let filename = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let flags: &[&str] = if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
        &["-xzf"]
    } else if filename.ends_with(".tar.xz") || filename.ends_with(".txz") {
        &["-xJf"]
    } else if filename.ends_with(".tar.bz2") || filename.ends_with(".tbz2") {
        &["-xjf"]
    } else if filename.ends_with(".tar.zst") {
        &["--zstd", "-xf"]
    } else if filename.ends_with(".tar") {
        &["-xf"]
    } else {
        return Err(Error::ParseError(format!(
            "Unknown archive format: {}",
            filename
        )));
    };

    let output = Command::new("tar")
        .args(flags)
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .output()
        .map_err(|e| Error::Filesystem(format!("tar failed: {}", e)))?;

    if !output.status.success() {
        return Err(Error::StepFailed {
            step: "extract".to_string(),
            code: output.status.code(),
            output: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(())
}

/// Recursively copy a directory, recreating symlinks rather than following them
pub fn copy_tree(src: &Path, dest: &Path) -> Result<u64> {
    let mut copied = 0;

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| Error::Filesystem(format!("Failed to walk {}: {}", src.display(), e)))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Filesystem(e.to_string()))?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            copy_entry(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Copy one file or symlink, creating parent directories
pub fn copy_entry(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let meta = fs::symlink_metadata(src)?;
    if meta.file_type().is_symlink() {
        let link = fs::read_link(src)?;
        if fs::symlink_metadata(dest).is_ok() {
            fs::remove_file(dest)?;
        }
        make_symlink(&link, dest)?;
    } else {
        fs::copy(src, dest)?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_symlink(link: &Path, dest: &Path) -> Result<()> {
    std::os::unix::fs::symlink(link, dest)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_symlink(link: &Path, dest: &Path) -> Result<()> {
    let resolved = dest.parent().map(|p| p.join(link)).unwrap_or_else(|| link.to_path_buf());
    fs::copy(resolved, dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_archive_unknown_format() {
        let result = extract_archive(Path::new("file.unknown"), Path::new("/tmp"));
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[test]
    fn test_download_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        fs::write(&src, b"payload").unwrap();

        let dest = dir.path().join("dest.txt");
        download_file(&format!("file://{}", src.display()), &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");

        let missing = download_file("file:///nonexistent/pantry", &dir.path().join("x"));
        assert!(matches!(missing, Err(Error::DownloadError(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_keeps_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("lib")).unwrap();
        fs::write(src.join("lib/libfoo.so.1"), b"elf").unwrap();
        std::os::unix::fs::symlink("libfoo.so.1", src.join("lib/libfoo.so")).unwrap();

        let dest = dir.path().join("dest");
        let copied = copy_tree(&src, &dest).unwrap();
        assert_eq!(copied, 2);

        let link = dest.join("lib/libfoo.so");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), Path::new("libfoo.so.1"));
    }
}
