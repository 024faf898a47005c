// src/commands/info.rs

//! Info command - show a published package's metadata

use anyhow::{Context, Result};
use pantry::package::{summarize, PackageInfo};
use std::path::Path;

pub fn cmd_info(package: &Path, json: bool) -> Result<()> {
    let info = PackageInfo::read_from(package)
        .with_context(|| format!("Not a pantry package: {}", package.display()))?;

    if json {
        print!("{}", info.to_json()?);
        return Ok(());
    }

    println!("Package: {} {}-{}", info.name, info.version, info.release);
    println!("Id:      {}", info.package_id);
    if let Some(summary) = &info.summary {
        println!("Summary: {}", summary);
    }
    if let Some(license) = &info.license {
        println!("License: {}", license);
    }

    println!("Settings:");
    for (key, value) in &info.settings {
        println!("  {} = {}", key, value);
    }
    if !info.options.is_empty() {
        println!("Options:");
        for (key, value) in &info.options {
            println!("  {} = {}", key, value);
        }
    }
    if !info.requires.is_empty() {
        println!("Requires: {}", info.requires.join(", "));
    }
    if !info.libs.is_empty() {
        println!("Libs: {}", info.libs.join(" "));
    }
    if !info.frameworks.is_empty() {
        println!("Frameworks: {}", info.frameworks.join(" "));
    }
    for (var, paths) in &info.env_append {
        println!("Env: {} += {}", var, paths.join(":"));
    }

    println!("Contents:");
    for (dir, count) in summarize(package)? {
        println!("  {}/ ({} files)", dir, count);
    }
    Ok(())
}
