// src/commands/cook.rs

//! Cook command - build packages from recipes

use super::{kitchen_config, resolve_recipe};
use crate::cli::RecipeArgs;
use anyhow::{Context, Result};
use pantry::config::PantryConfig;
use pantry::package::InstalledPackage;
use pantry::recipe::Kitchen;
use std::time::Duration;
use tracing::info;

/// Flags that only `cook` takes
#[derive(Debug, Default)]
pub struct CookOptions {
    pub jobs: Option<u32>,
    pub keep_builddir: bool,
    pub timeout_secs: Option<u64>,
    pub run_tests: bool,
    pub print_log: bool,
}

/// Cook a package from a recipe and publish it to the store
pub fn cmd_cook(config: &PantryConfig, args: &RecipeArgs, opts: &CookOptions) -> Result<()> {
    let resolved = resolve_recipe(config, args)?;

    let mut kitchen_cfg = kitchen_config(config, args);
    if let Some(j) = opts.jobs {
        kitchen_cfg.jobs = j;
    }
    if let Some(secs) = opts.timeout_secs {
        kitchen_cfg.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    kitchen_cfg.keep_builddir |= opts.keep_builddir;

    let kitchen = Kitchen::new(kitchen_cfg);

    println!(
        "Cooking with {} parallel jobs for {}",
        kitchen.config().jobs,
        resolved
            .settings()
            .to_map()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    );
    if resolved.settings().is_cross_building() {
        println!("  - Cross-building");
    }
    match kitchen.sources_cached(&resolved) {
        Ok(true) => println!("  - Sources already cached (offline build possible)"),
        Ok(false) => {}
        Err(e) => println!("Warning: {}", e),
    }

    let result = kitchen
        .cook(&resolved)
        .with_context(|| format!("Failed to cook {}", resolved.name()))?;

    if opts.print_log {
        println!("\n{}", result.log);
    }
    for warning in &result.warnings {
        println!("Warning: {}", warning);
    }

    println!("\n[COMPLETE] Package published:");
    println!("  Path: {}", result.package_path.display());
    println!("  Id:   {}", result.info.package_id);
    if let Some(dir) = &result.build_dir {
        println!("  Build directory kept at {}", dir.display());
    }

    if opts.run_tests {
        let package = InstalledPackage {
            root: result.package_path.clone(),
            info: result.info.clone(),
        };
        info!("Testing {}", package.root.display());
        let outcome = kitchen
            .test(&resolved, &package)
            .with_context(|| format!("Tests failed for {}", resolved.name()))?;
        match outcome.skipped {
            Some(reason) => println!("Tests skipped: {}", reason),
            None => println!("[OK] {} test command(s) passed", outcome.steps.len()),
        }
    }

    Ok(())
}
