// src/commands/fetch.rs

//! Fetch command - download and verify sources only

use super::{kitchen_config, resolve_recipe};
use crate::cli::RecipeArgs;
use anyhow::{Context, Result};
use pantry::config::PantryConfig;
use pantry::recipe::Kitchen;

pub fn cmd_fetch(config: &PantryConfig, args: &RecipeArgs) -> Result<()> {
    let resolved = resolve_recipe(config, args)?;
    let kitchen = Kitchen::new(kitchen_config(config, args));

    println!("Fetching sources...");
    let sources = kitchen
        .fetch(&resolved)
        .with_context(|| format!("Failed to fetch sources for {}", resolved.name()))?;

    if sources.is_empty() {
        println!("[OK] Recipe uses a local source; nothing to download");
        return Ok(());
    }

    println!("\n[COMPLETE] Fetched {} source file(s):", sources.len());
    for source in &sources {
        println!("  - {}", source.display());
    }

    if kitchen.sources_cached(&resolved)? {
        println!("\n[OK] All sources are cached. Ready for offline build.");
    }

    Ok(())
}
