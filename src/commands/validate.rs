// src/commands/validate.rs

//! Validate command - check a recipe and its option set

use super::resolve_recipe;
use crate::cli::RecipeArgs;
use anyhow::Result;
use pantry::config::PantryConfig;

pub fn cmd_validate(config: &PantryConfig, args: &RecipeArgs) -> Result<()> {
    let resolved = resolve_recipe(config, args)?;

    println!("Recipe validation passed");
    println!("Options:");
    if resolved.options().is_empty() {
        println!("  (none)");
    }
    for (name, value) in resolved.options() {
        println!("  {} = {}", name, value);
    }
    for req in resolved.requirements() {
        println!("Requires: {}", req);
    }
    println!("Package id: {}", resolved.package_id());

    if resolved.warnings().is_empty() {
        println!("[OK] No issues found");
    } else {
        println!("[OK] {} warning(s)", resolved.warnings().len());
    }
    Ok(())
}
