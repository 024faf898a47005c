// src/commands/mod.rs
//! Command handlers for the Pantry CLI

mod cook;
mod env;
mod fetch;
mod info;
mod validate;

pub use cook::{cmd_cook, CookOptions};
pub use env::cmd_env;
pub use fetch::cmd_fetch;
pub use info::cmd_info;
pub use test::cmd_test;
pub use validate::cmd_validate;

use crate::cli::RecipeArgs;
use anyhow::{Context, Result};
use pantry::config::PantryConfig;
use pantry::recipe::options::parse_option_args;
use pantry::recipe::{parse_recipe_file, KitchenConfig, ResolvedRecipe};
use pantry::settings::{load_profile, Settings};
use std::path::Path;
use tracing::debug;

/// Host settings: detected, config `[profile]`, `--profile`, then `-s`
pub(crate) fn host_settings(config: &PantryConfig, args: &RecipeArgs) -> Result<Settings> {
    let mut settings = config
        .host_settings()
        .context("Invalid [profile] in config")?;

    if let Some(profile) = &args.profile {
        let overrides = load_profile(profile)
            .with_context(|| format!("Failed to load profile: {}", profile.display()))?;
        settings
            .apply(&overrides)
            .with_context(|| format!("Invalid setting in {}", profile.display()))?;
    }

    settings
        .apply_args(&args.settings)
        .context("Invalid -s setting")?;

    debug!("Host settings: {:?}", settings.to_map());
    Ok(settings)
}

/// Kitchen configuration with command-line overrides applied
pub(crate) fn kitchen_config(config: &PantryConfig, args: &RecipeArgs) -> KitchenConfig {
    let mut kitchen = config.kitchen_config();
    if let Some(store) = &args.store {
        kitchen.store = store.clone();
    }
    if let Some(cache) = &args.source_cache {
        kitchen.source_cache = cache.clone();
    }
    kitchen
}

/// Parse, validate and resolve the recipe named on the command line
pub(crate) fn resolve_recipe(config: &PantryConfig, args: &RecipeArgs) -> Result<ResolvedRecipe> {
    let recipe_path: &Path = &args.recipe;
    println!("Reading recipe: {}", recipe_path.display());

    let recipe = parse_recipe_file(recipe_path)
        .with_context(|| format!("Failed to parse recipe: {}", recipe_path.display()))?;
    println!("Recipe: {} version {}", recipe.package.name, recipe.package.version);

    let settings = host_settings(config, args)?;
    let options = parse_option_args(&args.options).context("Invalid -o option")?;

    let resolved = ResolvedRecipe::resolve(recipe, &settings, &options)
        .with_context(|| "Recipe validation failed")?;

    for warning in resolved.warnings() {
        println!("Warning: {}", warning);
    }

    Ok(resolved)
}
