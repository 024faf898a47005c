// src/commands/env.rs

//! Env command - print the resolved build environment

use super::{kitchen_config, resolve_recipe};
use crate::cli::RecipeArgs;
use anyhow::{Context, Result};
use pantry::config::PantryConfig;
use pantry::recipe::Kitchen;
use std::path::Path;

pub fn cmd_env(config: &PantryConfig, args: &RecipeArgs, prefix: Option<&Path>, json: bool) -> Result<()> {
    let resolved = resolve_recipe(config, args)?;
    let kitchen = Kitchen::new(kitchen_config(config, args));

    let default_prefix =
        kitchen
            .store()
            .package_dir(resolved.name(), resolved.version(), &resolved.package_id());
    let prefix = prefix.unwrap_or(&default_prefix);

    let env = kitchen
        .environment(&resolved, prefix)
        .with_context(|| format!("Failed to resolve environment for {}", resolved.name()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&env)?);
        return Ok(());
    }

    print!("{}", env.to_shell(resolved.settings().build_os));
    println!("# configure {}", env.configure_args.join(" "));
    println!("# make {}", env.make_args.join(" "));
    Ok(())
}
