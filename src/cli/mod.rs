// src/cli/mod.rs
//! CLI definitions for Pantry
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `cook` - Build a recipe and publish the package
//! - `fetch` - Download and verify sources only
//! - `validate` - Check a recipe without building
//! - `env` - Print the resolved build environment
//! - `info` - Show a published package's metadata
//! - `test` - Run a recipe's test commands against its package

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pantry")]
#[command(author = "Pantry Contributors")]
#[command(version)]
#[command(about = "Recipe-driven builds of autotools packages", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (default: $PANTRY_CONFIG, then <config dir>/pantry/pantry.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments shared by every command that resolves a recipe
#[derive(Args, Debug, Clone)]
pub struct RecipeArgs {
    /// Path to the recipe file
    pub recipe: PathBuf,

    /// Host setting override, e.g. `-s os=Windows` (repeatable)
    #[arg(short = 's', long = "setting", value_name = "KEY=VALUE")]
    pub settings: Vec<String>,

    /// Option value, e.g. `-o shared=true` (repeatable)
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
    pub options: Vec<String>,

    /// Profile file with host settings
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Package store (overrides the config file)
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Source download cache (overrides the config file)
    #[arg(long, value_name = "DIR")]
    pub source_cache: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a recipe and publish the package to the store
    Cook {
        #[command(flatten)]
        recipe: RecipeArgs,

        /// Number of parallel make jobs
        #[arg(short, long)]
        jobs: Option<u32>,

        /// Keep the build directory for debugging
        #[arg(long)]
        keep_builddir: bool,

        /// Per-step timeout in seconds (0 = no limit)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Run the recipe's test commands after publishing
        #[arg(long)]
        test: bool,

        /// Print the full build log
        #[arg(long)]
        log: bool,
    },

    /// Download and verify sources without building
    Fetch {
        #[command(flatten)]
        recipe: RecipeArgs,
    },

    /// Check a recipe and its option set without building
    Validate {
        #[command(flatten)]
        recipe: RecipeArgs,
    },

    /// Print the resolved build environment
    Env {
        #[command(flatten)]
        recipe: RecipeArgs,

        /// Install prefix to resolve against (default: the package's store path)
        #[arg(long, value_name = "DIR")]
        prefix: Option<PathBuf>,

        /// Print JSON instead of shell exports
        #[arg(long)]
        json: bool,
    },

    /// Show a published package's metadata
    Info {
        /// Package directory
        package: PathBuf,

        /// Print the raw metadata record
        #[arg(long)]
        json: bool,
    },

    /// Run a recipe's test commands against its published package
    Test {
        #[command(flatten)]
        recipe: RecipeArgs,
    },
}
