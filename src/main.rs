// src/main.rs

use anyhow::Result;
use clap::Parser;
use pantry::config::PantryConfig;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise -v raises the default level
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = PantryConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Cook {
            recipe,
            jobs,
            keep_builddir,
            timeout,
            test,
            log,
        } => commands::cmd_cook(
            &config,
            &recipe,
            &commands::CookOptions {
                jobs,
                keep_builddir,
                timeout_secs: timeout,
                run_tests: test,
                print_log: log,
            },
        ),
        Commands::Fetch { recipe } => commands::cmd_fetch(&config, &recipe),
        Commands::Validate { recipe } => commands::cmd_validate(&config, &recipe),
        Commands::Env {
            recipe,
            prefix,
            json,
        } => commands::cmd_env(&config, &recipe, prefix.as_deref(), json),
        Commands::Info { package, json } => commands::cmd_info(&package, json),
        Commands::Test { recipe } => commands::cmd_test(&config, &recipe),
    }
}
