// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Arguments shared by commands that resolve a recipe
fn recipe_args(cmd: Command) -> Command {
    cmd.arg(Arg::new("recipe").required(true).help("Path to the recipe file"))
        .arg(
            Arg::new("setting")
                .short('s')
                .long("setting")
                .value_name("KEY=VALUE")
                .action(ArgAction::Append)
                .help("Host setting override, e.g. os=Windows"),
        )
        .arg(
            Arg::new("option")
                .short('o')
                .long("option")
                .value_name("NAME=VALUE")
                .action(ArgAction::Append)
                .help("Option value, e.g. shared=true"),
        )
        .arg(Arg::new("profile").long("profile").value_name("FILE").help("Profile file with host settings"))
        .arg(Arg::new("store").long("store").value_name("DIR").help("Package store"))
        .arg(
            Arg::new("source_cache")
                .long("source-cache")
                .value_name("DIR")
                .help("Source download cache"),
        )
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("pantry")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Pantry Contributors")
        .about("Recipe-driven builds of autotools packages")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v debug, -vv trace)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Config file (default: $PANTRY_CONFIG, then <config dir>/pantry/pantry.toml)"),
        )
        .subcommand(
            recipe_args(Command::new("cook").about("Build a recipe and publish the package to the store"))
                .arg(Arg::new("jobs").short('j').long("jobs").help("Number of parallel make jobs"))
                .arg(flag("keep-builddir", "Keep the build directory for debugging"))
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("SECS")
                        .help("Per-step timeout in seconds (0 = no limit)"),
                )
                .arg(flag("test", "Run the recipe's test commands after publishing"))
                .arg(flag("log", "Print the full build log")),
        )
        .subcommand(recipe_args(Command::new("fetch").about("Download and verify sources without building")))
        .subcommand(recipe_args(
            Command::new("validate").about("Check a recipe and its option set without building"),
        ))
        .subcommand(
            recipe_args(Command::new("env").about("Print the resolved build environment"))
                .arg(Arg::new("prefix").long("prefix").value_name("DIR").help("Install prefix to resolve against"))
                .arg(flag("json", "Print JSON instead of shell exports")),
        )
        .subcommand(
            Command::new("info")
                .about("Show a published package's metadata")
                .arg(Arg::new("package").required(true).help("Package directory"))
                .arg(flag("json", "Print the raw metadata record")),
        )
        .subcommand(recipe_args(
            Command::new("test").about("Run a recipe's test commands against its published package"),
        ))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("pantry.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
