// src/recipe/mod.rs

//! Recipe system for building packages from source
//!
//! Recipes define how to build a package from an upstream source tree:
//! - Source archive and its checksum
//! - Patches to apply
//! - Options (shared/static, threading model, ...) and how they map
//!   onto `configure` arguments
//! - Packaging layout and the metadata exported to consumers
//!
//! # Culinary Terminology
//!
//! - **Recipe**: What to build and how (like a recipe card)
//! - **Cook**: Build a package from a recipe
//! - **Kitchen**: The build environment that drives the external tools
//! - **Prep**: Fetch and prepare sources
//! - **Simmer**: The actual build process
//! - **Plate**: Lay the result out as a package
//!
//! # Example Recipe
//!
//! ```toml
//! requires = ["libiconv/1.16"]
//!
//! [package]
//! name = "gettext"
//! version = "0.21"
//!
//! [options.shared]
//! values = [true, false]
//! default = false
//!
//! [source]
//! archive = "https://ftp.gnu.org/pub/gnu/gettext/gettext-%(version)s.tar.gz"
//! checksum = "sha256:c77d0da3..."
//!
//! [build]
//! autoreconf = true
//! configure_args = ["--disable-nls", "--with-libiconv-prefix=%(dep.libiconv.root)s"]
//!
//! [build.option_args.shared]
//! true = ["--enable-shared", "--disable-static"]
//! false = ["--disable-shared", "--enable-static"]
//!
//! [info]
//! libs = ["gnuintl"]
//! ```

pub mod condition;
mod format;
pub mod kitchen;
pub mod options;
pub mod parser;
mod resolved;

pub use condition::{Condition, ConditionKey};
pub use format::{
    BuildSection, CopyRule, CopySource, FrameworkRef, InfoSection, LayoutSection, PackageSection,
    PatchInfo, PatchSection, Recipe, RenameRule, Requirement, SourceSection, TestSection,
};
pub use kitchen::{BuildResult, Cook, CookResult, Kitchen, KitchenConfig, StepRecord, TestOutcome};
pub use options::{OptionDecl, OptionSet, OptionValue};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
pub use resolved::ResolvedRecipe;
