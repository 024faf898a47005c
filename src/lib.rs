// src/lib.rs

//! Pantry: recipe-driven builds of autotools packages
//!
//! A recipe (TOML) names an upstream source archive, its patches, the
//! options it can be built with and how its output is laid out. Pantry
//! takes it through four strictly sequential stages:
//!
//! - [`recipe`]: parse, validate and bind to host [`settings`], fixing
//!   every option value ([`recipe::ResolvedRecipe`])
//! - [`environment`]: compute tools, flags, search paths and configure
//!   arguments as a pure function of the resolved recipe and its
//!   dependencies
//! - [`recipe::kitchen`]: fetch, unpack, patch, autoreconf, configure,
//!   make and install, recording every step
//! - [`package`]: lay the result out under `include/`, `lib/`, `bin/`
//!   and `licenses/`, write `pantry-package.json` and publish into the
//!   package store atomically

pub mod config;
pub mod environment;
mod error;
pub mod hash;
pub mod package;
pub mod recipe;
pub mod settings;

pub use error::{Error, Result};
pub use hash::{Checksum, HashAlgorithm, Hasher};
pub use package::{InstalledPackage, PackageInfo, PackageStore};
pub use recipe::{Cook, CookResult, Kitchen, KitchenConfig, Recipe, ResolvedRecipe};
pub use settings::Settings;
