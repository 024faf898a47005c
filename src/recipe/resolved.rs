// src/recipe/resolved.rs

//! A recipe bound to host settings and final option values
//!
//! Resolution is the last point where a recipe can change. From here on
//! the `ResolvedRecipe` is only handed out by shared reference, and the
//! environment resolver, build driver and packaging stage all read from it.

use crate::error::Result;
use crate::hash::{hash_bytes, HashAlgorithm};
use crate::settings::Settings;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::condition::{applies, Condition};
use super::format::{PatchInfo, Recipe, Requirement};
use super::options::{resolve_options, OptionSet, OptionValue};
use super::parser::validate_recipe;

/// Immutable result of binding a recipe to a configuration
#[derive(Debug, Clone)]
pub struct ResolvedRecipe {
    recipe: Recipe,
    settings: Settings,
    options: OptionSet,
    requirements: Vec<Requirement>,
    warnings: Vec<String>,
}

impl ResolvedRecipe {
    /// Validate the recipe and fix its option values for `settings`
    pub fn resolve(recipe: Recipe, settings: &Settings, user_options: &OptionSet) -> Result<Self> {
        let warnings = validate_recipe(&recipe)?;
        let options = resolve_options(&recipe.options, settings, user_options)?;
        let requirements = recipe.requirements()?;

        debug!(
            "Resolved {}/{} options: {:?}",
            recipe.package.name, recipe.package.version, options
        );

        Ok(Self {
            recipe,
            settings: settings.clone(),
            options,
            requirements,
            warnings,
        })
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Validation warnings collected during resolution
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn name(&self) -> &str {
        &self.recipe.package.name
    }

    pub fn version(&self) -> &str {
        &self.recipe.package.version
    }

    /// Whether an entry guarded by `when` applies to this configuration
    pub fn applies(&self, when: Option<&Condition>) -> bool {
        applies(when, &self.settings, &self.options)
    }

    /// Patches whose condition matches, in declaration order
    pub fn active_patches(&self) -> Vec<&PatchInfo> {
        self.recipe
            .patches
            .iter()
            .flat_map(|p| p.files.iter())
            .filter(|p| self.applies(p.when.as_ref()))
            .collect()
    }

    /// Package id: SHA-256 over everything that makes two builds differ
    ///
    /// Covers name, version, release, settings, option values and
    /// requirements. Everything is in sorted maps, so the id is stable
    /// across runs and machines.
    pub fn package_id(&self) -> String {
        #[derive(Serialize)]
        struct IdInput<'a> {
            name: &'a str,
            version: &'a str,
            release: &'a str,
            settings: BTreeMap<String, String>,
            options: BTreeMap<&'a str, String>,
            requires: Vec<String>,
        }

        let mut requires: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        requires.sort();

        let input = IdInput {
            name: self.name(),
            version: self.version(),
            release: &self.recipe.package.release,
            settings: self.settings.to_map(),
            options: self
                .options
                .iter()
                .map(|(k, v)| (k.as_str(), v.to_string()))
                .collect(),
            requires,
        };

        // Serializing plain maps and strings cannot fail
        let bytes = serde_json::to_vec(&input).unwrap_or_default();
        hash_bytes(HashAlgorithm::Sha256, &bytes).value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::options::parse_option_args;
    use crate::recipe::parser::parse_recipe;
    use crate::settings::{Arch, BuildType, Compiler, Os};

    const RECIPE: &str = r#"
requires = ["libiconv/1.16"]

[package]
name = "gettext"
version = "0.21"

[options.shared]
values = [true, false]
default = false

[options.fPIC]
values = [true, false]
default = true
remove_when = ["os=Windows", "shared=true"]

[source]
path = "src"

[[patches.files]]
file = "always.patch"

[[patches.files]]
file = "windows.patch"
when = "os=Windows"
"#;

    fn linux() -> Settings {
        Settings {
            os: Os::Linux,
            arch: Arch::X86_64,
            compiler: Compiler::Gcc,
            compiler_version: None,
            build_type: BuildType::Release,
            build_os: Os::Linux,
            build_arch: Arch::X86_64,
        }
    }

    fn resolve(settings: &Settings, opts: &[&str]) -> ResolvedRecipe {
        let recipe = parse_recipe(RECIPE).unwrap();
        ResolvedRecipe::resolve(recipe, settings, &parse_option_args(opts).unwrap()).unwrap()
    }

    #[test]
    fn test_active_patches_follow_settings() {
        let r = resolve(&linux(), &[]);
        let files: Vec<_> = r.active_patches().iter().map(|p| p.file.as_str()).collect();
        assert_eq!(files, vec!["always.patch"]);

        let mut windows = linux();
        windows.os = Os::Windows;
        windows.compiler = Compiler::Msvc;
        let r = resolve(&windows, &[]);
        assert_eq!(r.active_patches().len(), 2);
        assert!(r.option("fPIC").is_none());
    }

    #[test]
    fn test_package_id_is_stable() {
        let a = resolve(&linux(), &["shared=false"]);
        let b = resolve(&linux(), &[]);
        assert_eq!(a.package_id(), b.package_id());
        assert_eq!(a.package_id().len(), 64);
    }

    #[test]
    fn test_package_id_tracks_configuration() {
        let static_id = resolve(&linux(), &[]).package_id();
        let shared_id = resolve(&linux(), &["shared=true"]).package_id();
        assert_ne!(static_id, shared_id);

        let mut debug = linux();
        debug.build_type = BuildType::Debug;
        assert_ne!(static_id, resolve(&debug, &[]).package_id());
    }

    #[test]
    fn test_invalid_option_rejected() {
        let recipe = parse_recipe(RECIPE).unwrap();
        let user = parse_option_args(&["shared=maybe"]).unwrap();
        assert!(ResolvedRecipe::resolve(recipe, &linux(), &user).is_err());
    }
}
