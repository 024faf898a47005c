// src/recipe/format.rs

//! Recipe file format definitions
//!
//! Recipes are TOML files that describe how to build a package from an
//! upstream autotools source tree and how to lay out the result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::condition::Condition;
use super::options::OptionDecl;
use crate::error::{Error, Result};

/// A complete recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Runtime/link dependencies (`name/version`)
    #[serde(default)]
    pub requires: Vec<String>,

    /// Tools needed only to build (`name/version`)
    #[serde(default)]
    pub build_requires: Vec<String>,

    /// Package metadata
    pub package: PackageSection,

    /// Declared options
    #[serde(default)]
    pub options: BTreeMap<String, OptionDecl>,

    /// Upstream source
    pub source: SourceSection,

    /// Patches to apply (optional)
    #[serde(default)]
    pub patches: Option<PatchSection>,

    /// Build instructions
    #[serde(default)]
    pub build: BuildSection,

    /// How installed files become the package
    #[serde(default)]
    pub layout: LayoutSection,

    /// Metadata exported to consumers
    #[serde(default)]
    pub info: InfoSection,

    /// Smoke test run against the finished package (optional)
    #[serde(default)]
    pub test: Option<TestSection>,

    /// Variables for substitution (optional)
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Directory the recipe was read from; relative paths resolve here
    #[serde(skip)]
    pub recipe_dir: Option<PathBuf>,
}

impl Recipe {
    /// Substitute variables in a string
    ///
    /// Replaces `%(name)s` patterns with, in order:
    /// 1. Built-in variables (`name`, `version`)
    /// 2. Custom variables from the `[variables]` section
    /// 3. `extra`, supplied by the caller (prefix, options, dependencies)
    ///
    /// Unknown placeholders are left untouched.
    pub fn substitute(&self, template: &str, extra: &BTreeMap<String, String>) -> String {
        let mut result = template.to_string();

        result = result.replace("%(version)s", &self.package.version);
        result = result.replace("%(name)s", &self.package.name);

        for (key, value) in self.variables.iter().chain(extra.iter()) {
            result = result.replace(&format!("%({})s", key), value);
        }

        result
    }

    /// Archive URL with variables substituted
    pub fn archive_url(&self) -> Option<String> {
        self.source
            .archive
            .as_ref()
            .map(|a| self.substitute(a, &BTreeMap::new()))
    }

    /// Archive filename taken from the URL
    pub fn archive_filename(&self) -> String {
        self.archive_url()
            .as_deref()
            .and_then(|url| url.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .unwrap_or("source.tar.gz")
            .to_string()
    }

    /// Resolve a path from the recipe relative to the recipe's directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        match &self.recipe_dir {
            Some(dir) if p.is_relative() => dir.join(p),
            _ => p.to_path_buf(),
        }
    }

    /// Parsed `requires`
    pub fn requirements(&self) -> Result<Vec<Requirement>> {
        self.requires.iter().map(|r| r.parse()).collect()
    }

    /// Parsed `build_requires`
    pub fn build_requirements(&self) -> Result<Vec<Requirement>> {
        self.build_requires.iter().map(|r| r.parse()).collect()
    }
}

/// Package metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,

    pub version: String,

    /// Release number (for rebuilds of same version)
    #[serde(default = "default_release")]
    pub release: String,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// License identifier (SPDX)
    #[serde(default)]
    pub license: Option<String>,

    #[serde(default)]
    pub homepage: Option<String>,

    #[serde(default)]
    pub topics: Vec<String>,
}

fn default_release() -> String {
    "1".to_string()
}

/// A `name/version` dependency reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub version: String,
}

impl FromStr for Requirement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('/') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => Ok(Self {
                name: name.to_string(),
                version: version.to_string(),
            }),
            _ => Err(Error::ParseError(format!(
                "Invalid requirement '{}': expected name/version",
                s
            ))),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Source section
///
/// Either `archive` + `checksum` (downloaded and cached) or `path`
/// (a local archive or directory, used as is).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSection {
    /// Source archive URL, supports `%(version)s`
    #[serde(default)]
    pub archive: Option<String>,

    /// Checksum for the archive (`sha256:...` or `xxh128:...`)
    #[serde(default)]
    pub checksum: Option<String>,

    /// Local archive or directory, relative to the recipe
    #[serde(default)]
    pub path: Option<String>,

    /// Directory name after extraction (if not the single top-level dir)
    #[serde(default)]
    pub extract_dir: Option<String>,
}

/// Patch configuration section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PatchSection {
    #[serde(default)]
    pub files: Vec<PatchInfo>,
}

/// A single patch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchInfo {
    /// Patch URL or path relative to the recipe
    pub file: String,

    /// Checksum, required for remote patches
    #[serde(default)]
    pub checksum: Option<String>,

    /// Strip level for patch (default: 1)
    #[serde(default = "default_strip")]
    pub strip: u32,

    /// Apply only if the condition matches
    #[serde(default)]
    pub when: Option<Condition>,
}

impl PatchInfo {
    pub fn is_remote(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }
}

fn default_strip() -> u32 {
    1
}

/// Build instructions section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSection {
    /// Run `autoreconf -fiv` before configuring
    #[serde(default)]
    pub autoreconf: bool,

    /// Arguments passed to `configure` after `--prefix`
    ///
    /// Supports `%(variable)s` substitution.
    #[serde(default)]
    pub configure_args: Vec<String>,

    /// Option-driven arguments: option name, then option value (or `*`)
    /// to the arguments it adds. `%(value)s` expands to the value.
    ///
    /// ```toml
    /// [build.option_args.shared]
    /// true = ["--enable-shared", "--disable-static"]
    /// false = ["--disable-shared", "--enable-static"]
    /// ```
    #[serde(default)]
    pub option_args: BTreeMap<String, BTreeMap<String, Vec<String>>>,

    /// Extra arguments for every `make` invocation
    #[serde(default)]
    pub make_args: Vec<String>,

    /// Target used for the install step
    #[serde(default = "default_install_target")]
    pub install_target: String,

    /// Environment variables to set during build
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Working directory within source (relative path)
    #[serde(default)]
    pub workdir: Option<String>,

    /// Number of parallel jobs (default: kitchen setting)
    #[serde(default)]
    pub jobs: Option<u32>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            autoreconf: false,
            configure_args: Vec::new(),
            option_args: BTreeMap::new(),
            make_args: Vec::new(),
            install_target: default_install_target(),
            environment: BTreeMap::new(),
            workdir: None,
            jobs: None,
        }
    }
}

fn default_install_target() -> String {
    "install".to_string()
}

/// Where a copy rule reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopySource {
    /// The unpacked (and built) source tree
    #[default]
    Source,
    /// The tree produced by `make install`
    Install,
}

/// Copy files matching a glob into the package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyRule {
    /// Glob matched against paths relative to `src`, at any depth
    pub pattern: String,

    #[serde(default)]
    pub src: CopySource,

    /// Destination directory relative to the package root
    pub dst: String,

    /// Keep the matched file's directory structure under `dst`
    #[serde(default = "default_true")]
    pub keep_path: bool,

    #[serde(default)]
    pub when: Option<Condition>,
}

/// Rename a path inside the package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRule {
    pub from: String,
    pub to: String,

    /// Skip silently when `from` does not exist
    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub when: Option<Condition>,
}

/// Packaging layout section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSection {
    /// Top-level directories a package may contain
    #[serde(default = "default_layout_dirs")]
    pub dirs: Vec<String>,

    #[serde(default)]
    pub copy: Vec<CopyRule>,

    #[serde(default)]
    pub rename: Vec<RenameRule>,

    /// Globs relative to the package root to delete
    #[serde(default)]
    pub remove: Vec<String>,
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            dirs: default_layout_dirs(),
            copy: Vec::new(),
            rename: Vec::new(),
            remove: Vec::new(),
        }
    }
}

fn default_layout_dirs() -> Vec<String> {
    ["include", "lib", "bin", "licenses"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

/// A framework to link, optionally conditional (macOS)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkRef {
    pub name: String,
    #[serde(default)]
    pub when: Option<Condition>,
}

/// Metadata exported to consumers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoSection {
    /// Library names to link (without `lib` prefix or extension)
    #[serde(default)]
    pub libs: Vec<String>,

    #[serde(default)]
    pub frameworks: Vec<FrameworkRef>,

    /// Variable name to package-relative paths appended to it
    #[serde(default)]
    pub env_append: BTreeMap<String, Vec<String>>,
}

/// Consumer smoke test
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSection {
    /// Shell commands run with the package environment applied
    #[serde(default)]
    pub commands: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const GETTEXT_RECIPE: &str = r#"
requires = ["libiconv/1.16"]
build_requires = ["libtool/2.4.6"]

[package]
name = "gettext"
version = "0.21"
summary = "An internationalization and localization system"
license = "GPL-3.0-or-later"

[options.shared]
values = [true, false]
default = false

[source]
archive = "https://ftp.gnu.org/pub/gnu/gettext/gettext-%(version)s.tar.gz"
checksum = "sha256:c77d0da3102aec9c07f43671e60611ebff89a996ef159497ce8e59d075786b12"

[[patches.files]]
file = "patches/0001-fix-msvc.patch"
when = "compiler=msvc"

[build]
autoreconf = true
configure_args = ["--disable-nls", "--with-libiconv-prefix=%(dep.libiconv.root)s"]

[build.option_args.shared]
true = ["--enable-shared", "--disable-static"]
false = ["--disable-shared", "--enable-static"]

[[layout.copy]]
pattern = "COPYING"
dst = "licenses"

[[layout.rename]]
from = "include/libgnuintl.h"
to = "include/libintl.h"

[info]
libs = ["gnuintl"]
frameworks = [{ name = "CoreFoundation", when = "os=Macos" }]

[info.env_append]
PATH = ["bin"]
"#;

    #[test]
    fn test_parse_recipe() {
        let recipe: Recipe = toml::from_str(GETTEXT_RECIPE).unwrap();

        assert_eq!(recipe.package.name, "gettext");
        assert_eq!(recipe.package.release, "1");
        assert_eq!(recipe.requires, vec!["libiconv/1.16"]);
        assert!(recipe.options.contains_key("shared"));
        assert!(recipe.build.autoreconf);
        assert_eq!(recipe.build.install_target, "install");
        assert_eq!(recipe.build.option_args["shared"]["true"].len(), 2);
        assert_eq!(recipe.layout.dirs, vec!["include", "lib", "bin", "licenses"]);
        assert!(recipe.layout.copy[0].keep_path);
        assert_eq!(recipe.layout.copy[0].src, CopySource::Source);
        assert_eq!(recipe.info.frameworks[0].name, "CoreFoundation");
        assert!(recipe.info.frameworks[0].when.is_some());

        let patch = &recipe.patches.as_ref().unwrap().files[0];
        assert_eq!(patch.strip, 1);
        assert!(!patch.is_remote());
    }

    #[test]
    fn test_archive_url_and_filename() {
        let recipe: Recipe = toml::from_str(GETTEXT_RECIPE).unwrap();
        assert_eq!(
            recipe.archive_url().as_deref(),
            Some("https://ftp.gnu.org/pub/gnu/gettext/gettext-0.21.tar.gz")
        );
        assert_eq!(recipe.archive_filename(), "gettext-0.21.tar.gz");
    }

    #[test]
    fn test_substitute_order() {
        let mut recipe: Recipe = toml::from_str(GETTEXT_RECIPE).unwrap();
        recipe.variables.insert("flavor".into(), "gnu".into());

        let mut extra = BTreeMap::new();
        extra.insert("prefix".to_string(), "/pkg".to_string());

        let out = recipe.substitute("%(name)s-%(flavor)s --prefix=%(prefix)s %(missing)s", &extra);
        assert_eq!(out, "gettext-gnu --prefix=/pkg %(missing)s");
    }

    #[test]
    fn test_requirements() {
        let recipe: Recipe = toml::from_str(GETTEXT_RECIPE).unwrap();
        let reqs = recipe.requirements().unwrap();
        assert_eq!(reqs[0].name, "libiconv");
        assert_eq!(reqs[0].version, "1.16");
        assert_eq!(reqs[0].to_string(), "libiconv/1.16");

        assert!("libiconv".parse::<Requirement>().is_err());
        assert!("/1.0".parse::<Requirement>().is_err());
    }

    #[test]
    fn test_resolve_path() {
        let mut recipe: Recipe = toml::from_str(GETTEXT_RECIPE).unwrap();
        assert_eq!(recipe.resolve_path("a.patch"), PathBuf::from("a.patch"));

        recipe.recipe_dir = Some(PathBuf::from("/recipes/gettext"));
        assert_eq!(
            recipe.resolve_path("a.patch"),
            PathBuf::from("/recipes/gettext/a.patch")
        );
        assert_eq!(recipe.resolve_path("/abs.patch"), PathBuf::from("/abs.patch"));
    }

    #[test]
    fn test_minimal_recipe() {
        let minimal = r#"
[package]
name = "hello"
version = "1.0"

[source]
path = "src"
"#;
        let recipe: Recipe = toml::from_str(minimal).unwrap();
        assert!(recipe.patches.is_none());
        assert!(recipe.options.is_empty());
        assert_eq!(recipe.archive_filename(), "source.tar.gz");
        assert!(recipe.test.is_none());
    }
}
