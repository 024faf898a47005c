// src/recipe/kitchen/mod.rs

//! Kitchen: the build driver for cooking recipes
//!
//! The Kitchen takes a resolved recipe through the whole pipeline:
//! - Looking up `requires` in the package store
//! - Fetching source archives and patches (cached by checksum)
//! - Extracting and patching sources
//! - Running autoreconf, configure, make and make install
//! - Handing the install tree to the packaging stage
//!
//! Every step runs to completion before the next starts. The first
//! failing step aborts the cook; nothing is published in that case.

pub mod archive;
mod config;
mod cook;

pub use config::{BuildResult, CookResult, KitchenConfig, StepRecord};
pub use cook::Cook;

use crate::environment::{self, ResolveInputs, ResolvedEnvironment};
use crate::error::{Error, Result};
use crate::hash::{verify_file, Checksum};
use crate::package::{self, InstalledPackage, PackageStore};
use crate::recipe::ResolvedRecipe;
use archive::download_file;
use cook::{prepend_paths, ShellStep};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of running a recipe's `[test]` commands
#[derive(Debug, Default)]
pub struct TestOutcome {
    /// Set when the tests could not run on this machine
    pub skipped: Option<String>,
    pub steps: Vec<StepRecord>,
}

/// The Kitchen: where recipes are cooked
pub struct Kitchen {
    pub(crate) config: KitchenConfig,
    store: PackageStore,
}

impl Kitchen {
    /// Create a new Kitchen with the given configuration
    pub fn new(config: KitchenConfig) -> Self {
        let store = PackageStore::new(&config.store);
        Self { config, store }
    }

    /// Create a Kitchen with default configuration
    pub fn with_defaults() -> Self {
        Self::new(KitchenConfig::default())
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    pub fn store(&self) -> &PackageStore {
        &self.store
    }

    /// Find a store package for every `requires` entry, in recipe order
    pub fn dependencies(&self, resolved: &ResolvedRecipe) -> Result<Vec<InstalledPackage>> {
        resolved
            .requirements()
            .iter()
            .map(|req| self.store.find(req, resolved.settings()))
            .collect()
    }

    /// Look up `build_requires` tools on PATH
    ///
    /// Returns one warning per tool that cannot be found; a missing tool
    /// is left for the build itself to trip over.
    pub fn check_build_requires(&self, resolved: &ResolvedRecipe) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        for req in resolved.recipe().build_requirements()? {
            match which::which(&req.name) {
                Ok(path) => debug!("build requirement {} found at {}", req, path.display()),
                Err(_) => {
                    let msg = format!("build requirement {} not found on PATH", req);
                    warn!("{}", msg);
                    warnings.push(msg);
                }
            }
        }
        Ok(warnings)
    }

    /// Resolve the build environment against the store's packages
    pub fn environment(&self, resolved: &ResolvedRecipe, prefix: &Path) -> Result<ResolvedEnvironment> {
        let dependencies = self.dependencies(resolved)?;
        environment::resolve(
            resolved,
            &ResolveInputs {
                prefix,
                jobs: self.config.jobs,
                dependencies: &dependencies,
                msvc_wrappers: &self.config.msvc_wrappers,
            },
        )
    }

    /// Cook a recipe and publish the package
    ///
    /// This is the main entry point for building from source.
    ///
    /// ## Cooking Process
    /// 1. **Requirements**: check `build_requires`, load `requires` from the store
    /// 2. **Prep**: fetch source archives and patches
    /// 3. **Unpack**: extract sources and apply patches
    /// 4. **Simmer**: run autoreconf/configure/make/install
    /// 5. **Plate**: assemble the package and publish it to the store
    pub fn cook(&self, resolved: &ResolvedRecipe) -> Result<CookResult> {
        info!(
            "Cooking {} version {}",
            resolved.name(),
            resolved.version()
        );

        let mut warnings = self.check_build_requires(resolved)?;
        let dependencies = self.dependencies(resolved)?;
        let mut cook = Cook::new(self, resolved, &dependencies)?;

        let outcome = (|| -> Result<package::Published> {
            info!("Prep: fetching ingredients...");
            cook.prep()?;

            info!("Unpacking and patching sources...");
            cook.unpack()?;
            cook.patch()?;

            info!("Simmering: running build...");
            cook.simmer()?;

            info!("Plating: assembling package...");
            let build = cook.result();
            package::package(&self.store, resolved, &build)
        })();

        let log = std::mem::take(&mut cook.log);
        warnings.append(&mut cook.warnings);

        let build_dir = if self.config.keep_builddir {
            let path = cook.keep_build_dir();
            info!("Build directory kept at {}", path.display());
            Some(path)
        } else {
            None
        };

        let published = outcome?;
        warnings.extend(published.warnings);

        info!(
            "Cooked: {} ({})",
            published.path.display(),
            published.info.package_id
        );

        Ok(CookResult {
            package_path: published.path,
            info: published.info,
            log,
            warnings,
            build_dir,
        })
    }

    /// Run the recipe's `[test]` commands against a published package
    ///
    /// Commands run through the shell in a scratch directory with the
    /// package's `bin` dirs and `env_append` entries put in front of the
    /// inherited environment. Nothing runs when cross-building.
    pub fn test(&self, resolved: &ResolvedRecipe, package: &InstalledPackage) -> Result<TestOutcome> {
        let commands = resolved
            .recipe()
            .test
            .as_ref()
            .map(|t| t.commands.as_slice())
            .unwrap_or_default();

        if commands.is_empty() {
            return Ok(TestOutcome {
                skipped: Some("recipe has no test commands".to_string()),
                steps: Vec::new(),
            });
        }
        if resolved.settings().is_cross_building() {
            info!("Cross-building, skipping tests");
            return Ok(TestOutcome {
                skipped: Some("cross-building".to_string()),
                steps: Vec::new(),
            });
        }

        let scratch = tempfile::Builder::new()
            .prefix(&format!("pantry-test-{}-", resolved.name()))
            .tempdir()?;
        let env = package_environment(package, resolved);

        let mut vars = BTreeMap::new();
        vars.insert("package_root".to_string(), package.root.display().to_string());

        let mut outcome = TestOutcome::default();
        for (index, template) in commands.iter().enumerate() {
            let command = resolved.recipe().substitute(template, &vars);
            let record = ShellStep {
                shell: &self.config.shell,
                name: "test",
                command: &command,
                workdir: scratch.path(),
                env: env.clone(),
                timeout: self.config.timeout,
                log_dir: scratch.path().join(".logs"),
                index,
            }
            .run()?;

            let result = record.check();
            outcome.steps.push(record);
            result?;
        }

        info!("{} test command(s) passed", outcome.steps.len());
        Ok(outcome)
    }

    /// Fetch sources for a recipe without building
    ///
    /// Downloads and verifies the source archive and every remote patch,
    /// caching them locally so a later cook can run offline.
    ///
    /// # Returns
    /// A list of paths to the fetched and cached source files.
    pub fn fetch(&self, resolved: &ResolvedRecipe) -> Result<Vec<PathBuf>> {
        info!(
            "Fetching sources for {} version {}",
            resolved.name(),
            resolved.version()
        );

        let mut fetched = Vec::new();
        for (url, checksum) in remote_sources(resolved)? {
            info!("Fetching: {}", url);
            fetched.push(self.fetch_source(&url, &checksum)?);
        }

        info!(
            "Fetched {} source file(s) for {}",
            fetched.len(),
            resolved.name()
        );

        Ok(fetched)
    }

    /// Check if all remote sources for a recipe are already cached
    pub fn sources_cached(&self, resolved: &ResolvedRecipe) -> Result<bool> {
        for (_, checksum) in remote_sources(resolved)? {
            let key = Checksum::parse(&checksum)?.cache_key();
            if !self.config.source_cache.join(key).exists() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fetch a source file, verifying its checksum
    ///
    /// Cached files are re-verified and downloaded again when they no
    /// longer match.
    pub(crate) fn fetch_source(&self, url: &str, checksum: &str) -> Result<PathBuf> {
        let expected = Checksum::parse(checksum)?;
        fs::create_dir_all(&self.config.source_cache)?;

        let cache_key = expected.cache_key();
        let cached_path = self.config.source_cache.join(&cache_key);

        if cached_path.exists() {
            debug!("Using cached source: {}", cached_path.display());
            match verify_file(&cached_path, &expected) {
                Ok(()) => return Ok(cached_path),
                Err(Error::ChecksumMismatch { .. }) => {
                    warn!("Cached file checksum mismatch, re-downloading");
                    fs::remove_file(&cached_path)?;
                }
                Err(e) => return Err(e),
            }
        }

        info!("Downloading: {}", url);
        let temp_path = self.config.source_cache.join(format!("{}.tmp", cache_key));
        download_file(url, &temp_path)?;

        if let Err(e) = verify_file(&temp_path, &expected) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, &cached_path)?;
        Ok(cached_path)
    }
}

/// `(url, checksum)` of everything that has to be downloaded
fn remote_sources(resolved: &ResolvedRecipe) -> Result<Vec<(String, String)>> {
    let recipe = resolved.recipe();
    let mut sources = Vec::new();

    if let Some(url) = recipe.archive_url() {
        let checksum = recipe
            .source
            .checksum
            .clone()
            .ok_or_else(|| Error::ParseError("Source archive has no checksum".to_string()))?;
        sources.push((url, checksum));
    }

    for patch in resolved.active_patches() {
        if patch.is_remote() {
            let checksum = patch.checksum.clone().ok_or_else(|| {
                Error::ParseError(format!("Remote patch {} has no checksum", patch.file))
            })?;
            sources.push((patch.file.clone(), checksum));
        }
    }

    Ok(sources)
}

/// Environment for consumers of `package`: bin dirs and `env_append`
/// entries in front of the inherited values
fn package_environment(package: &InstalledPackage, resolved: &ResolvedRecipe) -> Vec<(OsString, OsString)> {
    let separator = ResolvedEnvironment::path_separator(resolved.settings().build_os);

    let mut lists: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    lists.insert("PATH".to_string(), package.bin_paths());
    for (var, paths) in package.env_appends() {
        lists.entry(var).or_default().extend(paths);
    }

    let mut env: Vec<(OsString, OsString)> = lists
        .into_iter()
        .filter(|(_, paths)| !paths.is_empty())
        .map(|(var, paths)| {
            let merged = prepend_paths(&paths, std::env::var_os(&var), separator);
            (OsString::from(var), merged)
        })
        .collect();
    env.push((
        OsString::from("PANTRY_PACKAGE_ROOT"),
        package.root.clone().into_os_string(),
    ));
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{hash_bytes, HashAlgorithm};
    use crate::recipe::options::parse_option_args;
    use crate::recipe::parse_recipe;
    use crate::settings::Settings;

    fn kitchen(dir: &Path) -> Kitchen {
        Kitchen::new(KitchenConfig {
            source_cache: dir.join("cache"),
            store: dir.join("store"),
            ..KitchenConfig::default()
        })
    }

    fn resolve(recipe: &str) -> ResolvedRecipe {
        let recipe = parse_recipe(recipe).unwrap();
        ResolvedRecipe::resolve(recipe, &Settings::detect(), &parse_option_args::<&str>(&[]).unwrap())
            .unwrap()
    }

    #[test]
    fn test_fetch_source_caches_by_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let kitchen = kitchen(dir.path());

        let upstream = dir.path().join("hello-1.0.tar.gz");
        fs::write(&upstream, b"not really a tarball").unwrap();
        let checksum = hash_bytes(HashAlgorithm::Sha256, b"not really a tarball").to_string();
        let url = format!("file://{}", upstream.display());

        let cached = kitchen.fetch_source(&url, &checksum).unwrap();
        assert!(cached.starts_with(dir.path().join("cache")));
        assert!(cached.file_name().unwrap().to_string_lossy().starts_with("sha256_"));

        // Served from cache even when upstream is gone
        fs::remove_file(&upstream).unwrap();
        assert_eq!(kitchen.fetch_source(&url, &checksum).unwrap(), cached);
    }

    #[test]
    fn test_fetch_source_rejects_bad_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let kitchen = kitchen(dir.path());

        let upstream = dir.path().join("hello.tar.gz");
        fs::write(&upstream, b"tampered").unwrap();
        let checksum = hash_bytes(HashAlgorithm::Sha256, b"original").to_string();

        let err = kitchen
            .fetch_source(&format!("file://{}", upstream.display()), &checksum)
            .unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
        // Nothing left behind in the cache
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("cache")).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_sources_cached_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let kitchen = kitchen(dir.path());

        let upstream = dir.path().join("hello-1.0.tar.gz");
        fs::write(&upstream, b"archive").unwrap();
        let checksum = hash_bytes(HashAlgorithm::Sha256, b"archive").to_string();

        let resolved = resolve(&format!(
            r#"
[package]
name = "hello"
version = "1.0"

[source]
archive = "file://{}/%(name)s-%(version)s.tar.gz"
checksum = "{}"
"#,
            dir.path().display(),
            checksum
        ));

        assert!(!kitchen.sources_cached(&resolved).unwrap());
        let fetched = kitchen.fetch(&resolved).unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(kitchen.sources_cached(&resolved).unwrap());
    }

    #[test]
    fn test_missing_build_requires_warn() {
        let dir = tempfile::tempdir().unwrap();
        let kitchen = kitchen(dir.path());
        let resolved = resolve(
            r#"
build_requires = ["pantry-no-such-tool/1.0"]

[package]
name = "hello"
version = "1.0"

[source]
path = "."
"#,
        );

        let warnings = kitchen.check_build_requires(&resolved).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("pantry-no-such-tool/1.0"));
    }

    #[test]
    fn test_missing_dependency_is_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let kitchen = kitchen(dir.path());
        let resolved = resolve(
            r#"
requires = ["libiconv/1.16"]

[package]
name = "hello"
version = "1.0"

[source]
path = "."
"#,
        );

        let err = kitchen.dependencies(&resolved).unwrap_err();
        assert!(matches!(err, Error::ResolutionError(_)));
    }
}
