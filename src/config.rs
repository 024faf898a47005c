// src/config.rs
//! Configuration file parsing for Pantry
//!
//! `pantry.toml` has two sections:
//! - [kitchen] - cache and store locations, jobs, timeouts, build tools
//! - [profile] - default host settings (same keys as `-s key=value`)
//!
//! Lookup order: `--config`, then `$PANTRY_CONFIG`, then
//! `<config dir>/pantry/pantry.toml`. A missing file means defaults.

use crate::environment::MsvcWrappers;
use crate::error::{Error, Result};
use crate::recipe::KitchenConfig;
use crate::settings::Settings;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "PANTRY_CONFIG";

/// Environment variable overriding the autoreconf command
pub const AUTORECONF_ENV: &str = "AUTORECONF";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PantryConfig {
    /// Build driver settings
    #[serde(default)]
    pub kitchen: KitchenSection,

    /// Default host settings
    #[serde(default)]
    pub profile: BTreeMap<String, String>,
}

/// Kitchen configuration section
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KitchenSection {
    /// Download cache
    #[serde(default = "default_source_cache")]
    pub source_cache: PathBuf,

    /// Package store
    #[serde(default = "default_store")]
    pub store: PathBuf,

    /// Parallel jobs (0 = number of CPUs)
    #[serde(default)]
    pub jobs: u32,

    #[serde(default)]
    pub keep_builddir: bool,

    /// Per-step timeout in seconds (0 = no limit)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_shell")]
    pub shell: String,

    #[serde(default = "default_make")]
    pub make_program: String,

    #[serde(default = "default_autoreconf")]
    pub autoreconf_program: String,

    #[serde(default = "default_configure")]
    pub configure_script: String,

    /// automake `compile` wrapper for MSVC builds
    #[serde(default = "default_compile_wrapper")]
    pub msvc_compile_wrapper: String,

    /// automake `ar-lib` wrapper for MSVC builds
    #[serde(default = "default_ar_lib_wrapper")]
    pub msvc_ar_lib_wrapper: String,
}

impl Default for KitchenSection {
    fn default() -> Self {
        Self {
            source_cache: default_source_cache(),
            store: default_store(),
            jobs: 0,
            keep_builddir: false,
            timeout_secs: default_timeout_secs(),
            shell: default_shell(),
            make_program: default_make(),
            autoreconf_program: default_autoreconf(),
            configure_script: default_configure(),
            msvc_compile_wrapper: default_compile_wrapper(),
            msvc_ar_lib_wrapper: default_ar_lib_wrapper(),
        }
    }
}

fn default_source_cache() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("pantry").join("sources"))
        .unwrap_or_else(|| KitchenConfig::default().source_cache)
}

fn default_store() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("pantry").join("store"))
        .unwrap_or_else(|| KitchenConfig::default().store)
}

fn default_timeout_secs() -> u64 {
    3600
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_make() -> String {
    "make".to_string()
}

fn default_autoreconf() -> String {
    "autoreconf".to_string()
}

fn default_configure() -> String {
    "./configure".to_string()
}

fn default_compile_wrapper() -> String {
    MsvcWrappers::default().compile
}

fn default_ar_lib_wrapper() -> String {
    MsvcWrappers::default().ar_lib
}

impl PantryConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Load the config following the lookup order
    ///
    /// An explicitly named file must exist; the default location may not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = config_path(
            explicit,
            std::env::var_os(CONFIG_ENV),
            dirs::config_dir(),
        );

        let Some(path) = path else {
            debug!("No config file location, using defaults");
            return Ok(Self::default());
        };

        let named = explicit.is_some() || std::env::var_os(CONFIG_ENV).is_some();
        if !named && !path.exists() {
            debug!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        debug!("Loading config from {}", path.display());
        Self::from_file(&path)
    }

    /// Kitchen configuration, with `$AUTORECONF` taking precedence
    pub fn kitchen_config(&self) -> KitchenConfig {
        self.kitchen_config_with(std::env::var(AUTORECONF_ENV).ok())
    }

    fn kitchen_config_with(&self, autoreconf_env: Option<String>) -> KitchenConfig {
        let k = &self.kitchen;
        let defaults = KitchenConfig::default();

        KitchenConfig {
            source_cache: k.source_cache.clone(),
            store: k.store.clone(),
            timeout: (k.timeout_secs > 0).then(|| Duration::from_secs(k.timeout_secs)),
            jobs: if k.jobs == 0 { defaults.jobs } else { k.jobs },
            keep_builddir: k.keep_builddir,
            shell: k.shell.clone(),
            make_program: k.make_program.clone(),
            autoreconf_program: autoreconf_env
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| k.autoreconf_program.clone()),
            configure_script: k.configure_script.clone(),
            msvc_wrappers: MsvcWrappers {
                compile: k.msvc_compile_wrapper.clone(),
                ar_lib: k.msvc_ar_lib_wrapper.clone(),
            },
        }
    }

    /// Host settings: detected, then `[profile]`
    pub fn host_settings(&self) -> Result<Settings> {
        let mut settings = Settings::detect();
        settings.apply(&self.profile)?;
        Ok(settings)
    }
}

fn config_path(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    config_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(value));
    }
    config_dir.map(|d| d.join("pantry").join("pantry.toml"))
}
