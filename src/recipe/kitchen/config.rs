// src/recipe/kitchen/config.rs

//! Configuration and result types for the Kitchen

use crate::environment::{MsvcWrappers, ResolvedEnvironment};
use crate::error::{Error, Result};
use crate::package::PackageInfo;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Kitchen
#[derive(Debug, Clone)]
pub struct KitchenConfig {
    /// Directory for downloaded sources, keyed by checksum
    pub source_cache: PathBuf,
    /// Package store: finished packages are published here and
    /// dependencies are looked up here
    pub store: PathBuf,
    /// Per-step timeout (None = no limit)
    pub timeout: Option<Duration>,
    /// Number of parallel jobs
    pub jobs: u32,
    /// Keep build directory after completion (for debugging)
    pub keep_builddir: bool,
    /// Shell used to run every step
    pub shell: String,
    /// Make command (may include leading arguments, e.g. `gmake`)
    pub make_program: String,
    /// autoreconf command
    pub autoreconf_program: String,
    /// Configure script, relative to the source directory
    pub configure_script: String,
    /// automake wrappers used for MSVC builds
    pub msvc_wrappers: MsvcWrappers,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        Self {
            source_cache: PathBuf::from("/var/cache/pantry/sources"),
            store: PathBuf::from("/var/lib/pantry/store"),
            timeout: Some(Duration::from_secs(3600)), // 1 hour
            jobs,
            keep_builddir: false,
            shell: "sh".to_string(),
            make_program: "make".to_string(),
            autoreconf_program: "autoreconf".to_string(),
            configure_script: "./configure".to_string(),
            msvc_wrappers: MsvcWrappers::default(),
        }
    }
}

/// Record of one external step
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Step name (`autoreconf`, `configure`, `make`, `install`, `patch`, ...)
    pub name: String,
    /// Command line as run by the shell
    pub command: String,
    /// Exit code; `None` when killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl StepRecord {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// `Err(StepFailed)` carrying the captured output unless the step succeeded
    pub fn check(&self) -> Result<()> {
        if self.succeeded() {
            return Ok(());
        }

        let mut output = self.stdout.clone();
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&self.stderr);
        Err(Error::StepFailed {
            step: self.name.clone(),
            code: self.exit_code,
            output,
        })
    }
}

/// Output of the build driver
#[derive(Debug)]
pub struct BuildResult {
    /// Every step run, in order
    pub steps: Vec<StepRecord>,
    /// Human-readable log of the whole build
    pub log: String,
    pub warnings: Vec<String>,
    /// Unpacked, patched and built source tree
    pub source_dir: PathBuf,
    /// Tree written by the install step (the configure prefix)
    pub install_dir: PathBuf,
    /// Environment the steps ran with
    pub environment: ResolvedEnvironment,
}

/// Result of cooking a recipe
#[derive(Debug)]
pub struct CookResult {
    /// Root of the published package
    pub package_path: PathBuf,
    /// Metadata written into the package
    pub info: PackageInfo,
    /// Build log
    pub log: String,
    /// Warnings generated during build
    pub warnings: Vec<String>,
    /// Build directory, when kept for debugging
    pub build_dir: Option<PathBuf>,
}
