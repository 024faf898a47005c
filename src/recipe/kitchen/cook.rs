// src/recipe/kitchen/cook.rs

//! Cook: the actual build execution for a single recipe

use crate::environment::{self, ResolveInputs, ResolvedEnvironment};
use crate::error::{Error, Result};
use crate::hash::Checksum;
use crate::package::InstalledPackage;
use crate::recipe::ResolvedRecipe;
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use super::archive::{copy_tree, extract_archive};
use super::config::{BuildResult, StepRecord};
use super::Kitchen;

/// A single cook operation
pub struct Cook<'a> {
    pub(super) kitchen: &'a Kitchen,
    pub(super) resolved: &'a ResolvedRecipe,
    /// Environment every step runs with
    pub(super) environment: ResolvedEnvironment,
    /// Temporary build directory
    pub(super) build_dir: TempDir,
    /// Source directory within build_dir
    pub(super) source_dir: PathBuf,
    /// Install prefix (where `make install` writes)
    pub(super) install_dir: PathBuf,
    /// Records of every external step run so far
    pub(super) steps: Vec<StepRecord>,
    /// Build log accumulator
    pub(super) log: String,
    /// Warnings
    pub(super) warnings: Vec<String>,
}

impl<'a> Cook<'a> {
    /// Set up a build directory and resolve the environment against it
    pub fn new(
        kitchen: &'a Kitchen,
        resolved: &'a ResolvedRecipe,
        dependencies: &[InstalledPackage],
    ) -> Result<Self> {
        let build_dir = tempfile::Builder::new()
            .prefix(&format!("pantry-{}-", resolved.name()))
            .tempdir()
            .map_err(|e| Error::Filesystem(format!("Failed to create build directory: {}", e)))?;

        let source_dir = build_dir.path().join("source");
        let install_dir = build_dir.path().join("image");

        fs::create_dir_all(&source_dir)?;
        fs::create_dir_all(&install_dir)?;

        let environment = environment::resolve(
            resolved,
            &ResolveInputs {
                prefix: &install_dir,
                jobs: kitchen.config.jobs,
                dependencies,
                msvc_wrappers: &kitchen.config.msvc_wrappers,
            },
        )?;

        Ok(Self {
            kitchen,
            resolved,
            environment,
            build_dir,
            source_dir,
            install_dir,
            steps: Vec::new(),
            log: String::new(),
            warnings: resolved.warnings().to_vec(),
        })
    }

    pub fn environment(&self) -> &ResolvedEnvironment {
        &self.environment
    }

    pub fn build_dir(&self) -> &Path {
        self.build_dir.path()
    }

    /// Phase 1: Prep - fetch all sources into the build directory
    pub fn prep(&mut self) -> Result<()> {
        let resolved = self.resolved;
        let recipe = resolved.recipe();

        if let Some(url) = recipe.archive_url() {
            let checksum = recipe
                .source
                .checksum
                .as_deref()
                .ok_or_else(|| Error::ParseError("Source archive has no checksum".to_string()))?;
            let cached = self.kitchen.fetch_source(&url, checksum)?;

            let local_archive = self.build_dir.path().join(recipe.archive_filename());
            fs::copy(&cached, &local_archive)?;
            self.log_line(&format!("Fetched source: {}", url));
        }

        for patch in resolved.active_patches() {
            if !patch.is_remote() {
                continue;
            }
            let checksum = patch.checksum.as_deref().ok_or_else(|| {
                Error::ParseError(format!("Remote patch {} has no checksum", patch.file))
            })?;
            let cached = self.kitchen.fetch_source(&patch.file, checksum)?;
            let local = self.remote_patch_path(&patch.file);
            if let Some(parent) = local.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&cached, &local)?;
            self.log_line(&format!("Fetched patch: {}", patch.file));
        }

        Ok(())
    }

    /// Phase 2a: Unpack sources
    pub fn unpack(&mut self) -> Result<()> {
        let resolved = self.resolved;
        let recipe = resolved.recipe();
        let extract_root = self.build_dir.path().join("source");

        if recipe.source.archive.is_some() {
            let archive_path = self.build_dir.path().join(recipe.archive_filename());
            extract_archive(&archive_path, &extract_root)?;
            self.log_line(&format!("Extracted source to {}", extract_root.display()));
        } else if let Some(path) = &recipe.source.path {
            let local = recipe.resolve_path(path);
            if local.is_dir() {
                let copied = copy_tree(&local, &extract_root)?;
                self.log_line(&format!(
                    "Copied {} file(s) from {}",
                    copied,
                    local.display()
                ));
            } else if local.is_file() {
                if let Some(checksum) = &recipe.source.checksum {
                    crate::hash::verify_file(&local, &Checksum::parse(checksum)?)?;
                }
                extract_archive(&local, &extract_root)?;
                self.log_line(&format!("Extracted {}", local.display()));
            } else {
                return Err(Error::NotFound(format!(
                    "Source path not found: {}",
                    local.display()
                )));
            }
        }

        // Archives usually carry one top-level directory
        let entries: Vec<_> = fs::read_dir(&extract_root)?
            .filter_map(|e| e.ok())
            .collect();
        if entries.len() == 1 && entries[0].file_type().map(|t| t.is_dir()).unwrap_or(false) {
            self.source_dir = entries[0].path();
        }

        if let Some(extract_dir) = &recipe.source.extract_dir {
            self.source_dir = extract_root.join(recipe.substitute(extract_dir, &Default::default()));
        }

        if !self.source_dir.is_dir() {
            return Err(Error::NotFound(format!(
                "Source directory not found: {}",
                self.source_dir.display()
            )));
        }
        debug!("Source directory: {}", self.source_dir.display());

        Ok(())
    }

    /// Phase 2b: Apply patches whose condition matches
    pub fn patch(&mut self) -> Result<()> {
        let resolved = self.resolved;

        for patch_info in resolved.active_patches() {
            let patch_path = if patch_info.is_remote() {
                self.remote_patch_path(&patch_info.file)
            } else {
                let local = resolved.recipe().resolve_path(&patch_info.file);
                if let Some(checksum) = &patch_info.checksum {
                    crate::hash::verify_file(&local, &Checksum::parse(checksum)?)?;
                }
                local
            };

            if !patch_path.exists() {
                return Err(Error::NotFound(format!(
                    "Patch file not found: {}",
                    patch_path.display()
                )));
            }

            info!("Applying patch: {}", patch_info.file);
            let command = format!(
                "patch -p{} -i {}",
                patch_info.strip,
                quote(&patch_path.display().to_string())
            );
            let source_dir = self.source_dir.clone();
            self.run_step("patch", &command, &source_dir)?;
        }

        Ok(())
    }

    /// Phase 3: Simmer - autoreconf, configure, make, make install
    pub fn simmer(&mut self) -> Result<()> {
        let kitchen = self.kitchen;
        let resolved = self.resolved;
        let config = &kitchen.config;
        let build = &resolved.recipe().build;

        let workdir = match &build.workdir {
            Some(wd) => self.source_dir.join(wd),
            None => self.source_dir.clone(),
        };

        if build.autoreconf {
            let command = format!("{} -fiv", config.autoreconf_program);
            self.run_step("autoreconf", &command, &workdir)?;
        }

        let configure = format!(
            "{} {}",
            config.configure_script,
            join(&self.environment.configure_args)
        );
        self.run_step("configure", &configure, &workdir)?;

        let make = format!("{} {}", config.make_program, join(&self.environment.make_args));
        self.run_step("make", make.trim_end(), &workdir)?;

        let install = format!(
            "{} {} {}",
            config.make_program,
            join(&self.environment.make_args),
            quote(&build.install_target)
        );
        self.run_step("install", &install, &workdir)?;

        if fs::read_dir(&self.install_dir)?.next().is_none() {
            let msg = "install step wrote nothing into the prefix".to_string();
            warn!("{}", msg);
            self.warnings.push(msg);
        }

        Ok(())
    }

    /// Hand over what the build produced
    ///
    /// The build directory stays owned by the `Cook` and is removed when it
    /// is dropped, unless the kitchen is configured to keep it.
    pub fn result(&self) -> BuildResult {
        BuildResult {
            steps: self.steps.clone(),
            log: self.log.clone(),
            warnings: self.warnings.clone(),
            source_dir: self.source_dir.clone(),
            install_dir: self.install_dir.clone(),
            environment: self.environment.clone(),
        }
    }

    /// Release the build directory from automatic cleanup
    pub fn keep_build_dir(self) -> PathBuf {
        self.build_dir.keep()
    }

    /// Run one external step and record it; non-zero exit aborts the cook
    fn run_step(&mut self, name: &str, command: &str, workdir: &Path) -> Result<()> {
        let kitchen = self.kitchen;
        let step = ShellStep {
            shell: &kitchen.config.shell,
            name,
            command,
            workdir,
            env: spawn_environment(&self.environment, self.resolved),
            timeout: kitchen.config.timeout,
            log_dir: self.build_dir.path().join("logs"),
            index: self.steps.len(),
        };

        let record = step.run()?;
        self.log_step(&record);
        let result = record.check();
        self.steps.push(record);
        result
    }

    fn remote_patch_path(&self, url: &str) -> PathBuf {
        let filename = url.rsplit('/').next().filter(|n| !n.is_empty()).unwrap_or("patch.diff");
        self.build_dir.path().join("patches").join(filename)
    }

    fn log_line(&mut self, line: &str) {
        self.log.push_str(line);
        self.log.push('\n');
    }

    /// Log a step's command and output under a header
    fn log_step(&mut self, record: &StepRecord) {
        self.log_line(&format!("=== {} ===", record.name));
        self.log_line(&format!("$ {}", record.command));
        if !record.stdout.is_empty() {
            self.log.push_str(&record.stdout);
            if !record.stdout.ends_with('\n') {
                self.log.push('\n');
            }
        }
        if !record.stderr.is_empty() {
            self.log.push_str(&record.stderr);
            if !record.stderr.ends_with('\n') {
                self.log.push('\n');
            }
        }
        let status = match record.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "no exit code".to_string(),
        };
        self.log_line(&format!("--- {} ({} ms)", status, record.duration_ms));
    }
}

/// One shell invocation
///
/// Output goes to files under `log_dir` rather than pipes so a long build
/// cannot block on a full pipe while the timeout is being waited on.
pub(crate) struct ShellStep<'s> {
    pub shell: &'s str,
    pub name: &'s str,
    pub command: &'s str,
    pub workdir: &'s Path,
    pub env: Vec<(OsString, OsString)>,
    pub timeout: Option<Duration>,
    pub log_dir: PathBuf,
    pub index: usize,
}

impl ShellStep<'_> {
    /// Run to completion and capture the result
    ///
    /// A spawn failure or timeout is an error; a non-zero exit is not, and
    /// shows up in the record's exit code.
    pub(crate) fn run(self) -> Result<StepRecord> {
        info!("Running {} step", self.name);
        debug!("{}: {}", self.name, self.command);

        fs::create_dir_all(&self.log_dir)?;
        let out_path = self.log_dir.join(format!("{:02}-{}.stdout", self.index, self.name));
        let err_path = self.log_dir.join(format!("{:02}-{}.stderr", self.index, self.name));

        let mut cmd = Command::new(self.shell);
        cmd.arg("-c")
            .arg(self.command)
            .current_dir(self.workdir)
            .stdin(Stdio::null())
            .stdout(File::create(&out_path)?)
            .stderr(File::create(&err_path)?)
            .envs(self.env);

        // Own process group, so a timeout can take make's children down too
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| Error::StepFailed {
            step: self.name.to_string(),
            code: None,
            output: format!("failed to spawn {}: {}", self.shell, e),
        })?;

        let status = match self.timeout {
            Some(timeout) => match child.wait_timeout(timeout)? {
                Some(status) => status,
                None => {
                    kill_step(&mut child);
                    warn!("{} step killed after {}s", self.name, timeout.as_secs());
                    return Err(Error::StepTimeout {
                        step: self.name.to_string(),
                        secs: timeout.as_secs(),
                    });
                }
            },
            None => child.wait()?,
        };

        Ok(StepRecord {
            name: self.name.to_string(),
            command: self.command.to_string(),
            exit_code: status.code(),
            stdout: read_lossy(&out_path),
            stderr: read_lossy(&err_path),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Kill a timed-out step and everything it started
fn kill_step(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
            debug!("killpg {} failed: {}", child.id(), e);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Variables to set on a spawned step
///
/// The resolved variables are set as-is. Path lists from `appends` are
/// put in front of whatever the inherited environment holds.
pub(crate) fn spawn_environment(
    env: &ResolvedEnvironment,
    resolved: &ResolvedRecipe,
) -> Vec<(OsString, OsString)> {
    let separator = ResolvedEnvironment::path_separator(resolved.settings().build_os);
    let mut out: Vec<(OsString, OsString)> = env
        .vars
        .iter()
        .map(|(k, v)| (OsString::from(k), OsString::from(v)))
        .collect();

    for (key, paths) in &env.appends {
        out.push((OsString::from(key), prepend_paths(paths, std::env::var_os(key), separator)));
    }

    out
}

pub(crate) fn prepend_paths(paths: &[PathBuf], inherited: Option<OsString>, separator: &str) -> OsString {
    let mut value = OsString::new();
    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            value.push(separator);
        }
        value.push(path.as_os_str());
    }
    if let Some(inherited) = inherited.filter(|v| !v.is_empty()) {
        if !value.is_empty() {
            value.push(separator);
        }
        value.push(inherited);
    }
    value
}

fn read_lossy(path: &Path) -> String {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Shell-quote a single word
pub(crate) fn quote(word: &str) -> String {
    shlex::try_quote(word)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| format!("'{}'", word.replace('\0', "")))
}

/// Shell-quote and join a list of words
pub(crate) fn join(words: &[String]) -> String {
    words.iter().map(|w| quote(w)).collect::<Vec<_>>().join(" ")
}
