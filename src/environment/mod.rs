// src/environment/mod.rs

//! Environment resolver: from a resolved recipe to concrete build inputs
//!
//! [`resolve`] turns a [`ResolvedRecipe`], the dependency packages it
//! links against and a few fixed paths into a [`ResolvedEnvironment`]:
//! tool commands, flags, search paths, configure triples, the full
//! configure argument list and the variables handed to every step.
//!
//! The function is pure. It reads nothing from the running process (no
//! `PATH`, no current directory) and spawns nothing, so equal inputs
//! always give equal output. Merging with the inherited process
//! environment happens in the build driver, at spawn time.

mod toolchain;

pub use toolchain::{base_flags, configure_triples, gnu_triple, tool_commands, MsvcWrappers};

use crate::error::{Error, Result};
use crate::package::InstalledPackage;
use crate::recipe::{OptionValue, ResolvedRecipe};
use crate::settings::{Compiler, Os};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Fixed, non-recipe inputs of resolution
#[derive(Debug, Clone)]
pub struct ResolveInputs<'a> {
    /// Install prefix passed to configure
    pub prefix: &'a Path,
    /// Parallel make jobs
    pub jobs: u32,
    /// Packages satisfying the recipe's `requires`
    pub dependencies: &'a [InstalledPackage],
    pub msvc_wrappers: &'a MsvcWrappers,
}

/// Concrete build environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEnvironment {
    /// `--host` triple, when configure needs one
    pub host_triple: Option<String>,
    /// `--build` triple, when configure needs one
    pub build_triple: Option<String>,

    /// Tool commands keyed by variable (`CC`, `AR`, ...)
    pub tools: BTreeMap<String, String>,

    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub cppflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub libs: Vec<String>,

    pub include_paths: Vec<PathBuf>,
    pub lib_paths: Vec<PathBuf>,

    /// Everything after `./configure`
    pub configure_args: Vec<String>,
    /// Arguments for every make invocation
    pub make_args: Vec<String>,

    /// Variables set for every step
    pub vars: BTreeMap<String, String>,
    /// Path lists appended to inherited variables (dependency `bin` dirs
    /// go into `PATH` here)
    pub appends: BTreeMap<String, Vec<PathBuf>>,

    /// `%(...)s` values available to recipe templates
    pub template_vars: BTreeMap<String, String>,
}

impl ResolvedEnvironment {
    /// Separator for path lists on the machine running the build
    pub fn path_separator(build_os: Os) -> &'static str {
        if build_os == Os::Windows { ";" } else { ":" }
    }

    /// `export NAME='value'` lines, sorted, for `pantry env`
    ///
    /// Path lists go in front of the inherited value, joined with the
    /// separator of `build_os`, as they are when steps run.
    pub fn to_shell(&self, build_os: Os) -> String {
        let sep = Self::path_separator(build_os);
        let mut out = String::new();
        for (key, value) in &self.vars {
            out.push_str(&format!("export {}={}\n", key, single_quote(value)));
        }
        for (key, paths) in &self.appends {
            let joined: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            out.push_str(&format!(
                "export {}={}\"${{{}:+{}${}}}\"\n",
                key,
                single_quote(&joined.join(sep)),
                key,
                sep,
                key
            ));
        }
        out
    }
}

fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Compute the build environment
pub fn resolve(resolved: &ResolvedRecipe, inputs: &ResolveInputs<'_>) -> Result<ResolvedEnvironment> {
    let settings = resolved.settings();
    let recipe = resolved.recipe();

    let deps = match_dependencies(resolved, inputs.dependencies)?;

    let (host_triple, build_triple) = configure_triples(settings);
    let tools = tool_commands(settings, host_triple.as_deref(), inputs.msvc_wrappers);

    let pic = resolved
        .option("fPIC")
        .is_some_and(OptionValue::is_truthy);
    let base = base_flags(settings, host_triple.as_deref(), pic);

    let mut include_paths = Vec::new();
    let mut lib_paths = Vec::new();
    let mut libs = Vec::new();
    let mut frameworks = Vec::new();
    let mut appends: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    for dep in &deps {
        include_paths.extend(dep.include_paths());
        lib_paths.extend(dep.lib_paths());
        libs.extend(dep.info.libs.iter().cloned());
        frameworks.extend(dep.info.frameworks.iter().cloned());
        appends
            .entry("PATH".to_string())
            .or_default()
            .extend(dep.bin_paths());
        for (var, paths) in dep.env_appends() {
            appends.entry(var).or_default().extend(paths);
        }
    }
    for paths in appends.values_mut() {
        dedup_keep_order(paths);
    }
    appends.retain(|_, paths| !paths.is_empty());

    let msvc = settings.compiler == Compiler::Msvc;

    let mut cppflags = base.cppflags;
    cppflags.extend(include_paths.iter().map(|p| format!("-I{}", p.display())));

    let mut ldflags = base.ldflags;
    ldflags.extend(lib_paths.iter().map(|p| format!("-L{}", p.display())));
    if matches!(settings.os, Os::Macos | Os::Ios) {
        for fw in &frameworks {
            ldflags.push("-framework".to_string());
            ldflags.push(fw.clone());
        }
    }

    let libs: Vec<String> = libs
        .iter()
        .map(|l| if msvc { format!("{}.lib", l) } else { format!("-l{}", l) })
        .collect();

    let cflags = base.cflags.clone();
    let cxxflags = base.cflags;

    let template_vars = template_vars(resolved, inputs, &deps, &host_triple, &build_triple);

    let mut configure_args = vec![
        format!("--prefix={}", inputs.prefix.display()),
        format!("--bindir={}", inputs.prefix.join("bin").display()),
        format!("--libdir={}", inputs.prefix.join("lib").display()),
        format!("--includedir={}", inputs.prefix.join("include").display()),
    ];
    if let Some(host) = &host_triple {
        configure_args.push(format!("--host={}", host));
    }
    if let Some(build) = &build_triple {
        configure_args.push(format!("--build={}", build));
    }
    configure_args.extend(
        recipe
            .build
            .configure_args
            .iter()
            .map(|a| recipe.substitute(a, &template_vars)),
    );
    configure_args.extend(option_arguments(resolved, &template_vars));

    let jobs = recipe.build.jobs.unwrap_or(inputs.jobs).max(1);
    let mut make_args = vec![format!("-j{}", jobs)];
    make_args.extend(
        recipe
            .build
            .make_args
            .iter()
            .map(|a| recipe.substitute(a, &template_vars)),
    );

    let mut vars = tools.clone();
    for (key, list) in [
        ("CFLAGS", &cflags),
        ("CXXFLAGS", &cxxflags),
        ("CPPFLAGS", &cppflags),
        ("LDFLAGS", &ldflags),
        ("LIBS", &libs),
    ] {
        if !list.is_empty() {
            vars.insert(key.to_string(), list.join(" "));
        }
    }
    for (key, value) in &recipe.build.environment {
        vars.insert(key.clone(), recipe.substitute(value, &template_vars));
    }

    Ok(ResolvedEnvironment {
        host_triple,
        build_triple,
        tools,
        cflags,
        cxxflags,
        cppflags,
        ldflags,
        libs,
        include_paths,
        lib_paths,
        configure_args,
        make_args,
        vars,
        appends,
        template_vars,
    })
}

/// Order dependency packages as the recipe lists its requirements,
/// failing on anything missing or mismatched
fn match_dependencies<'a>(
    resolved: &ResolvedRecipe,
    available: &'a [InstalledPackage],
) -> Result<Vec<&'a InstalledPackage>> {
    resolved
        .requirements()
        .iter()
        .map(|req| {
            available
                .iter()
                .find(|p| p.info.name == req.name && p.info.version == req.version)
                .ok_or_else(|| {
                    Error::ResolutionError(format!("No package available for requirement {}", req))
                })
        })
        .collect()
}

fn template_vars(
    resolved: &ResolvedRecipe,
    inputs: &ResolveInputs<'_>,
    deps: &[&InstalledPackage],
    host_triple: &Option<String>,
    build_triple: &Option<String>,
) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    vars.insert("prefix".to_string(), inputs.prefix.display().to_string());
    vars.insert("jobs".to_string(), inputs.jobs.to_string());
    if let Some(h) = host_triple {
        vars.insert("host_triple".to_string(), h.clone());
    }
    if let Some(b) = build_triple {
        vars.insert("build_triple".to_string(), b.clone());
    }
    for (key, value) in resolved.settings().to_map() {
        vars.insert(format!("settings.{}", key), value);
    }
    for (name, value) in resolved.options() {
        vars.insert(format!("option.{}", name), value.to_string());
    }
    for dep in deps {
        vars.insert(
            format!("dep.{}.root", dep.info.name),
            dep.root.display().to_string(),
        );
        vars.insert(format!("dep.{}.version", dep.info.name), dep.info.version.clone());
    }
    vars
}

/// Arguments contributed by `build.option_args`, in option name order
///
/// For each option still present, the exact value's arguments are used,
/// falling back to `*`. Removed options contribute nothing.
fn option_arguments(resolved: &ResolvedRecipe, template_vars: &BTreeMap<String, String>) -> Vec<String> {
    let recipe = resolved.recipe();
    let mut args = Vec::new();

    for (name, by_value) in &recipe.build.option_args {
        let Some(value) = resolved.option(name) else {
            continue;
        };
        let value_str = value.to_string();
        let Some(list) = by_value.get(&value_str).or_else(|| by_value.get("*")) else {
            continue;
        };

        let mut vars = template_vars.clone();
        vars.insert("value".to_string(), value_str);
        args.extend(list.iter().map(|a| recipe.substitute(a, &vars)));
    }

    args
}

fn dedup_keep_order(paths: &mut Vec<PathBuf>) {
    let mut seen = std::collections::BTreeSet::new();
    paths.retain(|p| seen.insert(p.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageInfo;
    use crate::recipe::options::parse_option_args;
    use crate::recipe::parse_recipe;
    use crate::settings::{Arch, BuildType, Settings};

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

[options.threads]
values = [false, "posix", "solaris", "pth", "windows"]
default = "posix"
default_when = [{ when = "os=Windows", value = "windows" }]

[source]
path = "src"

[build]
configure_args = ["HELP2MAN=/bin/true", "--with-libiconv-prefix=%(dep.libiconv.root)s"]

[build.environment]
GETTEXT_FLAVOR = "%(option.threads)s-%(settings.os)s"

[build.option_args.shared]
true = ["--enable-shared", "--disable-static"]
false = ["--disable-shared", "--enable-static"]

[build.option_args.threads]
false = ["--disable-threads"]
"*" = ["--enable-threads=%(value)s"]
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

    fn libiconv() -> InstalledPackage {
        let mut env_append = BTreeMap::new();
        env_append.insert("ACLOCAL_PATH".to_string(), vec!["share/aclocal".to_string()]);
        InstalledPackage {
            root: PathBuf::from("/store/libiconv/1.16/abc"),
            info: PackageInfo {
                name: "libiconv".to_string(),
                version: "1.16".to_string(),
                release: "1".to_string(),
                package_id: "abc".to_string(),
                summary: None,
                license: None,
                homepage: None,
                settings: BTreeMap::new(),
                options: BTreeMap::new(),
                requires: Vec::new(),
                libs: vec!["iconv".to_string(), "charset".to_string()],
                frameworks: vec!["CoreFoundation".to_string()],
                include_dirs: vec!["include".to_string()],
                lib_dirs: vec!["lib".to_string()],
                bin_dirs: vec!["bin".to_string()],
                env_append,
            },
        }
    }

    fn run(settings: &Settings, opts: &[&str]) -> Result<ResolvedEnvironment> {
        let recipe = parse_recipe(RECIPE).unwrap();
        let resolved =
            ResolvedRecipe::resolve(recipe, settings, &parse_option_args(opts).unwrap()).unwrap();
        let deps = vec![libiconv()];
        let wrappers = MsvcWrappers::default();
        resolve(
            &resolved,
            &ResolveInputs {
                prefix: Path::new("/build/image"),
                jobs: 8,
                dependencies: &deps,
                msvc_wrappers: &wrappers,
            },
        )
    }

    #[test]
    fn test_resolve_native_linux() {
        let env = run(&linux(), &[]).unwrap();

        assert_eq!(env.host_triple, None);
        assert_eq!(
            env.configure_args,
            vec![
                "--prefix=/build/image",
                "--bindir=/build/image/bin",
                "--libdir=/build/image/lib",
                "--includedir=/build/image/include",
                "HELP2MAN=/bin/true",
                "--with-libiconv-prefix=/store/libiconv/1.16/abc",
                "--disable-shared",
                "--enable-static",
                "--enable-threads=posix",
            ]
        );
        assert_eq!(env.make_args, vec!["-j8"]);
        assert_eq!(env.vars["CC"], "gcc");
        assert_eq!(env.vars["CFLAGS"], "-O3 -m64 -fPIC");
        assert_eq!(
            env.vars["CPPFLAGS"],
            "-DNDEBUG -I/store/libiconv/1.16/abc/include"
        );
        assert_eq!(env.vars["LDFLAGS"], "-m64 -L/store/libiconv/1.16/abc/lib");
        assert_eq!(env.vars["LIBS"], "-liconv -lcharset");
        assert_eq!(env.vars["GETTEXT_FLAVOR"], "posix-Linux");
        assert!(!env.vars["LDFLAGS"].contains("-framework"));

        assert_eq!(
            env.appends["PATH"],
            vec![PathBuf::from("/store/libiconv/1.16/abc/bin")]
        );
        assert_eq!(
            env.appends["ACLOCAL_PATH"],
            vec![PathBuf::from("/store/libiconv/1.16/abc/share/aclocal")]
        );
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let a = run(&linux(), &["shared=true"]).unwrap();
        let b = run(&linux(), &["shared=true"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_shell(Os::Linux), b.to_shell(Os::Linux));
        assert!(!a.cflags.contains(&"-fPIC".to_string()));
    }

    #[test]
    fn test_resolve_msvc_cross() {
        let mut s = linux();
        s.os = Os::Windows;
        s.compiler = Compiler::Msvc;
        let env = run(&s, &[]).unwrap();

        assert_eq!(env.host_triple.as_deref(), Some("x86_64-w64-mingw32"));
        assert_eq!(env.build_triple, None);
        assert!(env.configure_args.contains(&"--host=x86_64-w64-mingw32".to_string()));
        assert!(env.configure_args.contains(&"--enable-threads=windows".to_string()));
        assert_eq!(env.vars["LIBS"], "iconv.lib charset.lib");
        assert_eq!(env.vars["LD"], "link");
    }

    #[test]
    fn test_macos_links_frameworks() {
        let mut s = linux();
        s.os = Os::Macos;
        s.build_os = Os::Macos;
        s.compiler = Compiler::AppleClang;
        let env = run(&s, &[]).unwrap();
        assert!(env.vars["LDFLAGS"].contains("-framework CoreFoundation"));
    }

    #[test]
    fn test_missing_dependency_fails() {
        let recipe = parse_recipe(RECIPE).unwrap();
        let resolved = ResolvedRecipe::resolve(recipe, &linux(), &crate::recipe::OptionSet::new()).unwrap();
        let wrappers = MsvcWrappers::default();
        let err = resolve(
            &resolved,
            &ResolveInputs {
                prefix: Path::new("/p"),
                jobs: 1,
                dependencies: &[],
                msvc_wrappers: &wrappers,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::ResolutionError(_)));
    }

    #[test]
    fn test_to_shell_separator_follows_build_os() {
        let mut env = run(&linux(), &[]).unwrap();
        env.appends.insert(
            "PATH".to_string(),
            vec![PathBuf::from("/a/bin"), PathBuf::from("/b/bin")],
        );

        let unix = env.to_shell(Os::Linux);
        assert!(unix.contains("export PATH='/a/bin:/b/bin'\"${PATH:+:$PATH}\"\n"));

        let windows = env.to_shell(Os::Windows);
        assert!(windows.contains("export PATH='/a/bin;/b/bin'\"${PATH:+;$PATH}\"\n"));
    }
}
