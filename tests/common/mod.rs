// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
//!
//! Builds run against a fake autotools project: `configure` records its
//! arguments and the prefix, `fakemake` stands in for make. Both are
//! plain `sh` scripts, so no compiler is needed.

#![allow(dead_code)]

use pantry::recipe::options::parse_option_args;
use pantry::recipe::{parse_recipe_file, Kitchen, KitchenConfig, ResolvedRecipe};
use pantry::Settings;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

pub const CONFIGURE: &str = r#"#!/bin/sh
prefix=
fail=no
for arg in "$@"; do
  case "$arg" in
    --prefix=*) prefix="${arg#--prefix=}" ;;
    --fail-build) fail=yes ;;
  esac
done
echo "checking for C compiler... ${CC:-none}"
printf '%s\n' "$@" > configure.args
if [ -n "$HELLO_ROOT" ]; then
  test -f "$HELLO_ROOT/include/hello.h" || { echo "hello.h not found under $HELLO_ROOT" >&2; exit 1; }
  hello-tool > /dev/null || { echo "hello-tool not on PATH" >&2; exit 1; }
fi
printf 'PREFIX=%s\nFAIL=%s\n' "$prefix" "$fail" > config.status
"#;

pub const FAKEMAKE: &str = r#"#!/bin/sh
. ./config.status
target=all
for arg in "$@"; do
  case "$arg" in
    -j*) ;;
    *) target="$arg" ;;
  esac
done
if [ "$FAIL" = yes ]; then
  echo "error: deliberate failure" >&2
  exit 2
fi
case "$target" in
  all)
    printf '#!/bin/sh\necho hello from pantry\n' > hello-tool
    echo "archive" > libhello.a
    ;;
  install)
    mkdir -p "$PREFIX/include" "$PREFIX/lib" "$PREFIX/bin" "$PREFIX/share/doc/hello"
    cp hello.h "$PREFIX/include/"
    cp libhello.a "$PREFIX/lib/"
    echo "libtool" > "$PREFIX/lib/libhello.la"
    cp hello-tool "$PREFIX/bin/"
    chmod +x "$PREFIX/bin/hello-tool"
    echo "docs" > "$PREFIX/share/doc/hello/README"
    ;;
esac
"#;

pub const HELLO_RECIPE: &str = r#"
[package]
name = "hello"
version = "1.0"
summary = "Greeting library used in tests"
license = "MIT"

[options.shared]
values = [true, false]
default = false

[options.fPIC]
values = [true, false]
default = true
remove_when = ["shared=true"]

[options.fail]
values = [true, false]
default = false

[source]
path = "src"

[build]
configure_args = ["--disable-nls", "--docdir=%(prefix)s/share/doc/%(name)s"]

[build.option_args.shared]
true = ["--enable-shared", "--disable-static"]
false = ["--disable-shared", "--enable-static"]

[build.option_args.fail]
true = ["--fail-build"]

[layout]
remove = ["lib/*.la"]

[[layout.copy]]
pattern = "COPYING"
dst = "licenses"

[info]
libs = ["hello"]

[test]
commands = ["hello-tool", "test -f %(package_root)s/include/hello.h"]
"#;

pub const GREETER_RECIPE: &str = r#"
requires = ["hello/1.0"]

[package]
name = "greeter"
version = "0.1"
license = "MIT"

[source]
path = "src"

[build.environment]
HELLO_ROOT = "%(dep.hello.root)s"

[[layout.copy]]
pattern = "COPYING"
dst = "licenses"

[info]
libs = ["greeter"]
"#;

/// Scratch area holding projects, a source cache and a store
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store(&self) -> PathBuf {
        self.path().join("store")
    }

    pub fn kitchen_config(&self, store: &Path) -> KitchenConfig {
        KitchenConfig {
            source_cache: self.path().join("cache"),
            store: store.to_path_buf(),
            timeout: Some(Duration::from_secs(120)),
            jobs: 2,
            keep_builddir: false,
            shell: "sh".to_string(),
            make_program: "sh ./fakemake".to_string(),
            autoreconf_program: "true".to_string(),
            configure_script: "sh ./configure".to_string(),
            ..KitchenConfig::default()
        }
    }

    pub fn kitchen(&self) -> Kitchen {
        Kitchen::new(self.kitchen_config(&self.store()))
    }

    /// Write a project directory with the fake build scripts and a recipe
    pub fn project(&self, name: &str, recipe: &str) -> PathBuf {
        let root = self.path().join(name);
        let src = root.join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("configure"), CONFIGURE).unwrap();
        fs::write(src.join("fakemake"), FAKEMAKE).unwrap();
        fs::write(src.join("hello.h"), "int hello(void);\n").unwrap();
        fs::write(src.join("COPYING"), "MIT License\n").unwrap();

        let recipe_path = root.join("recipe.toml");
        fs::write(&recipe_path, recipe).unwrap();
        recipe_path
    }
}

/// Native settings for the machine running the tests
pub fn native_settings() -> Settings {
    let mut settings = Settings::detect();
    settings.build_os = settings.os;
    settings.build_arch = settings.arch;
    settings
}

pub fn resolve(recipe_path: &Path, options: &[&str]) -> ResolvedRecipe {
    let recipe = parse_recipe_file(recipe_path).unwrap();
    ResolvedRecipe::resolve(recipe, &native_settings(), &parse_option_args(options).unwrap()).unwrap()
}

/// Relative paths of every file under `root`, sorted
pub fn tree(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    files.sort();
    files
}

/// Entries in the store root whose names start with '.'
pub fn hidden_entries(store: &Path) -> Vec<String> {
    match fs::read_dir(store) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect(),
        Err(_) => Vec::new(),
    }
}
