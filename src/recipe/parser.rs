// src/recipe/parser.rs

//! Recipe file parsing and validation

use crate::error::{Error, Result};
use crate::hash::Checksum;
use crate::recipe::condition::{Condition, ConditionKey};
use crate::recipe::format::Recipe;
use crate::settings::Settings;
use std::path::{Component, Path};

/// Parse a recipe from a TOML string
pub fn parse_recipe(content: &str) -> Result<Recipe> {
    toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid recipe: {}", e)))
}

/// Parse a recipe from a file; relative paths in it resolve against its directory
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Filesystem(format!("Failed to read recipe file: {}", e)))?;

    let mut recipe = parse_recipe(&content)?;
    recipe.recipe_dir = path
        .parent()
        .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
        .map(Path::to_path_buf);
    Ok(recipe)
}

/// Validate a recipe for completeness and correctness
///
/// Hard errors are returned as `Err`; questionable but buildable
/// recipes produce warnings.
pub fn validate_recipe(recipe: &Recipe) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if recipe.package.name.is_empty() {
        return Err(Error::ParseError("Recipe package name cannot be empty".to_string()));
    }
    if recipe.package.version.is_empty() {
        return Err(Error::ParseError("Recipe package version cannot be empty".to_string()));
    }
    for (field, value) in [
        ("name", &recipe.package.name),
        ("version", &recipe.package.version),
    ] {
        if !is_single_component(value) {
            return Err(Error::ParseError(format!(
                "Recipe package {} '{}' must be a single path component",
                field, value
            )));
        }
    }

    validate_source(recipe)?;

    recipe.requirements()?;
    recipe.build_requirements()?;

    if let Some(patches) = &recipe.patches {
        for patch in &patches.files {
            if patch.is_remote() && patch.checksum.is_none() {
                return Err(Error::ParseError(format!(
                    "Remote patch {} has no checksum",
                    patch.file
                )));
            }
            if let Some(checksum) = &patch.checksum {
                Checksum::parse(checksum)?;
            }
        }
    }

    validate_options(recipe)?;
    validate_conditions(recipe)?;
    validate_layout(recipe, &mut warnings)?;

    for (var, paths) in &recipe.info.env_append {
        for p in paths {
            if !is_package_relative(p) {
                return Err(Error::ParseError(format!(
                    "env_append.{} path '{}' must be relative to the package",
                    var, p
                )));
            }
        }
    }

    if recipe.package.summary.is_none() && recipe.package.description.is_none() {
        warnings.push("Missing package summary".to_string());
    }
    if recipe.package.license.is_none() {
        warnings.push("Missing package license".to_string());
    }
    if recipe.info.libs.is_empty() {
        warnings.push("No libraries exported in [info].libs".to_string());
    }

    Ok(warnings)
}

fn validate_source(recipe: &Recipe) -> Result<()> {
    let source = &recipe.source;
    match (&source.archive, &source.path) {
        (Some(_), Some(_)) => Err(Error::ParseError(
            "[source] must set either archive or path, not both".to_string(),
        )),
        (None, None) => Err(Error::ParseError(
            "[source] must set archive (with checksum) or path".to_string(),
        )),
        (Some(_), None) => {
            let checksum = source.checksum.as_deref().ok_or_else(|| {
                Error::ParseError("[source] archive requires a checksum".to_string())
            })?;
            Checksum::parse(checksum)?;
            Ok(())
        }
        (None, Some(_)) => {
            if let Some(checksum) = &source.checksum {
                Checksum::parse(checksum)?;
            }
            Ok(())
        }
    }
}

fn validate_options(recipe: &Recipe) -> Result<()> {
    for (name, decl) in &recipe.options {
        if decl.values.is_empty() {
            return Err(Error::InvalidOption(format!("Option '{}' has no values", name)));
        }
        if !decl.allows(&decl.default) {
            return Err(Error::InvalidOption(format!(
                "Default '{}' of option '{}' is not an allowed value",
                decl.default, name
            )));
        }
        for cv in &decl.default_when {
            if !decl.allows(&cv.value) {
                return Err(Error::InvalidOption(format!(
                    "default_when value '{}' of option '{}' is not an allowed value",
                    cv.value, name
                )));
            }
        }
    }

    for (name, by_value) in &recipe.build.option_args {
        let decl = recipe.options.get(name).ok_or_else(|| {
            Error::InvalidOption(format!("build.option_args references unknown option '{}'", name))
        })?;
        for key in by_value.keys() {
            let known = key == "*" || decl.values.iter().any(|v| v.to_string() == *key);
            if !known {
                return Err(Error::InvalidOption(format!(
                    "build.option_args.{} has arguments for '{}', which is not an allowed value",
                    name, key
                )));
            }
        }
    }

    Ok(())
}

/// Every condition key must be a setting or a declared option
fn validate_conditions(recipe: &Recipe) -> Result<()> {
    let mut conditions: Vec<(String, &Condition)> = Vec::new();

    for (name, decl) in &recipe.options {
        for cv in &decl.default_when {
            conditions.push((format!("options.{}.default_when", name), &cv.when));
        }
        for c in &decl.remove_when {
            conditions.push((format!("options.{}.remove_when", name), c));
        }
    }
    if let Some(patches) = &recipe.patches {
        for patch in &patches.files {
            if let Some(c) = &patch.when {
                conditions.push((format!("patch {}", patch.file), c));
            }
        }
    }
    for rule in &recipe.layout.copy {
        if let Some(c) = &rule.when {
            conditions.push((format!("layout.copy '{}'", rule.pattern), c));
        }
    }
    for rule in &recipe.layout.rename {
        if let Some(c) = &rule.when {
            conditions.push((format!("layout.rename '{}'", rule.from), c));
        }
    }
    for fw in &recipe.info.frameworks {
        if let Some(c) = &fw.when {
            conditions.push((format!("info.frameworks '{}'", fw.name), c));
        }
    }

    for (place, condition) in conditions {
        for key in condition.keys() {
            let known = match key {
                ConditionKey::Option(name) => recipe.options.contains_key(name),
                ConditionKey::Bare(key) => Settings::is_key(key) || recipe.options.contains_key(key),
            };
            if !known {
                let key = match key {
                    ConditionKey::Option(name) => format!("options.{}", name),
                    ConditionKey::Bare(key) => key.to_string(),
                };
                return Err(Error::InvalidOption(format!(
                    "{}: condition '{}' tests '{}', which is neither a setting nor a declared option",
                    place, condition, key
                )));
            }
        }
    }

    Ok(())
}

fn validate_layout(recipe: &Recipe, warnings: &mut Vec<String>) -> Result<()> {
    let layout = &recipe.layout;

    for dir in &layout.dirs {
        if !is_single_component(dir) {
            return Err(Error::ParseError(format!(
                "Layout dir '{}' must be a single relative directory name",
                dir
            )));
        }
    }

    let declared = |p: &str| {
        Path::new(p)
            .components()
            .next()
            .and_then(|c| c.as_os_str().to_str())
            .is_some_and(|top| layout.dirs.iter().any(|d| d == top))
    };

    for rule in &layout.copy {
        if !is_package_relative(&rule.dst) {
            return Err(Error::ParseError(format!(
                "Copy destination '{}' must be relative to the package",
                rule.dst
            )));
        }
        if !declared(&rule.dst) {
            warnings.push(format!(
                "Copy destination '{}' is outside the declared layout and will be dropped",
                rule.dst
            ));
        }
    }

    for rule in &layout.rename {
        if !is_package_relative(&rule.from) || !is_package_relative(&rule.to) {
            return Err(Error::ParseError(format!(
                "Rename '{}' -> '{}' must stay inside the package",
                rule.from, rule.to
            )));
        }
        if !declared(&rule.to) {
            warnings.push(format!(
                "Rename target '{}' is outside the declared layout and will be dropped",
                rule.to
            ));
        }
    }

    for pattern in &layout.remove {
        if !is_package_relative(pattern) {
            return Err(Error::ParseError(format!(
                "Remove pattern '{}' must be relative to the package",
                pattern
            )));
        }
    }

    Ok(())
}

/// Exactly one normal path component: no separators, `.` or `..`
fn is_single_component(s: &str) -> bool {
    let mut components = Path::new(s).components();
    matches!(components.next(), Some(Component::Normal(c)) if c == s)
        && components.next().is_none()
}

/// Relative, non-empty, and never climbing out with `..`
pub(crate) fn is_package_relative(p: &str) -> bool {
    let path = Path::new(p);
    !p.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUM: &str = "sha256:c77d0da3102aec9c07f43671e60611ebff89a996ef159497ce8e59d075786b12";

    fn recipe_with(extra: &str) -> String {
        format!(
            r#"
[package]
name = "test"
version = "1.0"
summary = "A test"
license = "MIT"

[source]
archive = "https://example.com/test-1.0.tar.gz"
checksum = "{}"

[info]
libs = ["test"]

{}
"#,
            SUM, extra
        )
    }

    #[test]
    fn test_parse_valid_recipe() {
        let recipe = parse_recipe(&recipe_with("")).unwrap();
        assert_eq!(recipe.package.name, "test");
        assert!(validate_recipe(&recipe).unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_recipe() {
        assert!(parse_recipe("this is not valid toml at all {}").is_err());
    }

    #[test]
    fn test_parse_recipe_file_sets_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.toml");
        std::fs::write(&path, recipe_with("")).unwrap();

        let recipe = parse_recipe_file(&path).unwrap();
        assert_eq!(recipe.recipe_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_validate_empty_name() {
        let content = recipe_with("").replace("name = \"test\"", "name = \"\"");
        let recipe = parse_recipe(&content).unwrap();
        assert!(validate_recipe(&recipe).is_err());
    }

    #[test]
    fn test_validate_name_and_version_stay_in_store() {
        for (field, bad) in [
            ("name", ".."),
            ("name", "."),
            ("name", "a/b"),
            ("version", ".."),
            ("version", "1.0/../.."),
            ("version", "/1.0"),
        ] {
            let content = recipe_with("").replace(
                &format!("{} = \"{}\"", field, if field == "name" { "test" } else { "1.0" }),
                &format!("{} = \"{}\"", field, bad),
            );
            let recipe = parse_recipe(&content).unwrap();
            assert!(validate_recipe(&recipe).is_err(), "{field} = {bad}");
        }

        let dotted = recipe_with("").replace("version = \"1.0\"", "version = \"1.0.rc1\"");
        validate_recipe(&parse_recipe(&dotted).unwrap()).unwrap();
    }

    #[test]
    fn test_validate_condition_keys() {
        let good = recipe_with(
            r#"
[options.shared]
values = [true, false]
default = false

[options.fPIC]
values = [true, false]
default = true
remove_when = ["options.shared=true", "os=Windows&&compiler=msvc"]

[[layout.copy]]
pattern = "*.dll"
dst = "bin"
when = "shared=true&&os=Windows"
"#,
        );
        validate_recipe(&parse_recipe(&good).unwrap()).unwrap();

        let misspelled = [
            r#"
[options.shared]
values = [true, false]
default = false

[options.fPIC]
values = [true, false]
default = true
remove_when = ["shraed=true"]
"#,
            r#"
[options.shared]
values = [true, false]
default = false

[[patches.files]]
file = "fix.patch"
when = "options.sharde=true"
"#,
            r#"
[[layout.rename]]
from = "lib/a.lib"
to = "lib/b.lib"
when = "os=Windows&&complier=msvc"
"#,
            r#"
[options.shared]
values = [true, false]
default = false
default_when = [{ when = "options.os=Windows", value = true }]
"#,
            r#"
[[info.frameworks]]
name = "CoreFoundation"
when = "platform=Macos"
"#,
        ];
        for extra in misspelled {
            let recipe = parse_recipe(&recipe_with(extra)).unwrap();
            assert!(
                matches!(validate_recipe(&recipe), Err(Error::InvalidOption(_))),
                "{extra}"
            );
        }
    }

    #[test]
    fn test_validate_bad_checksum() {
        let content = recipe_with("").replace(SUM, "md5:abc123");
        let recipe = parse_recipe(&content).unwrap();
        assert!(validate_recipe(&recipe).is_err());
    }

    #[test]
    fn test_validate_source_shape() {
        let both = recipe_with("").replace("[source]\n", "[source]\npath = \"src\"\n");
        assert!(validate_recipe(&parse_recipe(&both).unwrap()).is_err());

        let no_sum = recipe_with("").replace(&format!("checksum = \"{}\"", SUM), "");
        assert!(validate_recipe(&parse_recipe(&no_sum).unwrap()).is_err());
    }

    #[test]
    fn test_validate_warnings() {
        let content = r#"
[package]
name = "test"
version = "1.0"

[source]
path = "src"
"#;
        let recipe = parse_recipe(content).unwrap();
        let warnings = validate_recipe(&recipe).unwrap();
        assert!(warnings.iter().any(|w| w.contains("summary")));
        assert!(warnings.iter().any(|w| w.contains("license")));
        assert!(warnings.iter().any(|w| w.contains("libs")));
    }

    #[test]
    fn test_validate_option_args() {
        let good = recipe_with(
            r#"
[options.threads]
values = [false, "posix"]
default = "posix"

[build.option_args.threads]
false = ["--disable-threads"]
"*" = ["--enable-threads=%(value)s"]
"#,
        );
        validate_recipe(&parse_recipe(&good).unwrap()).unwrap();

        let unknown_option = recipe_with(
            r#"
[build.option_args.lto]
true = ["--enable-lto"]
"#,
        );
        assert!(validate_recipe(&parse_recipe(&unknown_option).unwrap()).is_err());

        let bad_value = recipe_with(
            r#"
[options.threads]
values = [false, "posix"]
default = "posix"

[build.option_args.threads]
win32 = ["--enable-threads=windows"]
"#,
        );
        assert!(validate_recipe(&parse_recipe(&bad_value).unwrap()).is_err());

        let bad_default = recipe_with(
            r#"
[options.shared]
values = [true, false]
default = "maybe"
"#,
        );
        assert!(validate_recipe(&parse_recipe(&bad_default).unwrap()).is_err());
    }

    #[test]
    fn test_validate_layout() {
        let escaping = recipe_with(
            r#"
[[layout.rename]]
from = "share/aclocal"
to = "../aclocal"
"#,
        );
        assert!(validate_recipe(&parse_recipe(&escaping).unwrap()).is_err());

        let undeclared = recipe_with(
            r#"
[[layout.copy]]
pattern = "*.txt"
dst = "docs"
"#,
        );
        let warnings = validate_recipe(&parse_recipe(&undeclared).unwrap()).unwrap();
        assert!(warnings.iter().any(|w| w.contains("outside the declared layout")));

        let nested_dir = recipe_with(
            r#"
[layout]
dirs = ["lib/pkgconfig"]
"#,
        );
        assert!(validate_recipe(&parse_recipe(&nested_dir).unwrap()).is_err());
    }

    #[test]
    fn test_remote_patch_needs_checksum() {
        let content = recipe_with(
            r#"
[[patches.files]]
file = "https://example.com/fix.patch"
"#,
        );
        assert!(validate_recipe(&parse_recipe(&content).unwrap()).is_err());
    }

    #[test]
    fn test_is_package_relative() {
        assert!(is_package_relative("bin/aclocal"));
        assert!(is_package_relative("lib/*.la"));
        assert!(!is_package_relative("/usr/lib"));
        assert!(!is_package_relative("lib/../../etc"));
        assert!(!is_package_relative(""));
    }
}
