// src/settings.rs

//! Host settings: the machine a package is built for and the machine
//! it is built on
//!
//! Settings come from three layers, later ones winning:
//! 1. Detection of the running host
//! 2. The `[profile]` table of `pantry.toml` or a profile file
//! 3. `-s key=value` overrides on the command line
//!
//! Keys use the names recipes reference in conditions:
//! `os`, `arch`, `compiler`, `compiler.version`, `build_type`,
//! `build_os`, `build_arch`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use strum_macros::{Display, EnumString};

/// Target operating system
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Os {
    Linux,
    Windows,
    Macos,
    FreeBSD,
    SunOS,
    Android,
    #[strum(serialize = "iOS")]
    #[serde(rename = "iOS")]
    Ios,
}

impl Os {
    fn detect() -> Self {
        match std::env::consts::OS {
            "windows" => Os::Windows,
            "macos" => Os::Macos,
            "freebsd" => Os::FreeBSD,
            "solaris" | "illumos" => Os::SunOS,
            "android" => Os::Android,
            "ios" => Os::Ios,
            _ => Os::Linux,
        }
    }
}

/// Target CPU architecture
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86,
    #[strum(serialize = "x86_64")]
    #[serde(rename = "x86_64")]
    X86_64,
    Armv7,
    Armv8,
    Ppc64le,
    S390x,
    Riscv64,
}

impl Arch {
    fn detect() -> Self {
        match std::env::consts::ARCH {
            "x86" => Arch::X86,
            "arm" => Arch::Armv7,
            "aarch64" => Arch::Armv8,
            "powerpc64" => Arch::Ppc64le,
            "s390x" => Arch::S390x,
            "riscv64" => Arch::Riscv64,
            _ => Arch::X86_64,
        }
    }

    /// CPU part of a GNU triple
    pub fn triple_cpu(&self) -> &'static str {
        match self {
            Arch::X86 => "i686",
            Arch::X86_64 => "x86_64",
            Arch::Armv7 => "arm",
            Arch::Armv8 => "aarch64",
            Arch::Ppc64le => "powerpc64le",
            Arch::S390x => "s390x",
            Arch::Riscv64 => "riscv64",
        }
    }
}

/// Compiler family
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum Compiler {
    Gcc,
    Clang,
    AppleClang,
    #[strum(to_string = "msvc", serialize = "Visual Studio")]
    Msvc,
}

impl Compiler {
    /// GNU-style driver accepting `-O`/`-g`/`-m` flags
    pub fn is_gnu_like(&self) -> bool {
        !matches!(self, Compiler::Msvc)
    }
}

/// Optimization profile
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum BuildType {
    Debug,
    Release,
    RelWithDebInfo,
    MinSizeRel,
}

/// Complete set of host settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub os: Os,
    pub arch: Arch,
    pub compiler: Compiler,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler_version: Option<String>,
    pub build_type: BuildType,
    /// OS of the machine running the build
    pub build_os: Os,
    /// Architecture of the machine running the build
    pub build_arch: Arch,
}

impl Settings {
    /// Settings for the running machine, building natively
    pub fn detect() -> Self {
        let os = Os::detect();
        let arch = Arch::detect();
        let compiler = match os {
            Os::Windows => Compiler::Msvc,
            Os::Macos | Os::Ios => Compiler::AppleClang,
            Os::FreeBSD => Compiler::Clang,
            _ => Compiler::Gcc,
        };

        Self {
            os,
            arch,
            compiler,
            compiler_version: None,
            build_type: BuildType::Release,
            build_os: os,
            build_arch: arch,
        }
    }

    /// True when the produced binaries cannot run on the build machine
    pub fn is_cross_building(&self) -> bool {
        self.os != self.build_os || self.arch != self.build_arch
    }

    /// Every key `get` answers for
    pub const KEYS: &'static [&'static str] = &[
        "os",
        "arch",
        "compiler",
        "compiler.version",
        "build_type",
        "build_os",
        "os_build",
        "build_arch",
        "arch_build",
    ];

    pub fn is_key(key: &str) -> bool {
        Self::KEYS.contains(&key)
    }

    /// Look up a setting by key, as used in recipe conditions and templates
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "os" => Some(self.os.to_string()),
            "arch" => Some(self.arch.to_string()),
            "compiler" => Some(self.compiler.to_string()),
            "compiler.version" => self.compiler_version.clone(),
            "build_type" => Some(self.build_type.to_string()),
            "build_os" | "os_build" => Some(self.build_os.to_string()),
            "build_arch" | "arch_build" => Some(self.build_arch.to_string()),
            _ => None,
        }
    }

    /// Override a single setting
    ///
    /// Setting `os` or `arch` leaves `build_os`/`build_arch` alone, so
    /// `-s os=Windows` on a Linux host is a cross build.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |_| Error::InvalidSetting(format!("{}={}", key, value));
        match key {
            "os" => self.os = value.parse().map_err(invalid)?,
            "arch" => self.arch = value.parse().map_err(invalid)?,
            "compiler" => self.compiler = value.parse().map_err(invalid)?,
            "compiler.version" => self.compiler_version = Some(value.to_string()),
            "build_type" => self.build_type = value.parse().map_err(invalid)?,
            "build_os" | "os_build" => self.build_os = value.parse().map_err(invalid)?,
            "build_arch" | "arch_build" => self.build_arch = value.parse().map_err(invalid)?,
            _ => {
                return Err(Error::InvalidSetting(format!("Unknown setting: {}", key)));
            }
        }
        Ok(())
    }

    /// Apply a table of `key = "value"` overrides in key order
    pub fn apply(&mut self, overrides: &BTreeMap<String, String>) -> Result<()> {
        for (key, value) in overrides {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Apply `key=value` strings from the command line
    pub fn apply_args<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        for arg in args {
            let (key, value) = parse_assignment(arg.as_ref())?;
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Flattened view used in package metadata and package ids
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for key in [
            "os",
            "arch",
            "compiler",
            "compiler.version",
            "build_type",
            "build_os",
            "build_arch",
        ] {
            if let Some(value) = self.get(key) {
                map.insert(key.to_string(), value);
            }
        }
        map
    }
}

/// Load a profile file: a TOML table of settings, optionally under `[settings]`
pub fn load_profile(path: &Path) -> Result<BTreeMap<String, String>> {
    #[derive(Deserialize)]
    struct ProfileFile {
        #[serde(default)]
        settings: BTreeMap<String, String>,
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Filesystem(format!("Failed to read profile {}: {}", path.display(), e))
    })?;

    if let Ok(file) = toml::from_str::<ProfileFile>(&content)
        && !file.settings.is_empty()
    {
        return Ok(file.settings);
    }

    toml::from_str(&content)
        .map_err(|e| Error::ParseError(format!("Invalid profile {}: {}", path.display(), e)))
}

/// Split `key=value`
pub fn parse_assignment(s: &str) -> Result<(&str, &str)> {
    s.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| Error::ParseError(format!("Expected key=value, got '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_gcc() -> Settings {
        Settings {
            os: Os::Linux,
            arch: Arch::X86_64,
            compiler: Compiler::Gcc,
            compiler_version: Some("13".to_string()),
            build_type: BuildType::Release,
            build_os: Os::Linux,
            build_arch: Arch::X86_64,
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Macos".parse::<Os>().unwrap(), Os::Macos);
        assert_eq!("sunos".parse::<Os>().unwrap(), Os::SunOS);
        assert_eq!("x86_64".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("armv8".parse::<Arch>().unwrap(), Arch::Armv8);
        assert_eq!("apple-clang".parse::<Compiler>().unwrap(), Compiler::AppleClang);
        assert_eq!("Visual Studio".parse::<Compiler>().unwrap(), Compiler::Msvc);
        assert_eq!("RelWithDebInfo".parse::<BuildType>().unwrap(), BuildType::RelWithDebInfo);
        assert!("Plan9".parse::<Os>().is_err());
    }

    #[test]
    fn test_display_round_trips_get() {
        let s = linux_gcc();
        assert_eq!(s.get("os").as_deref(), Some("Linux"));
        assert_eq!(s.get("arch").as_deref(), Some("x86_64"));
        assert_eq!(s.get("compiler").as_deref(), Some("gcc"));
        assert_eq!(s.get("compiler.version").as_deref(), Some("13"));
        assert_eq!(s.get("arch_build").as_deref(), Some("x86_64"));
        assert_eq!(s.get("nonsense"), None);
    }

    #[test]
    fn test_set_os_makes_cross_build() {
        let mut s = linux_gcc();
        assert!(!s.is_cross_building());

        s.apply_args(&["os=Windows", "compiler=msvc"]).unwrap();
        assert_eq!(s.os, Os::Windows);
        assert_eq!(s.build_os, Os::Linux);
        assert!(s.is_cross_building());
    }

    #[test]
    fn test_set_rejects_unknown() {
        let mut s = linux_gcc();
        assert!(s.set("os", "Plan9").is_err());
        assert!(s.set("color", "blue").is_err());
        assert!(s.apply_args(&["os"]).is_err());
    }

    #[test]
    fn test_to_map_is_sorted_and_complete() {
        let map = linux_gcc().to_map();
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "arch",
                "build_arch",
                "build_os",
                "build_type",
                "compiler",
                "compiler.version",
                "os"
            ]
        );
    }

    #[test]
    fn test_load_profile_both_shapes() {
        let dir = tempfile::tempdir().unwrap();

        let nested = dir.path().join("nested.toml");
        std::fs::write(&nested, "[settings]\nos = \"Macos\"\narch = \"armv8\"\n").unwrap();
        let map = load_profile(&nested).unwrap();
        assert_eq!(map.get("os").map(String::as_str), Some("Macos"));

        let flat = dir.path().join("flat.toml");
        std::fs::write(&flat, "build_type = \"Debug\"\n").unwrap();
        let map = load_profile(&flat).unwrap();
        assert_eq!(map.get("build_type").map(String::as_str), Some("Debug"));

        let mut s = linux_gcc();
        s.apply(&map).unwrap();
        assert_eq!(s.build_type, BuildType::Debug);
    }

    #[test]
    fn test_every_key_is_answered() {
        let mut s = linux_gcc();
        s.compiler_version = Some("13".to_string());
        for key in Settings::KEYS {
            assert!(s.get(key).is_some(), "{key}");
        }
        assert!(Settings::is_key("build_type"));
        assert!(!Settings::is_key("shared"));
    }
}
