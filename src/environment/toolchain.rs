// src/environment/toolchain.rs

//! Toolchain knowledge: GNU triples, tool names and compiler flags
//!
//! Everything here is a table lookup on settings. No process is spawned
//! and nothing is read from the running system.

use crate::settings::{Arch, BuildType, Compiler, Os, Settings};
use std::collections::BTreeMap;

/// Wrapper scripts used to drive MSVC through an autotools build
///
/// automake ships `compile` and `ar-lib`, which translate GNU-style
/// command lines for `cl` and `lib`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsvcWrappers {
    pub compile: String,
    pub ar_lib: String,
}

impl Default for MsvcWrappers {
    fn default() -> Self {
        Self {
            compile: "compile".to_string(),
            ar_lib: "ar-lib".to_string(),
        }
    }
}

/// GNU triple for an OS/arch pair
pub fn gnu_triple(os: Os, arch: Arch) -> String {
    let cpu = arch.triple_cpu();
    match (os, arch) {
        (Os::Linux, Arch::Armv7) => "arm-linux-gnueabihf".to_string(),
        (Os::Linux, _) => format!("{}-linux-gnu", cpu),
        (Os::Android, Arch::Armv7) => "armv7a-linux-androideabi".to_string(),
        (Os::Android, _) => format!("{}-linux-android", cpu),
        (Os::Windows, _) => format!("{}-w64-mingw32", cpu),
        (Os::Macos, _) => format!("{}-apple-darwin", cpu),
        (Os::Ios, _) => format!("{}-apple-ios", cpu),
        (Os::FreeBSD, _) => format!("{}-unknown-freebsd", cpu),
        (Os::SunOS, _) => format!("{}-sun-solaris", cpu),
    }
}

/// `--host` and `--build` triples for configure, if any
///
/// MSVC builds always name a mingw host (picked from the build machine's
/// arch) and leave `--build` to configure. Other toolchains only pass
/// triples when cross-building.
pub fn configure_triples(settings: &Settings) -> (Option<String>, Option<String>) {
    if settings.compiler == Compiler::Msvc {
        let host = match settings.build_arch {
            Arch::X86 => Some("i686-w64-mingw32".to_string()),
            Arch::X86_64 => Some("x86_64-w64-mingw32".to_string()),
            _ => None,
        };
        return (host, None);
    }

    if settings.is_cross_building() {
        (
            Some(gnu_triple(settings.os, settings.arch)),
            Some(gnu_triple(settings.build_os, settings.build_arch)),
        )
    } else {
        (None, None)
    }
}

/// Tool commands (`CC`, `AR`, ...) for the toolchain
pub fn tool_commands(
    settings: &Settings,
    host_triple: Option<&str>,
    wrappers: &MsvcWrappers,
) -> BTreeMap<String, String> {
    let mut tools = BTreeMap::new();
    let mut set = |k: &str, v: String| {
        tools.insert(k.to_string(), v);
    };

    match settings.compiler {
        Compiler::Msvc => {
            set("CC", format!("{} cl -nologo", wrappers.compile));
            set("CXX", format!("{} cl -nologo", wrappers.compile));
            set("LD", "link".to_string());
            set("NM", "dumpbin -symbols".to_string());
            set("STRIP", ":".to_string());
            set("AR", format!("{} lib", wrappers.ar_lib));
            set("RANLIB", ":".to_string());

            let rc = match settings.build_arch {
                Arch::X86 => Some("windres --target=pe-i386"),
                Arch::X86_64 => Some("windres --target=pe-x86-64"),
                _ => None,
            };
            if let Some(rc) = rc {
                set("RC", rc.to_string());
                set("WINDRES", rc.to_string());
            }
        }
        Compiler::Gcc => match host_triple.filter(|_| settings.is_cross_building()) {
            Some(triple) => {
                for (var, tool) in [
                    ("CC", "gcc"),
                    ("CXX", "g++"),
                    ("AR", "ar"),
                    ("LD", "ld"),
                    ("NM", "nm"),
                    ("RANLIB", "ranlib"),
                    ("STRIP", "strip"),
                ] {
                    set(var, format!("{}-{}", triple, tool));
                }
            }
            None => {
                set("CC", "gcc".to_string());
                set("CXX", "g++".to_string());
            }
        },
        Compiler::Clang | Compiler::AppleClang => {
            set("CC", "clang".to_string());
            set("CXX", "clang++".to_string());
            if settings.is_cross_building() {
                for (var, tool) in [
                    ("AR", "llvm-ar"),
                    ("NM", "llvm-nm"),
                    ("RANLIB", "llvm-ranlib"),
                    ("STRIP", "llvm-strip"),
                ] {
                    set(var, tool.to_string());
                }
            }
        }
    }

    tools
}

/// Compiler flags implied by settings alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseFlags {
    /// Shared by C and C++
    pub cflags: Vec<String>,
    pub cppflags: Vec<String>,
    pub ldflags: Vec<String>,
}

pub fn base_flags(settings: &Settings, host_triple: Option<&str>, pic: bool) -> BaseFlags {
    let mut flags = BaseFlags::default();
    let push = |v: &mut Vec<String>, items: &[&str]| v.extend(items.iter().map(|s| s.to_string()));

    if settings.compiler == Compiler::Msvc {
        let opt: &[&str] = match settings.build_type {
            BuildType::Debug => &["-Zi", "-Ob0", "-Od"],
            BuildType::Release => &["-O2", "-Ob2"],
            BuildType::RelWithDebInfo => &["-Zi", "-O2", "-Ob1"],
            BuildType::MinSizeRel => &["-O1", "-Ob1"],
        };
        push(&mut flags.cflags, opt);
        // Parallel cl invocations share one PDB
        push(&mut flags.cflags, &["-FS"]);
    } else {
        let opt: &[&str] = match settings.build_type {
            BuildType::Debug => &["-g"],
            BuildType::Release => &["-O3"],
            BuildType::RelWithDebInfo => &["-O2", "-g"],
            BuildType::MinSizeRel => &["-Os"],
        };
        push(&mut flags.cflags, opt);

        match (settings.compiler, settings.arch) {
            (Compiler::AppleClang, Arch::X86_64) => {
                push(&mut flags.cflags, &["-arch", "x86_64"]);
                push(&mut flags.ldflags, &["-arch", "x86_64"]);
            }
            (Compiler::AppleClang, Arch::Armv8) => {
                push(&mut flags.cflags, &["-arch", "arm64"]);
                push(&mut flags.ldflags, &["-arch", "arm64"]);
            }
            (_, Arch::X86) => {
                push(&mut flags.cflags, &["-m32"]);
                push(&mut flags.ldflags, &["-m32"]);
            }
            (_, Arch::X86_64) => {
                push(&mut flags.cflags, &["-m64"]);
                push(&mut flags.ldflags, &["-m64"]);
            }
            _ => {}
        }

        if settings.compiler == Compiler::Clang
            && settings.is_cross_building()
            && let Some(triple) = host_triple
        {
            let target = format!("--target={}", triple);
            flags.cflags.push(target.clone());
            flags.ldflags.push(target);
        }

        if pic {
            push(&mut flags.cflags, &["-fPIC"]);
        }
    }

    if settings.build_type != BuildType::Debug {
        push(&mut flags.cppflags, &["-DNDEBUG"]);
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(os: Os, arch: Arch, compiler: Compiler) -> Settings {
        Settings {
            os,
            arch,
            compiler,
            compiler_version: None,
            build_type: BuildType::Release,
            build_os: os,
            build_arch: arch,
        }
    }

    #[test]
    fn test_gnu_triples() {
        assert_eq!(gnu_triple(Os::Linux, Arch::X86_64), "x86_64-linux-gnu");
        assert_eq!(gnu_triple(Os::Linux, Arch::Armv7), "arm-linux-gnueabihf");
        assert_eq!(gnu_triple(Os::Macos, Arch::Armv8), "aarch64-apple-darwin");
        assert_eq!(gnu_triple(Os::Windows, Arch::X86), "i686-w64-mingw32");
    }

    #[test]
    fn test_native_build_has_no_triples() {
        let s = settings(Os::Linux, Arch::X86_64, Compiler::Gcc);
        assert_eq!(configure_triples(&s), (None, None));
    }

    #[test]
    fn test_cross_build_triples() {
        let mut s = settings(Os::Linux, Arch::Armv8, Compiler::Gcc);
        s.build_arch = Arch::X86_64;
        let (host, build) = configure_triples(&s);
        assert_eq!(host.as_deref(), Some("aarch64-linux-gnu"));
        assert_eq!(build.as_deref(), Some("x86_64-linux-gnu"));

        let tools = tool_commands(&s, host.as_deref(), &MsvcWrappers::default());
        assert_eq!(tools["CC"], "aarch64-linux-gnu-gcc");
        assert_eq!(tools["STRIP"], "aarch64-linux-gnu-strip");
    }

    #[test]
    fn test_msvc_toolchain() {
        let s = settings(Os::Windows, Arch::X86_64, Compiler::Msvc);
        let (host, build) = configure_triples(&s);
        assert_eq!(host.as_deref(), Some("x86_64-w64-mingw32"));
        assert_eq!(build, None);

        let wrappers = MsvcWrappers {
            compile: "/automake/compile".to_string(),
            ar_lib: "/automake/ar-lib".to_string(),
        };
        let tools = tool_commands(&s, host.as_deref(), &wrappers);
        assert_eq!(tools["CC"], "/automake/compile cl -nologo");
        assert_eq!(tools["AR"], "/automake/ar-lib lib");
        assert_eq!(tools["NM"], "dumpbin -symbols");
        assert_eq!(tools["RANLIB"], ":");
        assert_eq!(tools["RC"], "windres --target=pe-x86-64");

        let flags = base_flags(&s, host.as_deref(), false);
        assert!(flags.cflags.contains(&"-FS".to_string()));
        assert!(flags.cppflags.contains(&"-DNDEBUG".to_string()));
    }

    #[test]
    fn test_gnu_flags() {
        let mut s = settings(Os::Linux, Arch::X86, Compiler::Gcc);
        s.build_type = BuildType::Debug;
        let flags = base_flags(&s, None, true);
        assert_eq!(flags.cflags, vec!["-g", "-m32", "-fPIC"]);
        assert!(flags.cppflags.is_empty());

        let s = settings(Os::Macos, Arch::Armv8, Compiler::AppleClang);
        let flags = base_flags(&s, None, false);
        assert_eq!(flags.cflags, vec!["-O3", "-arch", "arm64"]);
    }
}
