// src/recipe/options.rs

//! Recipe options: enumerated build choices such as `shared` or `threads`
//!
//! Each option declares its allowed values and a default. Two rules adapt
//! the declaration to the host before user choices are applied:
//! - `default_when`: the first matching condition replaces the default
//! - `remove_when`: any matching condition deletes the option entirely
//!   (e.g. `fPIC` on Windows, or when `shared=true`)
//!
//! ```toml
//! [options.threads]
//! values = [false, "posix", "solaris", "pth", "windows"]
//! default = "posix"
//! default_when = [
//!     { when = "os=Windows", value = "windows" },
//!     { when = "os=SunOS", value = "solaris" },
//! ]
//! ```

use crate::error::{Error, Result};
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use super::condition::Condition;

/// Value of an option: either a boolean or a named choice
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Str(String),
}

impl OptionValue {
    /// Parse a command-line value; `true`/`false` become booleans
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "true" => OptionValue::Bool(true),
            "false" => OptionValue::Bool(false),
            _ => OptionValue::Str(s.to_string()),
        }
    }

    /// Truthiness as used by `--enable-x`/`--disable-x` style switches
    pub fn is_truthy(&self) -> bool {
        match self {
            OptionValue::Bool(b) => *b,
            OptionValue::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Str(s) => f.write_str(s),
        }
    }
}

/// A conditional default
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalValue {
    pub when: Condition,
    pub value: OptionValue,
}

/// Declaration of a single option in `[options.<name>]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDecl {
    /// Allowed values
    pub values: Vec<OptionValue>,

    /// Value used when neither a rule nor the user picks one
    pub default: OptionValue,

    /// Host-dependent defaults; the first match wins
    #[serde(default)]
    pub default_when: Vec<ConditionalValue>,

    /// Conditions under which the option does not exist
    #[serde(default)]
    pub remove_when: Vec<Condition>,
}

impl OptionDecl {
    pub fn allows(&self, value: &OptionValue) -> bool {
        self.values.iter().any(|v| v == value)
    }

    fn allowed_list(&self) -> String {
        self.values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Final option values for one build, ordered by name
pub type OptionSet = BTreeMap<String, OptionValue>;

/// Resolve declared options against host settings and user choices
///
/// Order of evaluation:
/// 1. Defaults (with `default_when` applied against the settings)
/// 2. User values override defaults
/// 3. `remove_when` prunes options, evaluated against the values from 2
///
/// A user value for an option that gets pruned is dropped with a debug
/// message, not rejected; a user value for an undeclared option, or one
/// outside the allowed values, is an error.
pub fn resolve_options(
    decls: &BTreeMap<String, OptionDecl>,
    settings: &Settings,
    user: &OptionSet,
) -> Result<OptionSet> {
    for (name, value) in user {
        let decl = decls
            .get(name)
            .ok_or_else(|| Error::InvalidOption(format!("Unknown option: {}", name)))?;
        if !decl.allows(value) {
            return Err(Error::InvalidOption(format!(
                "Invalid value '{}' for option '{}' (allowed: {})",
                value,
                name,
                decl.allowed_list()
            )));
        }
    }

    let empty = OptionSet::new();
    let mut values = OptionSet::new();
    for (name, decl) in decls {
        let default = decl
            .default_when
            .iter()
            .find(|cv| cv.when.matches(settings, &empty))
            .map(|cv| &cv.value)
            .unwrap_or(&decl.default);
        let value = user.get(name).unwrap_or(default).clone();
        values.insert(name.clone(), value);
    }

    let snapshot = values.clone();
    values.retain(|name, _| {
        let removed = decls[name]
            .remove_when
            .iter()
            .any(|c| c.matches(settings, &snapshot));
        if removed {
            debug!("Option '{}' removed for this configuration", name);
        }
        !removed
    });

    Ok(values)
}

/// Parse `name=value` pairs from the command line
pub fn parse_option_args<S: AsRef<str>>(args: &[S]) -> Result<OptionSet> {
    let mut set = OptionSet::new();
    for arg in args {
        let (name, value) = crate::settings::parse_assignment(arg.as_ref())?;
        set.insert(name.to_string(), OptionValue::parse(value));
    }
    Ok(set)
}
