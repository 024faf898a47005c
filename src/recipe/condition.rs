// src/recipe/condition.rs

//! Conditions attached to recipe entries (`when = "os=Windows"`)
//!
//! A condition compares keys against values:
//! - `os=Windows`, `compiler!=msvc` test host settings
//! - `options.shared=true` (or plain `shared=true`) tests an option
//! - `os=Windows&&shared=true` holds when every clause holds
//!
//! Keys that name neither a setting nor an option never match, and a
//! `!=` against such a key always matches. Options that were removed
//! from the recipe behave the same way.

use crate::error::{Error, Result};
use crate::settings::Settings;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::options::OptionValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Equal,
    NotEqual,
}

/// A single `key=value` / `key!=value` test
#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    key: String,
    value: String,
    comparison: Comparison,
}

impl Clause {
    fn option_key(&self) -> Option<&str> {
        self.key.strip_prefix("options.")
    }

    fn matches(&self, settings: &Settings, options: &BTreeMap<String, OptionValue>) -> bool {
        let actual = match self.option_key() {
            Some(name) => options.get(name).map(|v| v.to_string()),
            None => settings
                .get(&self.key)
                .or_else(|| options.get(&self.key).map(|v| v.to_string())),
        };

        let equal = actual.is_some_and(|a| a.eq_ignore_ascii_case(&self.value));
        match self.comparison {
            Comparison::Equal => equal,
            Comparison::NotEqual => !equal,
        }
    }

    fn parse(s: &str, whole: &str) -> Result<Self> {
        let (key, value, comparison) = if let Some((k, v)) = s.split_once("!=") {
            (k, v, Comparison::NotEqual)
        } else if let Some((k, v)) = s.split_once('=') {
            (k, v, Comparison::Equal)
        } else {
            return Err(Error::ParseError(format!(
                "Invalid condition '{}': expected key=value or key!=value",
                whole
            )));
        };

        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() || key.contains('=') || value.contains('=') {
            return Err(Error::ParseError(format!("Invalid condition '{}'", whole)));
        }

        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
            comparison,
        })
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.comparison {
            Comparison::Equal => "=",
            Comparison::NotEqual => "!=",
        };
        write!(f, "{}{}{}", self.key, op, self.value)
    }
}

/// One or more clauses joined by `&&`; all of them must match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    clauses: Vec<Clause>,
}

/// What a condition key refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKey<'a> {
    /// `options.<name>`: must be an option
    Option(&'a str),
    /// A bare key: a setting, or else an option
    Bare(&'a str),
}

impl Condition {
    /// Every key the condition tests, in order
    pub fn keys(&self) -> impl Iterator<Item = ConditionKey<'_>> {
        self.clauses.iter().map(|c| match c.option_key() {
            Some(name) => ConditionKey::Option(name),
            None => ConditionKey::Bare(&c.key),
        })
    }

    /// Evaluate against settings and the option values known so far
    pub fn matches(&self, settings: &Settings, options: &BTreeMap<String, OptionValue>) -> bool {
        self.clauses.iter().all(|c| c.matches(settings, options))
    }
}

impl FromStr for Condition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let clauses = s
            .split("&&")
            .map(|part| Clause::parse(part, s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { clauses })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str("&&")?;
            }
            write!(f, "{}", clause)?;
        }
        Ok(())
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// True when `when` is absent or matches
pub fn applies(
    when: Option<&Condition>,
    settings: &Settings,
    options: &BTreeMap<String, OptionValue>,
) -> bool {
    when.is_none_or(|c| c.matches(settings, options))
}
