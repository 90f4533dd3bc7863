//! Wrapper resolution
//!
//! `sudo`, `timeout`, `nice`, `env` and friends re-invoke another command
//! without changing what it does. Allow rules are written against the real
//! command, so the wrappers are peeled off before matching.

use crate::rules::RuleError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Upper bound on nested wrappers peeled from a single sub-command
pub const MAX_WRAPPER_DEPTH: usize = 10;

static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=").unwrap());

/// A transparent pass-through command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WrapperSpec {
    /// Command name, matched against the basename of the first word
    pub name: String,
    /// Flags that consume the following token (`sudo -u root`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_flags: Vec<String>,
    /// Positional arguments between the flags and the wrapped command
    /// (`timeout 5 cmd`)
    #[serde(default)]
    pub positional_args: usize,
    /// The wrapper takes `NAME=value` tokens before the command (`env`)
    #[serde(default)]
    pub sets_env: bool,
}

impl WrapperSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value_flags: Vec::new(),
            positional_args: 0,
            sets_env: false,
        }
    }

    pub fn with_value_flags(mut self, flags: &[&str]) -> Self {
        self.value_flags = flags.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_positional_args(mut self, count: usize) -> Self {
        self.positional_args = count;
        self
    }

    pub fn setting_env(mut self) -> Self {
        self.sets_env = true;
        self
    }

    fn takes_value(&self, flag: &str) -> bool {
        self.value_flags.iter().any(|f| f == flag)
    }
}

/// The fixed set of wrappers known to the resolver
#[derive(Debug, Clone, Default)]
pub struct WrapperTable {
    wrappers: Vec<WrapperSpec>,
}

impl WrapperTable {
    pub fn new(wrappers: Vec<WrapperSpec>) -> Result<Self, RuleError> {
        for spec in &wrappers {
            if spec.name.is_empty() || spec.name.contains(|c: char| c == '/' || c.is_whitespace()) {
                return Err(RuleError::InvalidWrapper {
                    name: spec.name.clone(),
                    reason: "name must be a bare command name".to_string(),
                });
            }
        }
        Ok(Self { wrappers })
    }

    pub fn iter(&self) -> impl Iterator<Item = &WrapperSpec> {
        self.wrappers.iter()
    }

    pub fn get(&self, name: &str) -> Option<&WrapperSpec> {
        self.wrappers.iter().find(|w| w.name == name)
    }

    /// Strip leading wrapper invocations from a sub-command.
    ///
    /// Returns the input unchanged when the first word is not a wrapper, or
    /// when stripping would leave nothing to run (`sudo -i`).
    pub fn resolve<'a>(&self, command: &'a str) -> Cow<'a, str> {
        let tokens: Vec<&str> = command.split_whitespace().collect();
        let mut rest = tokens.as_slice();
        let mut stripped = false;

        for _ in 0..MAX_WRAPPER_DEPTH {
            let Some((first, tail)) = rest.split_first() else {
                break;
            };
            let Some(spec) = self.get(program_name(first)) else {
                break;
            };
            rest = tail;
            stripped = true;

            while let Some((flag, tail)) = rest.split_first() {
                if !flag.starts_with('-') {
                    break;
                }
                rest = tail;
                if *flag == "--" {
                    break;
                }
                if spec.takes_value(flag) {
                    rest = rest.get(1..).unwrap_or_default();
                }
            }

            rest = rest.get(spec.positional_args..).unwrap_or_default();

            if spec.sets_env {
                while rest.first().is_some_and(|t| ASSIGNMENT.is_match(t)) {
                    rest = &rest[1..];
                }
            }
        }

        if !stripped || rest.is_empty() {
            return Cow::Borrowed(command);
        }
        tracing::trace!(from = command, remaining = rest.len(), "wrappers stripped");
        Cow::Owned(rest.join(" "))
    }
}

/// Basename of a command word: `/usr/bin/sudo` -> `sudo`
pub fn program_name(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}

/// Replace a path-qualified leading word with its basename.
///
/// `.venv/bin/python app.py` -> `python app.py`. Returns `None` when the
/// first word carries no path.
pub fn strip_program_path(command: &str) -> Option<String> {
    let command = command.trim_start();
    let end = command
        .find(char::is_whitespace)
        .unwrap_or(command.len());
    let (first, rest) = command.split_at(end);
    let name = program_name(first);
    if name.len() == first.len() || name.is_empty() {
        return None;
    }
    Some(format!("{name}{rest}"))
}
