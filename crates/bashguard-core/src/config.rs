//! File-based configuration
//!
//! A TOML file can add rules, wrappers and interpreters on top of the
//! built-ins, or replace them entirely with `inherit_defaults = false`.
//!
//! ```toml
//! [[deny]]
//! id = "no-prod-psql"
//! pattern = 'psql\s+.*prod'
//!
//! [[wrappers]]
//! name = "doppler"
//! value_flags = ["-p", "-c"]
//! ```

use crate::defaults;
use crate::inline::{InterpreterSpec, InterpreterTable};
use crate::policy::CommandGuard;
use crate::rules::{RuleError, RuleSet, RuleSpec};
use crate::wrapper::{WrapperSpec, WrapperTable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Rules(#[from] RuleError),
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Start from the built-in lists
    #[serde(default = "default_true")]
    pub inherit_defaults: bool,
    #[serde(default)]
    pub zero_access: Vec<RuleSpec>,
    #[serde(default)]
    pub deny: Vec<RuleSpec>,
    #[serde(default)]
    pub allow: Vec<RuleSpec>,
    #[serde(default)]
    pub wrappers: Vec<WrapperSpec>,
    #[serde(default)]
    pub interpreters: Vec<InterpreterSpec>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            inherit_defaults: true,
            zero_access: Vec::new(),
            deny: Vec::new(),
            allow: Vec::new(),
            wrappers: Vec::new(),
            interpreters: Vec::new(),
        }
    }
}

impl GuardConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            inherit_defaults = config.inherit_defaults,
            "loaded config"
        );
        Ok(config)
    }

    /// Merge with the built-ins (if inherited) and compile.
    ///
    /// User rules go after the built-in rules of their category. A user
    /// wrapper or interpreter replaces the built-in one of the same name.
    pub fn build(&self) -> Result<CommandGuard, ConfigError> {
        let (mut zero_access, mut deny, mut allow, mut wrappers, mut interpreters) =
            if self.inherit_defaults {
                (
                    defaults::zero_access(),
                    defaults::deny(),
                    defaults::allow(),
                    defaults::wrappers(),
                    defaults::interpreters(),
                )
            } else {
                Default::default()
            };

        zero_access.extend(self.zero_access.iter().cloned());
        deny.extend(self.deny.iter().cloned());
        allow.extend(self.allow.iter().cloned());

        for wrapper in &self.wrappers {
            match wrappers.iter_mut().find(|w| w.name == wrapper.name) {
                Some(existing) => *existing = wrapper.clone(),
                None => wrappers.push(wrapper.clone()),
            }
        }
        for interpreter in &self.interpreters {
            match interpreters.iter_mut().find(|i| i.name == interpreter.name) {
                Some(existing) => *existing = interpreter.clone(),
                None => interpreters.push(interpreter.clone()),
            }
        }

        let rules = RuleSet::compile(&zero_access, &deny, &allow)?;
        Ok(CommandGuard::new(
            rules,
            WrapperTable::new(wrappers)?,
            InterpreterTable::new(interpreters)?,
        ))
    }
}
