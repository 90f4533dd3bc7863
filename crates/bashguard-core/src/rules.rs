//! Pattern rules and the rule matcher
//!
//! Rules are regular expressions searched (not anchored) case-insensitively
//! against a command string. Within a category they are tried in declaration
//! order and the first hit wins, so verdict reasons are deterministic.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Which layer a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Paths whose mere mention is denied
    ZeroAccess,
    /// Always-denied command patterns
    Deny,
    /// Known-safe command patterns
    Allow,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::ZeroAccess, Category::Deny, Category::Allow];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::ZeroAccess => write!(f, "zero-access path"),
            Category::Deny => write!(f, "deny"),
            Category::Allow => write!(f, "allow"),
        }
    }
}

/// Rule as written in configuration: identifier plus pattern text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub id: String,
    pub pattern: String,
}

impl RuleSpec {
    pub fn new(id: &str, pattern: &str) -> Self {
        Self {
            id: id.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

/// A compiled rule
#[derive(Debug, Clone)]
pub struct Rule {
    id: String,
    pattern: String,
    category: Category,
    regex: Regex,
}

impl Rule {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Configuration defects detected while building the engine
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid {category} rule '{id}': {source}")]
    InvalidPattern {
        id: String,
        category: Category,
        #[source]
        source: regex::Error,
    },

    #[error("Duplicate {category} rule id '{id}'")]
    DuplicateId { id: String, category: Category },

    #[error("Deny layer is empty: at least one zero-access or deny rule is required")]
    EmptyDenyLayer,

    #[error("Invalid wrapper '{name}': {reason}")]
    InvalidWrapper { name: String, reason: String },

    #[error("Invalid interpreter '{name}': {reason}")]
    InvalidInterpreter { name: String, reason: String },
}

/// All three rule categories, compiled and ordered
#[derive(Debug, Clone)]
pub struct RuleSet {
    zero_access: Vec<Rule>,
    deny: Vec<Rule>,
    allow: Vec<Rule>,
}

impl RuleSet {
    /// Compile every rule. Any bad pattern aborts the whole set: a silently
    /// skipped deny rule is a hole.
    pub fn compile(
        zero_access: &[RuleSpec],
        deny: &[RuleSpec],
        allow: &[RuleSpec],
    ) -> Result<Self, RuleError> {
        if zero_access.is_empty() && deny.is_empty() {
            return Err(RuleError::EmptyDenyLayer);
        }
        Ok(Self {
            zero_access: compile_category(Category::ZeroAccess, zero_access)?,
            deny: compile_category(Category::Deny, deny)?,
            allow: compile_category(Category::Allow, allow)?,
        })
    }

    pub fn rules(&self, category: Category) -> &[Rule] {
        match category {
            Category::ZeroAccess => &self.zero_access,
            Category::Deny => &self.deny,
            Category::Allow => &self.allow,
        }
    }

    /// First rule of `category` matching anywhere in `text`
    pub fn first_match(&self, category: Category, text: &str) -> Option<&Rule> {
        self.rules(category).iter().find(|rule| rule.is_match(text))
    }
}

fn compile_category(category: Category, specs: &[RuleSpec]) -> Result<Vec<Rule>, RuleError> {
    let mut seen = HashSet::new();
    specs
        .iter()
        .map(|spec| {
            if !seen.insert(spec.id.as_str()) {
                return Err(RuleError::DuplicateId {
                    id: spec.id.clone(),
                    category,
                });
            }
            let regex = RegexBuilder::new(&spec.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| RuleError::InvalidPattern {
                    id: spec.id.clone(),
                    category,
                    source,
                })?;
            Ok(Rule {
                id: spec.id.clone(),
                pattern: spec.pattern.clone(),
                category,
                regex,
            })
        })
        .collect()
}
