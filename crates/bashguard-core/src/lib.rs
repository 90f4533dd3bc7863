//! bashguard core - pre-execution classification of shell commands
//!
//! A command line is checked against deny rules as a whole, then split into
//! sub-commands that must each match an allow rule. Anything else is left
//! undecided for the caller to handle.

pub mod config;
pub mod defaults;
pub mod inline;
pub mod policy;
pub mod rules;
pub mod segment;
pub mod wrapper;

pub use config::{ConfigError, GuardConfig};
pub use inline::{InlineCode, InterpreterSpec, InterpreterTable};
pub use policy::{CommandGuard, Decision, Verdict};
pub use rules::{Category, Rule, RuleError, RuleSet, RuleSpec};
pub use segment::split_commands;
pub use wrapper::{WrapperSpec, WrapperTable};
