//! Inline interpreter code extraction
//!
//! `bash -c '...'`, `python3 -c "..."`, `node -e '...'` carry a whole program
//! in one argument. The program is pulled out so the deny rules can see it
//! as a command line of its own.

use crate::rules::RuleError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// An interpreter and the flag that introduces literal code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterpreterSpec {
    pub name: String,
    pub code_flag: String,
}

impl InterpreterSpec {
    pub fn new(name: &str, code_flag: &str) -> Self {
        Self {
            name: name.to_string(),
            code_flag: code_flag.to_string(),
        }
    }
}

/// Code recovered from an interpreter invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineCode<'a> {
    pub interpreter: &'a str,
    pub code: &'a str,
}

/// Interpreters in scan order, each with its compiled invocation pattern
#[derive(Debug, Clone, Default)]
pub struct InterpreterTable {
    entries: Vec<(InterpreterSpec, Regex)>,
}

impl InterpreterTable {
    /// Compile the invocation pattern for every interpreter.
    ///
    /// The pattern is `name[version] [-flags...] code_flag <ws>`, so
    /// `python3.12 -u -c "..."` is found through the `python` entry.
    pub fn new(specs: Vec<InterpreterSpec>) -> Result<Self, RuleError> {
        let mut entries = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.name.trim().is_empty() || spec.code_flag.trim().is_empty() {
                return Err(RuleError::InvalidInterpreter {
                    name: spec.name,
                    reason: "name and code flag must not be empty".to_string(),
                });
            }
            let pattern = format!(
                r"\b{}[\d.]*\s+(?:-\S+\s+)*{}\s+",
                regex::escape(&spec.name),
                regex::escape(&spec.code_flag)
            );
            let regex = Regex::new(&pattern).map_err(|e| RuleError::InvalidInterpreter {
                name: spec.name.clone(),
                reason: e.to_string(),
            })?;
            entries.push((spec, regex));
        }
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterpreterSpec> {
        self.entries.iter().map(|(spec, _)| spec)
    }

    /// Find the first interpreter invocation carrying inline code.
    ///
    /// Takes the whole command line: the code argument may itself contain
    /// `;` or `|` that the segmenter would otherwise cut through.
    pub fn extract<'a>(&'a self, line: &'a str) -> Option<InlineCode<'a>> {
        self.entries.iter().find_map(|(spec, regex)| {
            let found = regex.find(line)?;
            let code = code_argument(&line[found.end()..])?;
            Some(InlineCode {
                interpreter: spec.name.as_str(),
                code,
            })
        })
    }
}

/// Read the code argument at the start of `rest`.
///
/// A quoted argument runs to its closing quote (backslash escapes only count
/// inside double quotes); an unterminated one runs to the end of input. An
/// unquoted argument is the next whitespace-delimited token.
fn code_argument(rest: &str) -> Option<&str> {
    let quote = match rest.as_bytes().first() {
        Some(&q @ (b'\'' | b'"')) => q,
        Some(_) => return rest.split_whitespace().next(),
        None => return None,
    };

    let body = &rest[1..];
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => i += 2,
            b if b == quote => return Some(&body[..i]),
            _ => i += 1,
        }
    }
    Some(body)
}
