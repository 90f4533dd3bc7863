//! bashguard - pre-execution filter for agent shell commands
//!
//! Usage:
//!   bashguard [hook]          - Read a PreToolUse request on stdin, answer on stdout
//!   bashguard check <COMMAND> - Classify one command line
//!   bashguard rules           - List the loaded rules in evaluation order

mod hook;

use anyhow::{Context, Result};
use bashguard_core::{Category, CommandGuard, GuardConfig};
use clap::{Parser, Subcommand};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bashguard")]
#[command(author = "HeyBattle1")]
#[command(version)]
#[command(about = "Deny, allow or defer agent-issued shell commands", long_about = None)]
struct Cli {
    /// Rule configuration file (TOML)
    #[arg(long, global = true, env = "BASHGUARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a PreToolUse hook request read from stdin (default)
    Hook,

    /// Classify a command line
    Check {
        /// The command line, quoted as one argument
        command: String,

        /// Print the hook response instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// List loaded rules, wrappers and interpreters
    Rules,
}

fn main() -> Result<()> {
    // stdout carries the hook response; logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let guard = load_guard(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Hook) {
        Commands::Hook => {
            let mut raw = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut raw) {
                tracing::warn!(error = %e, "failed to read stdin");
                raw.clear();
            }
            let command = hook::command_from_envelope(&raw);
            let verdict = guard.classify(&command);
            tracing::info!(decision = %verdict.decision, reason = ?verdict.reason, "classified");
            if let Some(line) = hook::render_decision(&verdict) {
                println!("{line}");
            }
        }

        Commands::Check { command, json } => {
            let verdict = guard.classify(&command);
            tracing::info!(decision = %verdict.decision, reason = ?verdict.reason, "classified");
            if json {
                if let Some(line) = hook::render_decision(&verdict) {
                    println!("{line}");
                }
            } else {
                match &verdict.reason {
                    Some(reason) => println!("{}: {}", verdict.decision, reason),
                    None => println!("{}", verdict.decision),
                }
            }
        }

        Commands::Rules => print_rules(&guard),
    }

    Ok(())
}

/// Explicit path (flag or env) must exist; the per-user file is optional.
fn load_guard(explicit: Option<&Path>) -> Result<CommandGuard> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|path| path.exists()),
    };

    let config = match &path {
        Some(path) => GuardConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => GuardConfig::default(),
    };

    config.build().context("Invalid rule configuration")
}

/// `<config dir>/bashguard/config.toml`
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bashguard").join("config.toml"))
}

fn print_rules(guard: &CommandGuard) {
    for category in Category::ALL {
        let rules = guard.rules().rules(category);
        println!("{category} ({}):", rules.len());
        for rule in rules {
            println!("  {:<28} {}", rule.id(), rule.pattern());
        }
        println!();
    }

    println!("wrappers:");
    for wrapper in guard.wrappers().iter() {
        let mut detail = Vec::new();
        if !wrapper.value_flags.is_empty() {
            detail.push(format!("value flags {}", wrapper.value_flags.join(" ")));
        }
        if wrapper.positional_args > 0 {
            detail.push(format!("{} positional", wrapper.positional_args));
        }
        if wrapper.sets_env {
            detail.push("NAME=value".to_string());
        }
        println!("  {:<28} {}", wrapper.name, detail.join(", "));
    }
    println!();

    println!("interpreters:");
    for interpreter in guard.interpreters().iter() {
        println!("  {:<28} {}", interpreter.name, interpreter.code_flag);
    }
}
