//! CLI argument parsing and subcommand handling.
//!
//! `csg` with no subcommand runs as a hook (JSON on stdin). The subcommands
//! exist for humans and for test harnesses: `check` and `check-path` print
//! the verdict and report it in the exit code (0 allow, 2 deny, 3 ask),
//! `scan-output` runs the secret scanner over a file or stdin, and `rules`
//! shows what configuration was actually loaded.

use crate::config::{self, GateConfig, SecretRules};
use crate::gate::Gate;
use crate::verdict::{Decision, Verdict};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Read;

pub const EXIT_DENY: u8 = 2;
pub const EXIT_ASK: u8 = 3;

/// Command safety gate for AI coding agents.
///
/// csg checks candidate shell commands against policy rules, guards
/// sensitive file paths, and scans captured output for leaked secrets.
/// Run with no subcommand to act as a JSON stdin/stdout hook.
#[derive(Parser, Debug)]
#[command(name = "csg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run (omit to run in hook mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check one command string; exit 0 (allow), 2 (deny), or 3 (ask)
    #[command(name = "check")]
    Check {
        /// The command to check, as a single argument
        command: String,
    },

    /// Check one file path against the sensitive-path rules
    #[command(name = "check-path")]
    CheckPath {
        /// The path to classify
        path: String,
    },

    /// Scan output text for secrets; reads stdin for `-` or when absent
    #[command(name = "scan-output")]
    ScanOutput {
        /// File to scan, or `-` for stdin
        file: Option<String>,
    },

    /// Show loaded rules and where configuration was found
    #[command(name = "rules")]
    Rules,
}

/// Run one subcommand; the result is the process exit code.
///
/// # Errors
///
/// Returns a message for I/O failures (unreadable scan file, stdin errors).
pub fn run_command(command: Command) -> Result<u8, String> {
    let gate = Gate::new(GateConfig::load());
    match command {
        Command::Check { command } => Ok(report_verdict(&gate.evaluate_command(&command))),
        Command::CheckPath { path } => Ok(report_verdict(&gate.evaluate_file_open(&path))),
        Command::ScanOutput { file } => {
            let output = read_scan_input(file.as_deref())?;
            match gate.scan_output(&output) {
                Some(advisory) => {
                    println!("{}", advisory.yellow());
                    Ok(EXIT_ASK)
                }
                None => {
                    println!("no secrets detected");
                    Ok(0)
                }
            }
        }
        Command::Rules => {
            print_rules(&gate);
            Ok(0)
        }
    }
}

fn read_scan_input(file: Option<&str>) -> Result<String, String> {
    match file {
        Some(path) if path != "-" => std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {path}: {e}")),
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("cannot read stdin: {e}"))?;
            Ok(buffer)
        }
    }
}

fn report_verdict(verdict: &Verdict) -> u8 {
    match verdict.decision {
        Decision::Allow => {
            println!("{}", "allow".green());
            0
        }
        Decision::Ask => {
            let reason = verdict.reason.as_deref().unwrap_or("confirmation required");
            println!("{}: {reason}", "ask".yellow().bold());
            EXIT_ASK
        }
        Decision::Deny => {
            let reason = verdict.reason.as_deref().unwrap_or("blocked");
            println!("{}: {reason}", "deny".red().bold());
            EXIT_DENY
        }
    }
}

fn print_rules(gate: &Gate) {
    println!("{}", "configuration sources".bold());
    for (label, path) in config::describe_sources() {
        match path {
            Some(path) => println!("  {label}: {}", path.display()),
            None => println!("  {label}: {}", "not found".bright_black()),
        }
    }

    let config = gate.config();
    println!();
    println!("{}", "policy rules".bold());
    if config.policy.is_empty() {
        println!("  (none loaded; all commands allowed by policy)");
    }
    for rule in config.policy.rules() {
        println!("  {}  {}", rule.pattern.cyan(), rule.message);
    }
    for invalid in &config.policy.invalid {
        println!(
            "  {} line {}: {} ({})",
            "skipped".red(),
            invalid.line_number,
            invalid.line,
            invalid.error
        );
    }

    println!();
    println!("{}", "path rules".bold());
    if config.paths.is_poisoned() {
        println!("  {}", "extension file unparsable; every query errors".red());
    } else {
        println!(
            "  built-in set active, {} extension rule(s) loaded",
            config.paths.extension_len()
        );
    }

    println!();
    println!("{}", "secret rules".bold());
    match &config.secrets {
        SecretRules::Ready(scanner) => println!("  {} rule(s) loaded", scanner.len()),
        SecretRules::Degraded(reason) => {
            println!("  {} ({reason})", "degraded".yellow());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn check_subcommand_parses() {
        let cli = Cli::parse_from(["csg", "check", "git push --force"]);
        assert!(matches!(
            cli.command,
            Some(Command::Check { command }) if command == "git push --force"
        ));
    }

    #[test]
    fn no_subcommand_means_hook_mode() {
        let cli = Cli::parse_from(["csg"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn scan_output_file_is_optional() {
        let cli = Cli::parse_from(["csg", "scan-output"]);
        assert!(matches!(
            cli.command,
            Some(Command::ScanOutput { file: None })
        ));
    }
}
