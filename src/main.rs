//! Binary entry point: subcommand dispatch, then hook mode.

use clap::Parser;
use command_safety_gate::cli::{self, Cli};
use command_safety_gate::config::GateConfig;
use command_safety_gate::gate::Gate;
use command_safety_gate::hook::{
    classify_request, configure_colors, emit_advisory, emit_verdict, read_hook_input,
    HookReadError, HookRequest,
};
use tracing_subscriber::EnvFilter;

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TIMESTAMP: Option<&str> = option_env!("VERGEN_BUILD_TIMESTAMP");
const RUSTC_SEMVER: Option<&str> = option_env!("VERGEN_RUSTC_SEMVER");

/// Hook payloads beyond this size are allowed without evaluation (fail-open,
/// with a stderr warning).
const MAX_HOOK_INPUT_BYTES: usize = 1024 * 1024;

/// Commands beyond this size are likewise allowed without evaluation.
const MAX_COMMAND_BYTES: usize = 256 * 1024;

/// Escape hatch: set to `1` to allow everything for one invocation.
const BYPASS_ENV: &str = "CSG_BYPASS";

fn print_version() {
    eprintln!("csg v{PKG_VERSION}");
    if let Some(ts) = BUILD_TIMESTAMP {
        let date = ts.split('T').next().unwrap_or(ts);
        eprintln!("  built: {date}");
    }
    if let Some(rustc) = RUSTC_SEMVER {
        eprintln!("  rustc: {rustc}");
    }
}

fn init_tracing() {
    // CSG_LOG follows the usual env-filter syntax; silence by default so the
    // hook protocol on stdout/stderr stays clean.
    let filter = EnvFilter::try_from_env("CSG_LOG").unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn is_bypassed() -> bool {
    std::env::var(BYPASS_ENV)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn main() {
    configure_colors();
    init_tracing();

    if std::env::args()
        .nth(1)
        .is_some_and(|a| a == "--version" || a == "-V")
    {
        print_version();
        return;
    }

    // Unknown flags must error out rather than fall into hook mode and block
    // on stdin.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    if let Some(command) = cli.command {
        match cli::run_command(command) {
            Ok(code) => std::process::exit(i32::from(code)),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }

    run_hook_mode();
}

fn run_hook_mode() {
    if is_bypassed() {
        eprintln!("[csg] bypass requested via {BYPASS_ENV}; allowing without checks");
        return;
    }

    let input = match read_hook_input(MAX_HOOK_INPUT_BYTES) {
        Ok(input) => input,
        Err(HookReadError::InputTooLarge(len)) => {
            eprintln!(
                "[csg] Warning: hook payload ({len} bytes) exceeds limit ({MAX_HOOK_INPUT_BYTES} bytes); allowing (fail-open)"
            );
            return;
        }
        // Fail open on IO or JSON errors: an unusable payload must never
        // block the caller.
        Err(_) => return,
    };

    let gate = Gate::new(GateConfig::load());
    match classify_request(&input) {
        HookRequest::Command(command) => {
            if command.len() > MAX_COMMAND_BYTES {
                eprintln!(
                    "[csg] Warning: command ({} bytes) exceeds limit ({MAX_COMMAND_BYTES} bytes); allowing (fail-open)",
                    command.len()
                );
                return;
            }
            let verdict = gate.evaluate_command(&command);
            emit_verdict(&command, &verdict);
        }
        HookRequest::FileOpen(path) => {
            let verdict = gate.evaluate_file_open(&path);
            emit_verdict(&path, &verdict);
        }
        HookRequest::OutputScan(output) => {
            if let Some(advisory) = gate.scan_output(&output) {
                emit_advisory(&advisory);
            }
        }
        // Nothing checkable in the payload; silence means allow.
        HookRequest::Unsupported => {}
    }
}
