//! Hook wire protocol: one JSON request on stdin, at most one JSON object on
//! stdout.
//!
//! An empty stdout means Allow. Pre-execution checks answer with
//! `{"decision":"ask"|"deny","reason":…}`; post-execution output scans answer
//! with `{"advisoryText":…}`. A deny additionally prints a colored box to
//! stderr for the human watching the session, and appends a line to the
//! decision log when `CSG_LOG_FILE` is set.

use crate::verdict::{Decision, Verdict};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, IsTerminal, Read, Write};

/// Environment variable naming the append-only decision log file.
pub const LOG_FILE_ENV: &str = "CSG_LOG_FILE";

/// Incoming hook request.
#[derive(Debug, Deserialize)]
pub struct HookInput {
    pub hook_event_name: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<ToolInput>,
    pub tool_response: Option<ToolResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ToolInput {
    pub command: Option<serde_json::Value>,
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToolResponse {
    pub output: Option<String>,
    /// Some callers put captured output under `stdout` instead.
    pub stdout: Option<String>,
}

/// What the caller is actually asking us to check.
#[derive(Debug, PartialEq, Eq)]
pub enum HookRequest {
    Command(String),
    FileOpen(String),
    OutputScan(String),
    /// Nothing checkable in the payload; the answer is silence.
    Unsupported,
}

/// Failure to obtain a request from stdin.
#[derive(Debug)]
pub enum HookReadError {
    Io(io::Error),
    InputTooLarge(usize),
    Json(serde_json::Error),
}

impl fmt::Display for HookReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "reading stdin: {e}"),
            Self::InputTooLarge(n) => write!(f, "hook payload too large ({n} bytes)"),
            Self::Json(e) => write!(f, "parsing hook JSON: {e}"),
        }
    }
}

/// Read one JSON request from stdin, bounded by `max_bytes`.
///
/// # Errors
///
/// [`HookReadError::Io`] when stdin cannot be read, [`HookReadError::Json`]
/// when the payload is not hook JSON, [`HookReadError::InputTooLarge`] when
/// it exceeds `max_bytes`.
pub fn read_hook_input(max_bytes: usize) -> Result<HookInput, HookReadError> {
    let mut input = String::with_capacity(256);
    {
        let stdin = io::stdin();
        let mut handle = stdin.lock().take(max_bytes as u64 + 1);
        handle
            .read_to_string(&mut input)
            .map_err(HookReadError::Io)?;
    }
    if input.len() > max_bytes {
        return Err(HookReadError::InputTooLarge(input.len()));
    }
    serde_json::from_str(&input).map_err(HookReadError::Json)
}

/// Classify a parsed payload into the check it requests.
#[must_use]
pub fn classify_request(input: &HookInput) -> HookRequest {
    if input.hook_event_name.as_deref() == Some("PostToolUse") {
        let output = input
            .tool_response
            .as_ref()
            .and_then(|r| r.output.as_deref().or(r.stdout.as_deref()))
            .unwrap_or_default();
        return HookRequest::OutputScan(output.to_string());
    }

    let Some(tool_input) = input.tool_input.as_ref() else {
        return HookRequest::Unsupported;
    };

    if input.tool_name.as_deref() == Some("Bash") {
        if let Some(serde_json::Value::String(command)) = tool_input.command.as_ref() {
            if !command.is_empty() {
                return HookRequest::Command(command.clone());
            }
        }
        return HookRequest::Unsupported;
    }

    // Read/Open style tools, or a bare file_path from an unnamed caller.
    if let Some(path) = tool_input.file_path.as_deref() {
        if !path.is_empty()
            && matches!(input.tool_name.as_deref(), None | Some("Read" | "Open"))
        {
            return HookRequest::FileOpen(path.to_string());
        }
    }
    HookRequest::Unsupported
}

#[derive(Debug, Serialize)]
struct DecisionOutput<'a> {
    decision: Decision,
    reason: &'a str,
}

#[derive(Debug, Serialize)]
struct AdvisoryOutput<'a> {
    #[serde(rename = "advisoryText")]
    advisory_text: &'a str,
}

/// Emit a verdict on stdout. Allow writes nothing. Deny also prints the
/// stderr box and appends to the decision log.
pub fn emit_verdict(subject: &str, verdict: &Verdict) {
    let Some(reason) = verdict.reason.as_deref() else {
        return;
    };
    if verdict.decision == Decision::Allow {
        return;
    }

    if verdict.decision == Decision::Deny {
        print_deny_box(subject, reason);
        log_decision(subject, verdict);
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = serde_json::to_writer(
        &mut handle,
        &DecisionOutput {
            decision: verdict.decision,
            reason,
        },
    );
    let _ = writeln!(handle);
}

/// Emit a post-execution advisory on stdout.
pub fn emit_advisory(text: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = serde_json::to_writer(&mut handle, &AdvisoryOutput { advisory_text: text });
    let _ = writeln!(handle);
}

/// Disable colored output when stderr is not a terminal.
pub fn configure_colors() {
    if !io::stderr().is_terminal() {
        colored::control::set_override(false);
    }
}

const BOX_WIDTH: usize = 64;

fn box_line(handle: &mut io::StderrLock<'_>, content: &str) {
    let pad = BOX_WIDTH.saturating_sub(content.chars().count());
    let _ = writeln!(handle, "{}{content}{}{}", "│".red(), " ".repeat(pad), "│".red());
}

/// Human-visible deny banner on stderr.
pub fn print_deny_box(subject: &str, reason: &str) {
    let stderr = io::stderr();
    let mut handle = stderr.lock();

    let _ = writeln!(handle);
    let _ = writeln!(handle, "{}{}{}", "╭".red(), "─".repeat(BOX_WIDTH).red(), "╮".red());
    box_line(&mut handle, &format!("  {}", "BLOCKED by csg".red().bold()));
    let _ = writeln!(handle, "{}{}{}", "├".red(), "─".repeat(BOX_WIDTH).red(), "┤".red());

    for line in wrap_text(reason, BOX_WIDTH - 12) {
        box_line(&mut handle, &format!("  Reason:  {line}"));
    }
    box_line(&mut handle, &format!("  Subject: {}", truncate(subject, BOX_WIDTH - 12)));
    box_line(
        &mut handle,
        "  If this is genuinely needed, ask the user to run it manually.",
    );
    let _ = writeln!(handle, "{}{}{}", "╰".red(), "─".repeat(BOX_WIDTH).red(), "╯".red());
    let _ = writeln!(handle);
}

/// Append one decision to the log file named by `CSG_LOG_FILE`, if set.
/// Logging failures are swallowed: the decision already went to stdout.
pub fn log_decision(subject: &str, verdict: &Verdict) {
    let Ok(log_file) = std::env::var(LOG_FILE_ENV) else {
        return;
    };
    if log_file.trim().is_empty() {
        return;
    }
    let _ = append_log_line(&log_file, subject, verdict);
}

fn append_log_line(log_file: &str, subject: &str, verdict: &Verdict) -> io::Result<()> {
    use std::fs::OpenOptions;

    let path = if let Some(rest) = log_file.strip_prefix("~/") {
        dirs::home_dir().map_or_else(|| std::path::PathBuf::from(log_file), |h| h.join(rest))
    } else {
        std::path::PathBuf::from(log_file)
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let decision = match verdict.decision {
        Decision::Allow => "allow",
        Decision::Ask => "ask",
        Decision::Deny => "deny",
    };
    let rule = verdict.rule.as_deref().unwrap_or("-");
    let reason = verdict.reason.as_deref().unwrap_or("-");
    writeln!(file, "[{timestamp}] {decision} [{rule}] {reason}")?;
    writeln!(file, "  subject: {subject}")?;
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> HookInput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn bash_command_request() {
        let input = parse(r#"{"tool_name": "Bash", "tool_input": {"command": "git status"}}"#);
        assert_eq!(
            classify_request(&input),
            HookRequest::Command("git status".to_string())
        );
    }

    #[test]
    fn read_tool_is_a_file_open_request() {
        let input = parse(r#"{"tool_name": "Read", "tool_input": {"file_path": "/etc/shadow"}}"#);
        assert_eq!(
            classify_request(&input),
            HookRequest::FileOpen("/etc/shadow".to_string())
        );
    }

    #[test]
    fn bare_file_path_is_a_file_open_request() {
        let input = parse(r#"{"tool_input": {"file_path": "notes.txt"}}"#);
        assert_eq!(
            classify_request(&input),
            HookRequest::FileOpen("notes.txt".to_string())
        );
    }

    #[test]
    fn post_tool_use_is_an_output_scan() {
        let input = parse(
            r#"{"hook_event_name": "PostToolUse", "tool_name": "Bash",
                "tool_response": {"output": "token ghp_x"}}"#,
        );
        assert_eq!(
            classify_request(&input),
            HookRequest::OutputScan("token ghp_x".to_string())
        );
    }

    #[test]
    fn stdout_field_is_accepted_for_output_scans() {
        let input = parse(
            r#"{"hook_event_name": "PostToolUse", "tool_response": {"stdout": "abc"}}"#,
        );
        assert_eq!(
            classify_request(&input),
            HookRequest::OutputScan("abc".to_string())
        );
    }

    #[test]
    fn unknown_tool_is_unsupported() {
        let input = parse(r#"{"tool_name": "Write", "tool_input": {"file_path": "x"}}"#);
        assert_eq!(classify_request(&input), HookRequest::Unsupported);
    }

    #[test]
    fn empty_command_is_unsupported() {
        let input = parse(r#"{"tool_name": "Bash", "tool_input": {"command": ""}}"#);
        assert_eq!(classify_request(&input), HookRequest::Unsupported);
    }

    #[test]
    fn non_string_command_is_unsupported() {
        let input = parse(r#"{"tool_name": "Bash", "tool_input": {"command": 42}}"#);
        assert_eq!(classify_request(&input), HookRequest::Unsupported);
    }

    #[test]
    fn decision_output_shape() {
        let json = serde_json::to_string(&DecisionOutput {
            decision: Decision::Deny,
            reason: "why",
        })
        .unwrap();
        assert_eq!(json, r#"{"decision":"deny","reason":"why"}"#);
    }

    #[test]
    fn advisory_output_shape() {
        let json = serde_json::to_string(&AdvisoryOutput { advisory_text: "careful" }).unwrap();
        assert_eq!(json, r#"{"advisoryText":"careful"}"#);
    }

    #[test]
    fn wrap_text_respects_width() {
        let lines = wrap_text("one two three four five six seven", 10);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
        assert_eq!(lines.join(" "), "one two three four five six seven");
    }

    #[test]
    fn truncate_is_char_safe() {
        let t = truncate("rm -rf /home/用户/文件夹/子文件夹/更多内容", 12);
        assert!(t.ends_with("..."));
        assert!(t.chars().count() <= 12);
    }
}
