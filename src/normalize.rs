//! Segment normalization: exposing the real invoked program.
//!
//! Per-segment stripping of everything that hides the actual command from
//! the rule engines: leading variable assignments, absolute path prefixes,
//! wrapper programs (privilege/environment/timing wrappers) and their option
//! arguments, compound-statement keywords, and case-pattern tokens. Without
//! this, trivial prefixing (`sudo`, `env -i`, `/usr/bin/`) would defeat
//! every downstream rule.
//!
//! # Design Principles
//!
//! - **Conservative**: only strip when the syntax is unambiguous; a wrapper
//!   with no following command is left alone.
//! - **Fixpoint**: stripping repeats until nothing changes (bounded), so
//!   `sudo env -i /usr/bin/git ...` fully reduces.
//! - **Best-effort flag arguments**: after a wrapper's flags, one following
//!   token is consumed as a flag argument iff it is not a recognized program
//!   name. This heuristic is inherently incomplete for arbitrary
//!   wrapper/program combinations and is deliberately not tightened further.

use std::ops::Range;

/// Wrapper programs whose prefix is stripped to reach the real command.
const WRAPPERS: &[&str] = &[
    "sudo", "doas", "env", "command", "nohup", "nice", "stdbuf", "setsid", "timeout", "time",
    "strace",
];

/// Package managers whose leading flags are walked past to reach the real
/// subcommand (`npm --prefix x install` still means `npm install`).
const PACKAGE_MANAGERS: &[&str] = &[
    "npm", "pnpm", "yarn", "pip", "pip3", "cargo", "apt", "apt-get", "brew",
];

/// Package-manager flags known to take a separate value token.
const PM_VALUE_FLAGS: &[&str] = &[
    "--prefix", "--registry", "--cwd", "--dir", "-C", "--config", "--python", "-p", "--manifest-path",
];

/// Compound-statement keywords stripped from the front of a segment.
const COMPOUND_KEYWORDS: &[&str] = &[
    "if", "then", "elif", "else", "fi", "while", "until", "do", "done", "{", "}", "!", "exec",
];

/// Programs recognized as "the real command" by the wrapper flag-argument
/// heuristic. Deliberately broad; a miss only means one extra token is
/// treated as a flag argument.
const KNOWN_PROGRAMS: &[&str] = &[
    "apt", "apt-get", "awk", "base64", "bash", "brew", "cargo", "cat", "chmod", "chown", "cp",
    "curl", "cut", "dd", "docker", "echo", "find", "gh", "git", "go", "grep", "head", "kubectl",
    "less", "ln", "ls", "make", "mkdir", "more", "mv", "nano", "node", "npm", "perl", "pip",
    "pip3", "pnpm", "python", "python3", "rg", "rm", "rsync", "ruby", "rustc", "scp", "sed",
    "sh", "sort", "ssh", "stat", "systemctl", "tail", "tar", "tee", "touch", "uniq", "vi", "vim",
    "wc", "wget", "xargs", "yarn", "zsh",
];

/// One whitespace-delimited word with quoting metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Word content with quote characters removed.
    pub text: String,
    /// True when every content character sat inside single quotes: pure
    /// literal data, never a live command or path.
    pub fully_single_quoted: bool,
    /// True when a `$` or backtick appeared outside single quotes: the word
    /// could resolve to anything at execution time.
    pub has_unresolved: bool,
    /// Byte range of the raw word in the input.
    pub range: Range<usize>,
}

/// Split a segment into words, honoring quotes, escapes, and substitution
/// nesting (whitespace inside `$( )` does not split).
#[must_use]
pub fn split_words(text: &str) -> Vec<Word> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let len = text.len();
    let mut words = Vec::new();

    let mut in_single = false;
    let mut in_double = false;
    // One entry per open `$(`, saving the double-quote state to restore at
    // the matching `)`; the interior is its own quoting context.
    let mut double_stack: Vec<bool> = Vec::new();

    let mut current = String::new();
    let mut start: Option<usize> = None;
    let mut outside_single_chars = 0usize;
    let mut unresolved = false;

    let mut flush = |current: &mut String,
                     start: &mut Option<usize>,
                     end: usize,
                     outside: &mut usize,
                     unresolved: &mut bool,
                     words: &mut Vec<Word>| {
        if let Some(s) = start.take() {
            words.push(Word {
                text: std::mem::take(current),
                fully_single_quoted: *outside == 0,
                has_unresolved: *unresolved,
                range: s..end,
            });
        }
        *outside = 0;
        *unresolved = false;
    };

    let mut idx = 0;
    while idx < chars.len() {
        let (pos, c) = chars[idx];

        if in_single {
            if c == '\'' {
                in_single = false;
            } else {
                current.push(c);
            }
            idx += 1;
            continue;
        }

        match c {
            '\'' => {
                if in_double {
                    current.push('\'');
                    outside_single_chars += 1;
                } else {
                    in_single = true;
                    if start.is_none() {
                        start = Some(pos);
                    }
                }
                idx += 1;
            }
            '"' => {
                in_double = !in_double;
                if start.is_none() {
                    start = Some(pos);
                }
                idx += 1;
            }
            '\\' if idx + 1 < chars.len() => {
                if start.is_none() {
                    start = Some(pos);
                }
                current.push(chars[idx + 1].1);
                outside_single_chars += 1;
                idx += 2;
            }
            '$' | '`' => {
                if start.is_none() {
                    start = Some(pos);
                }
                unresolved = true;
                if c == '$' && chars.get(idx + 1).is_some_and(|&(_, n)| n == '(') {
                    double_stack.push(in_double);
                    in_double = false;
                    current.push_str("$(");
                    outside_single_chars += 2;
                    idx += 2;
                } else {
                    current.push(c);
                    outside_single_chars += 1;
                    idx += 1;
                }
            }
            ')' if !in_double && !double_stack.is_empty() => {
                if let Some(saved) = double_stack.pop() {
                    in_double = saved;
                }
                current.push(')');
                outside_single_chars += 1;
                idx += 1;
            }
            ' ' | '\t' if !in_double && double_stack.is_empty() => {
                flush(
                    &mut current,
                    &mut start,
                    pos,
                    &mut outside_single_chars,
                    &mut unresolved,
                    &mut words,
                );
                idx += 1;
            }
            _ => {
                if start.is_none() {
                    start = Some(pos);
                }
                current.push(c);
                outside_single_chars += 1;
                idx += 1;
            }
        }
    }
    flush(
        &mut current,
        &mut start,
        len,
        &mut outside_single_chars,
        &mut unresolved,
        &mut words,
    );

    words
}

/// Last path component of a token.
#[must_use]
pub fn basename(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

fn is_known_program(token: &str) -> bool {
    // A path-shaped token is taken at face value as a program.
    token.contains('/') || KNOWN_PROGRAMS.binary_search(&token).is_ok()
}

/// Leading `NAME=value` assignment?
fn is_assignment(raw: &str) -> bool {
    let Some(eq) = raw.find('=') else {
        return false;
    };
    if eq == 0 {
        return false;
    }
    let name = &raw[..eq];
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Leading case-pattern token of the form `pattern)`?
fn is_case_pattern_token(raw: &str) -> bool {
    let Some(body) = raw.strip_suffix(')') else {
        return false;
    };
    !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '*' | '?' | '[' | ']' | '|' | '-' | '.'))
}

/// If the whole segment is exactly one substitution/group/backtick wrapper,
/// return its interior.
fn unwrap_whole_wrapper(s: &str) -> Option<&str> {
    let s = s.trim();
    for (open, close) in [("$(", ")"), ("(", ")")] {
        if let Some(inner) = s.strip_prefix(open).and_then(|r| r.strip_suffix(close)) {
            // Only unwrap when the closer at the end matches the opener at
            // the start (no `(a) && (b)` false unwrap).
            if balanced_interior(inner) {
                return Some(inner);
            }
        }
    }
    if s.len() >= 2 && s.starts_with('`') && s.ends_with('`') {
        let inner = &s[1..s.len() - 1];
        if !inner.contains('`') {
            return Some(inner);
        }
    }
    None
}

/// True if `inner` never closes more parens than it opens (so the trailing
/// `)` we stripped really matched the leading opener).
fn balanced_interior(inner: &str) -> bool {
    let mut depth: i32 = 0;
    let mut in_single = false;
    let mut in_double = false;
    let bytes = inner.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if !in_single => i += 1,
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'(' if !in_single && !in_double => depth += 1,
            b')' if !in_single && !in_double => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
        i += 1;
    }
    true
}

/// Strip one wrapper program together with its flags and, heuristically, one
/// flag argument. Returns the byte offset where the real command begins, or
/// `None` when stripping would be ambiguous or leave nothing.
fn strip_wrapper(words: &[Word]) -> Option<usize> {
    let first = basename(&words[0].text);
    if !WRAPPERS.contains(&first) {
        return None;
    }

    let mut idx = 1;
    let mut saw_flags = false;
    while idx < words.len() {
        let tok = &words[idx].text;
        if tok == "--" {
            idx += 1;
            break;
        }
        if tok.starts_with('-') && tok.len() > 1 {
            // `command -v` / `-V` is query mode, not a wrapper.
            if first == "command" && (tok == "-v" || tok == "-V") {
                return None;
            }
            saw_flags = true;
            idx += 1;
            continue;
        }
        // `env FOO=bar cmd`: assignments belong to the wrapper.
        if first == "env" && is_assignment(tok) {
            idx += 1;
            continue;
        }
        break;
    }

    let candidate = words.get(idx)?;
    // A non-program token after the wrapper's flags is probably a flag
    // argument (user name, duration, ...). `timeout` takes its duration
    // positionally, so it consumes one even without flags.
    let consume_arg =
        !is_known_program(basename(&candidate.text)) && (saw_flags || first == "timeout");
    if consume_arg {
        if words.get(idx + 1).is_none() {
            // `sudo -u root` with nothing left to run: don't strip.
            return None;
        }
        idx += 1;
    }

    words.get(idx).map(|w| w.range.start)
}

/// Walk a package manager past its leading flags to the real subcommand.
/// Returns the rebuilt segment when anything was skipped.
fn strip_package_manager_flags(s: &str, words: &[Word]) -> Option<String> {
    let first = basename(&words[0].text);
    if !PACKAGE_MANAGERS.contains(&first) {
        return None;
    }

    let mut idx = 1;
    while idx < words.len() {
        let tok = &words[idx].text;
        if !tok.starts_with('-') || tok == "--" {
            break;
        }
        if PM_VALUE_FLAGS.contains(&tok.as_str()) && !tok.contains('=') {
            idx += 2;
        } else {
            idx += 1;
        }
    }

    if idx <= 1 {
        return None;
    }
    let sub = words.get(idx)?;
    Some(format!("{first} {}", &s[sub.range.start..]))
}

/// Normalize one segment to the form the policy rule engine evaluates.
///
/// Iterates until no further change: whitespace trim, whole-segment
/// substitution unwrap, absolute-path prefix strip, leading assignment
/// strip, wrapper strip, compound-keyword strip, case-pattern-token strip,
/// package-manager flag walk.
#[must_use]
pub fn normalize_segment(segment: &str) -> String {
    let mut current = segment.trim().to_string();

    for _ in 0..32 {
        let before = current.clone();

        if let Some(inner) = unwrap_whole_wrapper(&current) {
            current = inner.trim().to_string();
            continue;
        }

        let words = split_words(&current);
        let Some(first) = words.first() else {
            return String::new();
        };
        let raw_first = &current[first.range.clone()];

        // Quote removal on the command word: the shell strips quotes before
        // program lookup, so `'cat' /etc/shadow` still runs `cat`. A quoted
        // word with interior whitespace can only name a literal (almost
        // certainly nonexistent) program and stays data.
        if raw_first != first.text
            && !first.text.is_empty()
            && !first.has_unresolved
            && !first.text.contains(char::is_whitespace)
        {
            let rest = &current[first.range.end..];
            current = format!("{}{rest}", first.text);
            continue;
        }

        if !first.fully_single_quoted && COMPOUND_KEYWORDS.contains(&first.text.as_str()) {
            current = current[first.range.end..].trim().to_string();
            continue;
        }

        if !first.fully_single_quoted && is_assignment(raw_first) {
            current = current[first.range.end..].trim().to_string();
            continue;
        }

        // `case WORD in pattern) cmd ...`: drop the case header so the
        // branch body surfaces for the checks.
        if !first.fully_single_quoted
            && first.text == "case"
            && words.len() >= 3
            && words[2].text == "in"
        {
            current = current[words[2].range.end..].trim().to_string();
            continue;
        }

        if is_case_pattern_token(raw_first) {
            current = current[first.range.end..].trim().to_string();
            continue;
        }

        if first.text.starts_with('/') {
            let base = basename(&first.text).to_string();
            if !base.is_empty() && base != first.text {
                let rest = &current[first.range.end..];
                current = if rest.trim().is_empty() {
                    base
                } else {
                    format!("{base}{rest}")
                };
                continue;
            }
        }

        if let Some(offset) = strip_wrapper(&words) {
            current = current[offset..].trim().to_string();
            continue;
        }

        if let Some(rebuilt) = strip_package_manager_flags(&current, &words) {
            current = rebuilt;
            continue;
        }

        if current == before {
            break;
        }
    }

    current
}
