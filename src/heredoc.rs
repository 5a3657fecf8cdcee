//! Heredoc recognition and body suppression.
//!
//! Inline-document bodies are literal data: a body line that textually
//! contains a denied pattern must not be evaluated as a command, while a
//! command *following* the heredoc on the same input still must be. This
//! module strips body lines from the raw command text before either splitter
//! runs, so neither pass ever classifies heredoc content.
//!
//! Two false-positive / false-negative guards apply before a candidate
//! opener activates body suppression:
//!
//! 1. Quoted-literal suppression: an opener inside a quoted string (e.g.
//!    `git commit -m "see <<EOF"`) is ignored. We require a balanced quote
//!    count before the opener on its line, or — when double quotes are
//!    unbalanced — a `$(` substitution marker after the last quote, since a
//!    substitution re-opens live syntax inside double quotes.
//! 2. Fake-opener rejection: the closing identifier must appear as a
//!    standalone line somewhere later in the raw input. Otherwise a crafted
//!    one-liner like `cat <<EOF && rm -rf /` could fake heredoc mode and
//!    suppress the remaining checks.

use memchr::memchr;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Opener token: whitespace-or-start, `<<`, optional `-`, optional quote,
/// identifier. `<<<` here-strings do not match (the third `<` fails every
/// marker alternative and has no whitespace before it).
static OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|\s)<<(-)?\s*(?:"([A-Za-z_][A-Za-z0-9_]*)"|'([A-Za-z_][A-Za-z0-9_]*)'|([A-Za-z_][A-Za-z0-9_]*))"#,
    )
    .expect("heredoc opener pattern should compile")
});

/// A recognized heredoc opener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeredocOpener {
    /// The closing identifier.
    pub marker: String,
    /// True for the `<<-` variant: leading tabs are stripped from body and
    /// closer lines.
    pub strip_tabs: bool,
}

/// Find the first plausible heredoc opener on a single line.
///
/// Returns `None` for lines whose candidate opener sits inside a quoted
/// literal.
#[must_use]
pub fn find_opener(line: &str) -> Option<HeredocOpener> {
    if memchr(b'<', line.as_bytes()).is_none() {
        return None;
    }
    let caps = OPENER.captures(line)?;
    let whole = caps.get(0)?;
    if !opener_outside_quotes(&line[..whole.start()]) {
        return None;
    }
    let marker = caps
        .get(2)
        .or_else(|| caps.get(3))
        .or_else(|| caps.get(4))?
        .as_str()
        .to_string();
    Some(HeredocOpener {
        marker,
        strip_tabs: caps.get(1).is_some(),
    })
}

/// Quote-balance check for the text before a candidate opener.
fn opener_outside_quotes(prefix: &str) -> bool {
    let singles = prefix.matches('\'').count();
    let doubles = prefix.matches('"').count();
    if singles % 2 != 0 {
        return false;
    }
    if doubles % 2 == 0 {
        return true;
    }
    // Unbalanced double quotes: only live if a substitution re-opened
    // command syntax after the last quote.
    prefix
        .rfind('"')
        .is_some_and(|q| prefix[q..].contains("$("))
}

/// Check that `marker` appears as a standalone closing line after `from_line`.
fn has_closing_line(lines: &[&str], from_line: usize, opener: &HeredocOpener) -> bool {
    lines.iter().skip(from_line + 1).any(|line| {
        let candidate = if opener.strip_tabs {
            line.trim_start_matches('\t')
        } else {
            line
        };
        candidate == opener.marker
    })
}

/// Remove heredoc body lines (and their closing marker lines) from `raw`,
/// keeping opener lines and everything after the closer. Returns the input
/// unchanged when no active heredoc is found.
#[must_use]
pub fn strip_heredoc_bodies(raw: &str) -> Cow<'_, str> {
    if memchr(b'\n', raw.as_bytes()).is_none() {
        return Cow::Borrowed(raw);
    }
    let lines: Vec<&str> = raw.split('\n').collect();
    let mut active: Option<HeredocOpener> = None;
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut stripped_any = false;

    for (idx, line) in lines.iter().enumerate() {
        if let Some(opener) = &active {
            stripped_any = true;
            let candidate = if opener.strip_tabs {
                line.trim_start_matches('\t')
            } else {
                line
            };
            if candidate == opener.marker {
                active = None;
            }
            continue;
        }

        kept.push(line);
        if let Some(opener) = find_opener(line) {
            if has_closing_line(&lines, idx, &opener) {
                active = Some(opener);
            }
        }
    }

    if stripped_any {
        Cow::Owned(kept.join("\n"))
    } else {
        Cow::Borrowed(raw)
    }
}
