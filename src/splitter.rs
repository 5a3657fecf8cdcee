//! Primary lexical splitter: top-level sub-command segmentation.
//!
//! Walks a command string once using [`QuoteTracker`], emitting one
//! [`Segment`] per top-level sub-command, split on sequencing and piping
//! operators (`&&`, `||`, `|`, `;`, `&`, newline). Operators inside any
//! nesting level — including inside a command substitution — do **not**
//! fragment the top-level command list: a substitution's inner pipeline
//! executes as an atomic unit from the outer command's perspective, so its
//! text is preserved intact for the policy and path checks. The transparent
//! splitter ([`crate::transparent`]) exists precisely to also look inside
//! those levels.

use crate::tracker::QuoteTracker;

/// One top-level sub-command as sliced by a splitter pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The segment text, trimmed of surrounding whitespace.
    pub text: String,
    /// True if the scan that produced this segment hit unbalanced quoting
    /// or nesting. Callers decide per-context whether that means allow
    /// (command-policy checks) or deny (sensitive-path checks).
    pub parse_failed: bool,
}

/// Result of one splitting pass.
#[derive(Debug, Clone, Default)]
pub struct SplitResult {
    pub segments: Vec<Segment>,
    pub parse_failed: bool,
}

/// A splitting strategy. The two implementations are deliberately distinct:
/// the primary splitter leaves substitution and backtick regions opaque,
/// while the transparent splitter opens them up. Their differing opacity is
/// the whole point; do not unify them.
pub trait Segmenter {
    fn split(&self, command: &str) -> SplitResult;
}

/// The primary, opacity-preserving splitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueSplitter;

impl OpaqueSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Segmenter for OpaqueSplitter {
    fn split(&self, command: &str) -> SplitResult {
        let bytes = command.as_bytes();
        let len = bytes.len();
        let mut tracker = QuoteTracker::new();
        let mut raw_segments: Vec<(usize, usize)> = Vec::new();
        let mut seg_start = 0;
        let mut i = 0;

        while i < len {
            if tracker.at_top_level() {
                if let Some(op_len) = operator_len(bytes, i) {
                    raw_segments.push((seg_start, i));
                    i += op_len;
                    seg_start = i;
                    continue;
                }
            }
            i = tracker.advance(bytes, i);
        }
        raw_segments.push((seg_start, len));

        let parse_failed = tracker.parse_failed();
        let segments = raw_segments
            .into_iter()
            .filter_map(|(start, end)| {
                let text = command[start..end.min(len)].trim();
                if text.is_empty() {
                    None
                } else {
                    Some(Segment {
                        text: text.to_string(),
                        parse_failed,
                    })
                }
            })
            .collect();

        SplitResult {
            segments,
            parse_failed,
        }
    }
}

/// If `bytes[i..]` starts with a top-level sequencing/piping operator,
/// return its length in bytes.
#[inline]
fn operator_len(bytes: &[u8], i: usize) -> Option<usize> {
    let b = bytes[i];
    let next = bytes.get(i + 1).copied();
    match b {
        b'&' => match next {
            Some(b'&') => Some(2),
            // `&>`/`&>>` is a redirection, not a separator.
            Some(b'>') => None,
            _ => Some(1),
        },
        b'|' => match next {
            Some(b'|' | b'&') => Some(2),
            _ => Some(1),
        },
        b';' => match next {
            Some(b';') => Some(2),
            _ => Some(1),
        },
        b'\n' => Some(1),
        _ => None,
    }
}
