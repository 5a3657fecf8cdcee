//! Secondary defense-in-depth splitter.
//!
//! An independent re-implementation of segmentation that does the opposite of
//! [`crate::splitter::OpaqueSplitter`] at nesting boundaries: opening a
//! command substitution, backtick region, or grouping parenthesis *ends* the
//! current fragment, and closing one ends the fragment again — so the content
//! inside those regions surfaces as its own top-level-looking fragment.
//! `X=$(cat ~/.ssh/id_rsa)` yields a `cat ~/.ssh/id_rsa` fragment that the
//! path checks can see.
//!
//! Sequencing operators split at any depth here. The `case`..`esac` pattern
//! delimiter exception from the primary tracker is reproduced so a case
//! branch's `)` is not mistaken for a substitution closer, and a `#` comment
//! is recognized only when it begins a new word at the top level.
//!
//! Fragments are frequently quote-broken (cutting at `$(` slices through the
//! enclosing quote context); each fragment therefore carries its own
//! balanced-scan result rather than a whole-input verdict.

use crate::splitter::{Segment, Segmenter, SplitResult};
use crate::tracker::scan_balanced;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Substitution,
    Backtick,
    Group,
}

/// The transparent, boundary-opening splitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransparentSplitter;

impl TransparentSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Segmenter for TransparentSplitter {
    fn split(&self, command: &str) -> SplitResult {
        let bytes = command.as_bytes();
        let len = bytes.len();
        let mut regions: SmallVec<[Region; 8]> = SmallVec::new();
        let mut in_single = false;
        let mut in_double = false;
        let mut case_depth: u32 = 0;
        let mut fragments: Vec<(usize, usize)> = Vec::new();
        let mut frag_start = 0;
        let mut i = 0;

        while i < len {
            let b = bytes[i];

            if in_single {
                if b == b'\'' {
                    in_single = false;
                }
                i += 1;
                continue;
            }

            match b {
                b'\\' => {
                    i = (i + 2).min(len);
                }
                b'\'' if !in_double => {
                    in_single = true;
                    i += 1;
                }
                b'"' => {
                    in_double = !in_double;
                    i += 1;
                }
                b'$' if i + 1 < len && bytes[i + 1] == b'(' => {
                    fragments.push((frag_start, i));
                    regions.push(Region::Substitution);
                    // Fresh quoting context for the inner fragment.
                    in_double = false;
                    i += 2;
                    frag_start = i;
                }
                b'`' => {
                    fragments.push((frag_start, i));
                    match regions.last() {
                        Some(Region::Backtick) => {
                            regions.pop();
                        }
                        _ => regions.push(Region::Backtick),
                    }
                    in_double = false;
                    i += 1;
                    frag_start = i;
                }
                b'(' if !in_double => {
                    fragments.push((frag_start, i));
                    regions.push(Region::Group);
                    i += 1;
                    frag_start = i;
                }
                b')' if !in_double => {
                    // Inside a case block this is a pattern delimiter, not a
                    // region closer.
                    if case_depth > 0 {
                        i += 1;
                    } else {
                        fragments.push((frag_start, i));
                        if matches!(
                            regions.last(),
                            Some(Region::Substitution | Region::Group)
                        ) {
                            regions.pop();
                        }
                        in_double = false;
                        i += 1;
                        frag_start = i;
                    }
                }
                b'#' if !in_double
                    && regions.is_empty()
                    && (i == 0 || bytes[i - 1].is_ascii_whitespace()) =>
                {
                    fragments.push((frag_start, i));
                    while i < len && bytes[i] != b'\n' {
                        i += 1;
                    }
                    frag_start = i;
                }
                _ if !in_double => {
                    if let Some(op_len) = operator_len(bytes, i) {
                        fragments.push((frag_start, i));
                        i += op_len;
                        frag_start = i;
                    } else if b.is_ascii_alphabetic() {
                        let (end, delta) = scan_keyword(bytes, i);
                        case_depth = apply_case_delta(case_depth, delta);
                        i = end;
                    } else {
                        i += 1;
                    }
                }
                _ => {
                    i += 1;
                }
            }
        }
        fragments.push((frag_start, len));

        let segments: Vec<Segment> = fragments
            .into_iter()
            .filter_map(|(start, end)| {
                let text = command[start..end.min(len)].trim();
                if text.is_empty() {
                    None
                } else {
                    Some(Segment {
                        parse_failed: !scan_balanced(text),
                        text: text.to_string(),
                    })
                }
            })
            .collect();

        let parse_failed = segments.iter().any(|s| s.parse_failed);
        SplitResult {
            segments,
            parse_failed,
        }
    }
}

/// Sequencing/piping operators, recognized at any depth.
#[inline]
fn operator_len(bytes: &[u8], i: usize) -> Option<usize> {
    let b = bytes[i];
    let next = bytes.get(i + 1).copied();
    match b {
        b'&' => match next {
            Some(b'&') => Some(2),
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

/// Scan an identifier-shaped word; report +1 for `case`, -1 for `esac` when
/// the word sits at proper boundaries.
fn scan_keyword(bytes: &[u8], i: usize) -> (usize, i32) {
    let len = bytes.len();
    let mut end = i;
    while end < len && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    let preceded_ok = i == 0 || is_delimiter(bytes[i - 1]);
    let followed_ok = end >= len || is_delimiter(bytes[end]);
    if preceded_ok && followed_ok {
        match &bytes[i..end] {
            b"case" => return (end, 1),
            b"esac" => return (end, -1),
            _ => {}
        }
    }
    (end, 0)
}

fn apply_case_delta(depth: u32, delta: i32) -> u32 {
    match delta {
        1 => depth + 1,
        -1 => depth.saturating_sub(1),
        _ => depth,
    }
}

#[inline]
fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace()
        || matches!(b, b';' | b'&' | b'|' | b'(' | b')' | b'{' | b'}' | b'<' | b'>')
}
