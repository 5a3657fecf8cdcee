//! Quoting and nesting state machine for shell-like command text.
//!
//! This is the shared foundation for the primary splitter: a single
//! left-to-right scan with one character of look-ahead that tracks quoting
//! context and an explicit frame stack for nested regions (command
//! substitution, grouping parentheses, backticks).
//!
//! # Design Principles
//!
//! - **Not a shell parser**: the tracker recognizes just enough structure to
//!   know which characters are live syntax and which are literal data.
//! - **Opaque backticks**: nothing inside a backtick region is reinterpreted
//!   structurally. The transparent splitter ([`crate::transparent`])
//!   compensates by re-scanning those regions.
//! - **Bounded**: one pass, frame depth bounded by input length, so the scan
//!   terminates on any input.

use smallvec::SmallVec;

/// Kind of an open nesting frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// `` ` `` ... `` ` `` command substitution. Opaque while open.
    Backtick,
    /// `$(` ... `)` command substitution. Own quoting context.
    Substitution,
    /// Bare `(` ... `)` subshell / group.
    Group,
}

/// One entry on the nesting stack.
///
/// Popping a frame restores the double-quote state that was active before the
/// frame opened: substitution content is its own quoting context even when
/// the enclosing text is double-quoted.
#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    saved_double_quote: bool,
}

/// Quoting/nesting tracker.
///
/// Drive it with [`QuoteTracker::advance`], which consumes one lexeme at a
/// time and returns the index of the next unconsumed byte. Callers that split
/// on operators must check [`QuoteTracker::at_top_level`] *before* advancing
/// past an operator candidate.
#[derive(Debug, Default)]
pub struct QuoteTracker {
    frames: SmallVec<[Frame; 8]>,
    in_single_quote: bool,
    in_double_quote: bool,
    case_depth: u32,
}

impl QuoteTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no frame is open and no quote is active.
    #[inline]
    #[must_use]
    pub fn at_top_level(&self) -> bool {
        self.frames.is_empty() && !self.in_single_quote && !self.in_double_quote
    }

    /// Current nesting depth (open frames).
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// True while inside a `case`..`esac` region, where `)` is a pattern
    /// delimiter rather than a frame closer.
    #[inline]
    #[must_use]
    pub fn case_active(&self) -> bool {
        self.case_depth > 0
    }

    /// True if the scan ended with an open frame or unterminated quote.
    #[must_use]
    pub fn parse_failed(&self) -> bool {
        self.in_single_quote || self.in_double_quote || !self.frames.is_empty()
    }

    fn push_frame(&mut self, kind: FrameKind) {
        self.frames.push(Frame {
            kind,
            saved_double_quote: self.in_double_quote,
        });
        // Substitution/group interiors start with a fresh quoting context.
        self.in_double_quote = false;
    }

    fn pop_closing_paren(&mut self) {
        // A `)` only pops a Substitution or Group frame; inside a case
        // pattern it is a delimiter and never pops.
        if self.case_depth > 0 {
            return;
        }
        if let Some(frame) = self.frames.last() {
            if matches!(frame.kind, FrameKind::Substitution | FrameKind::Group) {
                let frame = self.frames.pop().unwrap_or(Frame {
                    kind: FrameKind::Group,
                    saved_double_quote: false,
                });
                self.in_double_quote = frame.saved_double_quote;
            }
        }
    }

    /// Consume one lexeme starting at byte index `i` and return the index of
    /// the next unconsumed byte. `i` must be a valid index into `bytes`.
    pub fn advance(&mut self, bytes: &[u8], i: usize) -> usize {
        let len = bytes.len();
        let b = bytes[i];

        // (a) inside single quotes every character is literal until the
        // closing quote.
        if self.in_single_quote {
            if b == b'\'' {
                self.in_single_quote = false;
            }
            return i + 1;
        }

        // (e) backtick regions are opaque: only the escape and the closing
        // backtick are recognized.
        if self
            .frames
            .last()
            .is_some_and(|f| f.kind == FrameKind::Backtick)
        {
            return match b {
                b'\\' => (i + 2).min(len),
                b'`' => {
                    let frame = self.frames.pop().unwrap_or(Frame {
                        kind: FrameKind::Backtick,
                        saved_double_quote: false,
                    });
                    self.in_double_quote = frame.saved_double_quote;
                    i + 1
                }
                _ => i + 1,
            };
        }

        match b {
            // (b) backslash escapes exactly the next character.
            b'\\' => (i + 2).min(len),
            // (c) a literal `'` inside double quotes is not a quote boundary.
            b'\'' => {
                if !self.in_double_quote {
                    self.in_single_quote = true;
                }
                i + 1
            }
            // (d)
            b'"' => {
                self.in_double_quote = !self.in_double_quote;
                i + 1
            }
            // (f) `$(` opens a substitution with its own quoting context.
            b'$' if i + 1 < len && bytes[i + 1] == b'(' => {
                self.push_frame(FrameKind::Substitution);
                i + 2
            }
            b'`' => {
                self.push_frame(FrameKind::Backtick);
                i + 1
            }
            // (g)/(h) parens are live only outside double quotes.
            b'(' if !self.in_double_quote => {
                self.push_frame(FrameKind::Group);
                i + 1
            }
            b')' if !self.in_double_quote => {
                self.pop_closing_paren();
                i + 1
            }
            // (i) `case`/`esac` keywords, recognized only at word boundaries.
            b'c' | b'e' if !self.in_double_quote => self.advance_word(bytes, i),
            _ => i + 1,
        }
    }

    /// Consume an identifier-shaped word, updating case depth if the word is
    /// the `case` or `esac` keyword at a proper boundary.
    fn advance_word(&mut self, bytes: &[u8], i: usize) -> usize {
        let len = bytes.len();
        let mut end = i;
        while end < len && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
            end += 1;
        }
        if end == i {
            return i + 1;
        }

        let preceded_ok = i == 0 || is_word_delimiter(bytes[i - 1]);
        let followed_ok = end >= len || is_word_delimiter(bytes[end]);
        if preceded_ok && followed_ok {
            match &bytes[i..end] {
                b"case" => self.case_depth += 1,
                b"esac" => self.case_depth = self.case_depth.saturating_sub(1),
                _ => {}
            }
        }
        end
    }
}

/// Bytes that delimit a keyword: whitespace or a sequencing/nesting operator.
#[inline]
fn is_word_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b';' | b'&' | b'|' | b'(' | b')' | b'{' | b'}' | b'<' | b'>')
}

/// Run the tracker over an entire string and report whether it parsed
/// cleanly (no open frames, no unterminated quotes).
#[must_use]
pub fn scan_balanced(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut tracker = QuoteTracker::new();
    let mut i = 0;
    while i < bytes.len() {
        i = tracker.advance(bytes, i);
    }
    !tracker.parse_failed()
}
