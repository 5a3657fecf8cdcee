//! Ordered command-policy rule engine.
//!
//! Rules are loaded from a plain-text file of `pattern | message` lines
//! (optional third ` | ask` field), evaluated in file order against each
//! normalized segment; the first matching rule decides. Patterns are
//! compiled once at load; rules that fail to compile are collected for
//! diagnostics rather than aborting the load.
//!
//! This engine is **fail-open**: no rules (missing file) means every segment
//! is allowed, and a segment's parse failure is not a denial signal here.

use fancy_regex::Regex;

/// What a matching rule requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Request user confirmation, with the rule's message as the reason.
    Ask,
    /// Block outright, with the rule's message as the reason.
    Deny,
}

/// One compiled policy rule.
#[derive(Debug)]
pub struct PolicyRule {
    /// Precompiled pattern.
    pub regex: Regex,
    /// The original pattern text (for diagnostics and `csg rules`).
    pub pattern: String,
    /// Human-readable reason surfaced on a match.
    pub message: String,
    pub action: PolicyAction,
}

impl PolicyRule {
    /// Check this rule against a normalized segment.
    #[inline]
    #[must_use]
    pub fn matches(&self, segment: &str) -> bool {
        self.regex.is_match(segment).unwrap_or(false)
    }
}

/// A rule line that failed to parse or compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRule {
    pub line_number: usize,
    pub line: String,
    pub error: String,
}

/// Ordered rule set with first-match-wins evaluation.
#[derive(Debug, Default)]
pub struct PolicyEngine {
    rules: Vec<PolicyRule>,
    /// Lines that failed to parse/compile (for `csg rules` diagnostics).
    pub invalid: Vec<InvalidRule>,
}

impl PolicyEngine {
    /// An engine with no rules: allows everything.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a rule file. Lines are `pattern | message` with an optional
    /// trailing ` | ask` / ` | deny` field; `#` comments and blank lines are
    /// ignored. Fields are separated by a spaced pipe, so regex alternation
    /// (`(a|b)`) survives.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut engine = Self::default();
        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Ok(rule) => engine.rules.push(rule),
                Err(error) => engine.invalid.push(InvalidRule {
                    line_number: idx + 1,
                    line: line.to_string(),
                    error,
                }),
            }
        }
        engine
    }

    /// First rule matching `segment`, in file order.
    #[must_use]
    pub fn first_match(&self, segment: &str) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.matches(segment))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }
}

fn parse_line(line: &str) -> Result<PolicyRule, String> {
    let mut parts: Vec<&str> = line.split(" | ").collect();
    if parts.len() < 2 {
        return Err("expected `pattern | message`".to_string());
    }

    let action = match parts.last().map(|s| s.trim()) {
        Some("ask") if parts.len() >= 3 => {
            parts.pop();
            PolicyAction::Ask
        }
        Some("deny") if parts.len() >= 3 => {
            parts.pop();
            PolicyAction::Deny
        }
        _ => PolicyAction::Deny,
    };

    let message = parts
        .pop()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| "empty message".to_string())?
        .to_string();
    let pattern = parts.join(" | ").trim().to_string();
    if pattern.is_empty() {
        return Err("empty pattern".to_string());
    }

    let regex = Regex::new(&pattern).map_err(|e| format!("invalid pattern: {e}"))?;
    Ok(PolicyRule {
        regex,
        pattern,
        message,
        action,
    })
}
