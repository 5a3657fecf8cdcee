//! Token-shaped secret detection in captured output.
//!
//! Runs on previously-executed output text only, never on commands. Each
//! rule is a regex plus an optional statistical threshold; the statistical
//! filters exist because token-shaped regexes otherwise light up on content
//! hashes and low-entropy placeholder values:
//!
//! 1. distinct-character count (ignoring trailing `=` padding) must meet the
//!    rule's threshold,
//! 2. all-hexadecimal matches are rejected (content hashes, not tokens),
//! 3. a match appearing immediately after a known integrity-hash prefix
//!    (`sha512-…` and friends) anywhere in the same output is exonerated.
//!
//! The scanner never blocks. It only names the rules that fired so the
//! caller can warn against repeating the value.

use aho_corasick::AhoCorasick;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// One secret-detection rule as loaded from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretRule {
    pub name: String,
    pub pattern: String,
    /// 0 disables the statistical filters for this rule.
    #[serde(default, alias = "minUniqueChars")]
    pub min_unique_chars: usize,
}

/// Subresource-integrity and digest prefixes. A token-shaped string directly
/// after one of these is a content hash, not a credential.
static HASH_PREFIXES: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::new([
        "sha256-", "sha384-", "sha512-", "sha1-", "md5-",
        "sha256:", "sha384:", "sha512:", "sha1:", "md5:",
    ])
    .expect("hash prefix automaton should build")
});

#[derive(Debug)]
struct CompiledRule {
    name: String,
    regex: Regex,
    min_unique_chars: usize,
}

/// Compiled scanner over a rule set.
#[derive(Debug, Default)]
pub struct SecretScanner {
    rules: Vec<CompiledRule>,
}

impl SecretScanner {
    /// Compile a rule set. Any uncompilable pattern fails the whole load;
    /// the caller degrades to a blanket advisory rather than scanning with a
    /// partial rule set.
    pub fn compile(rules: Vec<SecretRule>) -> Result<Self, String> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let regex = Regex::new(&rule.pattern)
                .map_err(|e| format!("rule {:?}: {e}", rule.name))?;
            compiled.push(CompiledRule {
                name: rule.name,
                regex,
                min_unique_chars: rule.min_unique_chars,
            });
        }
        Ok(Self { rules: compiled })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Names of rules with at least one surviving match, in rule order.
    #[must_use]
    pub fn scan(&self, output: &str) -> Vec<String> {
        if output.is_empty() || self.rules.is_empty() {
            return Vec::new();
        }
        let prefix_ends: Vec<usize> = HASH_PREFIXES
            .find_iter(output)
            .map(|m| m.end())
            .collect();

        let mut fired = Vec::new();
        for rule in &self.rules {
            let hit = rule.regex.find_iter(output).any(|m| {
                if rule.min_unique_chars == 0 {
                    return true;
                }
                let text = m.as_str();
                distinct_chars(text) >= rule.min_unique_chars
                    && !is_all_hex(text)
                    && !is_hash_suffixed(output, &prefix_ends, m.start(), text)
            });
            if hit {
                fired.push(rule.name.clone());
            }
        }
        fired
    }
}

/// Distinct characters, ignoring trailing `=` padding.
fn distinct_chars(text: &str) -> usize {
    let trimmed = text.trim_end_matches('=');
    let mut seen = [false; 256];
    let mut count = 0;
    for &b in trimmed.as_bytes() {
        if !seen[b as usize] {
            seen[b as usize] = true;
            count += 1;
        }
    }
    count
}

fn is_all_hex(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// True when the match sits directly after a hash prefix, or when the same
/// matched text appears after a hash prefix elsewhere in the output.
fn is_hash_suffixed(output: &str, prefix_ends: &[usize], start: usize, text: &str) -> bool {
    prefix_ends
        .iter()
        .any(|&end| end == start || output[end..].starts_with(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner(json: &str) -> SecretScanner {
        let rules: Vec<SecretRule> = serde_json::from_str(json).unwrap();
        SecretScanner::compile(rules).unwrap()
    }

    const RULES: &str = r#"[
        {"name": "github-token", "pattern": "ghp_[A-Za-z0-9]{36}", "min_unique_chars": 0},
        {"name": "generic-token", "pattern": "[A-Za-z0-9+/=]{40,}", "min_unique_chars": 12}
    ]"#;

    #[test]
    fn plain_pattern_rule_fires() {
        let s = scanner(RULES);
        let out = format!("token: ghp_{}", "Ab1".repeat(12));
        assert_eq!(s.scan(&out), vec!["github-token"]);
    }

    #[test]
    fn clean_output_is_silent() {
        let s = scanner(RULES);
        assert!(s.scan("all tests passed\n").is_empty());
    }

    #[test]
    fn low_entropy_match_is_filtered() {
        let s = scanner(RULES);
        // 48 chars but only one distinct character.
        let out = "A".repeat(48);
        assert!(s.scan(&out).is_empty());
    }

    #[test]
    fn padding_does_not_count_toward_entropy() {
        let s = scanner(RULES);
        // 8 distinct chars then 32 `=`: padding must not satisfy the
        // threshold.
        let out = format!("{}{}", "abcdefgh".repeat(2), "=".repeat(32));
        assert!(s.scan(&out).is_empty());
    }

    #[test]
    fn all_hex_match_is_filtered() {
        let s = scanner(RULES);
        // A sha256 digest: 64 hex chars, plenty of distinct ones.
        let out = "digest 3b4c5d6e7f8a9b0c1d2e3f4a5b6c7d8e9f0a1b2c3d4e5f6a7b8c9d0e1f2a3b4c";
        assert!(s.scan(out).is_empty());
    }

    #[test]
    fn integrity_hash_suffix_is_exonerated() {
        let s = scanner(RULES);
        let out = "integrity sha512-KxWqyP0fQhBmCnDsTgrUvJzLaMeXoYiRbNdHcFpAjSkVuEtOwGlZ==";
        assert!(s.scan(out).is_empty());
    }

    #[test]
    fn same_token_after_hash_prefix_elsewhere_is_exonerated() {
        let token = "KxWqyP0fQhBmCnDsTgrUvJzLaMeXoYiRbNdHcFpAjSk";
        let s = scanner(RULES);
        let out = format!("value {token} from lock entry sha512-{token}");
        assert!(s.scan(&out).is_empty());
    }

    #[test]
    fn entropic_token_survives_filters() {
        let s = scanner(RULES);
        let out = "export TOKEN=KxWqyP0fQhBmCnDsTgrUvJzLaMeXoYiRbNdHcFpAjSk";
        assert_eq!(s.scan(out), vec!["generic-token"]);
    }

    #[test]
    fn camel_case_field_alias_accepted() {
        let rules: Vec<SecretRule> = serde_json::from_str(
            r#"[{"name": "x", "pattern": "x+", "minUniqueChars": 3}]"#,
        )
        .unwrap();
        assert_eq!(rules[0].min_unique_chars, 3);
    }

    #[test]
    fn bad_pattern_fails_compile_with_rule_name() {
        let rules: Vec<SecretRule> = serde_json::from_str(
            r#"[{"name": "broken", "pattern": "([unclosed"}]"#,
        )
        .unwrap();
        let err = SecretScanner::compile(rules).unwrap_err();
        assert!(err.contains("broken"));
    }
}
