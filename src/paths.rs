//! Path sensitivity classification.
//!
//! Classifies a single already-tokenized argument string as naming a
//! sensitive resource or not. Three rule shapes are supported, checked in
//! order: exact paths, globs, and regex patterns. A built-in rule set covers
//! the usual credential material (key files, cloud credentials, shell
//! history, `/etc/shadow` and friends); an extension file and a per-project
//! supplement add to it.
//!
//! Failure philosophy is split across the `Error` variant: an extension file
//! that exists but cannot be parsed poisons the classifier so every query
//! reports `Error`. Whether `Error` means Deny (command arguments) or
//! Ask-with-warning (direct file opens) is the caller's call, not ours.

use regex::Regex;
use std::sync::LazyLock;

/// Classification of one argument string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathClass {
    /// Names a sensitive resource; carries the matching rule's description.
    Sensitive(String),
    Safe,
    /// The classifier itself is unusable (poisoned rule configuration).
    Error(String),
}

#[derive(Debug)]
enum Matcher {
    Exact(String),
    Glob(glob::Pattern),
    Pattern(Regex),
}

/// One sensitivity rule with its human-readable description. The description
/// is the denial reason surfaced to the caller, so it must say what the rule
/// protects, not just restate the pattern.
#[derive(Debug)]
pub struct PathRule {
    matcher: Matcher,
    description: String,
}

impl PathRule {
    fn matches(&self, path: &str) -> bool {
        match &self.matcher {
            Matcher::Exact(exact) => path == exact,
            Matcher::Glob(pattern) => pattern.matches(path),
            Matcher::Pattern(regex) => regex.is_match(path),
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

macro_rules! builtin {
    (exact $path:expr, $desc:expr) => {
        PathRule {
            matcher: Matcher::Exact(expand_home($path)),
            description: $desc.to_string(),
        }
    };
    (glob $pat:expr, $desc:expr) => {
        PathRule {
            matcher: Matcher::Glob(
                glob::Pattern::new(&expand_home($pat))
                    .expect("built-in glob should compile"),
            ),
            description: $desc.to_string(),
        }
    };
    (re $pat:expr, $desc:expr) => {
        PathRule {
            matcher: Matcher::Pattern(
                Regex::new($pat).expect("built-in pattern should compile"),
            ),
            description: $desc.to_string(),
        }
    };
}

static BUILTIN_RULES: LazyLock<Vec<PathRule>> = LazyLock::new(|| {
    vec![
        builtin!(exact "/etc/shadow", "system password hashes"),
        builtin!(exact "/etc/sudoers", "sudo privilege configuration"),
        builtin!(exact "/etc/gshadow", "system group password hashes"),
        builtin!(glob "~/.ssh/*", "SSH keys and configuration"),
        builtin!(glob "~/.gnupg/*", "GnuPG keyring"),
        builtin!(glob "~/.aws/*", "AWS credentials and configuration"),
        builtin!(glob "~/.kube/config*", "Kubernetes cluster credentials"),
        builtin!(glob "~/.docker/config.json", "Docker registry credentials"),
        builtin!(glob "~/.netrc", "netrc machine credentials"),
        builtin!(glob "~/.npmrc", "npm registry tokens"),
        builtin!(glob "~/.pypirc", "PyPI upload credentials"),
        builtin!(glob "~/.git-credentials", "stored git credentials"),
        builtin!(glob "~/.*_history", "shell history"),
        builtin!(glob "/etc/sudoers.d/*", "sudo privilege configuration"),
        builtin!(re r"(^|/)id_(rsa|dsa|ecdsa|ed25519)(\.pub)?$", "SSH private key material"),
        builtin!(re r"\.(pem|p12|pfx|jks|keystore)$", "key/certificate store file"),
        builtin!(re r"(^|/)\.env(\.[A-Za-z0-9_.-]+)?$", "environment secrets file"),
        builtin!(re r"(^|/)(credentials|secrets?)\.(json|ya?ml|toml)$", "credentials file"),
        builtin!(re r"(^|/)\.(secret|token)s?(/|$)", "secret/token store"),
    ]
});

/// Quick textual hint that a fragment plausibly touches sensitive material.
/// Used only to decide how strictly to treat unparsable secondary fragments.
static SENSITIVE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\.ssh|\.gnupg|\.aws|\.kube|\.netrc|id_rsa|id_ed25519|/etc/(shadow|sudoers|gshadow)|credential|private[_-]?key|secret|\.pem\b|\.env\b|_history\b",
    )
    .expect("sensitive hint pattern should compile")
});

/// True when a fragment's raw text looks like it touches credential material.
#[must_use]
pub fn looks_sensitive(text: &str) -> bool {
    SENSITIVE_HINT.is_match(text)
}

/// Expand a leading `~`/`~/` to the user's home directory. Left untouched
/// when no home directory is resolvable.
#[must_use]
pub fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            return if path == "~" {
                home.into_owned()
            } else {
                format!("{home}/{}", &path[2..])
            };
        }
    }
    path.to_string()
}

/// Collapse duplicate separators and drop a trailing one (keeping bare `/`).
#[must_use]
pub fn normalize_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if !prev_slash {
                out.push('/');
            }
            prev_slash = true;
        } else {
            out.push(ch);
            prev_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// The classifier: built-in rules plus loaded extensions, or a poisoned
/// state when an extension file was present but unparsable.
#[derive(Debug, Default)]
pub struct PathClassifier {
    extension: Vec<PathRule>,
    load_error: Option<String>,
}

impl PathClassifier {
    /// Built-in rules only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rules from an extension file's text. A file that yields any
    /// unparsable rule line poisons the classifier: every subsequent query
    /// returns [`PathClass::Error`]. Silence (no file) must be handled by
    /// not calling this at all.
    pub fn load_extension(&mut self, source: &str, text: &str) {
        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_rule_line(line) {
                Ok(rule) => self.extension.push(rule),
                Err(error) => {
                    self.load_error = Some(format!(
                        "{source}:{}: unusable path rule ({error})",
                        idx + 1
                    ));
                    return;
                }
            }
        }
    }

    /// Classify one argument string.
    #[must_use]
    pub fn classify(&self, arg: &str) -> PathClass {
        if let Some(error) = &self.load_error {
            return PathClass::Error(error.clone());
        }
        let path = normalize_separators(&expand_home(arg));

        // Exact rules first, then globs, then patterns, built-ins before
        // extensions within each shape.
        for shape in 0..3u8 {
            for rule in BUILTIN_RULES.iter().chain(&self.extension) {
                if shape_rank(&rule.matcher) == shape && rule.matches(&path) {
                    return PathClass::Sensitive(rule.description.clone());
                }
            }
        }
        PathClass::Safe
    }

    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.load_error.is_some()
    }

    #[must_use]
    pub fn extension_len(&self) -> usize {
        self.extension.len()
    }
}

fn shape_rank(matcher: &Matcher) -> u8 {
    match matcher {
        Matcher::Exact(_) => 0,
        Matcher::Glob(_) => 1,
        Matcher::Pattern(_) => 2,
    }
}

/// Parse one extension rule line: `re:`-prefixed regex, a glob when glob
/// metacharacters are present, otherwise an exact path. `~` is expanded at
/// load time. An optional ` | description` suffix overrides the default
/// description.
fn parse_rule_line(line: &str) -> Result<PathRule, String> {
    let (body, description) = match line.split_once(" | ") {
        Some((body, desc)) if !desc.trim().is_empty() => {
            (body.trim(), desc.trim().to_string())
        }
        _ => (line, format!("sensitive path rule: {line}")),
    };

    if let Some(pattern) = body.strip_prefix("re:") {
        let regex = Regex::new(pattern).map_err(|e| e.to_string())?;
        return Ok(PathRule {
            matcher: Matcher::Pattern(regex),
            description,
        });
    }
    let expanded = expand_home(body);
    if body.contains(['*', '?', '[']) {
        let pattern = glob::Pattern::new(&expanded).map_err(|e| e.to_string())?;
        return Ok(PathRule {
            matcher: Matcher::Glob(pattern),
            description,
        });
    }
    Ok(PathRule {
        matcher: Matcher::Exact(normalize_separators(&expanded)),
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etc_shadow_is_sensitive() {
        let c = PathClassifier::new();
        assert!(matches!(c.classify("/etc/shadow"), PathClass::Sensitive(_)));
    }

    #[test]
    fn duplicate_separators_are_normalized() {
        let c = PathClassifier::new();
        assert!(matches!(
            c.classify("/etc//shadow"),
            PathClass::Sensitive(_)
        ));
        assert!(matches!(
            c.classify("/etc/sudoers/"),
            PathClass::Sensitive(_)
        ));
    }

    #[test]
    fn tilde_expansion_hits_home_rules() {
        let c = PathClassifier::new();
        match c.classify("~/.ssh/id_rsa") {
            PathClass::Sensitive(desc) => {
                assert!(desc.contains("SSH"), "{desc}");
            }
            other => panic!("expected sensitive, got {other:?}"),
        }
    }

    #[test]
    fn key_basename_is_sensitive_anywhere() {
        let c = PathClassifier::new();
        assert!(matches!(
            c.classify("/tmp/backup/id_ed25519"),
            PathClass::Sensitive(_)
        ));
        assert!(matches!(c.classify("server.pem"), PathClass::Sensitive(_)));
    }

    #[test]
    fn env_file_variants_are_sensitive() {
        let c = PathClassifier::new();
        assert!(matches!(c.classify(".env"), PathClass::Sensitive(_)));
        assert!(matches!(
            c.classify("app/.env.production"),
            PathClass::Sensitive(_)
        ));
    }

    #[test]
    fn ordinary_paths_are_safe() {
        let c = PathClassifier::new();
        assert_eq!(c.classify("src/main.rs"), PathClass::Safe);
        assert_eq!(c.classify("README.md"), PathClass::Safe);
        assert_eq!(c.classify("environment.rs"), PathClass::Safe);
    }

    #[test]
    fn extension_exact_and_glob_and_regex_lines() {
        let mut c = PathClassifier::new();
        c.load_extension(
            "test",
            "/opt/deploy/token\nvault/*.hcl\nre:(^|/)master\\.key$ | application master key\n",
        );
        assert!(!c.is_poisoned());
        assert_eq!(c.extension_len(), 3);
        assert!(matches!(
            c.classify("/opt/deploy/token"),
            PathClass::Sensitive(_)
        ));
        assert!(matches!(
            c.classify("vault/prod.hcl"),
            PathClass::Sensitive(_)
        ));
        match c.classify("config/master.key") {
            PathClass::Sensitive(desc) => assert_eq!(desc, "application master key"),
            other => panic!("expected sensitive, got {other:?}"),
        }
    }

    #[test]
    fn unparsable_extension_poisons_every_query() {
        let mut c = PathClassifier::new();
        c.load_extension("test", "re:([unclosed\n");
        assert!(c.is_poisoned());
        assert!(matches!(c.classify("README.md"), PathClass::Error(_)));
        assert!(matches!(c.classify("/etc/shadow"), PathClass::Error(_)));
    }

    #[test]
    fn comments_and_blanks_do_not_poison() {
        let mut c = PathClassifier::new();
        c.load_extension("test", "# only a comment\n\n");
        assert!(!c.is_poisoned());
        assert_eq!(c.extension_len(), 0);
    }

    #[test]
    fn sensitive_hint_matches_credentialish_text() {
        assert!(looks_sensitive("cat ~/.ssh/unknown \"x"));
        assert!(looks_sensitive("grep secret /var/log"));
        assert!(!looks_sensitive("echo hello world"));
    }
}
