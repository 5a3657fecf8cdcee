//! Configuration discovery and loading.
//!
//! Three rule sources, each resolved independently through the same lookup
//! chain: an environment-variable override, then a project-local `.csg/`
//! directory, then the user configuration directory. Their degradation modes
//! differ on purpose:
//!
//! - policy rules: missing or unreadable means an empty rule set (fail-open),
//! - path rules: missing contributes nothing; present-but-unparsable poisons
//!   the classifier (fail-closed, surfaced by callers),
//! - secret rules: missing or malformed degrades to a blanket advisory for
//!   every scan (a silent scanner would be the worst failure mode here).
//!
//! A project-local `sensitive_paths.txt` is loaded as a supplement even when
//! a user-level or env-designated file is the primary source.

use crate::paths::PathClassifier;
use crate::policy::PolicyEngine;
use crate::secrets::{SecretRule, SecretScanner};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

const PROJECT_DIR: &str = ".csg";
const POLICY_FILE: &str = "command_rules.txt";
const PATH_FILE: &str = "sensitive_paths.txt";
const SECRET_FILE: &str = "secret_rules.json";

pub const POLICY_ENV: &str = "CSG_POLICY_RULES";
pub const PATH_ENV: &str = "CSG_PATH_RULES";
pub const SECRET_ENV: &str = "CSG_SECRET_RULES";

/// Secret-scanner state after loading.
#[derive(Debug)]
pub enum SecretRules {
    Ready(SecretScanner),
    /// No usable rule set; every scan gets a blanket advisory carrying this
    /// reason.
    Degraded(String),
}

/// Everything the gate needs for one invocation.
#[derive(Debug)]
pub struct GateConfig {
    pub policy: PolicyEngine,
    pub paths: PathClassifier,
    pub secrets: SecretRules,
}

impl GateConfig {
    /// Load all three rule sources from the discovery chain.
    #[must_use]
    pub fn load() -> Self {
        Self {
            policy: load_policy(),
            paths: load_paths(),
            secrets: load_secrets(),
        }
    }

    /// A config with no external rules at all (built-in path rules only,
    /// secret scanning degraded). Used by tests and benchmarks.
    #[must_use]
    pub fn builtin_only() -> Self {
        Self {
            policy: PolicyEngine::empty(),
            paths: PathClassifier::new(),
            secrets: SecretRules::Degraded("secret rule configuration not loaded".to_string()),
        }
    }
}

/// Where each rule source would be loaded from right now, for diagnostics.
#[must_use]
pub fn describe_sources() -> Vec<(&'static str, Option<PathBuf>)> {
    vec![
        ("policy rules", find_file(POLICY_ENV, POLICY_FILE)),
        ("path rules", find_file(PATH_ENV, PATH_FILE)),
        ("secret rules", find_file(SECRET_ENV, SECRET_FILE)),
    ]
}

/// Resolve one config file: env override, project `.csg/`, user config dir.
fn find_file(env_var: &str, name: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(env_var) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    let project = PathBuf::from(PROJECT_DIR).join(name);
    if project.is_file() {
        return Some(project);
    }
    let user = dirs::config_dir()?.join("csg").join(name);
    user.is_file().then_some(user)
}

fn load_policy() -> PolicyEngine {
    let Some(path) = find_file(POLICY_ENV, POLICY_FILE) else {
        debug!("no policy rule file found; allowing all commands");
        return PolicyEngine::empty();
    };
    match fs::read_to_string(&path) {
        Ok(text) => {
            let engine = PolicyEngine::parse(&text);
            for invalid in &engine.invalid {
                warn!(
                    file = %path.display(),
                    line = invalid.line_number,
                    error = %invalid.error,
                    "skipping unusable policy rule"
                );
            }
            debug!(file = %path.display(), rules = engine.len(), "loaded policy rules");
            engine
        }
        Err(error) => {
            warn!(file = %path.display(), %error, "policy rule file unreadable; allowing all commands");
            PolicyEngine::empty()
        }
    }
}

fn load_paths() -> PathClassifier {
    let mut classifier = PathClassifier::new();
    let primary = find_file(PATH_ENV, PATH_FILE);
    let project = PathBuf::from(PROJECT_DIR).join(PATH_FILE);

    if let Some(path) = &primary {
        match fs::read_to_string(path) {
            Ok(text) => classifier.load_extension(&path.display().to_string(), &text),
            Err(error) => {
                warn!(file = %path.display(), %error, "path rule file unreadable; using built-in rules only");
            }
        }
    }
    // Project supplement, unless it was already the primary source.
    if primary.as_deref() != Some(project.as_path()) && project.is_file() {
        match fs::read_to_string(&project) {
            Ok(text) => classifier.load_extension(&project.display().to_string(), &text),
            Err(error) => {
                warn!(file = %project.display(), %error, "project path rule file unreadable");
            }
        }
    }
    classifier
}

fn load_secrets() -> SecretRules {
    let Some(path) = find_file(SECRET_ENV, SECRET_FILE) else {
        return SecretRules::Degraded("no secret rule configuration found".to_string());
    };
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(error) => {
            return SecretRules::Degraded(format!(
                "secret rule file {} unreadable: {error}",
                path.display()
            ));
        }
    };
    let rules: Vec<SecretRule> = match serde_json::from_str(&text) {
        Ok(rules) => rules,
        Err(error) => {
            return SecretRules::Degraded(format!(
                "secret rule file {} malformed: {error}",
                path.display()
            ));
        }
    };
    match SecretScanner::compile(rules) {
        Ok(scanner) => {
            debug!(file = %path.display(), rules = scanner.len(), "loaded secret rules");
            SecretRules::Ready(scanner)
        }
        Err(error) => SecretRules::Degraded(format!(
            "secret rule file {} unusable: {error}",
            path.display()
        )),
    }
}
