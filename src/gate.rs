//! Decision pipeline: both splitter passes, policy and path checks, output
//! scanning.
//!
//! Control flow for a command request: strip heredoc bodies, run the primary
//! opaque split, normalize each segment, run the policy rules and — for
//! commands that read files — the path classifier over the arguments; then
//! independently re-split the same text with the transparent pass and check
//! its fragments the same way. The most restrictive verdict wins; on a tie
//! the earliest match keeps its reason.
//!
//! The two failure philosophies meet here. Policy checks are fail-open (a
//! parse failure contributes nothing). Path checks are fail-closed for the
//! primary pass (an unparsable command or unresolvable argument denies) and
//! lenient for secondary fragments, which are legitimately quote-broken,
//! unless the fragment's text also looks credential-adjacent.

use crate::config::{GateConfig, SecretRules};
use crate::heredoc::strip_heredoc_bodies;
use crate::normalize::{basename, normalize_segment, split_words};
use crate::paths::{looks_sensitive, PathClass};
use crate::policy::PolicyAction;
use crate::splitter::{OpaqueSplitter, Segment, Segmenter};
use crate::transparent::TransparentSplitter;
use crate::verdict::Verdict;
use tracing::debug;

/// Programs whose arguments are read targets and therefore get path checks.
/// Sorted for binary search.
const READ_COMMANDS: &[&str] = &[
    "awk", "base64", "bat", "cat", "cp", "cut", "dd", "diff", "egrep", "emacs", "fgrep", "file",
    "grep", "head", "hexdump", "less", "more", "nano", "od", "rg", "rsync", "scp", "sed", "sort",
    "source", "stat", "strings", "tail", "tee", "uniq", "vi", "view", "vim", "wc", "xxd",
];

fn reads_files(program: &str) -> bool {
    READ_COMMANDS.binary_search(&basename(program)).is_ok()
}

/// Stdin redirection glued to its operand (`<file`, `2<file`) reads that
/// file; return the operand so it gets classified. Heredoc (`<<`),
/// here-string (`<<<`), and process-substitution (`<(`) operands are not
/// plain paths and pass through unchanged.
fn redirection_target(word: &str) -> &str {
    let after_fd = word.trim_start_matches(|c: char| c.is_ascii_digit());
    if let Some(rest) = after_fd.strip_prefix('<') {
        if !rest.starts_with('<') && !rest.starts_with('(') {
            return rest;
        }
    }
    word
}

/// Strictness for path checks on one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strictness {
    /// Primary segments: unresolvable arguments and classifier errors deny.
    FailClosed,
    /// Secondary fragments: only deny when the fragment also looks like it
    /// touches credential material.
    Lenient,
}

/// The assembled gate.
#[derive(Debug)]
pub struct Gate {
    config: GateConfig,
}

impl Gate {
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Evaluate a whole command request.
    #[must_use]
    pub fn evaluate_command(&self, raw: &str) -> Verdict {
        let stripped = strip_heredoc_bodies(raw);

        let primary = OpaqueSplitter::new().split(&stripped);
        debug!(
            segments = primary.segments.len(),
            parse_failed = primary.parse_failed,
            "primary split"
        );

        let mut verdict = Verdict::allow();
        if primary.parse_failed {
            // Fail-closed for the path-check class: an unparsable command
            // could hide anything.
            verdict = verdict.combine(Verdict::deny(
                "command has unbalanced quoting or nesting and cannot be checked",
                "parse-failure",
            ));
        }
        for segment in &primary.segments {
            verdict = verdict.combine(self.check_segment(segment, Strictness::FailClosed));
        }

        let secondary = TransparentSplitter::new().split(&stripped);
        debug!(fragments = secondary.segments.len(), "secondary split");
        for fragment in &secondary.segments {
            verdict = verdict.combine(self.check_segment(fragment, Strictness::Lenient));
        }

        verdict
    }

    /// Evaluate a direct file-open request for one path.
    #[must_use]
    pub fn evaluate_file_open(&self, path: &str) -> Verdict {
        match self.config.paths.classify(path) {
            PathClass::Sensitive(description) => Verdict::ask(
                format!("{path} is a sensitive file ({description})"),
                "sensitive-path",
            ),
            PathClass::Safe => Verdict::allow(),
            PathClass::Error(reason) => Verdict::ask(
                format!("sensitive-path rules are degraded ({reason}); confirm before opening {path}"),
                "degraded-path-rules",
            ),
        }
    }

    /// Scan captured output; returns advisory text when anything fires.
    #[must_use]
    pub fn scan_output(&self, output: &str) -> Option<String> {
        if output.is_empty() {
            return None;
        }
        match &self.config.secrets {
            SecretRules::Ready(scanner) => {
                let names = scanner.scan(output);
                if names.is_empty() {
                    None
                } else {
                    Some(format!(
                        "Output appears to contain secrets ({}). Do not repeat these values in conversation or commit them anywhere.",
                        names.join(", ")
                    ))
                }
            }
            SecretRules::Degraded(reason) => Some(format!(
                "Secret scanning is degraded ({reason}); treat this output as potentially containing secrets."
            )),
        }
    }

    /// One segment/fragment through policy rules and path checks.
    fn check_segment(&self, segment: &Segment, strictness: Strictness) -> Verdict {
        let normalized = normalize_segment(&segment.text);
        if normalized.is_empty() {
            return Verdict::allow();
        }

        let mut verdict = Verdict::allow();
        if let Some(rule) = self.config.policy.first_match(&normalized) {
            debug!(pattern = %rule.pattern, "policy rule matched");
            verdict = verdict.combine(match rule.action {
                PolicyAction::Deny => Verdict::deny(rule.message.clone(), rule.pattern.clone()),
                PolicyAction::Ask => Verdict::ask(rule.message.clone(), rule.pattern.clone()),
            });
        }

        verdict.combine(self.check_paths(segment, &normalized, strictness))
    }

    /// Path checks over a read command's arguments.
    fn check_paths(&self, segment: &Segment, normalized: &str, strictness: Strictness) -> Verdict {
        let strict = strictness == Strictness::FailClosed;
        let words = split_words(normalized);
        let Some(first) = words.first() else {
            return Verdict::allow();
        };
        if first.fully_single_quoted || !reads_files(&first.text) {
            return Verdict::allow();
        }

        for word in &words[1..] {
            let target = redirection_target(&word.text);
            if target.is_empty() || target.starts_with('-') {
                continue;
            }
            if word.has_unresolved {
                // The argument could resolve to anything at execution time.
                if strict || looks_sensitive(&segment.text) {
                    return Verdict::deny(
                        format!(
                            "argument `{}` to {} cannot be resolved before execution and may name a sensitive file",
                            word.text, first.text
                        ),
                        "unresolved-argument",
                    );
                }
                continue;
            }
            match self.config.paths.classify(target) {
                PathClass::Sensitive(description) => {
                    return Verdict::deny(
                        format!("{} reads {target} ({description})", first.text),
                        "sensitive-path",
                    );
                }
                PathClass::Safe => {}
                PathClass::Error(reason) => {
                    if strict || looks_sensitive(&segment.text) {
                        return Verdict::deny(
                            format!("sensitive-path rules are degraded ({reason})"),
                            "degraded-path-rules",
                        );
                    }
                }
            }
        }
        Verdict::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::policy::PolicyEngine;
    use crate::verdict::Decision;

    fn gate_with_policy(rules: &str) -> Gate {
        let mut config = GateConfig::builtin_only();
        config.policy = PolicyEngine::parse(rules);
        Gate::new(config)
    }

    fn gate() -> Gate {
        Gate::new(GateConfig::builtin_only())
    }

    #[test]
    fn plain_command_is_allowed() {
        assert!(gate().evaluate_command("git status").is_allow());
        assert!(gate().evaluate_command("ls -la").is_allow());
    }

    #[test]
    fn policy_rule_denies_matching_segment() {
        let g = gate_with_policy("^git\\s+push\\s+.*--force | use --force-with-lease\n");
        let v = g.evaluate_command("git push --force origin main");
        assert_eq!(v.decision, Decision::Deny);
        assert_eq!(v.reason.as_deref(), Some("use --force-with-lease"));
    }

    #[test]
    fn policy_sees_through_wrappers_and_chaining() {
        let g = gate_with_policy("^rm\\s+-rf\\s+/tmp/x | no\n");
        assert_eq!(
            g.evaluate_command("true && sudo rm -rf /tmp/x").decision,
            Decision::Deny
        );
    }

    #[test]
    fn sensitive_read_is_denied() {
        let v = gate().evaluate_command("cat /etc/shadow");
        assert_eq!(v.decision, Decision::Deny);
        assert!(v.reason.as_deref().is_some_and(|r| r.contains("shadow")));
    }

    #[test]
    fn quoted_program_word_is_still_checked() {
        // The shell strips quotes before program lookup, so a quoted command
        // word must not dodge the path or policy checks.
        let v = gate().evaluate_command("'cat' /etc/shadow");
        assert_eq!(v.decision, Decision::Deny);

        let g = gate_with_policy("^rm\\s+-rf | never\n");
        assert_eq!(g.evaluate_command("'rm' -rf /x").decision, Decision::Deny);
    }

    #[test]
    fn whole_single_quoted_literal_stays_data() {
        // One quoted word with interior whitespace is a literal program
        // name, not a command plus arguments.
        assert!(gate().evaluate_command("'cat /etc/shadow'").is_allow());
    }

    #[test]
    fn glued_stdin_redirection_is_classified() {
        assert_eq!(
            gate().evaluate_command("cat </etc/shadow").decision,
            Decision::Deny
        );
        assert_eq!(
            gate().evaluate_command("cat < /etc/shadow").decision,
            Decision::Deny
        );
        assert_eq!(
            gate().evaluate_command("sort 2</etc/shadow").decision,
            Decision::Deny
        );
    }

    #[test]
    fn sensitive_read_inside_substitution_is_denied() {
        // The primary pass keeps the substitution opaque; the secondary pass
        // must surface the inner read.
        let v = gate().evaluate_command("X=$(cat ~/.ssh/id_rsa)");
        assert_eq!(v.decision, Decision::Deny);
    }

    #[test]
    fn sensitive_read_inside_backticks_is_denied() {
        let v = gate().evaluate_command("echo `cat /etc/shadow`");
        assert_eq!(v.decision, Decision::Deny);
    }

    #[test]
    fn sensitive_read_inside_case_branch_is_denied() {
        // The branch's `)` must not terminate substitution tracking early.
        let v = gate().evaluate_command("$(case x in x) cat ~/.ssh/id_rsa ;; esac)");
        assert_eq!(v.decision, Decision::Deny);
    }

    #[test]
    fn unparsable_command_is_denied() {
        let v = gate().evaluate_command("echo 'unterminated && cat /etc/shadow");
        assert_eq!(v.decision, Decision::Deny);
    }

    #[test]
    fn unresolved_argument_to_read_command_is_denied() {
        let v = gate().evaluate_command("cat $SECRET_FILE");
        assert_eq!(v.decision, Decision::Deny);
    }

    #[test]
    fn unresolved_argument_to_non_read_command_is_allowed() {
        assert!(gate().evaluate_command("echo $HOME").is_allow());
    }

    #[test]
    fn heredoc_body_is_not_evaluated() {
        let g = gate_with_policy("^rm\\s+-rf | never\n");
        let raw = "cat <<EOF\nrm -rf /\nEOF";
        assert!(g.evaluate_command(raw).is_allow());
    }

    #[test]
    fn command_after_heredoc_closer_is_still_checked() {
        let g = gate_with_policy("^rm\\s+-rf | never\n");
        let raw = "cat <<EOF\nbody\nEOF\nrm -rf /";
        assert_eq!(g.evaluate_command(raw).decision, Decision::Deny);
    }

    #[test]
    fn fake_heredoc_opener_does_not_suppress_checks() {
        let g = gate_with_policy("^rm\\s+-rf | never\n");
        assert_eq!(
            g.evaluate_command("cat <<EOF && rm -rf /").decision,
            Decision::Deny
        );
    }

    #[test]
    fn denied_pattern_inside_single_quotes_is_allowed() {
        let g = gate_with_policy("^rm\\s+-rf | never\n");
        assert!(g.evaluate_command("echo 'rm -rf /'").is_allow());
    }

    #[test]
    fn first_matching_reason_is_surfaced() {
        let g = gate_with_policy("^cat | first\n^cat\\s+x | second\n");
        let v = g.evaluate_command("cat x");
        assert_eq!(v.reason.as_deref(), Some("first"));
    }

    #[test]
    fn file_open_of_sensitive_path_asks() {
        let v = gate().evaluate_file_open("/etc/shadow");
        assert_eq!(v.decision, Decision::Ask);
    }

    #[test]
    fn file_open_of_ordinary_path_is_allowed() {
        assert!(gate().evaluate_file_open("src/main.rs").is_allow());
    }

    #[test]
    fn file_open_with_poisoned_rules_asks_not_denies() {
        let mut config = GateConfig::builtin_only();
        config.paths.load_extension("test", "re:([broken\n");
        let g = Gate::new(config);
        let v = g.evaluate_file_open("README.md");
        assert_eq!(v.decision, Decision::Ask);
        assert!(v.reason.as_deref().is_some_and(|r| r.contains("degraded")));
    }

    #[test]
    fn command_with_poisoned_rules_is_denied() {
        let mut config = GateConfig::builtin_only();
        config.paths.load_extension("test", "re:([broken\n");
        let g = Gate::new(config);
        assert_eq!(g.evaluate_command("cat notes.txt").decision, Decision::Deny);
    }

    #[test]
    fn degraded_secret_rules_give_blanket_advisory() {
        let advisory = gate().scan_output("some output").unwrap();
        assert!(advisory.contains("degraded"));
    }

    #[test]
    fn empty_output_is_never_advised() {
        assert!(gate().scan_output("").is_none());
    }

    #[test]
    fn quote_broken_secondary_fragment_is_not_denied() {
        // The transparent pass slices through the quoted context; the broken
        // fragment must not fail closed on its own.
        assert!(gate()
            .evaluate_command(r#"echo "result: $(date)""#)
            .is_allow());
    }
}
