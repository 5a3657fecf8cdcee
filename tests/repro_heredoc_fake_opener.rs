//! Regression scenarios around heredoc suppression.
//!
//! Two opposite failure modes: treating body lines as commands (false
//! positives on literal data) and letting a fake opener disable checking for
//! the rest of the input (a real bypass).

use command_safety_gate::config::GateConfig;
use command_safety_gate::gate::Gate;
use command_safety_gate::policy::PolicyEngine;
use command_safety_gate::verdict::Decision;

fn gate() -> Gate {
    let mut config = GateConfig::builtin_only();
    config.policy = PolicyEngine::parse("^rm\\s+-rf | refusing recursive delete\n");
    Gate::new(config)
}

#[test]
fn body_lines_are_data_not_commands() {
    let raw = "cat <<EOF\nrm -rf /\ncat /etc/shadow\nEOF";
    assert_eq!(gate().evaluate_command(raw).decision, Decision::Allow);
}

#[test]
fn command_after_closer_is_still_live() {
    let raw = "cat <<EOF\nharmless\nEOF\nrm -rf /";
    assert_eq!(gate().evaluate_command(raw).decision, Decision::Deny);
}

#[test]
fn command_on_opener_line_is_still_live() {
    let raw = "cat <<EOF && rm -rf /\nbody\nEOF";
    assert_eq!(gate().evaluate_command(raw).decision, Decision::Deny);
}

#[test]
fn fake_opener_without_closer_does_not_suppress() {
    // No closing line exists, so heredoc mode must not engage at all.
    let raw = "cat <<EOF && rm -rf /";
    assert_eq!(gate().evaluate_command(raw).decision, Decision::Deny);
}

#[test]
fn opener_inside_quotes_is_inert() {
    // The "opener" is commit-message text; the second line is a real command.
    let raw = "git commit -m 'fix <<EOF parsing'\nrm -rf /\nEOF";
    assert_eq!(gate().evaluate_command(raw).decision, Decision::Deny);
}

#[test]
fn tab_indented_closer_matches_dash_variant() {
    let raw = "cat <<-EOF\n\trm -rf /\n\tEOF\nrm -rf /tmp/x";
    let v = gate().evaluate_command(raw);
    assert_eq!(v.decision, Decision::Deny);
    // The deny must come from the trailing live command, not the body.
    assert!(v
        .reason
        .as_deref()
        .is_some_and(|r| r.contains("refusing recursive delete")));
}

#[test]
fn here_string_is_not_an_opener() {
    // `<<<` feeds a literal string; nothing here opens a body.
    let raw = "grep x <<< 'sample'\nrm -rf /";
    assert_eq!(gate().evaluate_command(raw).decision, Decision::Deny);
}

#[test]
fn sequential_heredocs_each_suppress_their_own_body() {
    let raw = "cat <<A\nrm -rf /\nA\ncat <<B\ncat /etc/shadow\nB\necho done";
    assert_eq!(gate().evaluate_command(raw).decision, Decision::Allow);
}
