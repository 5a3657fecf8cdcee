//! Final decision shape and combination.
//!
//! All checks reduce to one [`Verdict`] per invocation. Exactly one reason
//! string survives even when several rules matched: the first match in scan
//! order wins, mirroring the rule engines' first-match guarantee.

use serde::Serialize;

/// The three possible outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Ask,
    Deny,
}

impl Decision {
    /// Restrictiveness ordering: Deny > Ask > Allow.
    #[must_use]
    fn rank(self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Ask => 1,
            Self::Deny => 2,
        }
    }
}

/// One decision with its surfaced reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub decision: Decision,
    /// Human-readable reason; always present for Ask/Deny, never for Allow.
    pub reason: Option<String>,
    /// Short identifier of the originating rule or check, for the decision
    /// log.
    pub rule: Option<String>,
}

impl Verdict {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            reason: None,
            rule: None,
        }
    }

    #[must_use]
    pub fn ask(reason: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            decision: Decision::Ask,
            reason: Some(reason.into()),
            rule: Some(rule.into()),
        }
    }

    #[must_use]
    pub fn deny(reason: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason: Some(reason.into()),
            rule: Some(rule.into()),
        }
    }

    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.decision == Decision::Allow
    }

    /// Fold in another check's verdict: the more restrictive decision wins;
    /// on a tie the earlier verdict's reason is kept (first match wins).
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        if other.decision.rank() > self.decision.rank() {
            other
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_is_silent() {
        let v = Verdict::allow();
        assert!(v.is_allow());
        assert!(v.reason.is_none());
    }

    #[test]
    fn deny_beats_ask_beats_allow() {
        let d = Verdict::deny("no", "r1");
        let a = Verdict::ask("sure?", "r2");
        assert_eq!(Verdict::allow().combine(a.clone()).decision, Decision::Ask);
        assert_eq!(a.clone().combine(d.clone()).decision, Decision::Deny);
        assert_eq!(d.clone().combine(a).decision, Decision::Deny);
        assert_eq!(d.combine(Verdict::allow()).decision, Decision::Deny);
    }

    #[test]
    fn first_reason_wins_on_equal_rank() {
        let first = Verdict::deny("first reason", "r1");
        let second = Verdict::deny("second reason", "r2");
        let combined = first.combine(second);
        assert_eq!(combined.reason.as_deref(), Some("first reason"));
        assert_eq!(combined.rule.as_deref(), Some("r1"));
    }

    #[test]
    fn decision_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Decision::Deny).unwrap(), "\"deny\"");
        assert_eq!(serde_json::to_string(&Decision::Ask).unwrap(), "\"ask\"");
    }
}
