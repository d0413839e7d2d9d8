//! Verdicts - the outcome of evaluating a rule against collected facts

use crate::rule::Rule;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// Outcome classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every assertion held
    Pass,
    /// At least one assertion did not hold
    Fail,
    /// The rule does not apply to this host; nothing was asserted
    NotApplicable,
    /// A required fact was unavailable or malformed
    Error,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::NotApplicable => "N/A",
            Verdict::Error => "ERROR",
        }
    }

    /// Combine assertion verdicts: any Fail wins, then any Error, otherwise Pass.
    /// An empty set is an Error. The result does not depend on order.
    pub fn combine<I: IntoIterator<Item = Verdict>>(verdicts: I) -> Verdict {
        let mut any = false;
        let mut error = false;
        for verdict in verdicts {
            any = true;
            match verdict {
                Verdict::Fail => return Verdict::Fail,
                Verdict::Error => error = true,
                Verdict::Pass | Verdict::NotApplicable => {}
            }
        }
        if !any || error {
            Verdict::Error
        } else {
            Verdict::Pass
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    /// What was asserted
    pub assertion: String,
    pub verdict: Verdict,
    /// Observed state or the reason it could not be observed
    pub message: String,
}

impl AssertionOutcome {
    pub fn pass(assertion: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            assertion: assertion.into(),
            verdict: Verdict::Pass,
            message: message.into(),
        }
    }

    pub fn fail(assertion: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            assertion: assertion.into(),
            verdict: Verdict::Fail,
            message: message.into(),
        }
    }

    pub fn error(assertion: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            assertion: assertion.into(),
            verdict: Verdict::Error,
            message: message.into(),
        }
    }
}

/// Result of evaluating a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub id: String,
    pub title: String,
    pub verdict: Verdict,
    pub message: String,
    pub severity: Severity,
    pub impact: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<AssertionOutcome>,
}

impl RuleOutcome {
    /// Rule skipped; impact forced to zero
    pub fn not_applicable(rule: &Rule, reason: impl Into<String>) -> Self {
        Self {
            id: rule.id.clone(),
            title: rule.title.clone(),
            verdict: Verdict::NotApplicable,
            message: reason.into(),
            severity: Severity::None,
            impact: 0.0,
            assertions: Vec::new(),
        }
    }

    /// Rule-level error raised before any assertion ran
    pub fn error(rule: &Rule, message: impl Into<String>) -> Self {
        Self {
            id: rule.id.clone(),
            title: rule.title.clone(),
            verdict: Verdict::Error,
            message: message.into(),
            severity: rule.severity,
            impact: rule.impact(),
            assertions: Vec::new(),
        }
    }

    /// Combine assertion outcomes into the rule outcome
    pub fn from_assertions(rule: &Rule, assertions: Vec<AssertionOutcome>) -> Self {
        let verdict = Verdict::combine(assertions.iter().map(|a| a.verdict));
        let message = match verdict {
            Verdict::Pass => format!("{} of {} assertions passed", assertions.len(), assertions.len()),
            Verdict::NotApplicable => String::new(),
            Verdict::Fail | Verdict::Error if assertions.is_empty() => {
                String::from("rule has no assertions")
            }
            Verdict::Fail | Verdict::Error => assertions
                .iter()
                .filter(|a| a.verdict == verdict)
                .map(|a| a.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        };

        Self {
            id: rule.id.clone(),
            title: rule.title.clone(),
            verdict,
            message,
            severity: rule.severity,
            impact: rule.impact(),
            assertions,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}
