//! Rule evaluation - applicability first, then independent assertions

use crate::assertions::evaluate_assertion;
use forgestig_core::{Applicability, EvalContext, FactSet, Rule, RuleOutcome};
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a rule applies to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applicable {
    Yes,
    /// Not applicable, with the reason
    No(String),
    /// Applicability could not be decided
    Unknown(String),
}

/// Decide applicability; the first condition that does not hold wins
pub fn applicability(rule: &Rule, ctx: &EvalContext, facts: &FactSet) -> Applicable {
    for condition in &rule.applicability {
        match condition {
            Applicability::NotInContainer => {
                if ctx.virtualization.is_container() {
                    let system = ctx.virtualization.system.as_deref().unwrap_or("container");
                    return Applicable::No(format!(
                        "Control not applicable within a container ({})",
                        system
                    ));
                }
            }
            Applicability::DirectoryNotEmpty { path } => match facts.directory(path) {
                // Hidden entries do not count, as with a shell `*` glob
                Ok(entries) if entries.iter().all(|e| e.starts_with('.')) => {
                    return Applicable::No(format!("{} is empty or absent", path));
                }
                Ok(_) => {}
                Err(e) => {
                    return Applicable::Unknown(format!("cannot decide applicability: {}", e));
                }
            },
        }
    }
    Applicable::Yes
}

/// Evaluate a rule against collected facts, producing exactly one outcome
pub fn evaluate(rule: &Rule, ctx: &EvalContext, facts: &FactSet) -> RuleOutcome {
    match applicability(rule, ctx, facts) {
        Applicable::No(reason) => {
            debug!("{} not applicable: {}", rule.id, reason);
            return RuleOutcome::not_applicable(rule, reason);
        }
        Applicable::Unknown(message) => return RuleOutcome::error(rule, message),
        Applicable::Yes => {}
    }

    let outcomes = rule
        .assertions
        .iter()
        .map(|assertion| evaluate_assertion(assertion, facts, &ctx.inputs))
        .collect();
    let outcome = RuleOutcome::from_assertions(rule, outcomes);
    debug!("{} -> {}", rule.id, outcome.verdict);
    outcome
}

/// Evaluate rules in parallel tasks; results come back sorted by rule id
pub async fn evaluate_all(
    rules: Vec<Arc<Rule>>,
    ctx: Arc<EvalContext>,
    facts: Arc<FactSet>,
) -> Vec<RuleOutcome> {
    let handles: Vec<_> = rules
        .into_iter()
        .map(|rule| {
            let ctx = ctx.clone();
            let facts = facts.clone();
            let task_rule = rule.clone();
            let handle = tokio::spawn(async move { evaluate(&task_rule, &ctx, &facts) });
            (rule, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (rule, handle) in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!("Evaluation of {} failed: {}", rule.id, e);
                outcomes.push(RuleOutcome::error(&rule, format!("evaluation failed: {}", e)));
            }
        }
    }

    outcomes.sort_by(|a, b| a.id.cmp(&b.id));
    outcomes
}
