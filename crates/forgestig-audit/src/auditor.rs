//! Auditor - orchestrates collection and evaluation for a full run

use crate::collectors::FactCollector;
use crate::evaluator::{applicability, evaluate_all, Applicable};
use crate::report::AuditReport;
use forgestig_checks::RuleRegistry;
use forgestig_core::{EvalContext, FactKey, Inputs, Rule};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs the registry's rules against one host
pub struct Auditor {
    registry: RuleRegistry,
    collector: FactCollector,
    inputs: Inputs,
}

impl Auditor {
    pub fn new(registry: RuleRegistry, collector: FactCollector) -> Self {
        Self {
            registry,
            collector,
            inputs: Inputs::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Inputs) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Build the evaluation context: virtualization is detected once here
    pub async fn context(&self) -> EvalContext {
        let mut ctx = EvalContext::new()
            .with_virtualization(self.collector.detect_virtualization().await)
            .with_inputs(self.inputs.clone());
        ctx.hostname = self.collector.hostname().await;
        ctx
    }

    /// Run all enabled rules
    pub async fn run_audit(&self) -> AuditReport {
        let ctx = self.context().await;
        self.run_with_context(ctx).await
    }

    /// Run all enabled rules against an already built context.
    ///
    /// Applicability facts are collected first. Assertion facts are then
    /// collected only for rules that apply, so a rule that does not apply
    /// never touches the host for its assertions.
    pub async fn run_with_context(&self, ctx: EvalContext) -> AuditReport {
        info!(
            "Starting STIG audit on {} ({})",
            ctx.hostname.as_deref().unwrap_or("unknown host"),
            ctx.virtualization.system.as_deref().unwrap_or("bare metal")
        );

        let rules = self.registry.enabled();
        let skipped = self.registry.len() - rules.len();
        if skipped > 0 {
            debug!("Skipping {} disabled rules", skipped);
        }

        let applicability_keys: BTreeSet<FactKey> =
            rules.iter().flat_map(|r| r.applicability_facts()).collect();
        let mut facts = self.collector.collect(applicability_keys).await;

        let applicable: Vec<&Arc<Rule>> = rules
            .iter()
            .filter(|r| applicability(r, &ctx, &facts) == Applicable::Yes)
            .collect();
        debug!("{} of {} rules apply to this host", applicable.len(), rules.len());

        let assertion_keys: BTreeSet<FactKey> = applicable
            .iter()
            .flat_map(|r| r.assertion_facts())
            .filter(|k| !facts.contains(k))
            .collect();
        facts.extend(self.collector.collect(assertion_keys).await);

        let outcomes = evaluate_all(rules, Arc::new(ctx.clone()), Arc::new(facts)).await;
        let report = AuditReport::new(&ctx, outcomes, skipped);

        let s = &report.summary;
        info!(
            "Audit complete: {} passed, {} failed, {} errors, {} not applicable, {} skipped",
            s.passed, s.failed, s.errors, s.not_applicable, s.skipped
        );

        report
    }
}
