//! Audit reports - summary counts, per-rule outcomes and their renderings

use chrono::{DateTime, Utc};
use forgestig_core::{EvalContext, RuleOutcome, Severity, Verdict, Virtualization};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use uuid::Uuid;

/// Counts per verdict kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    /// Rules evaluated
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub not_applicable: usize,
    /// Disabled rules that were not evaluated
    pub skipped: usize,
    /// Failed rules by severity
    pub failures_by_severity: BTreeMap<Severity, usize>,
}

impl AuditSummary {
    pub fn from_outcomes(outcomes: &[RuleOutcome], skipped: usize) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            skipped,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome.verdict {
                Verdict::Pass => summary.passed += 1,
                Verdict::Fail => {
                    summary.failed += 1;
                    *summary.failures_by_severity.entry(outcome.severity).or_insert(0) += 1;
                }
                Verdict::Error => summary.errors += 1,
                Verdict::NotApplicable => summary.not_applicable += 1,
            }
        }
        summary
    }

    /// Share of applicable rules that passed, in percent
    pub fn pass_rate(&self) -> f64 {
        let applicable = self.total - self.not_applicable;
        if applicable == 0 {
            0.0
        } else {
            self.passed as f64 / applicable as f64 * 100.0
        }
    }
}

/// Which outcomes to include when rendering
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportFilter {
    /// Only Fail and Error outcomes
    pub failures_only: bool,
    pub min_severity: Option<Severity>,
}

impl ReportFilter {
    pub fn matches(&self, outcome: &RuleOutcome) -> bool {
        if self.failures_only && !matches!(outcome.verdict, Verdict::Fail | Verdict::Error) {
            return false;
        }
        match self.min_severity {
            Some(min) => outcome.severity >= min,
            None => true,
        }
    }
}

/// Result of a full audit run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub hostname: Option<String>,
    pub virtualization: Virtualization,
    pub summary: AuditSummary,
    /// Sorted by rule id
    pub results: Vec<RuleOutcome>,
}

impl AuditReport {
    pub fn new(ctx: &EvalContext, mut results: Vec<RuleOutcome>, skipped: usize) -> Self {
        results.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            hostname: ctx.hostname.clone(),
            virtualization: ctx.virtualization.clone(),
            summary: AuditSummary::from_outcomes(&results, skipped),
            results,
        }
    }

    pub fn get(&self, id: &str) -> Option<&RuleOutcome> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.results.iter().filter(|r| r.verdict == Verdict::Fail)
    }

    /// 0 when clean, 1 on any failure, 2 when rules errored but none failed
    pub fn exit_code(&self) -> i32 {
        if self.summary.failed > 0 {
            1
        } else if self.summary.errors > 0 {
            2
        } else {
            0
        }
    }

    /// Machine-readable JSON; the summary always covers the full run
    pub fn to_json(&self, filter: ReportFilter) -> serde_json::Result<String> {
        let results: Vec<&RuleOutcome> = self.results.iter().filter(|r| filter.matches(r)).collect();
        let output = serde_json::json!({
            "run_id": self.run_id,
            "generated_at": self.generated_at,
            "hostname": self.hostname,
            "virtualization": self.virtualization.system,
            "summary": self.summary,
            "results": results,
        });
        serde_json::to_string_pretty(&output)
    }

    pub fn render_text(&self, filter: ReportFilter) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n=== STIG Compliance Results ===\n");

        for r in self.results.iter().filter(|r| filter.matches(r)) {
            let _ = writeln!(out, "[{}] {} - {}", r.verdict, r.id, r.title);
            let _ = writeln!(out, "    Severity: {} (impact {:.1})", r.severity, r.impact);
            let _ = writeln!(out, "    Result:   {}", r.message);
            if matches!(r.verdict, Verdict::Fail | Verdict::Error) {
                for a in r.assertions.iter().filter(|a| a.verdict != Verdict::Pass) {
                    let _ = writeln!(out, "      - {} [{}]: {}", a.assertion, a.verdict, a.message);
                }
            }
            out.push('\n');
        }

        self.write_summary(&mut out);
        out
    }

    pub fn render_table(&self, filter: ReportFilter) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n{:<12} {:<56} {:<7} {:<8}", "RULE ID", "TITLE", "STATUS", "SEVERITY");
        let _ = writeln!(out, "{}", "-".repeat(86));

        for r in self.results.iter().filter(|r| filter.matches(r)) {
            let color = match r.verdict {
                Verdict::Pass => "\x1b[32m",
                Verdict::Fail => "\x1b[31m",
                Verdict::Error => "\x1b[33m",
                Verdict::NotApplicable => "\x1b[90m",
            };
            let _ = writeln!(
                out,
                "{:<12} {:<56} {}{:<7}\x1b[0m {:<8}",
                r.id,
                truncate(&r.title, 54),
                color,
                r.verdict.as_str(),
                r.severity.as_str()
            );
        }

        let _ = writeln!(out, "\n{}", "-".repeat(86));
        self.write_summary(&mut out);
        out
    }

    fn write_summary(&self, out: &mut String) {
        let s = &self.summary;
        let _ = writeln!(out, "Summary:");
        let _ = writeln!(out, "  Total:          {}", s.total);
        let _ = writeln!(out, "  Passed:         {} ({:.1}%)", s.passed, s.pass_rate());
        let _ = writeln!(out, "  Failed:         {}", s.failed);
        let _ = writeln!(out, "  Errors:         {}", s.errors);
        let _ = writeln!(out, "  Not applicable: {}", s.not_applicable);
        let _ = writeln!(out, "  Skipped:        {}", s.skipped);

        if !s.failures_by_severity.is_empty() {
            let _ = writeln!(out, "\nFailures by severity:");
            for (severity, count) in s.failures_by_severity.iter().rev() {
                let _ = writeln!(out, "  {}: {}", severity, count);
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
