//! ForgeSTIG Audit - fact collection, rule evaluation and reporting
//!
//! This crate provides:
//! - `FactProvider`: access to host state, backed by the local machine
//!   (`LocalHost`) or by memory (`MemoryHost`)
//! - `FactCollector`: gathers the facts rules ask for, each under a timeout
//! - Assertion predicates and the rule `evaluator`
//! - `Auditor`: runs a full audit and produces an `AuditReport`
//!
//! # Example
//!
//! ```no_run
//! use forgestig_audit::{Auditor, FactCollector, LocalHost};
//! use forgestig_checks::{default_inputs, RuleRegistry};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let collector = FactCollector::new(Arc::new(LocalHost::new()));
//! let auditor = Auditor::new(RuleRegistry::builtin(), collector).with_inputs(default_inputs());
//!
//! let report = auditor.run_audit().await;
//! println!("Failed: {}", report.summary.failed);
//!
//! for failure in report.failures() {
//!     println!("{}: {}", failure.id, failure.message);
//! }
//! # }
//! ```

pub mod assertions;
pub mod auditor;
pub mod collectors;
pub mod evaluator;
pub mod linux;
pub mod parsers;
pub mod provider;
pub mod report;

pub use assertions::evaluate_assertion;
pub use auditor::Auditor;
pub use collectors::FactCollector;
pub use evaluator::{applicability, evaluate, evaluate_all, Applicable};
pub use linux::LocalHost;
pub use provider::{FactProvider, MemoryHost};
pub use report::{AuditReport, AuditSummary, ReportFilter};
