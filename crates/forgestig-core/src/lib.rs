//! ForgeSTIG Core - Foundation types, traits, and error handling
//!
//! This crate provides the core abstractions used throughout the ForgeSTIG engine:
//! - `Rule`: A declarative compliance control (applicability + assertions)
//! - `Fact` / `FactKey`: Observed host state and the keys used to request it
//! - `Verdict` / `RuleOutcome`: The result of evaluating a rule
//! - `EvalContext`: Host context and tunable inputs passed to every evaluation
//! - `Severity`, `Error`, etc.

pub mod context;
pub mod error;
pub mod fact;
pub mod rule;
pub mod severity;
pub mod verdict;

// Re-export commonly used types at crate root
pub use context::{EvalContext, Inputs, Virtualization};
pub use error::{Error, Result};
pub use fact::{
    AuditRule, ChronyConfig, CollectError, CommandOutput, CommandSpec, ConfigParams, Fact,
    FactError, FactKey, FactSet, ModuleState, TimeSource,
};
pub use rule::{Applicability, Assertion, Param, Rule};
pub use severity::Severity;
pub use verdict::{AssertionOutcome, RuleOutcome, Verdict};
