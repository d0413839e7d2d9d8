//! ForgeSTIG Checks - Rule registry, YAML rule definitions, and built-in controls
//!
//! This crate provides:
//! - `RuleRegistry`: Index of all available rules
//! - YAML parser for declarative rule definitions
//! - Rule loader for directories of rule files
//! - The built-in RHEL 8 STIG controls and their default inputs

pub mod controls;
pub mod loader;
pub mod registry;
pub mod yaml_rule;

pub use controls::{default_inputs, rhel8_rules};
pub use loader::load_rules_from_dir;
pub use registry::RuleRegistry;
pub use yaml_rule::{parse_rule_yaml, rule_to_yaml};
