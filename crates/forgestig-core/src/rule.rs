//! Rule definitions - the declarative form every compliance control takes
//!
//! A rule is data: an applicability list evaluated first, then a list of
//! independent assertions. Assertions are pure predicates over a `FactSet`;
//! evaluation lives in `forgestig-audit`.

use crate::context::Inputs;
use crate::error::{Error, Result};
use crate::fact::{CommandSpec, FactKey};
use crate::severity::Severity;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const DEFAULT_AUDIT_RULES: &str = "/etc/audit/audit.rules";
pub const DEFAULT_CHRONY_CONF: &str = "/etc/chrony.conf";

/// A rule parameter: either a literal value or a reference to a named input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param<T> {
    Input { input: String },
    Value(T),
}

impl<T: DeserializeOwned + Clone> Param<T> {
    pub fn input(name: impl Into<String>) -> Self {
        Param::Input { input: name.into() }
    }

    /// Resolve against the run's inputs
    pub fn resolve(&self, inputs: &Inputs) -> Result<T> {
        match self {
            Param::Value(value) => Ok(value.clone()),
            Param::Input { input } => inputs.get(input),
        }
    }
}

impl<T: fmt::Debug> fmt::Display for Param<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Value(value) => write!(f, "{:?}", value),
            Param::Input { input } => write!(f, "input `{}`", input),
        }
    }
}

fn default_audit_rules() -> String {
    DEFAULT_AUDIT_RULES.to_string()
}

fn default_chrony_conf() -> String {
    DEFAULT_CHRONY_CONF.to_string()
}

fn default_permission() -> String {
    String::from("x")
}

fn default_max_poll() -> i64 {
    16
}

fn default_exact() -> Param<bool> {
    Param::Value(false)
}

fn default_true() -> bool {
    true
}

/// Condition deciding whether a rule applies to the host at all
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Applicability {
    /// Not applicable inside a container
    NotInContainer,
    /// Not applicable unless the directory exists and has entries
    DirectoryNotEmpty { path: String },
}

impl Applicability {
    pub fn required_facts(&self) -> Vec<FactKey> {
        match self {
            Applicability::NotInContainer => Vec::new(),
            Applicability::DirectoryNotEmpty { path } => {
                vec![FactKey::Directory { path: path.clone() }]
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Applicability::NotInContainer => "host is not a container".into(),
            Applicability::DirectoryNotEmpty { path } => format!("{} is not empty", path),
        }
    }
}

/// A single independent predicate over collected facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Assertion {
    /// Integer setting set exactly once, within [min, max]
    ConfigThreshold {
        file: String,
        key: String,
        #[serde(default)]
        min: Option<Param<i64>>,
        #[serde(default)]
        max: Option<Param<i64>>,
    },
    /// Setting set exactly once to the expected value
    ConfigEquals {
        file: String,
        key: String,
        expected: Param<String>,
    },
    /// Command stdout contains a whitespace-delimited token
    OutputContainsToken {
        command: CommandSpec,
        token: Param<String>,
    },
    /// Privileged command execution is audited
    AuditRule {
        #[serde(default = "default_audit_rules")]
        rules_file: String,
        path: String,
        #[serde(default = "default_permission")]
        permission: String,
        key: String,
    },
    /// `install <module> /bin/false` (or /bin/true) is configured
    ModuleDisabled { module: String },
    /// `blacklist <module>` is configured
    ModuleBlacklisted { module: String },
    /// At least one time source is configured
    TimeSourceConfigured {
        #[serde(default = "default_chrony_conf")]
        config: String,
    },
    /// Authoritative time servers are configured with a bounded poll interval
    AuthoritativeTimeServers {
        #[serde(default = "default_chrony_conf")]
        config: String,
        servers: Param<Vec<String>>,
        #[serde(default = "default_exact")]
        exact: Param<bool>,
        #[serde(default = "default_max_poll")]
        max_poll: i64,
    },
}

impl Assertion {
    /// Facts this assertion reads
    pub fn required_facts(&self) -> Vec<FactKey> {
        let key = match self {
            Assertion::ConfigThreshold { file, .. } | Assertion::ConfigEquals { file, .. } => {
                FactKey::Config { path: file.clone() }
            }
            Assertion::OutputContainsToken { command, .. } => FactKey::Command(command.clone()),
            Assertion::AuditRule { rules_file, .. } => FactKey::AuditRules {
                path: rules_file.clone(),
            },
            Assertion::ModuleDisabled { module } | Assertion::ModuleBlacklisted { module } => {
                FactKey::KernelModule {
                    name: module.clone(),
                }
            }
            Assertion::TimeSourceConfigured { config }
            | Assertion::AuthoritativeTimeServers { config, .. } => FactKey::Chrony {
                path: config.clone(),
            },
        };
        vec![key]
    }

    /// Short human-readable statement of what is asserted
    pub fn describe(&self) -> String {
        match self {
            Assertion::ConfigThreshold { file, key, min, max } => {
                let mut bounds = Vec::new();
                if let Some(min) = min {
                    bounds.push(format!(">= {}", min));
                }
                if let Some(max) = max {
                    bounds.push(format!("<= {}", max));
                }
                if bounds.is_empty() {
                    format!("{} is set once in {}", key, file)
                } else {
                    format!("{} is set once in {} and {}", key, file, bounds.join(" and "))
                }
            }
            Assertion::ConfigEquals {
                file,
                key,
                expected,
            } => format!("{} is set to {} in {}", key, expected, file),
            Assertion::OutputContainsToken { command, token } => {
                format!("output of `{}` includes {}", command, token)
            }
            Assertion::AuditRule { path, key, .. } => {
                format!("execution of {} is audited with key {}", path, key)
            }
            Assertion::ModuleDisabled { module } => format!("kernel module {} is disabled", module),
            Assertion::ModuleBlacklisted { module } => {
                format!("kernel module {} is blacklisted", module)
            }
            Assertion::TimeSourceConfigured { config } => {
                format!("a time server is configured in {}", config)
            }
            Assertion::AuthoritativeTimeServers {
                servers, max_poll, ..
            } => format!(
                "authoritative time servers {} are used with maxpoll <= {}",
                servers, max_poll
            ),
        }
    }
}

/// A compliance rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule ID (e.g. "SV-230360")
    pub id: String,
    /// Short title
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Severity if the rule fails
    pub severity: Severity,
    /// Impact score; defaults from severity
    #[serde(default)]
    pub impact: Option<f32>,
    /// All must hold for the rule to apply
    #[serde(default)]
    pub applicability: Vec<Applicability>,
    /// All must pass for the rule to pass
    pub assertions: Vec<Assertion>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Rule {
    pub fn new(id: impl Into<String>, title: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            severity,
            impact: None,
            applicability: Vec::new(),
            assertions: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_impact(mut self, impact: f32) -> Self {
        self.impact = Some(impact);
        self
    }

    pub fn only_if(mut self, condition: Applicability) -> Self {
        self.applicability.push(condition);
        self
    }

    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Impact when the rule applies
    pub fn impact(&self) -> f32 {
        self.impact.unwrap_or_else(|| self.severity.default_impact())
    }

    /// Facts needed to decide applicability
    pub fn applicability_facts(&self) -> BTreeSet<FactKey> {
        self.applicability
            .iter()
            .flat_map(Applicability::required_facts)
            .collect()
    }

    /// Facts needed by the assertions
    pub fn assertion_facts(&self) -> BTreeSet<FactKey> {
        self.assertions
            .iter()
            .flat_map(Assertion::required_facts)
            .collect()
    }

    /// Check structural validity
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| Error::InvalidRuleDefinition {
            path: self.id.clone(),
            message: message.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("rule id is empty"));
        }
        if self.assertions.is_empty() {
            return Err(invalid("rule has no assertions"));
        }
        if let Some(impact) = self.impact {
            if !(0.0..=1.0).contains(&impact) {
                return Err(invalid("impact must be between 0.0 and 1.0"));
            }
        }
        Ok(())
    }
}
