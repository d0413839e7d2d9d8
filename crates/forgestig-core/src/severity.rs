//! Severity levels

use serde::{Deserialize, Serialize};

/// Severity level of a rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No impact (rule not applicable, informational)
    #[default]
    None,
    /// CAT III
    Low,
    /// CAT II
    Medium,
    /// CAT I
    High,
}

impl Severity {
    /// Default impact score for this severity
    pub fn default_impact(&self) -> f32 {
        match self {
            Severity::None => 0.0,
            Severity::Low => 0.3,
            Severity::Medium => 0.5,
            Severity::High => 0.7,
        }
    }

    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Parse a severity name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "info" => Some(Severity::None),
            "low" | "cat3" | "cat-iii" => Some(Severity::Low),
            "medium" | "cat2" | "cat-ii" => Some(Severity::Medium),
            "high" | "cat1" | "cat-i" => Some(Severity::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
