//! Rule registry - index of all available rules

use forgestig_core::{Rule, Severity};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Registry of rules, ordered by ID
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<String, Arc<Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in RHEL 8 controls
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for rule in crate::controls::rhel8_rules() {
            registry.register(rule);
        }
        registry
    }

    /// Register a rule; a rule with the same ID is replaced
    pub fn register(&mut self, rule: Rule) -> Option<Arc<Rule>> {
        let id = rule.id.clone();
        let previous = self.rules.insert(id.clone(), Arc::new(rule));
        if previous.is_some() {
            warn!("Rule {} registered twice, keeping the latest definition", id);
        }
        previous
    }

    /// Register every rule from another registry
    pub fn extend(&mut self, other: RuleRegistry) {
        for (_, rule) in other.rules {
            self.register(Arc::unwrap_or_clone(rule));
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Rule>> {
        self.rules.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(|s| s.as_str())
    }

    pub fn all(&self) -> impl Iterator<Item = Arc<Rule>> + '_ {
        self.rules.values().cloned()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Mark a rule disabled; returns false if the ID is unknown
    pub fn disable(&mut self, id: &str) -> bool {
        match self.rules.get_mut(id) {
            Some(rule) => {
                Arc::make_mut(rule).enabled = false;
                true
            }
            None => false,
        }
    }

    /// Enabled rules
    pub fn enabled(&self) -> Vec<Arc<Rule>> {
        self.rules.values().filter(|r| r.enabled).cloned().collect()
    }

    /// Rules at or above a severity
    pub fn by_min_severity(&self, min_severity: Severity) -> Vec<Arc<Rule>> {
        self.rules
            .values()
            .filter(|r| r.severity >= min_severity)
            .cloned()
            .collect()
    }

    /// Keep only the given IDs
    pub fn retain_ids(&mut self, ids: &[String]) {
        self.rules.retain(|id, _| ids.iter().any(|keep| keep == id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgestig_core::{Assertion, Severity};

    fn rule(id: &str, severity: Severity) -> Rule {
        Rule::new(id, "Test Rule", severity).assert(Assertion::ModuleBlacklisted {
            module: "sctp".into(),
        })
    }

    #[test]
    fn test_registry() {
        let mut registry = RuleRegistry::new();
        assert!(registry.register(rule("TEST-002", Severity::Low)).is_none());
        assert!(registry.register(rule("TEST-001", Severity::High)).is_none());

        assert_eq!(registry.len(), 2);
        assert!(registry.get("TEST-001").is_some());
        assert!(registry.get("INVALID").is_none());
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["TEST-001", "TEST-002"]);
        assert_eq!(registry.by_min_severity(Severity::Medium).len(), 1);
    }

    #[test]
    fn test_duplicate_replaces() {
        let mut registry = RuleRegistry::new();
        registry.register(rule("TEST-001", Severity::Low));
        let previous = registry.register(rule("TEST-001", Severity::High));
        assert_eq!(previous.map(|r| r.severity), Some(Severity::Low));
        assert_eq!(registry.get("TEST-001").map(|r| r.severity), Some(Severity::High));
    }

    #[test]
    fn test_disable_and_select() {
        let mut registry = RuleRegistry::builtin();
        assert!(registry.disable("SV-244538"));
        assert!(!registry.disable("SV-000000"));
        assert_eq!(registry.enabled().len(), registry.len() - 1);

        registry.retain_ids(&["SV-230360".to_string(), "SV-230496".to_string()]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("SV-230496").is_some());
        assert!(registry.get("SV-244538").is_none());
    }
}
