//! YAML-based rule definitions

use forgestig_core::{Error, Result, Rule};

/// Parse and validate a single rule from YAML
pub fn parse_rule_yaml(yaml: &str) -> Result<Rule> {
    let rule: Rule = serde_yaml::from_str(yaml).map_err(|e| Error::Parse(e.to_string()))?;
    rule.validate()?;
    Ok(rule)
}

/// Render a rule as YAML, e.g. to use a built-in control as a template
pub fn rule_to_yaml(rule: &Rule) -> Result<String> {
    serde_yaml::to_string(rule).map_err(|e| Error::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgestig_core::{Applicability, Assertion, Param, Severity};

    #[test]
    fn test_parse_yaml_rule() {
        let yaml = r#"
id: "SV-230363"
title: "RHEL 8 must require the change of at least eight characters when passwords are changed"
severity: medium
applicability:
  - type: not-in-container
assertions:
  - type: config-threshold
    file: /etc/security/pwquality.conf
    key: difok
    min: 8
"#;

        let rule = parse_rule_yaml(yaml).unwrap();
        assert_eq!(rule.id, "SV-230363");
        assert_eq!(rule.severity, Severity::Medium);
        assert_eq!(rule.impact(), 0.5);
        assert!(rule.enabled);
        assert_eq!(rule.applicability, vec![Applicability::NotInContainer]);
        assert_eq!(
            rule.assertions,
            vec![Assertion::ConfigThreshold {
                file: "/etc/security/pwquality.conf".into(),
                key: "difok".into(),
                min: Some(Param::Value(8)),
                max: None,
            }]
        );
    }

    #[test]
    fn test_parse_input_reference_and_defaults() {
        let yaml = r#"
id: "NTP-1"
title: "time servers"
severity: low
impact: 0.2
assertions:
  - type: authoritative-time-servers
    servers:
      input: authoritative_timeservers
  - type: audit-rule
    path: /usr/bin/su
    key: privileged-priv_change
"#;
        let rule = parse_rule_yaml(yaml).unwrap();
        assert_eq!(rule.impact(), 0.2);
        match &rule.assertions[0] {
            Assertion::AuthoritativeTimeServers {
                config,
                servers,
                exact,
                max_poll,
            } => {
                assert_eq!(config, "/etc/chrony.conf");
                assert_eq!(servers, &Param::input("authoritative_timeservers"));
                assert_eq!(exact, &Param::Value(false));
                assert_eq!(*max_poll, 16);
            }
            other => panic!("unexpected assertion {:?}", other),
        }
        match &rule.assertions[1] {
            Assertion::AuditRule {
                rules_file,
                permission,
                ..
            } => {
                assert_eq!(rules_file, "/etc/audit/audit.rules");
                assert_eq!(permission, "x");
            }
            other => panic!("unexpected assertion {:?}", other),
        }
    }

    #[test]
    fn test_rejects_rule_without_assertions() {
        let yaml = "id: X\ntitle: nothing\nseverity: low\nassertions: []\n";
        let err = parse_rule_yaml(yaml).unwrap_err();
        assert_eq!(err.code(), "INVALID_RULE_DEF");
    }

    #[test]
    fn test_rejects_unknown_assertion_type() {
        let yaml = "id: X\ntitle: t\nseverity: low\nassertions:\n  - type: registry-value\n";
        assert_eq!(parse_rule_yaml(yaml).unwrap_err().code(), "PARSE_ERROR");
    }

    #[test]
    fn test_builtin_rules_round_trip_through_yaml() {
        for rule in crate::controls::rhel8_rules() {
            let yaml = rule_to_yaml(&rule).unwrap();
            assert_eq!(parse_rule_yaml(&yaml).unwrap(), rule, "{}", rule.id);
        }
    }
}
