//! Built-in RHEL 8 STIG controls

use forgestig_core::{Applicability, Assertion, CommandSpec, Inputs, Param, Rule, Severity};

pub const PWQUALITY_CONF: &str = "/etc/security/pwquality.conf";
pub const XSESSIONS_DIR: &str = "/usr/share/xsessions";
pub const IDLE_DELAY_LOCK: &str = "/org/gnome/desktop/session/idle-delay";
pub const DCONF_LOCKS_DIR: &str = "/etc/dconf/db/local.d/locks";

/// Search the dconf lock files for idle settings.
///
/// `-h` drops the `file:` prefix grep adds when the glob matches several files.
pub fn idle_lock_command(locks_dir: &str) -> CommandSpec {
    CommandSpec::shell(format!("grep -h -i idle {}/*", locks_dir.trim_end_matches('/')))
}

/// Default values for the inputs the built-in controls reference
pub fn default_inputs() -> Inputs {
    Inputs::new()
        .with("maxclassrepeat", 4)
        .with(
            "authoritative_timeservers",
            serde_json::json!(["0.us.pool.ntp.mil", "1.us.pool.ntp.mil", "2.us.pool.ntp.mil"]),
        )
        .with("authoritative_timeservers_exact", false)
}

/// Built-in STIG controls for Red Hat Enterprise Linux 8
pub fn rhel8_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "SV-230360",
            "RHEL 8 must limit repeating characters of the same character class to four when passwords are changed",
            Severity::Medium,
        )
        .with_description("pwquality maxclassrepeat must be set once, non-zero and no greater than the site value")
        .assert(Assertion::ConfigThreshold {
            file: PWQUALITY_CONF.into(),
            key: "maxclassrepeat".into(),
            // 0 disables the check entirely
            min: Some(Param::Value(1)),
            max: Some(Param::input("maxclassrepeat")),
        }),
        Rule::new(
            "SV-230422",
            "Successful/unsuccessful uses of the passwd command in RHEL 8 must generate an audit record",
            Severity::Medium,
        )
        .only_if(Applicability::NotInContainer)
        .assert(Assertion::AuditRule {
            rules_file: "/etc/audit/audit.rules".into(),
            path: "/usr/bin/passwd".into(),
            permission: "x".into(),
            key: "privileged-passwd".into(),
        }),
        Rule::new(
            "SV-230484",
            "RHEL 8 must securely compare internal information system clocks at least every 24 hours with an authoritative time source",
            Severity::Medium,
        )
        .only_if(Applicability::NotInContainer)
        .assert(Assertion::TimeSourceConfigured {
            config: "/etc/chrony.conf".into(),
        })
        .assert(Assertion::AuthoritativeTimeServers {
            config: "/etc/chrony.conf".into(),
            servers: Param::input("authoritative_timeservers"),
            exact: Param::input("authoritative_timeservers_exact"),
            max_poll: 16,
        }),
        Rule::new(
            "SV-230496",
            "RHEL 8 must disable the stream control transmission protocol (SCTP)",
            Severity::Low,
        )
        .only_if(Applicability::NotInContainer)
        .assert(Assertion::ModuleDisabled {
            module: "sctp".into(),
        })
        .assert(Assertion::ModuleBlacklisted {
            module: "sctp".into(),
        }),
        Rule::new(
            "SV-244538",
            "RHEL 8 must prevent a user from overriding the session idle-delay setting for the graphical user interface",
            Severity::Medium,
        )
        .only_if(Applicability::NotInContainer)
        .only_if(Applicability::DirectoryNotEmpty {
            path: XSESSIONS_DIR.into(),
        })
        .assert(Assertion::OutputContainsToken {
            command: idle_lock_command(DCONF_LOCKS_DIR),
            token: Param::Value(IDLE_DELAY_LOCK.into()),
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgestig_core::FactKey;

    #[test]
    fn test_builtin_rules_are_valid() {
        let rules = rhel8_rules();
        assert_eq!(rules.len(), 5);
        for rule in &rules {
            assert!(rule.validate().is_ok(), "{} is invalid", rule.id);
            assert!(rule.enabled);
        }
    }

    #[test]
    fn test_builtin_inputs_resolve() {
        let inputs = default_inputs();
        for rule in rhel8_rules() {
            for assertion in &rule.assertions {
                match assertion {
                    Assertion::ConfigThreshold { max: Some(max), .. } => {
                        assert_eq!(max.resolve(&inputs).unwrap(), 4);
                    }
                    Assertion::AuthoritativeTimeServers { servers, exact, .. } => {
                        assert_eq!(servers.resolve(&inputs).unwrap().len(), 3);
                        assert!(!exact.resolve(&inputs).unwrap());
                    }
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn test_gui_rule_needs_xsessions_fact() {
        let rule = rhel8_rules()
            .into_iter()
            .find(|r| r.id == "SV-244538")
            .unwrap();
        assert!(rule.applicability_facts().contains(&FactKey::Directory {
            path: XSESSIONS_DIR.into()
        }));
        assert_eq!(rule.impact(), 0.5);
    }

    #[test]
    fn test_idle_lock_command_omits_file_names() {
        let cmd = idle_lock_command("/etc/dconf/db/local.d/locks/");
        assert_eq!(cmd.args, vec!["-c", "grep -h -i idle /etc/dconf/db/local.d/locks/*"]);
    }

    #[test]
    fn test_sctp_is_low_impact() {
        let rule = rhel8_rules()
            .into_iter()
            .find(|r| r.id == "SV-230496")
            .unwrap();
        assert_eq!(rule.impact(), 0.3);
        assert_eq!(rule.assertion_facts().len(), 1);
    }
}
