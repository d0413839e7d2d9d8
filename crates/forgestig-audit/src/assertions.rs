//! Assertion predicates - pure functions from facts and inputs to an outcome

use forgestig_core::{
    Assertion, AssertionOutcome, AuditRule, CommandSpec, FactSet, Inputs, Param,
};
use std::collections::BTreeSet;

/// Evaluate one assertion. Never panics; unusable facts or inputs give Error.
pub fn evaluate_assertion(assertion: &Assertion, facts: &FactSet, inputs: &Inputs) -> AssertionOutcome {
    let described = assertion.describe();
    match assertion {
        Assertion::ConfigThreshold { file, key, min, max } => {
            config_threshold(described, facts, inputs, file, key, min.as_ref(), max.as_ref())
        }
        Assertion::ConfigEquals {
            file,
            key,
            expected,
        } => config_equals(described, facts, inputs, file, key, expected),
        Assertion::OutputContainsToken { command, token } => {
            output_contains_token(described, facts, inputs, command, token)
        }
        Assertion::AuditRule {
            rules_file,
            path,
            permission,
            key,
        } => audit_rule(described, facts, rules_file, path, permission, key),
        Assertion::ModuleDisabled { module } => match facts.kernel_module(module) {
            Err(e) => AssertionOutcome::error(described, e.to_string()),
            Ok(state) if state.is_disabled() => AssertionOutcome::pass(
                described,
                format!("install {} {}", module, state.install_commands.join(", ")),
            ),
            Ok(state) => {
                let mut message = format!("no `install {} /bin/false` directive", module);
                if state.loaded == Some(true) {
                    message.push_str(&format!(" and {} is currently loaded", module));
                }
                AssertionOutcome::fail(described, message)
            }
        },
        Assertion::ModuleBlacklisted { module } => match facts.kernel_module(module) {
            Err(e) => AssertionOutcome::error(described, e.to_string()),
            Ok(state) if state.blacklisted => {
                AssertionOutcome::pass(described, format!("blacklist {}", module))
            }
            Ok(_) => AssertionOutcome::fail(described, format!("no `blacklist {}` directive", module)),
        },
        Assertion::TimeSourceConfigured { config } => match facts.chrony(config) {
            Err(e) => AssertionOutcome::error(described, e.to_string()),
            Ok(chrony) if chrony.servers.is_empty() => {
                AssertionOutcome::fail(described, format!("no server directive in {}", config))
            }
            Ok(chrony) => AssertionOutcome::pass(
                described,
                format!("{} server directive(s) in {}", chrony.servers.len(), config),
            ),
        },
        Assertion::AuthoritativeTimeServers {
            config,
            servers,
            exact,
            max_poll,
        } => authoritative_time_servers(described, facts, inputs, config, servers, exact, *max_poll),
    }
}

/// The single value of `key`; absent or repeated keys are failures
fn single_value<'a>(values: &'a [String], key: &str, file: &str) -> Result<&'a str, String> {
    match values {
        [] => Err(format!("{} is not set in {}", key, file)),
        [value] => Ok(value.as_str()),
        many => Err(format!(
            "{} is set {} times in {} with conflicting values ({})",
            key,
            many.len(),
            file,
            many.join(", ")
        )),
    }
}

fn config_threshold(
    described: String,
    facts: &FactSet,
    inputs: &Inputs,
    file: &str,
    key: &str,
    min: Option<&Param<i64>>,
    max: Option<&Param<i64>>,
) -> AssertionOutcome {
    let bounds = min
        .map(|p| p.resolve(inputs))
        .transpose()
        .and_then(|min| Ok((min, max.map(|p| p.resolve(inputs)).transpose()?)));
    let (min, max) = match bounds {
        Ok(bounds) => bounds,
        Err(e) => return AssertionOutcome::error(described, e.to_string()),
    };

    let params = match facts.config(file) {
        Ok(params) => params,
        Err(e) => return AssertionOutcome::error(described, e.to_string()),
    };
    let raw = match single_value(params.values(key), key, file) {
        Ok(raw) => raw,
        Err(message) => return AssertionOutcome::fail(described, message),
    };
    let Ok(value) = raw.parse::<i64>() else {
        return AssertionOutcome::fail(described, format!("{} = {:?} is not an integer", key, raw));
    };

    if let Some(min) = min.filter(|min| value < *min) {
        return AssertionOutcome::fail(described, format!("{} = {} is below {}", key, value, min));
    }
    if let Some(max) = max.filter(|max| value > *max) {
        return AssertionOutcome::fail(described, format!("{} = {} exceeds {}", key, value, max));
    }
    AssertionOutcome::pass(described, format!("{} = {}", key, value))
}

fn config_equals(
    described: String,
    facts: &FactSet,
    inputs: &Inputs,
    file: &str,
    key: &str,
    expected: &Param<String>,
) -> AssertionOutcome {
    let expected = match expected.resolve(inputs) {
        Ok(expected) => expected,
        Err(e) => return AssertionOutcome::error(described, e.to_string()),
    };
    let params = match facts.config(file) {
        Ok(params) => params,
        Err(e) => return AssertionOutcome::error(described, e.to_string()),
    };
    match single_value(params.values(key), key, file) {
        Err(message) => AssertionOutcome::fail(described, message),
        Ok(value) if value == expected => AssertionOutcome::pass(described, format!("{} = {}", key, value)),
        Ok(value) => AssertionOutcome::fail(
            described,
            format!("{} = {:?}, expected {:?}", key, value, expected),
        ),
    }
}

fn output_contains_token(
    described: String,
    facts: &FactSet,
    inputs: &Inputs,
    command: &CommandSpec,
    token: &Param<String>,
) -> AssertionOutcome {
    let token = match token.resolve(inputs) {
        Ok(token) => token,
        Err(e) => return AssertionOutcome::error(described, e.to_string()),
    };
    match facts.command(command) {
        Err(e) => AssertionOutcome::error(described, e.to_string()),
        Ok(output) if output.stdout_tokens().any(|t| t == token) => {
            AssertionOutcome::pass(described, format!("{} found in output", token))
        }
        Ok(_) => AssertionOutcome::fail(
            described,
            format!("{} not found in output of `{}`", token, command),
        ),
    }
}

fn audit_rule(
    described: String,
    facts: &FactSet,
    rules_file: &str,
    path: &str,
    permission: &str,
    key: &str,
) -> AssertionOutcome {
    let rules = match facts.audit_rules(rules_file) {
        Ok(rules) => rules,
        Err(e) => return AssertionOutcome::error(described, e.to_string()),
    };
    let matching: Vec<&AuditRule> = rules
        .iter()
        .filter(|r| r.path.as_deref() == Some(path))
        .collect();
    if matching.is_empty() {
        return AssertionOutcome::fail(described, format!("no audit rule for {} in {}", path, rules_file));
    }

    let mut problems = Vec::new();

    let permissions: String = matching.iter().map(|r| r.permissions.as_str()).collect();
    if !permission.chars().all(|p| permissions.contains(p)) {
        problems.push(format!("permissions {:?} do not include {:?}", permissions, permission));
    }

    let actions: BTreeSet<&str> = matching.iter().map(|r| r.action.as_str()).collect();
    if actions != BTreeSet::from(["always"]) {
        problems.push(format!("actions are {:?}, expected only always", actions));
    }

    let lists: BTreeSet<&str> = matching.iter().map(|r| r.list.as_str()).collect();
    if lists != BTreeSet::from(["exit"]) {
        problems.push(format!("lists are {:?}, expected only exit", lists));
    }

    for field in ["auid>=1000", "auid!=-1"] {
        if !matching.iter().any(|r| r.fields.iter().any(|f| f == field)) {
            problems.push(format!("missing field {}", field));
        }
    }

    let keys: BTreeSet<Option<&str>> = matching.iter().map(|r| r.key.as_deref()).collect();
    if keys != BTreeSet::from([Some(key)]) {
        problems.push(format!("keys are {:?}, expected {}", keys, key));
    }

    if problems.is_empty() {
        AssertionOutcome::pass(
            described,
            format!("{} audit rule(s) for {} with key {}", matching.len(), path, key),
        )
    } else {
        AssertionOutcome::fail(described, format!("audit rule for {}: {}", path, problems.join(", ")))
    }
}

fn authoritative_time_servers(
    described: String,
    facts: &FactSet,
    inputs: &Inputs,
    config: &str,
    servers: &Param<Vec<String>>,
    exact: &Param<bool>,
    max_poll: i64,
) -> AssertionOutcome {
    let resolved = servers
        .resolve(inputs)
        .and_then(|servers| Ok((servers, exact.resolve(inputs)?)));
    let (servers, exact) = match resolved {
        Ok(resolved) => resolved,
        Err(e) => return AssertionOutcome::error(described, e.to_string()),
    };
    if servers.is_empty() {
        return AssertionOutcome::error(described, "no authoritative time servers are listed");
    }

    let chrony = match facts.chrony(config) {
        Ok(chrony) => chrony,
        Err(e) => return AssertionOutcome::error(described, e.to_string()),
    };

    let (good, bad): (Vec<&String>, Vec<&String>) = servers.iter().partition(|host| {
        chrony
            .server(host)
            .map(|s| s.effective_maxpoll() <= max_poll)
            .unwrap_or(false)
    });

    let satisfied = if exact { bad.is_empty() } else { !good.is_empty() };
    if satisfied {
        let hosts: Vec<&str> = good.iter().map(|s| s.as_str()).collect();
        AssertionOutcome::pass(described, format!("using {}", hosts.join(", ")))
    } else {
        let missing: Vec<String> = bad
            .iter()
            .map(|host| match chrony.server(host) {
                Some(s) => format!("{} (maxpoll {})", host, s.effective_maxpoll()),
                None => format!("{} (not configured)", host),
            })
            .collect();
        let qualifier = if exact { "all of" } else { "any of" };
        AssertionOutcome::fail(
            described,
            format!(
                "{} the authoritative servers must be used with maxpoll <= {}: {}",
                qualifier,
                max_poll,
                missing.join(", ")
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{parse_audit_rules, parse_chrony, parse_config};
    use forgestig_core::{CollectError, CommandOutput, Fact, FactKey, Verdict};

    const PWQUALITY: &str = "/etc/security/pwquality.conf";

    fn threshold() -> Assertion {
        Assertion::ConfigThreshold {
            file: PWQUALITY.into(),
            key: "maxclassrepeat".into(),
            min: Some(Param::Value(1)),
            max: Some(Param::input("maxclassrepeat")),
        }
    }

    fn inputs() -> Inputs {
        Inputs::new()
            .with("maxclassrepeat", 4)
            .with(
                "servers",
                serde_json::json!(["0.us.pool.ntp.mil", "1.us.pool.ntp.mil"]),
            )
    }

    fn config_facts(content: &str) -> FactSet {
        let mut facts = FactSet::new();
        facts.insert(
            FactKey::Config { path: PWQUALITY.into() },
            Fact::Config(parse_config(content)),
        );
        facts
    }

    fn verdict(assertion: &Assertion, facts: &FactSet) -> Verdict {
        evaluate_assertion(assertion, facts, &inputs()).verdict
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(verdict(&threshold(), &config_facts("maxclassrepeat = 4\n")), Verdict::Pass);
        assert_eq!(verdict(&threshold(), &config_facts("maxclassrepeat = 1\n")), Verdict::Pass);
        assert_eq!(verdict(&threshold(), &config_facts("maxclassrepeat = 5\n")), Verdict::Fail);
        assert_eq!(verdict(&threshold(), &config_facts("maxclassrepeat = 0\n")), Verdict::Fail);
        assert_eq!(verdict(&threshold(), &config_facts("maxclassrepeat = four\n")), Verdict::Fail);
    }

    #[test]
    fn test_threshold_absent_commented_duplicated() {
        assert_eq!(verdict(&threshold(), &config_facts("minlen = 15\n")), Verdict::Fail);
        assert_eq!(verdict(&threshold(), &config_facts("# maxclassrepeat = 4\n")), Verdict::Fail);

        let outcome = evaluate_assertion(
            &threshold(),
            &config_facts("maxclassrepeat = 4\nmaxclassrepeat = 4\n"),
            &inputs(),
        );
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.message.contains("set 2 times"));
    }

    #[test]
    fn test_threshold_unreadable_and_missing() {
        let mut facts = FactSet::new();
        facts.insert_error(
            FactKey::Config { path: PWQUALITY.into() },
            CollectError::PermissionDenied { path: PWQUALITY.into() },
        );
        assert_eq!(verdict(&threshold(), &facts), Verdict::Error);
        assert_eq!(verdict(&threshold(), &FactSet::new()), Verdict::Error);
    }

    #[test]
    fn test_threshold_missing_input() {
        let outcome = evaluate_assertion(&threshold(), &config_facts("maxclassrepeat = 4\n"), &Inputs::new());
        assert_eq!(outcome.verdict, Verdict::Error);
        assert!(outcome.message.contains("maxclassrepeat"));
    }

    #[test]
    fn test_config_equals() {
        let assertion = Assertion::ConfigEquals {
            file: PWQUALITY.into(),
            key: "dictcheck".into(),
            expected: Param::Value("1".into()),
        };
        assert_eq!(verdict(&assertion, &config_facts("dictcheck = 1\n")), Verdict::Pass);
        assert_eq!(verdict(&assertion, &config_facts("dictcheck = 0\n")), Verdict::Fail);
    }

    #[test]
    fn test_token_presence_is_order_independent() {
        let command = CommandSpec::shell("grep -i idle /etc/dconf/db/local.d/locks/*");
        let assertion = Assertion::OutputContainsToken {
            command: command.clone(),
            token: Param::Value("/org/gnome/desktop/session/idle-delay".into()),
        };

        for stdout in [
            "/org/gnome/desktop/session/idle-delay\n/org/gnome/desktop/screensaver/idle-activation-enabled\n",
            "/org/gnome/desktop/screensaver/idle-activation-enabled\n/org/gnome/desktop/session/idle-delay\n",
        ] {
            let mut facts = FactSet::new();
            facts.insert(
                FactKey::Command(command.clone()),
                Fact::Command(CommandOutput { stdout: stdout.into(), ..Default::default() }),
            );
            assert_eq!(verdict(&assertion, &facts), Verdict::Pass);
        }

        let mut facts = FactSet::new();
        facts.insert(
            FactKey::Command(command.clone()),
            Fact::Command(CommandOutput {
                stdout: "/org/gnome/desktop/session/idle-delay-extra\n".into(),
                ..Default::default()
            }),
        );
        assert_eq!(verdict(&assertion, &facts), Verdict::Fail);
    }

    fn audit_facts(content: &str) -> FactSet {
        let mut facts = FactSet::new();
        facts.insert(
            FactKey::AuditRules { path: "/etc/audit/audit.rules".into() },
            Fact::AuditRules(parse_audit_rules(content)),
        );
        facts
    }

    fn passwd_rule() -> Assertion {
        Assertion::AuditRule {
            rules_file: "/etc/audit/audit.rules".into(),
            path: "/usr/bin/passwd".into(),
            permission: "x".into(),
            key: "privileged-passwd".into(),
        }
    }

    #[test]
    fn test_audit_rule() {
        let good = "-a always,exit -F path=/usr/bin/passwd -F perm=x -F auid>=1000 -F auid!=unset -k privileged-passwd\n";
        assert_eq!(verdict(&passwd_rule(), &audit_facts(good)), Verdict::Pass);

        let wrong_key = "-a always,exit -F path=/usr/bin/passwd -F perm=x -F auid>=1000 -F auid!=unset -k passwd\n";
        let outcome = evaluate_assertion(&passwd_rule(), &audit_facts(wrong_key), &inputs());
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.message.contains("keys are"));

        let no_auid = "-a always,exit -F path=/usr/bin/passwd -F perm=x -k privileged-passwd\n";
        let outcome = evaluate_assertion(&passwd_rule(), &audit_facts(no_auid), &inputs());
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.message.contains("auid>=1000"));

        assert_eq!(verdict(&passwd_rule(), &audit_facts("-D\n")), Verdict::Fail);
    }

    fn module_facts(install: &[&str], blacklisted: bool) -> FactSet {
        let mut facts = FactSet::new();
        facts.insert(
            FactKey::KernelModule { name: "sctp".into() },
            Fact::KernelModule(forgestig_core::ModuleState {
                name: "sctp".into(),
                loaded: Some(false),
                install_commands: install.iter().map(|s| s.to_string()).collect(),
                blacklisted,
            }),
        );
        facts
    }

    #[test]
    fn test_module_assertions() {
        let disabled = Assertion::ModuleDisabled { module: "sctp".into() };
        let blacklisted = Assertion::ModuleBlacklisted { module: "sctp".into() };

        let facts = module_facts(&["/bin/true"], true);
        assert_eq!(verdict(&disabled, &facts), Verdict::Pass);
        assert_eq!(verdict(&blacklisted, &facts), Verdict::Pass);

        let facts = module_facts(&["/sbin/modprobe --ignore-install sctp"], false);
        assert_eq!(verdict(&disabled, &facts), Verdict::Fail);
        assert_eq!(verdict(&blacklisted, &facts), Verdict::Fail);
    }

    fn chrony_facts(content: &str) -> FactSet {
        let mut facts = FactSet::new();
        facts.insert(
            FactKey::Chrony { path: "/etc/chrony.conf".into() },
            Fact::Chrony(parse_chrony(content)),
        );
        facts
    }

    fn time_servers(exact: bool) -> Assertion {
        Assertion::AuthoritativeTimeServers {
            config: "/etc/chrony.conf".into(),
            servers: Param::input("servers"),
            exact: Param::Value(exact),
            max_poll: 16,
        }
    }

    #[test]
    fn test_time_sources() {
        let configured = Assertion::TimeSourceConfigured { config: "/etc/chrony.conf".into() };
        assert_eq!(verdict(&configured, &chrony_facts("pool 2.rhel.pool.ntp.org\n")), Verdict::Fail);

        let one = chrony_facts("server 0.us.pool.ntp.mil iburst maxpoll 16\n");
        assert_eq!(verdict(&configured, &one), Verdict::Pass);
        assert_eq!(verdict(&time_servers(false), &one), Verdict::Pass);
        assert_eq!(verdict(&time_servers(true), &one), Verdict::Fail);

        let slow = chrony_facts("server 0.us.pool.ntp.mil maxpoll 17\nserver 1.us.pool.ntp.mil maxpoll 17\n");
        assert_eq!(verdict(&time_servers(false), &slow), Verdict::Fail);

        let both = chrony_facts("server 0.us.pool.ntp.mil\nserver 1.us.pool.ntp.mil maxpoll 16\n");
        assert_eq!(verdict(&time_servers(true), &both), Verdict::Pass);
    }

    #[test]
    fn test_time_servers_empty_input_is_error() {
        let inputs = Inputs::new().with("servers", serde_json::json!([]));
        let outcome = evaluate_assertion(&time_servers(true), &chrony_facts("server a\n"), &inputs);
        assert_eq!(outcome.verdict, Verdict::Error);
    }
}
