//! Parsers for the host configuration formats the collectors read

use forgestig_core::{AuditRule, ChronyConfig, ConfigParams, TimeSource};
use regex::Regex;
use std::sync::OnceLock;

/// Parse a `key = value` / `key value` settings file.
///
/// Lines starting with `#` or `;` are comments and are ignored, so a
/// commented-out setting is reported as absent. Every occurrence of a key
/// is kept so duplicates can be detected.
pub fn parse_config(content: &str) -> ConfigParams {
    let mut params = ConfigParams::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => match line.split_once(char::is_whitespace) {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (line, ""),
            },
        };

        if !key.is_empty() {
            params.push(key, value.trim_matches('"'));
        }
    }

    params
}

fn field_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([A-Za-z0-9_]+)(!=|>=|<=|&=|=|>|<|&)(.*)$").ok())
        .as_ref()
}

/// `unset` and `4294967295` both mean "no login uid"
fn normalize_field(name: &str, op: &str, value: &str) -> String {
    let value = match (name, value) {
        ("auid", "unset" | "4294967295") => "-1",
        _ => value,
    };
    format!("{}{}{}", name, op, value)
}

/// Parse audit rules in `auditctl` syntax.
///
/// Syscall rules (`-a action,list ... -F path=... -F perm=... -k key`) and
/// watch rules (`-w path -p perms -k key`) are both returned. Control lines
/// such as `-D`, `-b` and `-e` are skipped.
pub fn parse_audit_rules(content: &str) -> Vec<AuditRule> {
    let mut rules = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let mut rule = AuditRule::default();
        let mut is_rule = false;

        while let Some(token) = tokens.next() {
            match token {
                "-a" | "-A" => {
                    is_rule = true;
                    if let Some(action_list) = tokens.next() {
                        // action and list may be given in either order
                        for part in action_list.split(',') {
                            match part {
                                "always" | "never" => rule.action = part.to_string(),
                                _ => rule.list = part.to_string(),
                            }
                        }
                    }
                }
                "-w" => {
                    is_rule = true;
                    rule.action = "always".into();
                    rule.list = "exit".into();
                    rule.path = tokens.next().map(str::to_string);
                }
                "-p" => {
                    if let Some(perms) = tokens.next() {
                        rule.permissions.push_str(perms);
                    }
                }
                "-k" => rule.key = tokens.next().map(str::to_string),
                "-F" => {
                    let Some(field) = tokens.next() else { continue };
                    let Some(caps) = field_pattern().and_then(|re| re.captures(field)) else {
                        rule.fields.push(field.to_string());
                        continue;
                    };
                    let (name, op, value) = (&caps[1], &caps[2], &caps[3]);
                    match (name, op) {
                        ("path" | "dir", "=") => rule.path = Some(value.to_string()),
                        ("perm", "=") => rule.permissions.push_str(value),
                        ("key", "=") => rule.key = Some(value.to_string()),
                        _ => rule.fields.push(normalize_field(name, op, value)),
                    }
                }
                "-S" | "-C" => {
                    tokens.next();
                }
                _ => {}
            }
        }

        if is_rule {
            rules.push(rule);
        }
    }

    rules
}

/// Parse the `server` directives of a chrony configuration
pub fn parse_chrony(content: &str) -> ChronyConfig {
    let mut config = ChronyConfig::default();

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with('!') || line.starts_with(';') {
            continue;
        }

        let mut parts = line.split_whitespace();
        if parts.next() != Some("server") {
            continue;
        }
        let Some(host) = parts.next() else { continue };

        let options: Vec<String> = parts.map(str::to_string).collect();
        let maxpoll = options
            .iter()
            .position(|o| o == "maxpoll")
            .and_then(|i| options.get(i + 1))
            .and_then(|v| v.parse().ok());

        config.servers.push(TimeSource {
            host: host.to_string(),
            options,
            maxpoll,
        });
    }

    config
}

/// Directives found for one module in a modprobe configuration file
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ModprobeDirectives {
    pub install_commands: Vec<String>,
    pub blacklisted: bool,
}

/// Extract the `install` and `blacklist` directives for `module`.
///
/// modprobe treats `-` and `_` in module names as equivalent.
pub fn parse_modprobe(content: &str, module: &str) -> ModprobeDirectives {
    let wanted = module.replace('-', "_");
    let mut directives = ModprobeDirectives::default();

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [directive, name, rest @ ..] = fields.as_slice() else { continue };
        if name.replace('-', "_") != wanted {
            continue;
        }

        match *directive {
            "install" => directives.install_commands.push(rest.join(" ")),
            "blacklist" => directives.blacklisted = true,
            _ => {}
        }
    }

    directives
}

/// Whether `module` appears in /proc/modules
pub fn module_loaded(proc_modules: &str, module: &str) -> bool {
    let wanted = module.replace('-', "_");
    proc_modules
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|name| name == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let params = parse_config(
            "# Default pwquality settings\n\
             # maxclassrepeat = 0\n\
             minlen = 15\n\
             maxclassrepeat=4\n\
             dictcheck 1\n\
             ; ignored\n\
             enforce_for_root\n",
        );
        assert_eq!(params.values("maxclassrepeat"), ["4"]);
        assert_eq!(params.values("minlen"), ["15"]);
        assert_eq!(params.values("dictcheck"), ["1"]);
        assert_eq!(params.values("enforce_for_root"), [""]);
        assert!(params.values("ignored").is_empty());
    }

    #[test]
    fn test_parse_config_keeps_duplicates() {
        let params = parse_config("maxclassrepeat = 4\nmaxclassrepeat = 0\n");
        assert_eq!(params.values("maxclassrepeat"), ["4", "0"]);
    }

    #[test]
    fn test_parse_syscall_audit_rule() {
        let rules = parse_audit_rules(
            "-D\n-b 8192\n\
             -a always,exit -F path=/usr/bin/passwd -F perm=x -F auid>=1000 -F auid!=unset -k privileged-passwd\n",
        );
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.action, "always");
        assert_eq!(rule.list, "exit");
        assert_eq!(rule.path.as_deref(), Some("/usr/bin/passwd"));
        assert_eq!(rule.permissions, "x");
        assert_eq!(rule.fields, vec!["auid>=1000", "auid!=-1"]);
        assert_eq!(rule.key.as_deref(), Some("privileged-passwd"));
    }

    #[test]
    fn test_parse_audit_rule_reversed_and_numeric_auid() {
        let rules = parse_audit_rules(
            "-a exit,always -F arch=b64 -S execve -F path=/usr/bin/passwd -F perm=x -F auid!=4294967295 -F key=passwd\n",
        );
        let rule = &rules[0];
        assert_eq!(rule.action, "always");
        assert_eq!(rule.list, "exit");
        assert_eq!(rule.fields, vec!["arch=b64", "auid!=-1"]);
        assert_eq!(rule.key.as_deref(), Some("passwd"));
    }

    #[test]
    fn test_parse_watch_rule() {
        let rules = parse_audit_rules("-w /etc/passwd -p wa -k identity\n");
        assert_eq!(rules[0].path.as_deref(), Some("/etc/passwd"));
        assert_eq!(rules[0].permissions, "wa");
        assert_eq!(rules[0].key.as_deref(), Some("identity"));
    }

    #[test]
    fn test_parse_chrony() {
        let config = parse_chrony(
            "# server 3.us.pool.ntp.mil iburst\n\
             server 0.us.pool.ntp.mil iburst maxpoll 16\n\
             server 1.us.pool.ntp.mil iburst\n\
             pool 2.rhel.pool.ntp.org iburst\n\
             driftfile /var/lib/chrony/drift\n",
        );
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].maxpoll, Some(16));
        assert_eq!(config.servers[1].maxpoll, None);
        assert_eq!(config.servers[1].effective_maxpoll(), 10);
        assert!(config.server("3.us.pool.ntp.mil").is_none());
    }

    #[test]
    fn test_parse_modprobe() {
        let directives = parse_modprobe(
            "# disable sctp\ninstall sctp /bin/false\nblacklist sctp\nblacklist dccp\n",
            "sctp",
        );
        assert_eq!(directives.install_commands, vec!["/bin/false"]);
        assert!(directives.blacklisted);

        let other = parse_modprobe("install usb-storage /bin/true\n", "usb_storage");
        assert_eq!(other.install_commands, vec!["/bin/true"]);
        assert!(!other.blacklisted);
    }

    #[test]
    fn test_module_loaded() {
        let proc_modules = "sctp 409600 4 - Live 0x0000000000000000\n\
                            libcrc32c 16384 3 sctp,xfs, Live 0x0000000000000000\n";
        assert!(module_loaded(proc_modules, "sctp"));
        assert!(!module_loaded(proc_modules, "dccp"));
    }
}
