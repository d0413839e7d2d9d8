//! ForgeSTIG Agent - runs STIG compliance rules against the local host
//!
//! The agent loads the built-in RHEL 8 controls and any YAML rule files,
//! collects the host facts those rules need and reports a verdict per rule.
//!
//! Exit status: 0 when every rule passed or was not applicable, 1 when any
//! rule failed, 2 when rules errored but none failed.

use anyhow::{bail, Context, Result};
use clap::Parser;
use forgestig_audit::{Auditor, FactCollector, LocalHost, ReportFilter};
use forgestig_checks::{default_inputs, load_rules_from_dir, rule_to_yaml, RuleRegistry};
use forgestig_common::logging::{LogConfig, LogFormat};
use forgestig_common::Config;
use forgestig_core::{Inputs, Severity};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// ForgeSTIG compliance agent
#[derive(Parser, Debug)]
#[command(name = "forgestig-agent")]
#[command(author = "Forge Cyber Defense")]
#[command(version)]
#[command(about = "Evaluate STIG compliance rules on the local host", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,

    /// Output format for results (json, text, table)
    #[arg(long, default_value = "text")]
    format: String,

    /// Only show failed and errored rules
    #[arg(long)]
    failures_only: bool,

    /// Filter by minimum severity (low, medium, high)
    #[arg(long)]
    min_severity: Option<String>,

    /// Directory of YAML rule definitions
    #[arg(long)]
    rules_dir: Option<String>,

    /// Evaluate only these rule IDs (repeatable)
    #[arg(long = "rule")]
    rules: Vec<String>,

    /// Override an input, e.g. maxclassrepeat=3 (repeatable, values parsed as JSON)
    #[arg(long = "input", value_name = "KEY=VALUE")]
    inputs: Vec<String>,

    /// Do not load the built-in RHEL 8 controls
    #[arg(long)]
    no_builtin: bool,

    /// List the selected rules and exit
    #[arg(long)]
    list_rules: bool,

    /// Print the selected rules as YAML and exit
    #[arg(long)]
    dump_rules: bool,
}

fn default_config_path() -> String {
    String::from("/etc/forgestig/agent.toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = if std::path::Path::new(&config_path).exists() {
        Config::from_file(&config_path)?
    } else if args.config.is_some() {
        bail!("Config file not found: {}", config_path);
    } else {
        Config::default()
    };
    let config = config.merge_env();

    let mut log_config = LogConfig::from_settings(&config.logging);
    if let Some(level) = &args.log_level {
        log_config = log_config.level(level);
    }
    if let Some(format) = &args.log_format {
        log_config = log_config.format(LogFormat::from_name(format));
    }
    forgestig_common::init_logging_with_config(log_config);

    info!("ForgeSTIG Agent v{}", env!("CARGO_PKG_VERSION"));
    debug!("Using config {}", config_path);

    let registry = build_registry(&args, &config)?;
    if registry.is_empty() {
        bail!("No rules selected");
    }

    if args.list_rules {
        print_rule_list(&registry);
        return Ok(());
    }
    if args.dump_rules {
        for rule in registry.all() {
            print!("---\n{}", rule_to_yaml(&rule)?);
        }
        return Ok(());
    }

    let inputs = build_inputs(&args, &config)?;
    let collector = FactCollector::new(Arc::new(LocalHost::new()))
        .with_timeout(Duration::from_millis(config.collector.timeout_ms))
        .with_concurrency(config.collector.concurrency)
        .with_modprobe_dirs(config.collector.modprobe_dirs.clone());

    let auditor = Auditor::new(registry, collector).with_inputs(inputs);
    let report = auditor.run_audit().await;

    let min_severity = match &args.min_severity {
        Some(s) => Some(Severity::parse(s).with_context(|| format!("Unknown severity: {}", s))?),
        None => None,
    };
    let filter = ReportFilter {
        failures_only: args.failures_only,
        min_severity,
    };

    match args.format.as_str() {
        "json" => println!("{}", report.to_json(filter)?),
        "table" => print!("{}", report.render_table(filter)),
        _ => print!("{}", report.render_text(filter)),
    }

    let code = report.exit_code();
    if code != 0 {
        warn!(
            "{} rules failed, {} rules errored",
            report.summary.failed, report.summary.errors
        );
        std::process::exit(code);
    }

    Ok(())
}

/// Built-in controls plus YAML rules, minus disabled ones, narrowed to --rule
fn build_registry(args: &Args, config: &Config) -> Result<RuleRegistry> {
    let mut registry = if config.audit.builtin_rules && !args.no_builtin {
        RuleRegistry::builtin()
    } else {
        RuleRegistry::new()
    };

    if let Some(dir) = args.rules_dir.as_ref().or(config.audit.rules_dir.as_ref()) {
        let loaded = load_rules_from_dir(dir)
            .with_context(|| format!("Failed to load rules from {}", dir))?;
        info!("Loaded {} rules from {}", loaded.len(), dir);
        registry.extend(loaded);
    }

    for id in &config.audit.disabled_rules {
        if !registry.disable(id) {
            warn!("Cannot disable unknown rule {}", id);
        }
    }

    if !args.rules.is_empty() {
        for id in &args.rules {
            if registry.get(id).is_none() {
                return Err(forgestig_core::Error::RuleNotFound {
                    rule_id: id.clone(),
                }
                .into());
            }
        }
        registry.retain_ids(&args.rules);
    }

    Ok(registry)
}

/// Built-in defaults, then the config file's [inputs], then --input overrides
fn build_inputs(args: &Args, config: &Config) -> Result<Inputs> {
    let mut inputs = default_inputs();
    inputs.merge(&config.inputs);

    for raw in &args.inputs {
        let (name, value) = parse_input(raw)?;
        inputs.set(name, value);
    }

    Ok(inputs)
}

/// Parse `KEY=VALUE`; the value is read as JSON, falling back to a plain string
fn parse_input(raw: &str) -> Result<(String, serde_json::Value)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("Invalid input {:?}, expected KEY=VALUE", raw);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid input {:?}, empty key", raw);
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn print_rule_list(registry: &RuleRegistry) {
    println!("\n{:<12} {:<8} {:<8} {}", "RULE ID", "SEVERITY", "ENABLED", "TITLE");
    println!("{}", "-".repeat(90));
    for rule in registry.all() {
        println!(
            "{:<12} {:<8} {:<8} {}",
            rule.id,
            rule.severity.as_str(),
            if rule.enabled { "yes" } else { "no" },
            rule.title
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        let (name, value) = parse_input("maxclassrepeat=3").unwrap();
        assert_eq!(name, "maxclassrepeat");
        assert_eq!(value, serde_json::json!(3));

        let (_, value) = parse_input(r#"authoritative_timeservers=["tick.usno.navy.mil"]"#).unwrap();
        assert_eq!(value, serde_json::json!(["tick.usno.navy.mil"]));

        let (_, value) = parse_input("site=pool.ntp.mil").unwrap();
        assert_eq!(value, serde_json::json!("pool.ntp.mil"));

        assert!(parse_input("maxclassrepeat").is_err());
        assert!(parse_input("=3").is_err());
    }

    #[test]
    fn test_input_precedence() {
        let args = Args::parse_from(["forgestig-agent", "--input", "maxclassrepeat=2"]);
        let config = Config::builder()
            .input("maxclassrepeat", 3)
            .input("authoritative_timeservers_exact", true)
            .build();
        let inputs = build_inputs(&args, &config).unwrap();

        assert_eq!(inputs.get::<i64>("maxclassrepeat").unwrap(), 2);
        assert!(inputs.get::<bool>("authoritative_timeservers_exact").unwrap());
        assert_eq!(inputs.get::<Vec<String>>("authoritative_timeservers").unwrap().len(), 3);
    }

    #[test]
    fn test_registry_selection() {
        let args = Args::parse_from(["forgestig-agent", "--rule", "SV-230360"]);
        let registry = build_registry(&args, &Config::default()).unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["SV-230360"]);

        let args = Args::parse_from(["forgestig-agent", "--rule", "SV-999999"]);
        let err = build_registry(&args, &Config::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<forgestig_core::Error>(),
            Some(forgestig_core::Error::RuleNotFound { rule_id }) if rule_id == "SV-999999"
        ));

        let args = Args::parse_from(["forgestig-agent", "--no-builtin"]);
        assert!(build_registry(&args, &Config::default()).unwrap().is_empty());
    }

    #[test]
    fn test_disabled_rules_from_config() {
        let args = Args::parse_from(["forgestig-agent"]);
        let config = Config::builder().disable_rule("SV-230496").build();
        let registry = build_registry(&args, &config).unwrap();
        let rule = registry.get("SV-230496").unwrap();
        assert!(!rule.enabled);
        assert_eq!(registry.enabled().len(), 4);
    }
}
