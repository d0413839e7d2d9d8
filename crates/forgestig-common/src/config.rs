//! Configuration management for ForgeSTIG components

use forgestig_core::{Error, Inputs, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Rule selection settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Fact collection settings
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Tunable inputs referenced by rules, overriding built-in defaults
    #[serde(default)]
    pub inputs: Inputs,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Reject values the collector cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.collector.timeout_ms == 0 {
            return Err(Error::InvalidConfig {
                key: "collector.timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.collector.concurrency == 0 {
            return Err(Error::InvalidConfig {
                key: "collector.concurrency".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Merge with environment variables (FORGESTIG_ prefix)
    pub fn merge_env(mut self) -> Self {
        if let Ok(val) = std::env::var("FORGESTIG_RULES_DIR") {
            self.audit.rules_dir = Some(val);
        }
        if let Ok(val) = std::env::var("FORGESTIG_COLLECTOR_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                self.collector.timeout_ms = n;
            }
        }
        if let Ok(val) = std::env::var("FORGESTIG_COLLECTOR_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                self.collector.concurrency = n;
            }
        }

        // Logging
        if let Ok(val) = std::env::var("FORGESTIG_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("FORGESTIG_LOG_FORMAT") {
            self.logging.format = val;
        }

        self
    }
}

/// Rule selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Load the built-in RHEL 8 controls
    #[serde(default = "default_true")]
    pub builtin_rules: bool,

    /// Directory of YAML rule definitions
    pub rules_dir: Option<String>,

    /// Rule IDs to skip
    #[serde(default)]
    pub disabled_rules: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            builtin_rules: true,
            rules_dir: None,
            disabled_rules: Vec::new(),
        }
    }
}

/// Fact collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Timeout for a single collector (file read, command) in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Maximum collectors running at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Directories scanned for modprobe directives, in precedence order
    #[serde(default = "default_modprobe_dirs")]
    pub modprobe_dirs: Vec<String>,
}

fn default_timeout() -> u64 {
    10_000
}

fn default_concurrency() -> usize {
    8
}

fn default_modprobe_dirs() -> Vec<String> {
    vec![
        String::from("/etc/modprobe.d"),
        String::from("/run/modprobe.d"),
        String::from("/usr/lib/modprobe.d"),
    ]
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            concurrency: default_concurrency(),
            modprobe_dirs: default_modprobe_dirs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("pretty")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn rules_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.audit.rules_dir = Some(dir.into());
        self
    }

    pub fn builtin_rules(mut self, enabled: bool) -> Self {
        self.config.audit.builtin_rules = enabled;
        self
    }

    pub fn disable_rule(mut self, id: impl Into<String>) -> Self {
        self.config.audit.disabled_rules.push(id.into());
        self
    }

    pub fn collector_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.collector.timeout_ms = timeout_ms;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.collector.concurrency = concurrency;
        self
    }

    pub fn input(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.inputs.set(name, value);
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
