//! Facts - typed pieces of observed host state and the keys used to request them

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// A command to run on the host, identified by program and arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Run through `sh -c` so globs and pipes in `script` are expanded by the shell
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Identifies a piece of host state a rule needs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FactKey {
    /// Key/value settings parsed from a configuration file
    Config { path: String },
    /// Output of a command
    Command(CommandSpec),
    /// Load/blacklist/install state of a kernel module
    KernelModule { name: String },
    /// Parsed audit rules file
    AuditRules { path: String },
    /// Parsed chrony configuration
    Chrony { path: String },
    /// Entry names of a directory
    Directory { path: String },
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactKey::Config { path } => write!(f, "config file {}", path),
            FactKey::Command(cmd) => write!(f, "command `{}`", cmd),
            FactKey::KernelModule { name } => write!(f, "kernel module {}", name),
            FactKey::AuditRules { path } => write!(f, "audit rules {}", path),
            FactKey::Chrony { path } => write!(f, "chrony config {}", path),
            FactKey::Directory { path } => write!(f, "directory {}", path),
        }
    }
}

/// Collected host state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Fact {
    Config(ConfigParams),
    Command(CommandOutput),
    KernelModule(ModuleState),
    AuditRules(Vec<AuditRule>),
    Chrony(ChronyConfig),
    Directory(Vec<String>),
}

impl Fact {
    fn kind(&self) -> &'static str {
        match self {
            Fact::Config(_) => "config",
            Fact::Command(_) => "command",
            Fact::KernelModule(_) => "kernel-module",
            Fact::AuditRules(_) => "audit-rules",
            Fact::Chrony(_) => "chrony",
            Fact::Directory(_) => "directory",
        }
    }
}

/// Settings of a key/value configuration file; every occurrence of a key is kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigParams {
    pub params: BTreeMap<String, Vec<String>>,
}

impl ConfigParams {
    /// All uncommented values of `key`, in file order
    pub fn values(&self, key: &str) -> &[String] {
        self.params.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.entry(key.into()).or_default().push(value.into());
    }
}

/// Captured output of a command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// None when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Whitespace-separated tokens of stdout
    pub fn stdout_tokens(&self) -> impl Iterator<Item = &str> {
        self.stdout.split_whitespace()
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Kernel module state assembled from modprobe configuration and /proc/modules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleState {
    pub name: String,
    /// None when /proc/modules could not be read
    pub loaded: Option<bool>,
    /// Commands from `install <name> <command>` directives
    pub install_commands: Vec<String>,
    /// A `blacklist <name>` directive is present
    pub blacklisted: bool,
}

impl ModuleState {
    /// Module loading is replaced by a command that does nothing
    pub fn is_disabled(&self) -> bool {
        self.install_commands.iter().any(|cmd| {
            matches!(
                cmd.split_whitespace().next(),
                Some("/bin/false" | "/bin/true" | "/usr/bin/false" | "/usr/bin/true")
            )
        })
    }
}

/// A single parsed audit rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRule {
    /// always / never
    pub action: String,
    /// exit / task / user / exclude / filesystem
    pub list: String,
    /// Watched path (`-w` or `-F path=`)
    pub path: Option<String>,
    /// Permission letters (`-p` or `-F perm=`)
    pub permissions: String,
    /// Remaining fields, e.g. `auid>=1000`
    pub fields: Vec<String>,
    /// Filter key (`-k` or `-F key=`)
    pub key: Option<String>,
}

/// A `server` directive from chrony.conf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSource {
    pub host: String,
    pub options: Vec<String>,
    pub maxpoll: Option<i64>,
}

impl TimeSource {
    /// chrony's default maxpoll when the option is not given
    pub const DEFAULT_MAXPOLL: i64 = 10;

    pub fn effective_maxpoll(&self) -> i64 {
        self.maxpoll.unwrap_or(Self::DEFAULT_MAXPOLL)
    }
}

/// Parsed chrony configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChronyConfig {
    pub servers: Vec<TimeSource>,
}

impl ChronyConfig {
    pub fn server(&self, host: &str) -> Option<&TimeSource> {
        self.servers.iter().find(|s| s.host == host)
    }
}

/// Why a fact could not be collected
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectError {
    #[error("{path} does not exist")]
    NotFound { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("failed to run {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{0}")]
    Io(String),
}

impl CollectError {
    /// Map an IO error for `path` onto a collection error
    pub fn from_io(path: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => CollectError::NotFound {
                path: path.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => CollectError::PermissionDenied {
                path: path.to_string(),
            },
            _ => CollectError::Io(format!("{}: {}", path, err)),
        }
    }
}

/// A required fact that is not usable for evaluation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactError {
    #[error("{0} was not collected")]
    Missing(FactKey),

    #[error("{key} unavailable: {source}")]
    Unavailable { key: FactKey, source: CollectError },

    #[error("{key} has unexpected kind {found}")]
    WrongKind { key: FactKey, found: &'static str },
}

/// Facts gathered for an audit run, including collection failures
#[derive(Debug, Clone, Default)]
pub struct FactSet {
    facts: HashMap<FactKey, std::result::Result<Fact, CollectError>>,
}

macro_rules! typed_getter {
    ($name:ident, $variant:ident, $key:expr, $ty:ty, $arg:ident : $argty:ty) => {
        pub fn $name(&self, $arg: $argty) -> std::result::Result<&$ty, FactError> {
            let key = $key;
            match self.require(&key)? {
                Fact::$variant(value) => Ok(value),
                other => Err(FactError::WrongKind {
                    key,
                    found: other.kind(),
                }),
            }
        }
    };
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully collected fact
    pub fn insert(&mut self, key: FactKey, fact: Fact) {
        self.facts.insert(key, Ok(fact));
    }

    /// Record a collection failure
    pub fn insert_error(&mut self, key: FactKey, error: CollectError) {
        self.facts.insert(key, Err(error));
    }

    pub fn insert_result(&mut self, key: FactKey, result: std::result::Result<Fact, CollectError>) {
        self.facts.insert(key, result);
    }

    pub fn contains(&self, key: &FactKey) -> bool {
        self.facts.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Merge another fact set into this one, replacing duplicate keys
    pub fn extend(&mut self, other: FactSet) {
        self.facts.extend(other.facts);
    }

    /// Number of facts whose collection failed
    pub fn error_count(&self) -> usize {
        self.facts.values().filter(|r| r.is_err()).count()
    }

    /// Get a fact, failing when it is absent or its collection failed
    pub fn require(&self, key: &FactKey) -> std::result::Result<&Fact, FactError> {
        match self.facts.get(key) {
            Some(Ok(fact)) => Ok(fact),
            Some(Err(source)) => Err(FactError::Unavailable {
                key: key.clone(),
                source: source.clone(),
            }),
            None => Err(FactError::Missing(key.clone())),
        }
    }

    typed_getter!(config, Config, FactKey::Config { path: path.to_string() }, ConfigParams, path: &str);
    typed_getter!(command, Command, FactKey::Command(spec.clone()), CommandOutput, spec: &CommandSpec);
    typed_getter!(kernel_module, KernelModule, FactKey::KernelModule { name: name.to_string() }, ModuleState, name: &str);
    typed_getter!(audit_rules, AuditRules, FactKey::AuditRules { path: path.to_string() }, Vec<AuditRule>, path: &str);
    typed_getter!(chrony, Chrony, FactKey::Chrony { path: path.to_string() }, ChronyConfig, path: &str);
    typed_getter!(directory, Directory, FactKey::Directory { path: path.to_string() }, Vec<String>, path: &str);
}
