//! Fact collection - gathers exactly the host state the selected rules need

use crate::parsers::{module_loaded, parse_audit_rules, parse_chrony, parse_config, parse_modprobe};
use crate::provider::FactProvider;
use forgestig_core::{CollectError, CommandSpec, Fact, FactKey, FactSet, ModuleState, Virtualization};
use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONCURRENCY: usize = 8;

/// modprobe configuration directories, highest precedence first
pub const DEFAULT_MODPROBE_DIRS: &[&str] =
    &["/etc/modprobe.d", "/run/modprobe.d", "/usr/lib/modprobe.d"];

const PROC_MODULES: &str = "/proc/modules";

/// Collects facts from a provider with a per-fact timeout and bounded concurrency
#[derive(Clone)]
pub struct FactCollector {
    provider: Arc<dyn FactProvider>,
    timeout: Duration,
    concurrency: usize,
    modprobe_dirs: Vec<String>,
}

impl FactCollector {
    pub fn new(provider: Arc<dyn FactProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            modprobe_dirs: DEFAULT_MODPROBE_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_modprobe_dirs(mut self, dirs: Vec<String>) -> Self {
        self.modprobe_dirs = dirs;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Collect every requested fact. Failures are recorded per key and
    /// never abort the rest of the batch.
    pub async fn collect(&self, keys: impl IntoIterator<Item = FactKey>) -> FactSet {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::new();
        let mut facts = FactSet::new();

        for key in keys {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    facts.insert_error(key, CollectError::Io(e.to_string()));
                    continue;
                }
            };
            let collector = self.clone();
            let task_key = key.clone();

            let handle = tokio::spawn(async move {
                let result = collector.collect_bounded(&task_key).await;
                drop(permit);
                result
            });
            handles.push((key, handle));
        }

        debug!("Collecting {} facts", handles.len());

        for (key, handle) in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(CollectError::Io(format!("collector task failed: {}", e))));
            if let Err(e) = &result {
                debug!("Could not collect {}: {}", key, e);
            }
            facts.insert_result(key, result);
        }

        facts
    }

    /// Collect a single fact under the collector timeout
    pub async fn collect_bounded(&self, key: &FactKey) -> Result<Fact, CollectError> {
        match timeout(self.timeout, self.collect_one(key)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Collecting {} timed out after {:?}", key, self.timeout);
                Err(CollectError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn collect_one(&self, key: &FactKey) -> Result<Fact, CollectError> {
        trace!("Collecting {}", key);
        match key {
            FactKey::Config { path } => {
                let content = self.read(path).await?;
                Ok(Fact::Config(parse_config(&content)))
            }
            FactKey::Command(command) => self.run(command).await.map(Fact::Command),
            FactKey::KernelModule { name } => self.collect_module(name).await,
            FactKey::AuditRules { path } => {
                let content = self.read(path).await?;
                Ok(Fact::AuditRules(parse_audit_rules(&content)))
            }
            FactKey::Chrony { path } => {
                let content = self.read(path).await?;
                Ok(Fact::Chrony(parse_chrony(&content)))
            }
            FactKey::Directory { path } => match self.provider.read_dir(path).await {
                Ok(entries) => Ok(Fact::Directory(entries)),
                // An absent directory has no entries
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Fact::Directory(Vec::new())),
                Err(e) => Err(CollectError::from_io(path, &e)),
            },
        }
    }

    async fn read(&self, path: &str) -> Result<String, CollectError> {
        self.provider
            .read_to_string(path)
            .await
            .map_err(|e| CollectError::from_io(path, &e))
    }

    async fn run(&self, command: &CommandSpec) -> Result<forgestig_core::CommandOutput, CollectError> {
        self.provider
            .run(command)
            .await
            .map_err(|e| CollectError::Spawn {
                program: command.program.clone(),
                message: e.to_string(),
            })
    }

    /// A file name in a higher-precedence directory shadows the same name
    /// in later directories.
    async fn collect_module(&self, name: &str) -> Result<Fact, CollectError> {
        let mut state = ModuleState {
            name: name.to_string(),
            ..Default::default()
        };
        let mut seen = HashSet::new();

        for dir in &self.modprobe_dirs {
            let entries = match self.provider.read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(CollectError::from_io(dir, &e)),
            };

            for entry in entries {
                if !entry.ends_with(".conf") || !seen.insert(entry.clone()) {
                    continue;
                }
                let path = format!("{}/{}", dir.trim_end_matches('/'), entry);
                let content = self.read(&path).await?;
                let directives = parse_modprobe(&content, name);
                state.install_commands.extend(directives.install_commands);
                state.blacklisted |= directives.blacklisted;
            }
        }

        state.loaded = self
            .provider
            .read_to_string(PROC_MODULES)
            .await
            .ok()
            .map(|modules| module_loaded(&modules, name));

        Ok(Fact::KernelModule(state))
    }

    /// Detect whether the host is a container, once per run
    pub async fn detect_virtualization(&self) -> Virtualization {
        let detect = CommandSpec::new("systemd-detect-virt").arg("--container");
        if let Ok(Ok(output)) = timeout(self.timeout, self.provider.run(&detect)).await {
            let system = output.stdout.trim();
            if output.success() && !system.is_empty() && system != "none" {
                debug!("systemd-detect-virt reports container {}", system);
                return Virtualization::system(system);
            }
            if system == "none" {
                return Virtualization::bare_metal();
            }
        }

        // Fallback markers when systemd is not available
        if self.provider.exists("/.dockerenv").await {
            return Virtualization::system("docker");
        }
        if self.provider.exists("/run/.containerenv").await {
            return Virtualization::system("podman");
        }
        if let Ok(Ok(cgroup)) = timeout(self.timeout, self.provider.read_to_string("/proc/1/cgroup")).await {
            if cgroup.contains("/docker") {
                return Virtualization::system("docker");
            }
            if cgroup.contains("/kubepods") || cgroup.contains("/lxc") {
                return Virtualization::system("container-other");
            }
        }

        Virtualization::bare_metal()
    }

    /// Host name from the kernel, if readable
    pub async fn hostname(&self) -> Option<String> {
        for path in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
            if let Ok(Ok(name)) = timeout(self.timeout, self.provider.read_to_string(path)).await {
                let name = name.trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
        None
    }
}
