//! Fact providers - the host access layer the collectors read through

use async_trait::async_trait;
use forgestig_core::{CommandOutput, CommandSpec};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;
use std::sync::Mutex;

/// Raw access to host state
#[async_trait]
pub trait FactProvider: Send + Sync {
    /// Read a file as UTF-8 (lossy)
    async fn read_to_string(&self, path: &str) -> io::Result<String>;

    /// Names of the entries of a directory, sorted
    async fn read_dir(&self, path: &str) -> io::Result<Vec<String>>;

    /// Whether a path exists
    async fn exists(&self, path: &str) -> bool;

    /// Run a command and capture its output
    async fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput>;
}

/// In-memory host, for tests and offline evaluation
#[derive(Debug, Default)]
pub struct MemoryHost {
    files: HashMap<String, String>,
    dirs: HashMap<String, Vec<String>>,
    unreadable: HashSet<String>,
    commands: HashMap<CommandSpec, CommandOutput>,
    hanging: HashSet<CommandSpec>,
    accessed: Mutex<Vec<String>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Register a directory with explicit entries
    pub fn with_dir(mut self, path: impl Into<String>, entries: &[&str]) -> Self {
        self.dirs
            .insert(path.into(), entries.iter().map(|e| e.to_string()).collect());
        self
    }

    /// Reads of this path fail with permission denied
    pub fn with_unreadable(mut self, path: impl Into<String>) -> Self {
        self.unreadable.insert(path.into());
        self
    }

    pub fn with_command(mut self, command: CommandSpec, output: CommandOutput) -> Self {
        self.commands.insert(command, output);
        self
    }

    /// Shorthand for a command that exits 0 with the given stdout
    pub fn with_stdout(self, command: CommandSpec, stdout: impl Into<String>) -> Self {
        self.with_command(
            command,
            CommandOutput {
                stdout: stdout.into(),
                stderr: String::new(),
                exit_code: Some(0),
            },
        )
    }

    /// This command never completes
    pub fn with_hanging_command(mut self, command: CommandSpec) -> Self {
        self.hanging.insert(command);
        self
    }

    /// Everything read or run so far, in access order
    pub fn accessed(&self) -> Vec<String> {
        self.accessed
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    fn record(&self, what: String) {
        if let Ok(mut accessed) = self.accessed.lock() {
            accessed.push(what);
        }
    }

    fn denied(&self, path: &str) -> io::Result<()> {
        if self.unreadable.contains(path) {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FactProvider for MemoryHost {
    async fn read_to_string(&self, path: &str) -> io::Result<String> {
        self.record(format!("read {}", path));
        self.denied(path)?;
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    async fn read_dir(&self, path: &str) -> io::Result<Vec<String>> {
        self.record(format!("list {}", path));
        self.denied(path)?;
        if let Some(entries) = self.dirs.get(path) {
            let mut entries = entries.clone();
            entries.sort();
            return Ok(entries);
        }

        // Direct children of registered files
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let children: BTreeSet<String> = self
            .files
            .keys()
            .filter_map(|file| file.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(str::to_string)
            .collect();

        if children.is_empty() {
            Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        } else {
            Ok(children.into_iter().collect())
        }
    }

    async fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path) || self.dirs.contains_key(path)
    }

    async fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput> {
        self.record(format!("run {}", command));
        if self.hanging.contains(command) {
            std::future::pending::<()>().await;
        }
        self.commands.get(command).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: command not found", command.program),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_host_files_and_dirs() {
        let host = MemoryHost::new()
            .with_file("/etc/modprobe.d/sctp.conf", "blacklist sctp\n")
            .with_file("/etc/modprobe.d/usb.conf", "blacklist usb-storage\n")
            .with_dir("/usr/share/xsessions", &["gnome.desktop"]);

        assert_eq!(
            host.read_dir("/etc/modprobe.d").await.unwrap(),
            vec!["sctp.conf", "usb.conf"]
        );
        assert_eq!(
            host.read_dir("/usr/share/xsessions").await.unwrap(),
            vec!["gnome.desktop"]
        );
        assert_eq!(
            host.read_dir("/run/modprobe.d").await.unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
        assert!(host.exists("/etc/modprobe.d/sctp.conf").await);
        assert_eq!(host.accessed().len(), 3);
    }

    #[tokio::test]
    async fn test_memory_host_unreadable() {
        let host = MemoryHost::new()
            .with_file("/etc/shadow", "root:!:19000::::::")
            .with_unreadable("/etc/shadow");
        let err = host.read_to_string("/etc/shadow").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
