//! Local host provider backed by the filesystem and process execution

use crate::provider::FactProvider;
use async_trait::async_trait;
use forgestig_core::{CommandOutput, CommandSpec};
use std::io;
use std::process::Stdio;
use tokio::process::Command;
use tracing::trace;

/// Reads facts from the machine the agent runs on
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHost;

impl LocalHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FactProvider for LocalHost {
    async fn read_to_string(&self, path: &str) -> io::Result<String> {
        trace!("Reading {}", path);
        let bytes = tokio::fs::read(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn read_dir(&self, path: &str) -> io::Result<Vec<String>> {
        trace!("Listing {}", path);
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn run(&self, command: &CommandSpec) -> io::Result<CommandOutput> {
        trace!("Running {}", command);
        // The collector enforces the timeout by dropping this future,
        // kill_on_drop makes sure the child goes with it.
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_file_and_dir() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pwquality.conf");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "maxclassrepeat = 4").unwrap();
        std::fs::File::create(tmp.path().join("a.conf")).unwrap();

        let host = LocalHost::new();
        let content = host.read_to_string(path.to_str().unwrap()).await.unwrap();
        assert_eq!(content.trim(), "maxclassrepeat = 4");

        let names = host.read_dir(tmp.path().to_str().unwrap()).await.unwrap();
        assert_eq!(names, vec!["a.conf", "pwquality.conf"]);
        assert!(host.exists(path.to_str().unwrap()).await);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = LocalHost::new()
            .read_to_string("/nonexistent/forgestig.conf")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command() {
        let output = LocalHost::new()
            .run(&CommandSpec::shell("echo idle-delay; exit 3"))
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "idle-delay");
        assert_eq!(output.exit_code, Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_idle_lock_search_across_lock_files() {
        use crate::assertions::evaluate_assertion;
        use forgestig_checks::controls::{idle_lock_command, IDLE_DELAY_LOCK};
        use forgestig_core::{Assertion, Fact, FactKey, FactSet, Inputs, Param, Verdict};

        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("session"), "/org/gnome/desktop/session/idle-delay\n").unwrap();
        std::fs::write(
            tmp.path().join("screensaver"),
            "/org/gnome/desktop/screensaver/lock-delay\n/org/gnome/desktop/screensaver/idle-activation-enabled\n",
        )
        .unwrap();

        let command = idle_lock_command(tmp.path().to_str().unwrap());
        let output = LocalHost::new().run(&command).await.unwrap();
        assert!(!output.stdout.contains(':'), "{}", output.stdout);

        let mut facts = FactSet::new();
        facts.insert(FactKey::Command(command.clone()), Fact::Command(output));
        let assertion = Assertion::OutputContainsToken {
            command,
            token: Param::Value(IDLE_DELAY_LOCK.into()),
        };
        let outcome = evaluate_assertion(&assertion, &facts, &Inputs::new());
        assert_eq!(outcome.verdict, Verdict::Pass, "{}", outcome.message);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let err = LocalHost::new()
            .run(&CommandSpec::new("/nonexistent/forgestig-binary"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
