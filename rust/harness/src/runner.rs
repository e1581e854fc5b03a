//! Subprocess execution for trainer runs.

use std::{collections::VecDeque, future::Future, process::Stdio};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    task::JoinHandle,
};

use crate::command::ShellCommand;

/// Lines of stderr kept for the failure message.
const STDERR_TAIL: usize = 20;

/// Result of one command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Whether the command exited with status 0.
    pub success: bool,
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Last lines of stderr when the command failed.
    pub error: Option<String>,
}

impl RunResult {
    /// A result for `exit_code`, with no captured output.
    #[must_use]
    pub fn from_code(exit_code: i32) -> Self {
        Self {
            success: exit_code == 0,
            exit_code: Some(exit_code),
            error: None,
        }
    }
}

/// Something that can run a shell command to completion.
pub trait Execute {
    fn execute(
        &self,
        command: &ShellCommand,
    ) -> impl Future<Output = Result<RunResult, RunError>> + Send;
}

/// Runs commands through the system shell, one at a time.
#[derive(Debug, Clone)]
pub struct Runner {
    shell: String,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl Runner {
    #[must_use]
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Run `command` and wait for it, forwarding its output to the log.
    pub async fn run(&self, command: &ShellCommand) -> Result<RunResult, RunError> {
        tracing::debug!("Spawning: {command}");

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RunError::Spawn(command.to_string(), e))?;

        let stdout_task = child.stdout.take().map(|stdout| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::info!(target: "trainer", "{line}");
                }
            })
        });

        // Keep the tail of stderr for the failure message
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut tail = VecDeque::with_capacity(STDERR_TAIL);
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(target: "trainer", "{line}");
                    if tail.len() >= STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail.into_iter().collect::<Vec<_>>()
            })
        });

        let status = child
            .wait()
            .await
            .map_err(|e| RunError::Wait(command.to_string(), e))?;

        join_forwarder(stdout_task, "stdout").await;
        let stderr_lines = join_forwarder(stderr_task, "stderr").await;

        if status.success() {
            return Ok(RunResult {
                success: true,
                exit_code: status.code(),
                error: None,
            });
        }

        let error = if stderr_lines.is_empty() {
            format!("Exit code: {:?}", status.code())
        } else {
            stderr_lines.join("\n")
        };
        Ok(RunResult {
            success: false,
            exit_code: status.code(),
            error: Some(error),
        })
    }
}

impl Execute for Runner {
    async fn execute(&self, command: &ShellCommand) -> Result<RunResult, RunError> {
        self.run(command).await
    }
}

/// Errors that can occur when running a subprocess.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to spawn `{0}`: {1}")]
    Spawn(String, std::io::Error),
    #[error("failed waiting for `{0}`: {1}")]
    Wait(String, std::io::Error),
    #[error("failed to create {0}: {1}")]
    Io(std::path::PathBuf, std::io::Error),
}

/// Wait for an output forwarding task. A task that died yields the default.
async fn join_forwarder<T: Default>(task: Option<JoinHandle<T>>, stream: &str) -> T {
    match task {
        Some(task) => task.await.unwrap_or_else(|e| {
            tracing::debug!("{stream} forwarding ended abnormally: {e}");
            T::default()
        }),
        None => T::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success() {
        let result = Runner::default()
            .run(&ShellCommand::new("echo hello"))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_nonzero_exit_keeps_stderr() {
        let result = Runner::default()
            .run(&ShellCommand::new("echo boom >&2; exit 3"))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_stderr_tail_is_bounded() {
        let result = Runner::default()
            .run(&ShellCommand::new(
                "i=0; while [ $i -lt 50 ]; do echo line$i >&2; i=$((i+1)); done; exit 1",
            ))
            .await
            .unwrap();
        let error = result.error.unwrap();
        assert_eq!(error.lines().count(), STDERR_TAIL);
        assert!(error.starts_with("line30"));
        assert!(error.ends_with("line49"));
    }

    #[tokio::test]
    async fn test_redirect_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let err = dir.path().join("err.txt");
        std::fs::write(&out, "stale\n").unwrap();

        let cmd = ShellCommand::new(format!(
            "sh -c 'echo fresh; echo oops >&2' > {} 2> {}",
            out.display(),
            err.display()
        ));
        let result = Runner::default().run(&cmd).await.unwrap();
        assert!(result.success);
        // Redirects overwrite, never append
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "fresh\n");
        assert_eq!(std::fs::read_to_string(&err).unwrap(), "oops\n");
    }

    #[tokio::test]
    async fn test_dead_forwarder_yields_default() {
        let died = true;
        let task = tokio::spawn(async move {
            assert!(!died, "reader died");
            vec![String::from("never seen")]
        });
        let lines: Vec<String> = join_forwarder(Some(task), "stderr").await;
        assert!(lines.is_empty());

        let none: Vec<String> = join_forwarder(None, "stdout").await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_missing_shell_is_spawn_error() {
        let result = Runner::new("bamboo-no-such-shell")
            .run(&ShellCommand::new("true"))
            .await;
        assert!(matches!(result, Err(RunError::Spawn(..))));
    }
}
