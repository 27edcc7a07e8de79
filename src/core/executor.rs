//! Subprocess execution for running linter binaries.
//!
//! One OS process is created per call and always reaped before the call
//! returns. Both output streams are drained to end-of-stream before the exit
//! code is read so a child filling a pipe buffer can never deadlock us.

use crate::core::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

/// The raw outcome of one subprocess invocation.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code of the command.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Renders a command line for logging and failed-command reports.
#[must_use]
pub fn render_command(binary: &str, args: &[String]) -> String {
    if args.is_empty() {
        binary.to_string()
    } else {
        format!("{} {}", binary, args.join(" "))
    }
}

/// Executor for spawning linter processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor {
    /// Optional per-invocation timeout. No default; a hung linter without a
    /// timeout hangs the run.
    timeout: Option<Duration>,
}

impl Executor {
    /// Creates an executor with an optional timeout.
    #[must_use]
    pub const fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Spawns `binary` with `args` and `envs`, blocking until it exits.
    ///
    /// Fails with a process error when the executable cannot be spawned or an
    /// output stream cannot be read; a configured timeout kills the child and
    /// fails with a timeout error.
    pub async fn execute(
        &self,
        binary: &str,
        args: &[String],
        envs: &HashMap<String, String>,
        cwd: Option<&Path>,
    ) -> Result<CommandResult> {
        let command_line = render_command(binary, args);
        tracing::debug!(command = %command_line, "Spawning process");

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .envs(envs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::process(&command_line, e.to_string()))?;

        match self.timeout {
            Some(limit) => match timeout(limit, wait_for_output(&mut child, &command_line)).await {
                Ok(result) => result,
                Err(_) => {
                    drop(child.kill().await);
                    Err(Error::ProcessTimeout {
                        command: command_line,
                        seconds: limit.as_secs(),
                    })
                }
            },
            None => wait_for_output(&mut child, &command_line).await,
        }
    }
}

/// Drains stdout and stderr concurrently, then reaps the exit code.
async fn wait_for_output(
    child: &mut tokio::process::Child,
    command_line: &str,
) -> Result<CommandResult> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_handle = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut pipe) = stdout {
            pipe.read_to_string(&mut buf).await?;
        }
        Ok::<_, std::io::Error>(buf)
    });
    let stderr_handle = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut pipe) = stderr {
            pipe.read_to_string(&mut buf).await?;
        }
        Ok::<_, std::io::Error>(buf)
    });

    let status = child
        .wait()
        .await
        .map_err(|e| Error::process(command_line, e.to_string()))?;

    let stdout = stdout_handle
        .await
        .map_err(|e| Error::process(command_line, format!("stdout task failed: {e}")))?
        .map_err(|e| Error::process(command_line, format!("read stdout: {e}")))?;
    let stderr = stderr_handle
        .await
        .map_err(|e| Error::process(command_line, format!("stderr task failed: {e}")))?
        .map_err(|e| Error::process(command_line, format!("read stderr: {e}")))?;

    Ok(CommandResult {
        exit_code: status.code().unwrap_or(1),
        stdout,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let executor = Executor::default();
        let result = executor
            .execute("echo", &["hello".to_string()], &no_env(), None)
            .await
            .expect("echo should run");
        assert!(result.success());
        assert!(result.stdout.contains("hello"));
        assert!(result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_execute_nonzero_exit() {
        let executor = Executor::default();
        let result = executor
            .execute("sh", &["-c".to_string(), "exit 3".to_string()], &no_env(), None)
            .await
            .expect("sh should run");
        assert!(!result.success());
        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn test_execute_spawn_failure_is_process_error() {
        let executor = Executor::default();
        let result = executor
            .execute("definitely_not_a_real_binary_12345", &[], &no_env(), None)
            .await;
        assert!(matches!(result, Err(Error::Process { .. })));
    }

    #[tokio::test]
    async fn test_execute_timeout_kills_child() {
        let executor = Executor::new(Some(Duration::from_millis(100)));
        let result = executor
            .execute("sleep", &["10".to_string()], &no_env(), None)
            .await;
        assert!(matches!(result, Err(Error::ProcessTimeout { .. })));
    }

    #[tokio::test]
    async fn test_execute_passes_environment() {
        let executor = Executor::default();
        let mut envs = HashMap::new();
        envs.insert("DIFF_LINT_TEST_VAR".to_string(), "42".to_string());
        let result = executor
            .execute(
                "sh",
                &["-c".to_string(), "echo $DIFF_LINT_TEST_VAR".to_string()],
                &envs,
                None,
            )
            .await
            .expect("sh should run");
        assert!(result.stdout.contains("42"));
    }

    #[test]
    fn test_render_command() {
        assert_eq!(render_command("clang-format", &[]), "clang-format");
        assert_eq!(
            render_command("clang-tidy", &["--quiet".to_string(), "a.cpp".to_string()]),
            "clang-tidy --quiet a.cpp"
        );
    }
}
