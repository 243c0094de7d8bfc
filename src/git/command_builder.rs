//! Type-safe Git command builder for consistent command execution
//!
//! This module provides a fluent API for building and executing git commands,
//! ensuring consistent error handling across the crate. Commands run the
//! system `git` binary (the same approach Cargo takes with
//! `git-fetch-with-cli`) so authentication helpers, proxies, and platform
//! specific configuration keep working.
//!
//! Long-running operations (clone, fetch) can stream their stderr to a
//! progress channel while the command runs; the checkout engine attaches a
//! [`ProgressMonitor`](crate::git::progress::ProgressMonitor) to that channel.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::core::GitdepError;
use crate::git::git_binary;

/// Builder for constructing and executing git commands.
///
/// Defaults: output captured, 5-minute timeout, current process directory.
/// The working directory is passed with `-C` so git operations are
/// independent of the process's own current directory.
///
/// # Examples
///
/// ```rust,ignore
/// let output = GitCommand::new()
///     .args(["status", "--untracked-files=no", "--porcelain"])
///     .current_dir("/path/to/repo")
///     .execute()
///     .await?;
/// ```
pub struct GitCommand {
    /// Command arguments to pass to git (e.g., ["clone", "url", "path"])
    args: Vec<String>,

    /// Working directory for command execution (passed via `-C`)
    current_dir: Option<std::path::PathBuf>,

    /// Environment variables to set for the git process
    env_vars: Vec<(String, String)>,

    /// Maximum duration to wait for command completion (None = no timeout)
    timeout_duration: Option<Duration>,

    /// Optional context string for log messages
    context: Option<String>,

    /// For clone commands, the URL for better error messages
    clone_url: Option<String>,

    /// Channel receiving raw stderr chunks while the command runs
    progress: Option<mpsc::Sender<String>>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            // Default timeout of 5 minutes for most git operations
            timeout_duration: Some(Duration::from_secs(300)),
            context: None,
            clone_url: None,
            progress: None,
        }
    }
}

impl GitCommand {
    /// Creates a new git command builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory for command execution.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Adds a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable for the git process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set a custom timeout for the command (None for no timeout).
    ///
    /// Clone and fetch operations opt out of the default timeout: a slow
    /// network transfer is not an error, and the caller decides how long to
    /// wait.
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Set a context string for log messages (e.g., the package name),
    /// distinguishing concurrent operations in the logs.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Record the URL of a clone operation for error reporting.
    pub fn clone_url(mut self, url: impl Into<String>) -> Self {
        self.clone_url = Some(url.into());
        self
    }

    /// Stream raw stderr chunks to `sender` while the command runs.
    ///
    /// Chunks are delivered with `try_send`; when the receiver lags, chunks
    /// are dropped rather than blocking the command. Progress output is
    /// lossy by nature.
    pub fn with_progress(mut self, sender: mpsc::Sender<String>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Execute the command and return the captured output.
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = git_binary();
        let mut cmd = Command::new(git_command);

        // Build the full argument list including -C if a directory was set
        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.clone());

        cmd.args(&full_args);

        if let Some(ref ctx) = self.context {
            tracing::debug!(
                target: "git",
                "({}) Executing command: {} {}",
                ctx,
                git_command,
                full_args.join(" ")
            );
        } else {
            tracing::debug!(
                target: "git",
                "Executing command: {} {}",
                git_command,
                full_args.join(" ")
            );
        }

        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());

        let progress = self.progress.clone();
        let run = async move {
            let mut child = cmd
                .spawn()
                .with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?;

            let mut stderr_pipe =
                child.stderr.take().context("Git process stderr was not captured")?;
            let stderr_task = tokio::spawn(async move {
                let mut collected: Vec<u8> = Vec::new();
                let mut buf = [0u8; 8192];
                loop {
                    match stderr_pipe.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            collected.extend_from_slice(&buf[..n]);
                            if let Some(ref sender) = progress {
                                let _ = sender
                                    .try_send(String::from_utf8_lossy(&buf[..n]).into_owned());
                            }
                        }
                    }
                }
                collected
            });

            let mut stdout_pipe =
                child.stdout.take().context("Git process stdout was not captured")?;
            let mut stdout_bytes = Vec::new();
            stdout_pipe
                .read_to_end(&mut stdout_bytes)
                .await
                .context("Failed to read git stdout")?;

            let status = child.wait().await.context("Failed to wait for git process")?;
            let stderr_bytes = stderr_task.await.unwrap_or_default();

            Ok::<_, anyhow::Error>((status, stdout_bytes, stderr_bytes, full_args))
        };

        let (status, stdout_bytes, stderr_bytes, full_args) =
            if let Some(duration) = self.timeout_duration {
                match timeout(duration, run).await {
                    Ok(result) => result?,
                    Err(_) => {
                        tracing::warn!(
                            target: "git",
                            "Command timed out after {} seconds",
                            duration.as_secs()
                        );
                        return Err(GitdepError::GitTimeout {
                            operation: self
                                .args
                                .first()
                                .cloned()
                                .unwrap_or_else(|| "unknown".to_string()),
                            seconds: duration.as_secs(),
                        }
                        .into());
                    }
                }
            } else {
                run.await?
            };

        let stdout = String::from_utf8_lossy(&stdout_bytes).to_string();
        let stderr = String::from_utf8_lossy(&stderr_bytes).to_string();

        if !status.success() {
            tracing::debug!(
                target: "git",
                "Command failed with exit code: {:?}",
                status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "Error: {}", stderr);
            }

            // Skip -C flag arguments when classifying the operation
            let args_start =
                if full_args.first() == Some(&"-C".to_string()) && full_args.len() > 2 {
                    2
                } else {
                    0
                };
            let effective_args = &full_args[args_start..];

            let error = if effective_args.first().is_some_and(|arg| arg == "clone") {
                let url = self.clone_url.unwrap_or_else(|| "unknown".to_string());
                GitdepError::GitCloneFailed {
                    url,
                    reason: stderr,
                }
            } else if effective_args.first().is_some_and(|arg| arg == "checkout") {
                let reference = effective_args.get(1).cloned().unwrap_or_default();
                GitdepError::GitCheckoutFailed {
                    reference,
                    reason: stderr,
                }
            } else {
                GitdepError::GitCommandError {
                    operation: effective_args
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string()),
                    stderr,
                }
            };

            return Err(error.into());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());
            if let Some(ref ctx) = self.context {
                tracing::info!(target: "git::perf", "({}) Git {} took {:.2}s", ctx, operation, elapsed.as_secs_f64());
            } else {
                tracing::info!(target: "git::perf", "Git {} took {:.2}s", operation, elapsed.as_secs_f64());
            }
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Execute the command and return only stdout as a trimmed string.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Execute the command and check for success, discarding output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Output captured from a git command.
#[derive(Debug, Clone, Default)]
pub struct GitCommandOutput {
    /// Standard output from the git command
    pub stdout: String,
    /// Standard error output from the git command
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_basic() {
        let cmd = GitCommand::new().arg("status").arg("--short");
        assert_eq!(cmd.args, vec!["status", "--short"]);
    }

    #[test]
    fn test_command_builder_with_dir() {
        let cmd = GitCommand::new().current_dir("/tmp/repo").arg("status");
        assert_eq!(cmd.current_dir, Some(std::path::PathBuf::from("/tmp/repo")));
    }

    #[tokio::test]
    async fn test_execute_version() {
        let result = GitCommand::new().arg("--version").execute().await;
        assert!(result.is_ok(), "git --version should succeed");
        assert!(result.unwrap().stdout.contains("git version"));
    }

    #[tokio::test]
    async fn test_execute_failure_maps_operation() {
        let dir = tempfile::tempdir().unwrap();
        let result = GitCommand::new()
            .args(["status", "--porcelain"])
            .current_dir(dir.path())
            .execute()
            .await;
        let err = result.expect_err("status outside a repository should fail");
        let gitdep = err.downcast_ref::<GitdepError>().expect("typed error");
        match gitdep {
            GitdepError::GitCommandError {
                operation, ..
            } => assert_eq!(operation, "status"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
