//! External Process Execution
//!
//! Every external tool (git, ssh-keygen, ssh-add, whoami, az) is run through
//! these helpers. Output is captured, never inherited, so the setup can
//! interpret it and keep the terminal clean for prompts.

use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.trim().to_string();
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr);
        }
        text
    }

    /// Short single-line reason for a failed run.
    pub fn failure_reason(&self) -> String {
        let detail = self.stderr.trim();
        let detail = if detail.is_empty() { self.stdout.trim() } else { detail };
        let detail = detail.lines().next().unwrap_or_default();
        match self.status {
            Some(code) => format!("exit status {code}: {detail}"),
            None => format!("terminated by signal: {detail}"),
        }
    }
}

/// Run a program to completion and capture its output.
///
/// Only a failure to spawn is an error; a non-zero exit is reported
/// through [`CommandOutput::status`].
pub async fn exec_capture<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    cwd: Option<&Path>,
) -> Result<CommandOutput> {
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    debug!(
        program = %program,
        args = ?args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>(),
        "Running external command"
    );

    let output = command
        .output()
        .await
        .with_context(|| format!("Failed to execute: {program}"))?;

    let captured = CommandOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    debug!(program = %program, status = ?captured.status, "External command finished");
    Ok(captured)
}

/// Run a program and fail on a non-zero exit. Returns trimmed stdout.
pub async fn exec_checked<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    cwd: Option<&Path>,
) -> Result<String> {
    let output = exec_capture(program, args, cwd).await?;

    if !output.success() {
        anyhow::bail!("{} failed with {}", program, output.failure_reason());
    }

    Ok(output.stdout.trim().to_string())
}

/// Render a command line for messages that tell the operator what to run.
pub fn render_command(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() {
            line.push_str("\"\"");
        } else if arg.contains(char::is_whitespace) {
            line.push_str(&format!("\"{arg}\""));
        } else {
            line.push_str(arg);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output() {
        let output = CommandOutput {
            status: Some(0),
            stdout: "Good \"git\" signature\n".to_string(),
            stderr: "warning\n".to_string(),
        };
        assert_eq!(output.combined(), "Good \"git\" signature\nwarning");
        assert!(output.success());
    }

    #[test]
    fn test_failure_reason_prefers_stderr() {
        let output = CommandOutput {
            status: Some(2),
            stdout: "ignored".to_string(),
            stderr: "Could not open a connection to your authentication agent.\nmore".to_string(),
        };
        assert_eq!(
            output.failure_reason(),
            "exit status 2: Could not open a connection to your authentication agent."
        );
    }

    #[test]
    fn test_render_command_quotes() {
        assert_eq!(
            render_command("ssh-keygen", &["-C", "a@b.c - Git Signing", "-N", ""]),
            "ssh-keygen -C \"a@b.c - Git Signing\" -N \"\""
        );
    }

    #[tokio::test]
    async fn test_exec_capture_missing_program() {
        let result = exec_capture::<&str>("definitely-not-a-real-binary-xyz", &[], None).await;
        assert!(result.is_err());
    }
}
