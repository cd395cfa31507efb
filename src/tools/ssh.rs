//! OpenSSH Tools
//!
//! `ssh-keygen` for key generation and `ssh-add` / the ssh-agent service for
//! key registration.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::process::{exec_capture, exec_checked, render_command};
use crate::agents::signing::types::KeyAlgorithm;

/// Generates an unencrypted key pair at a path
#[async_trait]
pub trait KeyGenerator: Send + Sync {
    /// Fails when the generator cannot be executed at all.
    async fn check_available(&self) -> Result<()>;

    /// Write `<path>` and `<path>.pub`. The private key is always written
    /// without a passphrase so signing works unattended.
    async fn generate(&self, algorithm: KeyAlgorithm, path: &Path, comment: &str) -> Result<()>;

    /// The command line `generate` runs, for manual retries.
    fn command_line(&self, algorithm: KeyAlgorithm, path: &Path, comment: &str) -> String;
}

/// Whether a key agent is reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Running,
    NotRunning,
}

/// Key agent service and key registration
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn status(&self) -> Result<AgentStatus>;

    /// Start the agent service and enable it at boot.
    async fn start(&self) -> Result<()>;

    /// Register a private key with the running agent.
    async fn add(&self, private_key_path: &Path) -> Result<()>;

    /// Command the operator can run to start the agent by hand.
    fn start_command(&self) -> String;

    /// Command the operator can run to add a key by hand.
    fn add_command(&self, private_key_path: &Path) -> String {
        format!("ssh-add \"{}\"", private_key_path.display())
    }
}

/// `ssh-keygen` on PATH
#[derive(Debug, Clone)]
pub struct SshKeygen {
    program: String,
}

impl Default for SshKeygen {
    fn default() -> Self {
        Self {
            program: "ssh-keygen".to_string(),
        }
    }
}

impl SshKeygen {
    fn args(algorithm: KeyAlgorithm, path: &Path, comment: &str) -> Vec<String> {
        vec![
            "-q".to_string(),
            "-t".to_string(),
            algorithm.to_string(),
            "-f".to_string(),
            path.to_string_lossy().into_owned(),
            "-C".to_string(),
            comment.to_string(),
            "-N".to_string(),
            String::new(),
        ]
    }
}

#[async_trait]
impl KeyGenerator for SshKeygen {
    async fn check_available(&self) -> Result<()> {
        // ssh-keygen has no --version; any exit code proves it runs
        exec_capture(&self.program, &["-?"], None)
            .await
            .map(|_| ())
            .context("ssh-keygen could not be executed")
    }

    async fn generate(&self, algorithm: KeyAlgorithm, path: &Path, comment: &str) -> Result<()> {
        let args = Self::args(algorithm, path, comment);
        exec_checked(&self.program, &args[..], None).await?;
        Ok(())
    }

    fn command_line(&self, algorithm: KeyAlgorithm, path: &Path, comment: &str) -> String {
        let args = Self::args(algorithm, path, comment);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        render_command(&self.program, &args)
    }
}

/// OpenSSH agent reached through `ssh-add`
#[derive(Debug, Clone)]
pub struct SshAgent {
    program: String,
}

impl Default for SshAgent {
    fn default() -> Self {
        Self {
            program: "ssh-add".to_string(),
        }
    }
}

const WINDOWS_START_SCRIPT: &str =
    "Set-Service -Name ssh-agent -StartupType Automatic; Start-Service ssh-agent";

#[async_trait]
impl AgentClient for SshAgent {
    async fn status(&self) -> Result<AgentStatus> {
        let output = exec_capture(&self.program, &["-l"], None).await?;

        // 0: keys listed, 1: agent has no identities, 2: cannot connect
        match output.status {
            Some(0) | Some(1) => Ok(AgentStatus::Running),
            _ => Ok(AgentStatus::NotRunning),
        }
    }

    async fn start(&self) -> Result<()> {
        if cfg!(windows) {
            exec_checked(
                "powershell",
                &["-NoProfile", "-Command", WINDOWS_START_SCRIPT],
                None,
            )
            .await
            .context("Failed to start the ssh-agent service (requires an elevated shell)")?;
            Ok(())
        } else {
            anyhow::bail!("ssh-agent must be started from your login shell")
        }
    }

    async fn add(&self, private_key_path: &Path) -> Result<()> {
        exec_checked(&self.program, &[private_key_path.as_os_str()], None).await?;
        Ok(())
    }

    fn start_command(&self) -> String {
        if cfg!(windows) {
            format!("powershell -Command \"{WINDOWS_START_SCRIPT}\" (as Administrator)")
        } else {
            "eval \"$(ssh-agent -s)\"".to_string()
        }
    }
}
