//! Git CLI Tool
//!
//! Global configuration reads/writes and the handful of repository commands
//! needed to make and inspect one signed commit.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use super::process::{exec_capture, exec_checked};

/// Key/value access to the global git configuration
#[async_trait]
pub trait VcsConfig: Send + Sync {
    /// Read a global key. `Ok(None)` when the key is not set.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a global key, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Git commands beyond configuration
#[async_trait]
pub trait VcsTool: Send + Sync {
    /// Raw `git --version` output
    async fn version(&self) -> Result<String>;

    async fn init_repo(&self, dir: &Path) -> Result<()>;

    async fn stage(&self, dir: &Path, file: &str) -> Result<()>;

    async fn commit(&self, dir: &Path, message: &str) -> Result<()>;

    /// `git log --show-signature -1` output, stdout and stderr combined
    async fn show_signature(&self, dir: &Path) -> Result<String>;
}

/// The `git` executable on PATH
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl VcsConfig for GitCli {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let output = exec_capture(&self.program, &["config", "--global", "--get", key], None).await?;

        // `git config --get` exits 1 when the key is unset
        match output.status {
            Some(0) => {
                let value = output.stdout.trim();
                Ok((!value.is_empty()).then(|| value.to_string()))
            }
            Some(1) => Ok(None),
            _ => anyhow::bail!("git config --get {} failed with {}", key, output.failure_reason()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        exec_checked(&self.program, &["config", "--global", key, value], None).await?;
        Ok(())
    }
}

#[async_trait]
impl VcsTool for GitCli {
    async fn version(&self) -> Result<String> {
        exec_checked(&self.program, &["--version"], None).await
    }

    async fn init_repo(&self, dir: &Path) -> Result<()> {
        exec_checked(&self.program, &["init", "--quiet"], Some(dir)).await?;
        Ok(())
    }

    async fn stage(&self, dir: &Path, file: &str) -> Result<()> {
        exec_checked(&self.program, &["add", "--", file], Some(dir)).await?;
        Ok(())
    }

    async fn commit(&self, dir: &Path, message: &str) -> Result<()> {
        exec_checked(&self.program, &["commit", "--quiet", "-m", message], Some(dir)).await?;
        Ok(())
    }

    async fn show_signature(&self, dir: &Path) -> Result<String> {
        let output = exec_capture(
            &self.program,
            &["log", "--show-signature", "-1"],
            Some(dir),
        )
        .await?;

        if !output.success() {
            anyhow::bail!("git log failed with {}", output.failure_reason());
        }

        Ok(output.combined())
    }
}
