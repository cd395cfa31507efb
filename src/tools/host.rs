//! Host Identity Surface
//!
//! Raw, unparsed identity hints from the operating system and the optional
//! Azure CLI. Interpretation lives in the identity resolver.

use std::env;

use anyhow::Result;
use async_trait::async_trait;

use super::process::exec_checked;

/// Sources of identity hints on the local machine
#[async_trait]
pub trait HostIdentity: Send + Sync {
    /// Directory user principal name (`whoami /upn`)
    async fn user_principal_name(&self) -> Result<String>;

    /// Account name of the current process, `DOMAIN\user` when domain-joined
    async fn joined_identity(&self) -> Result<String>;

    fn env_var(&self, name: &str) -> Option<String>;

    /// JSON record of the signed-in cloud account
    async fn cloud_account(&self) -> Result<String>;
}

/// The real machine
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

#[async_trait]
impl HostIdentity for SystemHost {
    async fn user_principal_name(&self) -> Result<String> {
        exec_checked("whoami", &["/upn"], None).await
    }

    async fn joined_identity(&self) -> Result<String> {
        exec_checked("whoami", &[] as &[&str], None).await
    }

    fn env_var(&self, name: &str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.trim().is_empty())
    }

    async fn cloud_account(&self) -> Result<String> {
        // The Azure CLI ships as a batch wrapper on Windows
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        exec_checked(program, &["account", "show", "--output", "json"], None).await
    }
}
