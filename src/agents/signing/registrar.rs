//! ssh-agent Registration

use std::path::Path;

use tracing::info;

use super::types::SetupError;
use crate::tools::AgentClient;

pub struct AgentRegistrar<'a> {
    agent: &'a dyn AgentClient,
}

impl<'a> AgentRegistrar<'a> {
    pub fn new(agent: &'a dyn AgentClient) -> Self {
        Self { agent }
    }

    /// Add the private key to the running agent.
    ///
    /// Failure is `AgentUnavailable`; the key on disk stays usable once an
    /// agent is started later.
    pub async fn register(&self, private_key_path: &Path) -> Result<(), SetupError> {
        self.agent
            .add(private_key_path)
            .await
            .map_err(|e| SetupError::AgentUnavailable {
                reason: format!("{e:#}"),
                remedy: self.agent.add_command(private_key_path),
            })?;

        info!(path = %private_key_path.display(), "Key added to ssh-agent");
        Ok(())
    }
}
