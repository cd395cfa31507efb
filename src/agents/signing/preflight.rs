//! Environment Preflight
//!
//! Checks that git and ssh-keygen can run, that git is new enough for SSH
//! signing, and that an ssh-agent is reachable.

use tracing::{debug, info};

use super::types::{GitVersion, SetupError, Warnings};
use crate::tools::{AgentClient, AgentStatus, KeyGenerator, Prompter, VcsTool};

/// What preflight learned about the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    /// `None` when the version string could not be parsed
    pub git_version: Option<GitVersion>,
    pub agent_running: bool,
}

pub struct PreflightChecker<'a> {
    vcs: &'a dyn VcsTool,
    keygen: &'a dyn KeyGenerator,
    agent: &'a dyn AgentClient,
    prompter: &'a dyn Prompter,
}

impl<'a> PreflightChecker<'a> {
    pub fn new(
        vcs: &'a dyn VcsTool,
        keygen: &'a dyn KeyGenerator,
        agent: &'a dyn AgentClient,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            vcs,
            keygen,
            agent,
            prompter,
        }
    }

    /// Run every check. Only missing tools or a declined version prompt fail.
    pub async fn run(
        &self,
        required: GitVersion,
        warnings: &mut Warnings,
    ) -> Result<PreflightReport, SetupError> {
        let raw_version = self.check_vcs_available().await?;
        let git_version = self.check_minimum_version(&raw_version, required, warnings)?;
        self.check_keygen_available().await?;
        let agent_running = self.ensure_agent_running(warnings).await;

        Ok(PreflightReport {
            git_version,
            agent_running,
        })
    }

    /// Raw `git --version` output, or `ToolMissing`.
    pub async fn check_vcs_available(&self) -> Result<String, SetupError> {
        self.vcs
            .version()
            .await
            .map_err(|e| SetupError::ToolMissing {
                tool: "git".to_string(),
                reason: format!("{e:#}"),
                remedy: "install git from https://git-scm.com/downloads and reopen the terminal"
                    .to_string(),
            })
    }

    /// Warn about an old git and let the operator decide whether to go on.
    pub fn check_minimum_version(
        &self,
        raw_version: &str,
        required: GitVersion,
        warnings: &mut Warnings,
    ) -> Result<Option<GitVersion>, SetupError> {
        let Some(found) = GitVersion::parse(raw_version) else {
            debug!(raw = %raw_version, "Could not parse git version");
            warnings.push(SetupError::VersionUnknown(raw_version.trim().to_string()));
            return Ok(None);
        };

        if found >= required {
            info!(version = %found, "git version supports SSH signing");
            return Ok(Some(found));
        }

        warnings.push(SetupError::VersionTooOld { found, required });

        let question = format!("git {found} is older than {required}. Continue anyway?");
        match self.prompter.confirm(&question, false) {
            Ok(true) => Ok(Some(found)),
            Ok(false) => Err(SetupError::Aborted(format!(
                "git {found} is older than {required}"
            ))),
            Err(e) => {
                debug!(error = %e, "Version prompt unavailable, continuing");
                Ok(Some(found))
            }
        }
    }

    pub async fn check_keygen_available(&self) -> Result<(), SetupError> {
        self.keygen
            .check_available()
            .await
            .map_err(|e| SetupError::ToolMissing {
                tool: "ssh-keygen".to_string(),
                reason: format!("{e:#}"),
                remedy: if cfg!(windows) {
                    "Add-WindowsCapability -Online -Name OpenSSH.Client~~~~0.0.1.0".to_string()
                } else {
                    "install the OpenSSH client package (e.g. apt install openssh-client)"
                        .to_string()
                },
            })
    }

    /// Start the agent when it is not reachable. Never fails the run.
    pub async fn ensure_agent_running(&self, warnings: &mut Warnings) -> bool {
        match self.agent.status().await {
            Ok(AgentStatus::Running) => {
                debug!("ssh-agent is running");
                return true;
            }
            Ok(AgentStatus::NotRunning) => info!("ssh-agent is not running, trying to start it"),
            Err(e) => debug!(error = %e, "Could not query ssh-agent status"),
        }

        match self.agent.start().await {
            Ok(()) => {
                info!("ssh-agent started");
                true
            }
            Err(e) => {
                warnings.push(SetupError::AgentUnavailable {
                    reason: format!("{e:#}"),
                    remedy: self.agent.start_command(),
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::signing::fakes::{FakeAgent, FakeKeygen, FakeVcs, ScriptedPrompter};
    use crate::agents::signing::types::MINIMUM_GIT_VERSION;

    #[tokio::test]
    async fn test_missing_git_is_fatal() {
        let vcs = FakeVcs::with_version(None);
        let keygen = FakeKeygen::default();
        let agent = FakeAgent::default();
        let prompter = ScriptedPrompter::default();
        let checker = PreflightChecker::new(&vcs, &keygen, &agent, &prompter);
        let mut warnings = Warnings::default();

        let err = checker
            .run(MINIMUM_GIT_VERSION, &mut warnings)
            .await
            .unwrap_err();

        assert!(matches!(err, SetupError::ToolMissing { ref tool, .. } if tool == "git"));
        assert!(err.is_fatal());
        assert!(err.remedy().unwrap().contains("git-scm.com"));
    }

    #[tokio::test]
    async fn test_missing_keygen_is_fatal() {
        let vcs = FakeVcs::default();
        let keygen = FakeKeygen {
            missing: true,
            ..Default::default()
        };
        let agent = FakeAgent::default();
        let prompter = ScriptedPrompter::default();
        let checker = PreflightChecker::new(&vcs, &keygen, &agent, &prompter);
        let mut warnings = Warnings::default();

        let err = checker
            .run(MINIMUM_GIT_VERSION, &mut warnings)
            .await
            .unwrap_err();

        assert!(matches!(err, SetupError::ToolMissing { ref tool, .. } if tool == "ssh-keygen"));
    }

    #[tokio::test]
    async fn test_old_git_continue_on_confirm() {
        let vcs = FakeVcs::with_version(Some("git version 2.30.1"));
        let keygen = FakeKeygen::default();
        let agent = FakeAgent::default();
        let prompter = ScriptedPrompter::default().confirms(&[true]);
        let checker = PreflightChecker::new(&vcs, &keygen, &agent, &prompter);
        let mut warnings = Warnings::default();

        let report = checker.run(MINIMUM_GIT_VERSION, &mut warnings).await.unwrap();

        assert_eq!(report.git_version, GitVersion::parse("git version 2.30.1"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings.iter().next().unwrap().message.contains("2.30.1"));
    }

    #[tokio::test]
    async fn test_old_git_declined_aborts() {
        let vcs = FakeVcs::with_version(Some("git version 2.30.1"));
        let keygen = FakeKeygen::default();
        let agent = FakeAgent::default();
        let prompter = ScriptedPrompter::default().confirms(&[false]);
        let checker = PreflightChecker::new(&vcs, &keygen, &agent, &prompter);
        let mut warnings = Warnings::default();

        let err = checker
            .run(MINIMUM_GIT_VERSION, &mut warnings)
            .await
            .unwrap_err();

        assert!(matches!(err, SetupError::Aborted(_)));
    }

    #[tokio::test]
    async fn test_current_git_does_not_prompt() {
        let vcs = FakeVcs::with_version(Some("git version 2.34.1"));
        let keygen = FakeKeygen::default();
        let agent = FakeAgent::default();
        let prompter = ScriptedPrompter::default();
        let checker = PreflightChecker::new(&vcs, &keygen, &agent, &prompter);
        let mut warnings = Warnings::default();

        let report = checker.run(MINIMUM_GIT_VERSION, &mut warnings).await.unwrap();

        assert!(report.agent_running);
        assert!(warnings.is_empty());
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_agent_started_when_stopped() {
        let vcs = FakeVcs::default();
        let keygen = FakeKeygen::default();
        let agent = FakeAgent {
            running: false,
            ..Default::default()
        };
        let prompter = ScriptedPrompter::default();
        let checker = PreflightChecker::new(&vcs, &keygen, &agent, &prompter);
        let mut warnings = Warnings::default();

        assert!(checker.ensure_agent_running(&mut warnings).await);
        assert!(agent.was_started());
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_agent_unavailable_is_warning_with_remedy() {
        let vcs = FakeVcs::default();
        let keygen = FakeKeygen::default();
        let agent = FakeAgent::unavailable();
        let prompter = ScriptedPrompter::default();
        let checker = PreflightChecker::new(&vcs, &keygen, &agent, &prompter);
        let mut warnings = Warnings::default();

        let report = checker.run(MINIMUM_GIT_VERSION, &mut warnings).await.unwrap();

        assert!(!report.agent_running);
        let warning = warnings.iter().next().unwrap();
        assert_eq!(warning.remedy.as_deref(), Some("eval \"$(ssh-agent -s)\""));
    }
}
