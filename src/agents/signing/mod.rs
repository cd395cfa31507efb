//! Git SSH Commit Signing Setup
//!
//! Prepares a developer machine for SSH-signed git commits in one pass:
//!
//! 1. Preflight - git and ssh-keygen present, git new enough, ssh-agent up
//! 2. Identity - `user.name` / `user.email` from config, host hints or prompts
//! 3. Key - Ed25519 pair from `ssh-keygen`, empty passphrase
//! 4. Agent - `ssh-add` the private key
//! 5. Config - `user.signingkey`, `gpg.format`, `commit.gpgsign`, `tag.gpgsign`
//! 6. Verify (optional) - one signed commit in a throwaway repository
//!
//! Only missing tools, a declined version prompt, and key generation
//! failures stop the run. Everything else becomes a warning in the
//! [`SetupReport`].
//!
//! ## Example Usage
//!
//! ```ignore
//! use lornu_git_signing::agents::signing::{Collaborators, SetupOptions, SigningSetupAgent};
//! use lornu_git_signing::tools::*;
//!
//! let git = GitCli::default();
//! let tools = Collaborators {
//!     config: &git,
//!     vcs: &git,
//!     keygen: &SshKeygen::default(),
//!     agent: &SshAgent::default(),
//!     host: &SystemHost,
//!     prompter: &TerminalPrompter,
//! };
//!
//! let options = SetupOptions::new("/home/me/.ssh").verify(true);
//! let report = SigningSetupAgent::new(tools, options).run().await?;
//! println!("{}", report.display());
//! ```

pub mod config_writer;
pub mod identity;
pub mod preflight;
pub mod provisioner;
pub mod registrar;
pub mod types;
pub mod verifier;

#[cfg(test)]
pub(crate) mod fakes;

pub use types::{
    Identity, IdentitySource, KeyMaterial, SetupError, SetupReport, SigningConfig, TagSigning,
    VerifyOutcome,
};

use std::path::PathBuf;

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::tools::{AgentClient, HostIdentity, KeyGenerator, Prompter, VcsConfig, VcsTool};
use config_writer::ConfigWriter;
use identity::IdentityResolver;
use preflight::PreflightChecker;
use provisioner::{default_comment, default_key_name, read_public_key, KeyProvisioner};
use registrar::AgentRegistrar;
use types::{keys, GitVersion, Warnings, MINIMUM_GIT_VERSION};
use verifier::Verifier;

/// Placeholder email domain when none is configured
pub const DEFAULT_PLACEHOLDER_DOMAIN: &str = "example.com";

/// External collaborators the setup drives
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub config: &'a dyn VcsConfig,
    pub vcs: &'a dyn VcsTool,
    pub keygen: &'a dyn KeyGenerator,
    pub agent: &'a dyn AgentClient,
    pub host: &'a dyn HostIdentity,
    pub prompter: &'a dyn Prompter,
}

/// Options for one setup run
#[derive(Debug, Clone)]
pub struct SetupOptions {
    /// Directory the key pair is written to (usually `~/.ssh`)
    pub key_dir: PathBuf,
    /// Defaults to `git_signing_<timestamp>`
    pub key_name: Option<String>,
    /// Defaults to `<email> - Git Signing <date>`
    pub comment: Option<String>,
    /// Overwrite existing keys without asking and re-probe identity
    pub force: bool,
    /// Leave `user.name` / `user.email` alone entirely
    pub skip_user_config: bool,
    pub tag_signing: TagSigning,
    pub verify: bool,
    pub placeholder_domain: String,
    pub minimum_version: GitVersion,
}

impl SetupOptions {
    pub fn new(key_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_dir: key_dir.into(),
            key_name: None,
            comment: None,
            force: false,
            skip_user_config: false,
            tag_signing: TagSigning::Prompt,
            verify: false,
            placeholder_domain: DEFAULT_PLACEHOLDER_DOMAIN.to_string(),
            minimum_version: MINIMUM_GIT_VERSION,
        }
    }

    pub fn key_name(mut self, key_name: Option<String>) -> Self {
        self.key_name = key_name;
        self
    }

    pub fn comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn skip_user_config(mut self, skip: bool) -> Self {
        self.skip_user_config = skip;
        self
    }

    pub fn tag_signing(mut self, tag_signing: TagSigning) -> Self {
        self.tag_signing = tag_signing;
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn placeholder_domain(mut self, domain: impl Into<String>) -> Self {
        self.placeholder_domain = domain.into();
        self
    }

    /// Quick variant defaults: identity left as configured, `tag.gpgsign`
    /// untouched, no verification.
    pub fn quick(key_dir: impl Into<PathBuf>) -> Self {
        Self::new(key_dir)
            .skip_user_config(true)
            .tag_signing(TagSigning::Leave)
    }
}

/// SSH commit signing setup agent
pub struct SigningSetupAgent<'a> {
    tools: Collaborators<'a>,
    options: SetupOptions,
}

impl<'a> SigningSetupAgent<'a> {
    pub fn new(tools: Collaborators<'a>, options: SetupOptions) -> Self {
        Self { tools, options }
    }

    /// Run the full pipeline at the current local time.
    pub async fn run(&self) -> Result<SetupReport, SetupError> {
        self.run_at(Local::now()).await
    }

    /// Run the full pipeline; `now` drives the default key name and comment.
    pub async fn run_at(&self, now: DateTime<Local>) -> Result<SetupReport, SetupError> {
        let tools = self.tools;
        let options = &self.options;
        let mut warnings = Warnings::default();

        info!(key_dir = %options.key_dir.display(), "Starting git signing setup");

        let preflight = PreflightChecker::new(tools.vcs, tools.keygen, tools.agent, tools.prompter)
            .run(options.minimum_version, &mut warnings)
            .await?;
        debug!(?preflight, "Preflight complete");

        let existing_name = self.read_config(keys::USER_NAME).await;
        let existing_email = self.read_config(keys::USER_EMAIL).await;

        let identity = if options.skip_user_config {
            debug!("Identity resolution skipped");
            Identity::existing(existing_name, existing_email)
        } else {
            IdentityResolver::new(tools.config, tools.host, tools.prompter, &options.placeholder_domain)
                .resolve(existing_name, existing_email, options.force, &mut warnings)
                .await
        };

        let comment = options
            .comment
            .clone()
            .unwrap_or_else(|| default_comment(identity.label(), now.date_naive()));
        let key_name = options
            .key_name
            .clone()
            .unwrap_or_else(|| default_key_name(now));

        let key = KeyProvisioner::new(tools.keygen, tools.prompter)
            .provision(&options.key_dir, &key_name, &comment, options.force)
            .await?;
        let public_key = read_public_key(&key)?;

        let agent_registered = match AgentRegistrar::new(tools.agent)
            .register(&key.private_key_path)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warnings.push(e);
                false
            }
        };

        let tag_sign = self.tag_sign_choice();
        let signing = SigningConfig::for_key(&key, tag_sign);
        let config = ConfigWriter::new(tools.config)
            .apply(&signing, &mut warnings)
            .await;

        let verification = if options.verify {
            let outcome = Verifier::new(tools.vcs).verify().await;
            if let VerifyOutcome::Inconclusive(reason) = &outcome {
                warnings.push(SetupError::VerificationInconclusive(reason.clone()));
            }
            Some(outcome)
        } else {
            None
        };

        info!(
            fingerprint = %public_key.fingerprint,
            key = %key.private_key_path.display(),
            warnings = warnings.len(),
            "Git signing setup finished"
        );

        Ok(SetupReport {
            identity,
            key,
            public_key: public_key.openssh,
            fingerprint: public_key.fingerprint,
            agent_registered,
            config,
            verification,
            warnings,
        })
    }

    async fn read_config(&self, key: &str) -> Option<String> {
        match self.tools.config.get(key).await {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %key, error = %e, "Could not read git config");
                None
            }
        }
    }

    fn tag_sign_choice(&self) -> Option<bool> {
        match self.options.tag_signing {
            TagSigning::Enable => Some(true),
            TagSigning::Disable => Some(false),
            TagSigning::Leave => None,
            TagSigning::Prompt => {
                match self.tools.prompter.confirm("Also sign tags (tag.gpgsign)?", false) {
                    Ok(answer) => Some(answer),
                    Err(e) => {
                        debug!(error = %e, "Tag signing prompt unavailable, leaving tag.gpgsign");
                        None
                    }
                }
            }
        }
    }
}
