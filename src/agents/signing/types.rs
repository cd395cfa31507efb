//! Types for SSH commit signing setup
//!
//! This module contains the values that flow through a single setup run:
//! the resolved identity, the generated key material, the signing
//! configuration written to git, and the error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Global git config keys touched by the setup.
pub mod keys {
    pub const USER_NAME: &str = "user.name";
    pub const USER_EMAIL: &str = "user.email";
    pub const SIGNING_KEY: &str = "user.signingkey";
    pub const GPG_FORMAT: &str = "gpg.format";
    pub const COMMIT_GPGSIGN: &str = "commit.gpgsign";
    pub const TAG_GPGSIGN: &str = "tag.gpgsign";
}

/// Oldest git release with SSH signing support we accept without asking.
pub const MINIMUM_GIT_VERSION: GitVersion = GitVersion {
    major: 2,
    minor: 34,
    patch: 0,
};

/// Supported SSH key algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    /// Ed25519 (the only algorithm git signing keys are generated with)
    #[default]
    Ed25519,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Ed25519 => write!(f, "ed25519"),
        }
    }
}

/// Where an identity value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// Directory user principal name (`whoami /upn`)
    Upn,
    /// Domain-joined account name (`DOMAIN\user`)
    WindowsIdentity,
    /// Principal name assembled from environment variables
    EnvironmentVariable,
    /// Signed-in account of the Azure CLI
    CloudCli,
    /// Typed in by the operator
    Manual,
    /// Pre-existing config left untouched, or nothing found
    #[default]
    Unset,
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IdentitySource::Upn => "user principal name",
            IdentitySource::WindowsIdentity => "windows identity",
            IdentitySource::EnvironmentVariable => "environment",
            IdentitySource::CloudCli => "azure cli",
            IdentitySource::Manual => "manual entry",
            IdentitySource::Unset => "existing config",
        };
        f.write_str(label)
    }
}

/// Operator identity used for `user.name` / `user.email` and the key comment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
    /// First probe that supplied a value
    pub source: IdentitySource,
    /// The email was synthesized from an account name, not discovered
    pub email_is_placeholder: bool,
}

impl Identity {
    /// Identity taken verbatim from existing configuration.
    pub fn existing(name: Option<String>, email: Option<String>) -> Self {
        Self {
            name,
            email,
            source: IdentitySource::Unset,
            email_is_placeholder: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.email.is_some()
    }

    /// Label used in the default key comment: email first, then name.
    pub fn label(&self) -> Option<&str> {
        self.email.as_deref().or(self.name.as_deref())
    }
}

/// Key pair written by the provisioner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub algorithm: KeyAlgorithm,
    pub comment: String,
    /// Always false: keys are generated without a passphrase
    pub has_passphrase: bool,
    /// An existing key at the target path was kept instead of regenerated
    pub reused: bool,
}

impl KeyMaterial {
    pub fn new(private_key_path: PathBuf, comment: impl Into<String>) -> Self {
        let public_key_path = public_key_path_for(&private_key_path);
        Self {
            private_key_path,
            public_key_path,
            algorithm: KeyAlgorithm::Ed25519,
            comment: comment.into(),
            has_passphrase: false,
            reused: false,
        }
    }
}

/// `<private>.pub`, the path ssh-keygen writes the public half to.
pub fn public_key_path_for(private_key_path: &Path) -> PathBuf {
    let mut path = private_key_path.as_os_str().to_owned();
    path.push(".pub");
    PathBuf::from(path)
}

/// Signing options written to the global git config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Path to the public key
    pub signing_key: PathBuf,
    /// Always "ssh"
    pub format: String,
    /// Always true
    pub commit_sign: bool,
    /// `None` leaves `tag.gpgsign` untouched
    pub tag_sign: Option<bool>,
}

impl SigningConfig {
    pub fn for_key(key: &KeyMaterial, tag_sign: Option<bool>) -> Self {
        Self {
            signing_key: key.public_key_path.clone(),
            format: "ssh".to_string(),
            commit_sign: true,
            tag_sign,
        }
    }

    /// Config entries in write order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            (
                keys::SIGNING_KEY,
                self.signing_key.to_string_lossy().into_owned(),
            ),
            (keys::GPG_FORMAT, self.format.clone()),
            (keys::COMMIT_GPGSIGN, self.commit_sign.to_string()),
        ];
        if let Some(tag_sign) = self.tag_sign {
            entries.push((keys::TAG_GPGSIGN, tag_sign.to_string()));
        }
        entries
    }
}

/// What to do about `tag.gpgsign`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagSigning {
    /// Ask the operator
    #[default]
    Prompt,
    Enable,
    Disable,
    /// Do not write the key at all
    Leave,
}

/// Parsed `git --version`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GitVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GitVersion {
    /// Parse output such as `git version 2.39.2` or
    /// `git version 2.45.1.windows.1`.
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw
            .split_whitespace()
            .find(|t| t.chars().next().is_some_and(|c| c.is_ascii_digit()))?;

        let mut parts = token.split('.').map(leading_number);
        let major = parts.next()??;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);

        Some(Self {
            major,
            minor,
            patch,
        })
    }
}

fn leading_number(part: &str) -> Option<u32> {
    let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

impl fmt::Display for GitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Result of the throwaway-commit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Verified,
    Inconclusive(String),
}

/// Outcome of writing the signing config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigWriteReport {
    pub applied: Vec<String>,
    pub failed: Option<String>,
    pub skipped: Vec<String>,
}

impl ConfigWriteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_none() && self.skipped.is_empty()
    }
}

/// A non-fatal problem surfaced to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupWarning {
    pub message: String,
    pub remedy: Option<String>,
}

/// Warnings collected over a run, logged as they arrive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Warnings(Vec<SetupWarning>);

impl Warnings {
    pub fn push(&mut self, error: SetupError) {
        let warning = SetupWarning {
            message: error.to_string(),
            remedy: error.remedy(),
        };
        match &warning.remedy {
            Some(remedy) => warn!(remedy = %remedy, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
        self.0.push(warning);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SetupWarning> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Summary of a completed setup run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupReport {
    pub identity: Identity,
    pub key: KeyMaterial,
    /// Public key line as written by ssh-keygen
    pub public_key: String,
    /// SHA256 fingerprint
    pub fingerprint: String,
    pub agent_registered: bool,
    pub config: ConfigWriteReport,
    pub verification: Option<VerifyOutcome>,
    pub warnings: Warnings,
}

impl SetupReport {
    /// Format the report for display
    pub fn display(&self) -> String {
        let mut out = String::from("Git SSH Signing Setup:\n");

        let name = self.identity.name.as_deref().unwrap_or("(not set)");
        let email = self.identity.email.as_deref().unwrap_or("(not set)");
        out.push_str(&format!("  Name: {name}\n  Email: {email}\n"));
        if self.identity.source != IdentitySource::Unset {
            out.push_str(&format!("  Identity source: {}\n", self.identity.source));
        }

        let state = if self.key.reused { " (existing key kept)" } else { "" };
        out.push_str(&format!(
            "  Algorithm: {}\n  Private key: {}{}\n  Public key file: {}\n  Fingerprint: {}\n",
            self.key.algorithm,
            self.key.private_key_path.display(),
            state,
            self.key.public_key_path.display(),
            self.fingerprint,
        ));

        let agent = if self.agent_registered { "registered" } else { "not registered" };
        out.push_str(&format!("  ssh-agent: {agent}\n"));

        out.push_str(&format!("  Config applied: {}\n", self.config.applied.join(", ")));
        if let Some(failed) = &self.config.failed {
            out.push_str(&format!("  Config failed: {failed}\n"));
        }
        if !self.config.skipped.is_empty() {
            out.push_str(&format!("  Config skipped: {}\n", self.config.skipped.join(", ")));
        }

        match &self.verification {
            Some(VerifyOutcome::Verified) => out.push_str("  Verification: signed commit detected\n"),
            Some(VerifyOutcome::Inconclusive(reason)) => {
                out.push_str(&format!("  Verification: inconclusive ({reason})\n"))
            }
            None => {}
        }

        if !self.warnings.is_empty() {
            out.push_str("Warnings:\n");
            for warning in self.warnings.iter() {
                out.push_str(&format!("  - {}\n", warning.message));
                if let Some(remedy) = &warning.remedy {
                    out.push_str(&format!("    run: {remedy}\n"));
                }
            }
        }

        out.push_str("Public Key (add it to your Git host as a signing key):\n");
        out.push_str(&self.public_key);
        out
    }
}

/// Errors that can occur during signing setup
#[derive(Debug, Error)]
pub enum SetupError {
    /// A required external tool could not be run
    #[error("{tool} is not available: {reason}")]
    ToolMissing {
        tool: String,
        reason: String,
        remedy: String,
    },

    /// git is older than the version with SSH signing support
    #[error("git {found} is older than {required}; SSH signing may not work")]
    VersionTooOld {
        found: GitVersion,
        required: GitVersion,
    },

    /// `git --version` output that does not contain a version number
    #[error("Could not determine git version from '{0}'")]
    VersionUnknown(String),

    /// ssh-keygen failed or left no usable public key
    #[error("Key generation failed: {reason}")]
    KeyGenerationFailed { reason: String, command: String },

    /// ssh-agent is not running or refused the key
    #[error("ssh-agent unavailable: {reason}")]
    AgentUnavailable { reason: String, remedy: String },

    /// A single `git config` write failed
    #[error("Failed to set {key}: {reason}")]
    ConfigWriteFailed {
        key: String,
        value: String,
        reason: String,
    },

    /// A config write that never ran because an earlier one failed
    #[error("Skipped setting {key} after an earlier config failure")]
    ConfigWriteSkipped { key: String, value: String },

    /// Identity field left empty after every probe and prompt
    #[error("Could not determine {key}")]
    IdentityUnresolved { key: String },

    /// The throwaway signed commit could not be confirmed
    #[error("Verification inconclusive: {0}")]
    VerificationInconclusive(String),

    /// Operator declined to continue
    #[error("Setup cancelled: {0}")]
    Aborted(String),

    /// Interactive prompt could not be shown or answered
    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SetupError {
    /// Fatal errors stop the pipeline and make the process exit with 1.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SetupError::ToolMissing { .. }
                | SetupError::KeyGenerationFailed { .. }
                | SetupError::Aborted(_)
                | SetupError::Prompt(_)
                | SetupError::Io(_)
        )
    }

    /// Exact command the operator can run to fix things by hand.
    pub fn remedy(&self) -> Option<String> {
        match self {
            SetupError::ToolMissing { remedy, .. } => Some(remedy.clone()),
            SetupError::VersionTooOld { required, .. } => Some(format!(
                "upgrade git to {}.{} or later (https://git-scm.com/downloads)",
                required.major, required.minor
            )),
            SetupError::KeyGenerationFailed { command, .. } => Some(command.clone()),
            SetupError::AgentUnavailable { remedy, .. } => Some(remedy.clone()),
            SetupError::ConfigWriteFailed { key, value, .. }
            | SetupError::ConfigWriteSkipped { key, value } => {
                Some(git_config_command(key, value))
            }
            SetupError::IdentityUnresolved { key } => {
                Some(git_config_command(key, &format!("<your {}>", key.trim_start_matches("user."))))
            }
            _ => None,
        }
    }
}

/// `git config --global <key> "<value>"`
pub fn git_config_command(key: &str, value: &str) -> String {
    format!("git config --global {key} \"{value}\"")
}
