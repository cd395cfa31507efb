//! SSH Signing Key Provisioning
//!
//! Generates Ed25519 key pairs with the external `ssh-keygen` and reads the
//! public half back using the `ssh-key` crate.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDate};
use ssh_key::{HashAlg, PublicKey};
use tracing::{debug, info};

use super::types::{KeyMaterial, SetupError};
use crate::tools::{KeyGenerator, Prompter};

/// Public key as written next to the private key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    /// Public key in OpenSSH format (e.g., "ssh-ed25519 AAAA... comment")
    pub openssh: String,
    /// SHA256 fingerprint
    pub fingerprint: String,
}

/// `git_signing_<YYYYMMDD_HHMMSS>`
pub fn default_key_name(now: DateTime<Local>) -> String {
    format!("git_signing_{}", now.format("%Y%m%d_%H%M%S"))
}

/// `<email or name> - Git Signing <YYYY-MM-DD>`
pub fn default_comment(label: Option<&str>, today: NaiveDate) -> String {
    match label {
        Some(label) => format!("{label} - Git Signing {}", today.format("%Y-%m-%d")),
        None => format!("Git Signing {}", today.format("%Y-%m-%d")),
    }
}

fn validate_key_name(key_name: &str) -> Result<(), String> {
    if key_name.is_empty()
        || key_name.starts_with('.')
        || !key_name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(format!(
            "Key name must be alphanumeric characters, dots, hyphens, or underscores: {key_name}"
        ));
    }
    Ok(())
}

pub struct KeyProvisioner<'a> {
    keygen: &'a dyn KeyGenerator,
    prompter: &'a dyn Prompter,
}

impl<'a> KeyProvisioner<'a> {
    pub fn new(keygen: &'a dyn KeyGenerator, prompter: &'a dyn Prompter) -> Self {
        Self { keygen, prompter }
    }

    /// Create `<base_dir>/<key_name>` and its `.pub`.
    ///
    /// When a key already exists and `overwrite` is false the operator is
    /// asked once: "no" keeps the existing files untouched and returns them
    /// as reused, "yes" removes both files and generates a new pair.
    pub async fn provision(
        &self,
        base_dir: &Path,
        key_name: &str,
        comment: &str,
        overwrite: bool,
    ) -> Result<KeyMaterial, SetupError> {
        let mut material = KeyMaterial::new(base_dir.join(key_name), comment);
        let command =
            self.keygen
                .command_line(material.algorithm, &material.private_key_path, comment);

        validate_key_name(key_name)
            .map_err(|reason| SetupError::KeyGenerationFailed { reason, command: command.clone() })?;

        fs::create_dir_all(base_dir)?;

        if material.private_key_path.exists() || material.public_key_path.exists() {
            let replace = overwrite || {
                let question = format!(
                    "A key already exists at {}. Overwrite it?",
                    material.private_key_path.display()
                );
                self.prompter
                    .confirm(&question, false)
                    .map_err(|e| SetupError::Prompt(format!("{e:#}")))?
            };

            if !replace {
                info!(path = %material.private_key_path.display(), "Keeping existing key");
                material.comment = existing_comment(&material.public_key_path);
                material.reused = true;
                return Ok(material);
            }

            remove_if_exists(&material.private_key_path)?;
            remove_if_exists(&material.public_key_path)?;
            debug!(path = %material.private_key_path.display(), "Removed existing key pair");
        }

        info!(
            algorithm = %material.algorithm,
            path = %material.private_key_path.display(),
            comment = %comment,
            "Generating SSH signing key"
        );

        self.keygen
            .generate(material.algorithm, &material.private_key_path, comment)
            .await
            .map_err(|e| SetupError::KeyGenerationFailed {
                reason: format!("{e:#}"),
                command,
            })?;

        Ok(material)
    }
}

/// Comment of a kept public key, empty when it cannot be read.
fn existing_comment(public_key_path: &Path) -> String {
    fs::read_to_string(public_key_path)
        .ok()
        .and_then(|openssh| PublicKey::from_openssh(openssh.trim()).ok())
        .map(|key| key.comment().to_string())
        .unwrap_or_default()
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Read and fingerprint the public key of `material`.
pub fn read_public_key(material: &KeyMaterial) -> Result<PublicKeyInfo, SetupError> {
    let path = &material.public_key_path;
    let failed = |reason: String| SetupError::KeyGenerationFailed {
        reason,
        command: format!("ssh-keygen -y -f \"{}\"", material.private_key_path.display()),
    };

    let openssh = fs::read_to_string(path)
        .map_err(|e| failed(format!("Failed to read public key {}: {e}", path.display())))?
        .trim()
        .to_string();

    let public_key = PublicKey::from_openssh(&openssh)
        .map_err(|e| failed(format!("Failed to parse public key {}: {e}", path.display())))?;

    let fingerprint = public_key.fingerprint(HashAlg::Sha256).to_string();
    debug!(fingerprint = %fingerprint, "Public key loaded");

    Ok(PublicKeyInfo {
        openssh,
        fingerprint,
    })
}
