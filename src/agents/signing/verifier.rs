//! Signed Commit Verification
//!
//! Makes one commit in a throwaway repository and looks for a signature in
//! `git log --show-signature`. The result is advisory only.
//!
//! The repository lives in a `tempfile::TempDir`, so it is removed on every
//! exit path, including early returns and panics.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::types::VerifyOutcome;
use crate::tools::VcsTool;

const PROBE_FILE: &str = "signing-check.txt";

/// Heuristic read of `git log --show-signature` output.
pub fn classify_signature_output(output: &str) -> VerifyOutcome {
    let lowered = output.to_lowercase();
    if lowered.contains("signature") && !lowered.contains("no signature") {
        VerifyOutcome::Verified
    } else {
        VerifyOutcome::Inconclusive("no signature found in git log output".to_string())
    }
}

pub struct Verifier<'a> {
    vcs: &'a dyn VcsTool,
}

impl<'a> Verifier<'a> {
    pub fn new(vcs: &'a dyn VcsTool) -> Self {
        Self { vcs }
    }

    pub async fn verify(&self) -> VerifyOutcome {
        let dir = match tempfile::Builder::new()
            .prefix("git-signing-check-")
            .tempdir()
        {
            Ok(dir) => dir,
            Err(e) => return VerifyOutcome::Inconclusive(format!("no temporary directory: {e}")),
        };

        let outcome = match self.signed_commit_output(dir.path()).await {
            Ok(output) => classify_signature_output(&output),
            Err(e) => VerifyOutcome::Inconclusive(format!("{e:#}")),
        };

        let path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove verification repository");
        }

        match &outcome {
            VerifyOutcome::Verified => info!("Signed test commit verified"),
            VerifyOutcome::Inconclusive(reason) => info!(reason = %reason, "Verification inconclusive"),
        }
        outcome
    }

    async fn signed_commit_output(&self, dir: &Path) -> Result<String> {
        self.vcs.init_repo(dir).await.context("git init failed")?;

        fs::write(dir.join(PROBE_FILE), "ssh signing check\n")
            .context("Failed to write test file")?;

        self.vcs.stage(dir, PROBE_FILE).await.context("git add failed")?;
        self.vcs
            .commit(dir, "Test signed commit")
            .await
            .context("git commit failed")?;

        let output = self.vcs.show_signature(dir).await?;
        debug!(output = %output, "Signature output");
        Ok(output)
    }
}
