//! Signing Config Writer
//!
//! Writes the signing entries one `git config --global` call at a time.
//! There is no rollback: when a write fails, earlier entries stay applied
//! and the remaining ones are reported as skipped.

use tracing::info;

use super::types::{ConfigWriteReport, SetupError, SigningConfig, Warnings};
use crate::tools::VcsConfig;

pub struct ConfigWriter<'a> {
    config: &'a dyn VcsConfig,
}

impl<'a> ConfigWriter<'a> {
    pub fn new(config: &'a dyn VcsConfig) -> Self {
        Self { config }
    }

    pub async fn apply(&self, signing: &SigningConfig, warnings: &mut Warnings) -> ConfigWriteReport {
        let mut report = ConfigWriteReport::default();
        let mut entries = signing.entries().into_iter();

        for (key, value) in entries.by_ref() {
            match self.config.set(key, &value).await {
                Ok(()) => {
                    info!(key = %key, value = %value, "Signing config written");
                    report.applied.push(key.to_string());
                }
                Err(e) => {
                    warnings.push(SetupError::ConfigWriteFailed {
                        key: key.to_string(),
                        value,
                        reason: format!("{e:#}"),
                    });
                    report.failed = Some(key.to_string());
                    break;
                }
            }
        }

        for (key, value) in entries {
            warnings.push(SetupError::ConfigWriteSkipped {
                key: key.to_string(),
                value,
            });
            report.skipped.push(key.to_string());
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::signing::fakes::InMemoryConfig;
    use crate::agents::signing::types::{keys, KeyMaterial};
    use std::path::PathBuf;

    fn signing(tag_sign: Option<bool>) -> SigningConfig {
        let key = KeyMaterial::new(PathBuf::from("/k/git_signing_1"), "c");
        SigningConfig::for_key(&key, tag_sign)
    }

    #[tokio::test]
    async fn test_apply_writes_all_entries() {
        let config = InMemoryConfig::with(&[("core.editor", "vim")]);
        let mut warnings = Warnings::default();

        let report = ConfigWriter::new(&config).apply(&signing(Some(true)), &mut warnings).await;

        assert!(report.is_complete());
        assert_eq!(
            config.written_keys(),
            vec![
                keys::SIGNING_KEY.to_string(),
                keys::GPG_FORMAT.to_string(),
                keys::COMMIT_GPGSIGN.to_string(),
                keys::TAG_GPGSIGN.to_string(),
            ]
        );
        assert_eq!(config.value(keys::SIGNING_KEY).as_deref(), Some("/k/git_signing_1.pub"));
        assert_eq!(config.value("core.editor").as_deref(), Some("vim"));
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let config = InMemoryConfig::default();
        let mut warnings = Warnings::default();
        let writer = ConfigWriter::new(&config);

        writer.apply(&signing(None), &mut warnings).await;
        let first = config.value(keys::GPG_FORMAT);
        writer.apply(&signing(None), &mut warnings).await;

        assert_eq!(config.value(keys::GPG_FORMAT), first);
        assert_eq!(config.value(keys::TAG_GPGSIGN), None);
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_and_skips_later() {
        let config = InMemoryConfig::default().fail_on(keys::GPG_FORMAT);
        let mut warnings = Warnings::default();

        let report = ConfigWriter::new(&config).apply(&signing(Some(false)), &mut warnings).await;

        assert_eq!(report.applied, vec![keys::SIGNING_KEY.to_string()]);
        assert_eq!(report.failed.as_deref(), Some(keys::GPG_FORMAT));
        assert_eq!(
            report.skipped,
            vec![keys::COMMIT_GPGSIGN.to_string(), keys::TAG_GPGSIGN.to_string()]
        );
        assert_eq!(config.value(keys::COMMIT_GPGSIGN), None);

        // one warning per unapplied key, each with the manual command
        let remedies: Vec<_> = warnings.iter().filter_map(|w| w.remedy.clone()).collect();
        assert_eq!(
            remedies,
            vec![
                "git config --global gpg.format \"ssh\"".to_string(),
                "git config --global commit.gpgsign \"true\"".to_string(),
                "git config --global tag.gpgsign \"false\"".to_string(),
            ]
        );
    }
}
