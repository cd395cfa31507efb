//! Operator Identity Resolution
//!
//! Fills `user.name` / `user.email` from the first host hint that yields a
//! usable value. Probes run in a fixed priority order and each one is
//! skipped once every field it can supply is already known:
//!
//! 1. `Upn` - directory user principal name
//! 2. `WindowsIdentity` - `DOMAIN\user` account name (may synthesize a
//!    placeholder email, offered to the operator only when no later probe
//!    finds a real one)
//! 3. `EnvironmentVariable` - pre-formed principal names or
//!    `USERNAME@USERDNSDOMAIN`
//! 4. `CloudCli` - signed-in Azure CLI account
//!
//! Anything still missing is asked for interactively. A failing probe is
//! only logged at debug level.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use super::types::{keys, Identity, IdentitySource, SetupError, Warnings};
use crate::tools::{HostIdentity, Prompter, VcsConfig};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+$").expect("username pattern compiles"));

/// Pre-formed principal names, checked in order.
const PRINCIPAL_ENV_VARS: [&str; 2] = ["USERPRINCIPALNAME", "UPN"];

/// Syntactic email check: one token, one `@`, a `.` somewhere after it.
pub fn is_email_shaped(candidate: &str) -> bool {
    EMAIL_PATTERN.is_match(candidate)
}

pub fn parse_upn(raw: &str) -> Option<String> {
    let upn = raw.trim();
    is_email_shaped(upn).then(|| upn.to_string())
}

/// Extract `user` from `DOMAIN\user`.
pub fn parse_joined_identity(raw: &str) -> Option<String> {
    let (domain, user) = raw.trim().split_once('\\')?;
    if domain.is_empty() || user.is_empty() || user.contains('\\') {
        return None;
    }
    Some(user.to_string())
}

/// `user@domain` guess for account names that are safe in an email local part.
pub fn placeholder_email(username: &str, domain: &str) -> Option<String> {
    USERNAME_PATTERN
        .is_match(username)
        .then(|| format!("{}@{}", username.to_lowercase(), domain))
}

/// Email from the environment: pre-formed principal names first, then
/// `USERNAME` (or `USER`) joined with `USERDNSDOMAIN`.
pub fn email_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    for var in PRINCIPAL_ENV_VARS {
        if let Some(email) = lookup(var).as_deref().and_then(parse_upn) {
            return Some(email);
        }
    }

    let user = lookup("USERNAME").or_else(|| lookup("USER"))?;
    let domain = lookup("USERDNSDOMAIN")?;
    parse_upn(&format!("{}@{}", user.trim(), domain.trim().to_lowercase()))
}

#[derive(Debug, Deserialize)]
struct CloudAccount {
    user: Option<CloudUser>,
}

#[derive(Debug, Deserialize)]
struct CloudUser {
    name: Option<String>,
}

/// `user.name` of `az account show` output, when email-shaped.
pub fn parse_cloud_account(raw_json: &str) -> Option<String> {
    let account: CloudAccount = serde_json::from_str(raw_json).ok()?;
    account.user?.name.as_deref().and_then(parse_upn)
}

/// Values one probe produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeHit {
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_is_placeholder: bool,
}

/// Identity hint sources in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Upn,
    WindowsIdentity,
    EnvironmentVariable,
    CloudCli,
}

pub const PROBE_ORDER: [Probe; 4] = [
    Probe::Upn,
    Probe::WindowsIdentity,
    Probe::EnvironmentVariable,
    Probe::CloudCli,
];

impl Probe {
    pub fn source(self) -> IdentitySource {
        match self {
            Probe::Upn => IdentitySource::Upn,
            Probe::WindowsIdentity => IdentitySource::WindowsIdentity,
            Probe::EnvironmentVariable => IdentitySource::EnvironmentVariable,
            Probe::CloudCli => IdentitySource::CloudCli,
        }
    }

    fn supplies_name(self) -> bool {
        matches!(self, Probe::WindowsIdentity)
    }

    /// Whether running this probe could fill a field that is still empty.
    pub fn is_needed(self, identity: &Identity) -> bool {
        identity.email.is_none() || (self.supplies_name() && identity.name.is_none())
    }

    /// Query the host. `Ok` with an empty hit means "ran, found nothing usable".
    pub async fn run(
        self,
        host: &dyn HostIdentity,
        placeholder_domain: &str,
    ) -> anyhow::Result<ProbeHit> {
        let hit = match self {
            Probe::Upn => ProbeHit {
                email: parse_upn(&host.user_principal_name().await?),
                ..Default::default()
            },
            Probe::WindowsIdentity => {
                let raw = host.joined_identity().await?;
                match parse_joined_identity(&raw) {
                    Some(user) => ProbeHit {
                        email: placeholder_email(&user, placeholder_domain),
                        email_is_placeholder: true,
                        name: Some(user),
                    },
                    None => ProbeHit::default(),
                }
            }
            Probe::EnvironmentVariable => ProbeHit {
                email: email_from_env(|name| host.env_var(name)),
                ..Default::default()
            },
            Probe::CloudCli => ProbeHit {
                email: parse_cloud_account(&host.cloud_account().await?),
                ..Default::default()
            },
        };
        Ok(hit)
    }
}

/// Fold a probe hit into the identity without replacing known values.
/// Returns true when any field was taken.
pub fn merge_hit(identity: &mut Identity, probe: Probe, hit: ProbeHit) -> bool {
    let mut taken = false;

    if identity.name.is_none() {
        if let Some(name) = hit.name {
            identity.name = Some(name);
            taken = true;
        }
    }

    if identity.email.is_none() {
        if let Some(email) = hit.email {
            identity.email = Some(email);
            identity.email_is_placeholder = hit.email_is_placeholder;
            taken = true;
        }
    }

    if taken && identity.source == IdentitySource::Unset {
        identity.source = probe.source();
    }
    taken
}

/// Identity resolution against the host, the operator and the config store
pub struct IdentityResolver<'a> {
    config: &'a dyn VcsConfig,
    host: &'a dyn HostIdentity,
    prompter: &'a dyn Prompter,
    placeholder_domain: String,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(
        config: &'a dyn VcsConfig,
        host: &'a dyn HostIdentity,
        prompter: &'a dyn Prompter,
        placeholder_domain: impl Into<String>,
    ) -> Self {
        Self {
            config,
            host,
            prompter,
            placeholder_domain: placeholder_domain.into(),
        }
    }

    /// Resolve name and email.
    ///
    /// Existing values are returned untouched unless `force_refresh` is set.
    /// Newly resolved values are written to the global config before
    /// returning.
    pub async fn resolve(
        &self,
        existing_name: Option<String>,
        existing_email: Option<String>,
        force_refresh: bool,
        warnings: &mut Warnings,
    ) -> Identity {
        let (known_name, known_email) = if force_refresh {
            (None, None)
        } else {
            (non_empty(existing_name), non_empty(existing_email))
        };

        if known_name.is_some() && known_email.is_some() {
            debug!("Identity already configured, skipping probes");
            return Identity::existing(known_name, known_email);
        }

        let mut identity = Identity::existing(known_name.clone(), known_email.clone());
        // A synthesized email is only a fallback; later probes may still find a real one
        let mut placeholder: Option<String> = None;

        for probe in PROBE_ORDER {
            if identity.is_complete() {
                break;
            }
            if !probe.is_needed(&identity) {
                debug!(probe = ?probe, "Identity probe not needed");
                continue;
            }

            match probe.run(self.host, &self.placeholder_domain).await {
                Ok(mut hit) => {
                    if hit.email_is_placeholder {
                        placeholder = placeholder.or(hit.email.take());
                        hit.email_is_placeholder = false;
                    }
                    if merge_hit(&mut identity, probe, hit) {
                        debug!(probe = ?probe, "Identity probe supplied a value");
                    } else {
                        debug!(probe = ?probe, "Identity probe found nothing usable");
                    }
                }
                Err(e) => debug!(probe = ?probe, error = %e, "Identity probe failed"),
            }
        }

        if identity.email.is_none() {
            if let Some(email) = placeholder {
                self.confirm_placeholder(&mut identity, email);
            }
        }

        self.prompt_missing(&mut identity, warnings);

        if identity.name != known_name {
            if let Some(name) = &identity.name {
                self.persist(keys::USER_NAME, name, warnings).await;
            }
        }
        if identity.email != known_email {
            if let Some(email) = &identity.email {
                self.persist(keys::USER_EMAIL, email, warnings).await;
            }
        }

        info!(
            name = ?identity.name,
            email = ?identity.email,
            source = %identity.source,
            "Identity resolved"
        );
        identity
    }

    /// Keep a synthesized email only when the operator says so.
    fn confirm_placeholder(&self, identity: &mut Identity, email: String) {
        let question = format!("Use {email} as your git email? (guessed from your account name)");
        match self.prompter.confirm(&question, false) {
            Ok(true) => {
                debug!(email = %email, "Placeholder email confirmed");
                identity.email = Some(email);
                identity.email_is_placeholder = true;
                if identity.source == IdentitySource::Unset {
                    identity.source = IdentitySource::WindowsIdentity;
                }
            }
            Ok(false) => debug!(email = %email, "Placeholder email rejected"),
            Err(e) => debug!(error = %e, "Placeholder email could not be confirmed"),
        }
    }

    fn prompt_missing(&self, identity: &mut Identity, warnings: &mut Warnings) {
        if identity.name.is_none() {
            identity.name = self.ask(keys::USER_NAME, "Your name for git commits", warnings);
            if identity.name.is_some() && identity.source == IdentitySource::Unset {
                identity.source = IdentitySource::Manual;
            }
        }

        if identity.email.is_none() {
            identity.email = self.ask(keys::USER_EMAIL, "Your email for git commits", warnings);
            if let Some(email) = &identity.email {
                if !is_email_shaped(email) {
                    debug!(email = %email, "Entered email does not look like an address");
                }
                if identity.source == IdentitySource::Unset {
                    identity.source = IdentitySource::Manual;
                }
            }
        }
    }

    fn ask(&self, key: &str, question: &str, warnings: &mut Warnings) -> Option<String> {
        let answer = match self.prompter.ask(question) {
            Ok(answer) => non_empty(Some(answer)),
            Err(e) => {
                debug!(key = %key, error = %e, "Prompt unavailable");
                None
            }
        };
        if answer.is_none() {
            warnings.push(SetupError::IdentityUnresolved {
                key: key.to_string(),
            });
        }
        answer
    }

    async fn persist(&self, key: &str, value: &str, warnings: &mut Warnings) {
        match self.config.set(key, value).await {
            Ok(()) => info!(key = %key, value = %value, "Identity written to git config"),
            Err(e) => warnings.push(SetupError::ConfigWriteFailed {
                key: key.to_string(),
                value: value.to_string(),
                reason: format!("{e:#}"),
            }),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
