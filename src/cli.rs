//! Shared plumbing for the `git-signing-*` binaries.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::agents::signing::{Collaborators, SetupError, SetupOptions, SetupReport, SigningSetupAgent};
use crate::tools::{GitCli, SshAgent, SshKeygen, SystemHost, TerminalPrompter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
}

/// Log to stderr so stdout carries only the report.
///
/// `RUST_LOG` wins over `--verbose` when set.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// `~/.ssh`, or `.ssh` under the working directory when there is no home.
pub fn default_key_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".ssh"))
        .unwrap_or_else(|| PathBuf::from(".ssh"))
}

pub fn render(report: &SetupReport, output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Text => Ok(report.display()),
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).context("Failed to serialize setup report")
        }
    }
}

/// One line for a fatal error, with the manual fix when there is one.
pub fn fatal_line(err: &SetupError) -> String {
    match err.remedy() {
        Some(remedy) => format!("error: {err} (run manually: {remedy})"),
        None => format!("error: {err}"),
    }
}

/// Run the setup against the real machine and print the report.
pub async fn execute(options: SetupOptions, output: OutputFormat) -> ExitCode {
    let git = GitCli::default();
    let keygen = SshKeygen::default();
    let agent = SshAgent::default();
    let tools = Collaborators {
        config: &git,
        vcs: &git,
        keygen: &keygen,
        agent: &agent,
        host: &SystemHost,
        prompter: &TerminalPrompter,
    };

    let report = match SigningSetupAgent::new(tools, options).run().await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Git signing setup failed");
            eprintln!("{}", fatal_line(&e));
            return ExitCode::FAILURE;
        }
    };

    match render(&report, output) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    }

    info!(
        fingerprint = %report.fingerprint,
        warnings = report.warnings.len(),
        "Git signing configured"
    );
    ExitCode::SUCCESS
}
