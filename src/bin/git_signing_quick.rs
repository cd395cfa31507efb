//! Git Signing Quick Setup - Standalone Binary
//!
//! Shorter variant: generates a key, registers it and writes the commit
//! signing settings. Leaves `tag.gpgsign` alone and skips verification.
//!
//! ## Usage
//!
//! ```bash
//! git-signing-quick
//!
//! # Keep user.name / user.email exactly as configured
//! git-signing-quick --skip-user-config --key-comment "laptop signing key"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lornu_git_signing::agents::signing::SetupOptions;
use lornu_git_signing::cli::{self, OutputFormat};
use tracing::info;

/// Git Signing Quick Setup - Generate and configure an SSH signing key
#[derive(Parser, Debug)]
#[command(name = "git-signing-quick", version, about)]
struct Args {
    /// Comment to embed in the public key (default: "<email> - Git Signing <date>")
    #[arg(long, env = "GIT_SIGNING_COMMENT")]
    key_comment: Option<String>,

    /// Do not resolve or write user.name / user.email
    #[arg(long)]
    skip_user_config: bool,

    /// Directory for the key pair (default: ~/.ssh)
    #[arg(long, env = "GIT_SIGNING_KEY_DIR")]
    key_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    cli::init_logging(args.verbose);

    let key_dir = args.key_dir.unwrap_or_else(cli::default_key_dir);
    info!(
        key_dir = %key_dir.display(),
        skip_user_config = args.skip_user_config,
        "Starting Git Signing Quick Setup"
    );

    let options = SetupOptions::quick(key_dir)
        .skip_user_config(args.skip_user_config)
        .comment(args.key_comment);

    cli::execute(options, args.output).await
}
