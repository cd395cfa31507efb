//! Git Signing Setup - Standalone Binary
//!
//! Configures git to sign every commit with a fresh SSH key.
//!
//! ## Usage
//!
//! ```bash
//! # Interactive setup with defaults (~/.ssh/git_signing_<timestamp>)
//! git-signing-setup
//!
//! # Named key, sign tags too, and check a signed commit at the end
//! git-signing-setup --key-name work_signing --sign-tags --verify
//!
//! # Re-probe identity and replace an existing key without asking
//! git-signing-setup --key-name work_signing --force --output json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lornu_git_signing::agents::signing::{SetupOptions, TagSigning, DEFAULT_PLACEHOLDER_DOMAIN};
use lornu_git_signing::cli::{self, OutputFormat};
use tracing::info;

/// Git Signing Setup - Configure SSH commit signing for git
#[derive(Parser, Debug)]
#[command(name = "git-signing-setup", version, about)]
struct Args {
    /// Key file name inside the key directory (default: git_signing_<timestamp>)
    #[arg(long, env = "GIT_SIGNING_KEY_NAME")]
    key_name: Option<String>,

    /// Comment to embed in the public key (default: "<email> - Git Signing <date>")
    #[arg(long, env = "GIT_SIGNING_COMMENT")]
    comment: Option<String>,

    /// Overwrite an existing key without asking and re-probe the identity
    #[arg(long)]
    force: bool,

    /// Sign tags as well (tag.gpgsign=true)
    #[arg(long, conflicts_with = "no_sign_tags")]
    sign_tags: bool,

    /// Do not sign tags (tag.gpgsign=false)
    #[arg(long)]
    no_sign_tags: bool,

    /// Make a signed commit in a temporary repository afterwards
    #[arg(long)]
    verify: bool,

    /// Directory for the key pair (default: ~/.ssh)
    #[arg(long, env = "GIT_SIGNING_KEY_DIR")]
    key_dir: Option<PathBuf>,

    /// Domain for a guessed email address
    #[arg(long, env = "GIT_SIGNING_PLACEHOLDER_DOMAIN", default_value = DEFAULT_PLACEHOLDER_DOMAIN)]
    placeholder_domain: String,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Args {
    fn tag_signing(&self) -> TagSigning {
        if self.sign_tags {
            TagSigning::Enable
        } else if self.no_sign_tags {
            TagSigning::Disable
        } else {
            TagSigning::Prompt
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    cli::init_logging(args.verbose);

    let key_dir = args.key_dir.clone().unwrap_or_else(cli::default_key_dir);
    info!(key_dir = %key_dir.display(), "Starting Git Signing Setup");

    let options = SetupOptions::new(key_dir)
        .key_name(args.key_name.clone())
        .comment(args.comment.clone())
        .force(args.force)
        .tag_signing(args.tag_signing())
        .verify(args.verify)
        .placeholder_domain(args.placeholder_domain.clone());

    cli::execute(options, args.output).await
}
