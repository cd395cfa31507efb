//! External Tools
//!
//! Narrow wrappers around the programs the signing setup drives. Each
//! concern sits behind a trait so the pipeline can run against fakes.

pub mod git;
pub mod host;
pub mod process;
pub mod prompt;
pub mod ssh;

pub use git::{GitCli, VcsConfig, VcsTool};
pub use host::{HostIdentity, SystemHost};
pub use prompt::{Prompter, TerminalPrompter};
pub use ssh::{AgentClient, AgentStatus, KeyGenerator, SshAgent, SshKeygen};
