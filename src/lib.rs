//! Lornu AI Git Signing Library
//!
//! Configures git to sign commits with an SSH key: resolves the committer
//! identity, provisions an Ed25519 key, registers it with ssh-agent and
//! writes the global signing settings.

pub mod agents;
pub mod cli;
pub mod tools;

pub use agents::signing::{SetupOptions, SetupReport, SigningSetupAgent};
