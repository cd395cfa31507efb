//! Agent modules for Lornu AI Git Signing
//!
//! - `signing`: SSH commit signing setup for a developer machine

pub mod signing;

pub use signing::SigningSetupAgent;
