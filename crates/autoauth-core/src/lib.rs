//! Automatic answering of remote-session authentication prompts
//!
//! This crate provides:
//! - An ordered path-pattern → credential-query table (first match wins)
//! - Credential backends (authinfo/netrc files, external helper commands)
//! - Prompt classification for secret and yes/no prompts
//! - A chain-of-handlers registry with tagged, removable layers
//! - Hooks that answer prompts automatically and otherwise fall through
//! - The enable/disable lifecycle that installs and removes the hooks

pub mod credentials;
mod error;
mod handler;
mod interceptor;
mod mode;
mod prompt;
mod secret;
mod table;

pub use credentials::{CredentialChain, CredentialRecord, CredentialSource, CredentialSpec};
pub use error::*;
pub use handler::*;
pub use interceptor::*;
pub use mode::*;
pub use prompt::*;
pub use secret::*;
pub use table::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
