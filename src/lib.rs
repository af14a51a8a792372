//! authsock-pin - SSH agent proxy with per-key sockets
//!
//! This library creates one unix socket per key held by an upstream SSH
//! agent. Clients connecting to a given socket see the agent's identity
//! list reordered so that socket's key comes first; everything else is
//! forwarded untouched. Tools that always pick the first offered key are
//! thereby pinned to a specific one.

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pin;
pub mod protocol;
pub mod utils;

pub use error::{Error, Result};

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const NAME: &str = env!("CARGO_PKG_NAME");
