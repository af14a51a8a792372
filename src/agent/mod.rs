//! SSH Agent proxy module
//!
//! This module provides the components of the key-pinning proxy:
//! - `Upstream`: connection to the upstream SSH agent
//! - `Forwarder`: per-connection bidirectional relay
//! - `ProxyServer`: per-identity unix socket listeners

mod forwarder;
mod server;
mod upstream;

pub use forwarder::Forwarder;
pub use server::{ProxyServer, SocketCleanupGuard};
pub use upstream::Upstream;
