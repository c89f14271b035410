//! Shared support for the `recvfile` and `sendfile` binaries.
//!
//! This crate owns exactly the collaborators the transport core treats as
//! external: the UDP datagram channel, derived-filename/directory handling,
//! and the `tracing` bootstrap. Argument parsing and the event loop stay in
//! each binary.

pub mod adapter;
pub mod paths;

use tracing_subscriber::EnvFilter;

/// Lowest UDP port the receiver accepts on the CLI.
pub const MIN_PORT: u16 = 18000;
/// Highest UDP port the receiver accepts on the CLI.
pub const MAX_PORT: u16 = 18200;

/// Install the process-wide `tracing` subscriber, honoring `RUST_LOG` and
/// defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();
}
