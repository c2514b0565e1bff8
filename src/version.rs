//! Harness version information.
//!
//! The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time so the CLI and JSON reports agree
//! on the same value.

/// The fixtest version string (for example, `0.1.0`).
pub const FIXTEST_VERSION: &str = env!("CARGO_PKG_VERSION");
