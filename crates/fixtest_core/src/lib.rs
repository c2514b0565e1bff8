//! Provide the shared data model for the fixtest harness.
//!
//! This crate is intentionally small and dependency-light. It contains the value types that every layer of the
//! harness agrees on:
//! - the scanner and executor consume [`FixtureGroup`] definitions,
//! - the runner produces [`CaseResult`]s,
//! - the verifier and reporters exchange [`CoverageViolation`]s.
//!
//! ## Notes
//!
//! - **No IO** and no async: filesystem access and process spawning live in the `fixtest` crate.
//! - Every type that ends up in a report implements `serde::Serialize` so JSON output stays derivable.

pub mod coverage;
pub mod group;
pub mod outcome;
pub mod state;

pub use coverage::CoverageViolation;
pub use group::{DEFAULT_PATTERN, FixtureGroup, GroupError, default_pattern};
pub use outcome::{CaseResult, CaseStatus, ErrorCause, StatusKind};
pub use state::{CaseState, TransitionError};

/// Serialize a duration as whole milliseconds.
///
/// Reports are consumed by CI tooling that expects plain integers rather than serde's `{secs, nanos}` shape.
pub fn serialize_millis<S>(duration: &std::time::Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    serializer.serialize_u64(millis)
}
