//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`KnxHaError`]
//! via `#[from]` or an adapter-side `into_domain()`.

/// Top-level error crossing layer boundaries.
#[derive(Debug, thiserror::Error)]
pub enum KnxHaError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A persisted snapshot could not be accepted.
    #[error("invalid snapshot")]
    Snapshot(#[from] SnapshotError),

    /// The project archive could not be read at all.
    #[error("archive error")]
    Archive(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Another import is already in flight on this service.
    #[error("a project import is already running")]
    Busy,
}

/// Domain validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A group address string is not in `main/middle/sub` form.
    #[error("malformed group address {0:?}")]
    MalformedAddress(String),

    /// One component of a group address is outside its allowed range.
    #[error("group address component {component} = {value} exceeds {max}")]
    AddressOutOfRange {
        component: &'static str,
        value: u32,
        max: u32,
    },
}

/// Reasons a persisted snapshot envelope is rejected.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u64),

    #[error("unexpected tool identifier {0:?}")]
    UnexpectedTool(String),

    #[error("snapshot is missing field '{0}'")]
    MissingField(&'static str),

    #[error("snapshot catalog is missing field '{0}'")]
    MissingCatalogField(&'static str),
}
