//! Error types for topology editing.

use thiserror::Error;

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Errors returned by [`TopologyEditor::apply`](crate::TopologyEditor::apply).
///
/// Edits that merely conflict with the current model (unknown ids, links to
/// missing nodes) are not errors; they come back as
/// [`EditOutcome::Ignored`](crate::EditOutcome::Ignored).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyError {
    /// The console is not in a state where the topology may change.
    #[error("topology editing is locked while a run is active")]
    EditingLocked,

    /// A parameter is outside what the engine accepts.
    #[error("invalid parameter {field}: {reason}")]
    InvalidParameter {
        field: &'static str,
        reason: String,
    },
}
