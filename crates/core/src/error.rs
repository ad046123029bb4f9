//! Error types for editing, hooks and persisted records

use crate::scene::{ObjectId, ObjectKind};

/// Why the modification gate refused an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The whole scene is read-only
    ReadOnly,
    /// The object is locked
    Locked,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::ReadOnly => write!(f, "scene is read-only"),
            DenyReason::Locked => write!(f, "object is locked"),
        }
    }
}

/// Errors raised by scene edits
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("modification of {id} denied: {reason}")]
    ModificationDenied { id: ObjectId, reason: DenyReason },
    #[error("object {0} not found")]
    NotFound(ObjectId),
    #[error("object {id} is not an {expected}")]
    WrongKind { id: ObjectId, expected: ObjectKind },
    #[error("no command is active")]
    NoActiveCommand,
    #[error("command `{0}` is already active")]
    CommandActive(String),
    #[error("nothing to undo")]
    NothingToUndo,
    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// Failure while reconciling a single anchor inside a hook
///
/// Caught at the hook boundary; never aborts the rest of the pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HookError {
    #[error("object {0} disappeared during the pass")]
    MissingObject(ObjectId),
    #[error("object {id} is not an {expected}")]
    WrongKind { id: ObjectId, expected: ObjectKind },
    #[error(transparent)]
    Edit(#[from] EditError),
}

/// Errors reading a persisted anchor record
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    /// The record was written by an unsupported major version, or carries
    /// no version at all; the host should keep it as a proxy and re-resolve
    /// later.
    #[error("record version {} needs re-resolution", version_label(.major, .minor))]
    NeedsProxy { major: Option<i64>, minor: Option<i64> },
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("record class {0} is not an anchor")]
    WrongClass(String),
    #[error("object id {0} is already in use")]
    DuplicateId(ObjectId),
}

fn version_label(major: &Option<i64>, minor: &Option<i64>) -> String {
    let part = |value: &Option<i64>| value.map_or_else(|| "?".to_string(), |v| v.to_string());
    format!("{}.{}", part(major), part(minor))
}

impl RecordError {
    /// Whether the host should keep the raw record as a proxy object
    pub fn needs_proxy(&self) -> bool {
        matches!(self, RecordError::NeedsProxy { .. })
    }
}

/// Errors from the property surface
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropertyError {
    #[error("unknown property `{0}`")]
    Unknown(String),
    #[error("property `{name}` expects {expected}")]
    TypeMismatch {
        name: &'static str,
        expected: &'static str,
    },
    #[error("`{value}` is not a valid value for `{name}`")]
    OutOfDomain { name: &'static str, value: String },
    #[error("length must be positive, got {0}")]
    NonPositiveLength(f64),
}
