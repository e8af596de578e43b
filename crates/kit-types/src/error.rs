use thiserror::Error;

use crate::segment::SegmentKind;

/// Errors produced while projecting or validating an object.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A required field is absent.
    #[error("not found: {0}")]
    MissingField(&'static str),

    /// A required field is present but has the wrong JSON type.
    #[error("field {field} must be {expected}, found {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A value cannot be used as a path segment.
    #[error("invalid {kind} {value:?}: {reason}")]
    InvalidSegment {
        kind: SegmentKind,
        value: String,
        reason: String,
    },

    /// The producer's object could not be converted to a field map.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
