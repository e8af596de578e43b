//! Path segment validation.
//!
//! Namespaces, groups and names become directory and file names under the
//! repository root, so each one must be a single, visible path component:
//! - Must be non-empty
//! - Must not be `.` or `..`, and must not start with `.`
//! - Must not contain `/`, `\` or NUL

use std::fmt;

use crate::error::{TypeError, TypeResult};

/// Characters that are forbidden anywhere in a segment.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', '\0'];

/// Which part of the on-disk address a segment fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Namespace,
    Group,
    Name,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Namespace => "namespace",
            Self::Group => "group",
            Self::Name => "name",
        };
        f.write_str(s)
    }
}

/// Validate a path segment, returning `Ok(())` if it is safe to join onto
/// the repository root.
///
/// # Examples
///
/// ```
/// use kit_types::{validate_segment, SegmentKind};
///
/// assert!(validate_segment(SegmentKind::Name, "web-1").is_ok());
/// assert!(validate_segment(SegmentKind::Namespace, "..").is_err());
/// assert!(validate_segment(SegmentKind::Group, "a/b").is_err());
/// ```
pub fn validate_segment(kind: SegmentKind, value: &str) -> TypeResult<()> {
    let reject = |reason: String| TypeError::InvalidSegment {
        kind,
        value: value.to_string(),
        reason,
    };

    if value.is_empty() {
        return Err(reject("must not be empty".into()));
    }

    for ch in FORBIDDEN_CHARS {
        if value.contains(*ch) {
            return Err(reject(format!("contains forbidden character: {ch:?}")));
        }
    }

    // Covers `.`, `..` and hidden entries such as `.git`.
    if value.starts_with('.') {
        return Err(reject("must not start with '.'".into()));
    }

    Ok(())
}
