//! Object addressing.
//!
//! An object's location is derived from three segments and nothing else:
//!
//! ```text
//! <root>/<namespace>/<group>/<name>.yml
//! ```
//!
//! The same triple always yields the same paths. Relative forms are what git
//! sees (repository-root relative), absolute forms are what the filesystem
//! sees.

use std::path::{Path, PathBuf};

use kit_types::{validate_segment, ObjectMeta, SegmentKind, TypeResult};
use serde_json::{Map, Value};

/// Extension of every stored object file.
pub const FILE_EXTENSION: &str = "yml";

/// A location in both its repository-relative and absolute forms.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    pub relative: PathBuf,
    pub absolute: PathBuf,
}

impl Location {
    fn under(root: &Path, relative: PathBuf) -> Self {
        Self {
            absolute: root.join(&relative),
            relative,
        }
    }
}

/// The directory and file an object is stored at.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathPair {
    pub directory: Location,
    pub file: Location,
}

impl PathPair {
    /// Build the paths for an already extracted identity.
    ///
    /// Every segment is checked with [`validate_segment`], so the result
    /// never escapes `root` or lands inside `.git`.
    pub fn for_meta(root: &Path, group: &str, meta: &ObjectMeta) -> TypeResult<Self> {
        validate_segment(SegmentKind::Namespace, &meta.namespace)?;
        validate_segment(SegmentKind::Group, group)?;
        validate_segment(SegmentKind::Name, &meta.name)?;

        let directory = Path::new(&meta.namespace).join(group);
        let file = directory.join(format!("{}.{FILE_EXTENSION}", meta.name));

        Ok(Self {
            directory: Location::under(root, directory),
            file: Location::under(root, file),
        })
    }
}

/// Resolve the paths for an object given as its top-level field map.
///
/// Fails when `metadata`, `metadata.namespace` or `metadata.name` is absent
/// or not a string, or when a segment is not a valid path component.
pub fn resolve(root: &Path, group: &str, fields: &Map<String, Value>) -> TypeResult<PathPair> {
    let meta = ObjectMeta::from_fields(fields)?;
    PathPair::for_meta(root, group, &meta)
}
