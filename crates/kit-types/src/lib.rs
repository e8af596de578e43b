//! Foundation types for kit.
//!
//! kit mirrors a live set of structured objects into a git working tree, one
//! YAML file per object. This crate holds the pieces every other crate needs
//! to agree on:
//!
//! - [`ObjectRecord`] -- the typed projection of a producer's object: the two
//!   identifying fields pulled out of `metadata`, plus the opaque field map
//! - [`ObjectMeta`] -- the `(namespace, name)` identity of a record
//! - [`validate_segment`] -- the rule set a value must satisfy before it is
//!   used as a path segment under the repository root
//!
//! Extraction is schema-on-read: only `metadata.namespace` and
//! `metadata.name` are interpreted, everything else is carried verbatim.

pub mod error;
pub mod object;
pub mod segment;

pub use error::{TypeError, TypeResult};
pub use object::{ObjectMeta, ObjectRecord, KEY_METADATA, KEY_NAME, KEY_NAMESPACE};
pub use segment::{validate_segment, SegmentKind};
