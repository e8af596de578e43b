//! Versioned file store for kit.
//!
//! Mirrors structured objects into a git working tree: every object lives at
//! `<root>/<namespace>/<group>/<name>.yml`, and every net change to a file
//! becomes exactly one commit.
//!
//! # Components
//!
//! - [`paths`] -- deterministic `(namespace, group, name)` to [`PathPair`]
//! - [`serialize`] -- stable YAML rendering of an object's field map
//! - [`CommitCoalescer`] -- status check, staging and commit; skips commits
//!   when the tree has no net change
//! - [`VersionedStore`] -- the producer-facing `write` / `delete` API
//!
//! # Design Rules
//!
//! 1. One mutex serializes every resolve, mutate, stage and commit sequence.
//!    The repository handle lives inside it, so nothing reaches git without
//!    holding the lock.
//! 2. A clean tree never produces a commit.
//! 3. Files are replaced atomically (temp file in the same directory, then
//!    rename).
//! 4. Errors name the stage that failed and are never retried or rolled back.

pub mod commit;
pub mod config;
pub mod error;
pub mod paths;
pub mod serialize;
pub mod store;

// Re-export primary types at crate root for ergonomic imports.
pub use commit::{CommitCoalescer, CommitOutcome, CommitSummary, RevisionId};
pub use config::{AuthorConfig, StoreConfig};
pub use error::{FsStage, SerdeStage, StoreError, StoreResult, VcsStage};
pub use paths::{Location, PathPair, FILE_EXTENSION};
pub use store::{StoredPath, VersionedStore};

pub use kit_types::{ObjectMeta, ObjectRecord};
