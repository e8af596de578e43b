use std::fmt;
use std::path::PathBuf;

use kit_types::TypeError;

/// Filesystem step that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsStage {
    CreateDirectory,
    WriteFile,
    RemoveFile,
    ReadFile,
    Walk,
}

impl fmt::Display for FsStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CreateDirectory => "create directory",
            Self::WriteFile => "write file",
            Self::RemoveFile => "delete file",
            Self::ReadFile => "read file",
            Self::Walk => "walk",
        };
        f.write_str(s)
    }
}

/// Serialization step that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerdeStage {
    /// Producer object to field map.
    Convert,
    /// Field map to YAML.
    Render,
    /// YAML back to a record.
    Parse,
}

impl fmt::Display for SerdeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Convert => "convert to unstructured object",
            Self::Render => "marshal to yaml",
            Self::Parse => "parse yaml",
        };
        f.write_str(s)
    }
}

/// Version-control step that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VcsStage {
    Status,
    Stage,
    WriteTree,
    Head,
    Commit,
    Log,
}

impl fmt::Display for VcsStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Status => "get repository status",
            Self::Stage => "add file",
            Self::WriteTree => "write tree",
            Self::Head => "resolve HEAD",
            Self::Commit => "commit",
            Self::Log => "walk history",
        };
        f.write_str(s)
    }
}

/// Errors from versioned store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The repository could not be opened.
    #[error("failed to open repository at {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    /// A configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The object's identity is missing, mistyped, or unusable as a path.
    #[error("failed to get paths: {0}")]
    Field(TypeError),

    /// The object could not be converted, rendered, or parsed.
    #[error("failed to {stage}: {reason}")]
    Serialization { stage: SerdeStage, reason: String },

    /// A directory or file operation failed.
    #[error("failed to {stage} {}: {source}", .path.display())]
    Filesystem {
        stage: FsStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The object's file does not exist.
    #[error("object not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A git operation failed.
    #[error("failed to {stage}: {source}")]
    VersionControl {
        stage: VcsStage,
        #[source]
        source: git2::Error,
    },
}

impl StoreError {
    pub(crate) fn fs(stage: FsStage, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Filesystem { stage, path, source }
    }

    pub(crate) fn vcs(stage: VcsStage) -> impl FnOnce(git2::Error) -> Self {
        move |source| Self::VersionControl { stage, source }
    }

    /// Returns `true` if the error reports a missing object file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<TypeError> for StoreError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::Conversion(reason) => Self::Serialization {
                stage: SerdeStage::Convert,
                reason,
            },
            other => Self::Field(other),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
