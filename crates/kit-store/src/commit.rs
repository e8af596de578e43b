use std::fmt;
use std::path::Path;

use chrono::{DateTime, Local, TimeZone, Utc};
use git2::{Commit, ErrorCode, Oid, Repository, Signature, StatusOptions, Time};
use tracing::{debug, info};

use crate::config::AuthorConfig;
use crate::error::{StoreError, StoreResult, VcsStage};

/// Identifier of a commit created by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RevisionId(Oid);

impl RevisionId {
    pub fn oid(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Oid> for RevisionId {
    fn from(oid: Oid) -> Self {
        Self(oid)
    }
}

/// What a commit attempt did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new commit was created.
    Committed(RevisionId),
    /// The working tree had no changes at all.
    SkippedClean,
    /// The tree was dirty elsewhere, but staging the path left the index
    /// tree identical to HEAD.
    Unchanged,
}

impl CommitOutcome {
    pub fn revision(&self) -> Option<RevisionId> {
        match self {
            Self::Committed(id) => Some(*id),
            Self::SkippedClean | Self::Unchanged => None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// One entry of the repository history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitSummary {
    pub revision: RevisionId,
    pub message: String,
    pub author: String,
    pub email: String,
    pub time: DateTime<Utc>,
}

/// Turns working-tree changes into commits.
///
/// Owns the repository handle. The store keeps it behind its mutex, so every
/// method here runs with the lock held.
pub struct CommitCoalescer {
    repo: Repository,
    author: AuthorConfig,
}

impl fmt::Debug for CommitCoalescer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitCoalescer")
            .field("workdir", &self.repo.workdir())
            .field("author", &self.author)
            .finish()
    }
}

impl CommitCoalescer {
    pub fn new(repo: Repository, author: AuthorConfig) -> Self {
        Self { repo, author }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Commit the change at `file` (repository-relative) with `message`.
    ///
    /// 1. A clean working tree short-circuits to [`CommitOutcome::SkippedClean`].
    /// 2. Otherwise `file` is staged: added if it exists, removed from the
    ///    index if it does not.
    /// 3. If the staged tree equals HEAD's tree nothing is committed.
    /// 4. Otherwise a commit is created on HEAD with the configured identity
    ///    and the current time.
    pub fn commit(&self, file: &Path, message: &str) -> StoreResult<CommitOutcome> {
        if self.is_clean()? {
            debug!(path = %file.display(), "working tree clean; skipping commit");
            return Ok(CommitOutcome::SkippedClean);
        }

        let tree_id = self.stage(file)?;
        let parent = self.head_commit()?;

        if parent.as_ref().map(|c| c.tree_id()) == Some(tree_id) {
            debug!(path = %file.display(), "staged tree matches HEAD; skipping commit");
            return Ok(CommitOutcome::Unchanged);
        }

        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(StoreError::vcs(VcsStage::WriteTree))?;
        let signature = self.signature()?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(StoreError::vcs(VcsStage::Commit))?;

        info!(revision = %oid, "{message}");
        Ok(CommitOutcome::Committed(oid.into()))
    }

    /// Returns `true` when nothing is staged, modified, deleted or untracked.
    pub fn is_clean(&self) -> StoreResult<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(StoreError::vcs(VcsStage::Status))?;
        Ok(statuses.is_empty())
    }

    /// Most recent commits first, at most `limit` of them.
    pub fn history(&self, limit: usize) -> StoreResult<Vec<CommitSummary>> {
        if self.head_commit()?.is_none() {
            return Ok(Vec::new());
        }

        let mut walk = self.repo.revwalk().map_err(StoreError::vcs(VcsStage::Log))?;
        walk.push_head().map_err(StoreError::vcs(VcsStage::Log))?;

        let mut out = Vec::new();
        for oid in walk.take(limit) {
            let oid = oid.map_err(StoreError::vcs(VcsStage::Log))?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(StoreError::vcs(VcsStage::Log))?;
            let author = commit.author();
            out.push(CommitSummary {
                revision: oid.into(),
                message: commit.message().unwrap_or_default().to_string(),
                author: author.name().unwrap_or_default().to_string(),
                email: author.email().unwrap_or_default().to_string(),
                time: Utc
                    .timestamp_opt(commit.time().seconds(), 0)
                    .single()
                    .unwrap_or_default(),
            });
        }
        Ok(out)
    }

    fn stage(&self, file: &Path) -> StoreResult<Oid> {
        let mut index = self.repo.index().map_err(StoreError::vcs(VcsStage::Stage))?;

        let on_disk = self
            .repo
            .workdir()
            .map(|root| root.join(file).exists())
            .unwrap_or(false);
        let staged = if on_disk {
            index.add_path(file)
        } else {
            index.remove_path(file)
        };
        staged.map_err(StoreError::vcs(VcsStage::Stage))?;

        index.write().map_err(StoreError::vcs(VcsStage::Stage))?;
        index
            .write_tree()
            .map_err(StoreError::vcs(VcsStage::WriteTree))
    }

    fn head_commit(&self) -> StoreResult<Option<Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => head
                .peel_to_commit()
                .map(Some)
                .map_err(StoreError::vcs(VcsStage::Head)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(None)
            }
            Err(e) => Err(StoreError::vcs(VcsStage::Head)(e)),
        }
    }

    fn signature(&self) -> StoreResult<Signature<'static>> {
        let now = Local::now();
        let when = Time::new(now.timestamp(), now.offset().local_minus_utc() / 60);
        Signature::new(&self.author.name, &self.author.email, &when)
            .map_err(StoreError::vcs(VcsStage::Commit))
    }
}
