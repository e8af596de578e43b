use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use git2::Repository;
use kit_types::{ObjectMeta, ObjectRecord};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::commit::{CommitCoalescer, CommitOutcome, CommitSummary};
use crate::config::StoreConfig;
use crate::error::{FsStage, StoreError, StoreResult};
use crate::paths::{PathPair, FILE_EXTENSION};
use crate::serialize;

/// An object file found in the working tree.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoredPath {
    pub namespace: String,
    pub group: String,
    pub name: String,
    /// Repository-relative file path.
    pub relative: PathBuf,
}

/// Git-backed store with one YAML file per object.
///
/// Every `write`/`delete` holds a single mutex for its whole
/// resolve, mutate, stage and commit sequence. The repository handle lives
/// inside that mutex, so no two sequences can interleave and nothing else
/// in the process can touch the index. Running two stores against the same
/// directory is unsupported.
#[derive(Debug)]
pub struct VersionedStore {
    root: PathBuf,
    worktree: Mutex<CommitCoalescer>,
}

impl VersionedStore {
    /// Open the existing repository at `config.root`.
    ///
    /// The repository must already be initialized with a working tree.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let repo = Repository::open(&config.root).map_err(|source| StoreError::Open {
            path: config.root.clone(),
            source,
        })?;
        Self::new(repo, config)
    }

    /// Build a store around an already opened repository.
    ///
    /// The store root is the repository's working directory; `config.root`
    /// is only used by [`VersionedStore::open`].
    pub fn new(repo: Repository, config: &StoreConfig) -> StoreResult<Self> {
        let root = match repo.workdir() {
            Some(dir) => dir.to_path_buf(),
            None => {
                return Err(StoreError::Open {
                    path: repo.path().to_path_buf(),
                    source: git2::Error::from_str("repository has no working tree"),
                })
            }
        };

        debug!(root = %root.display(), "opened repository");
        Ok(Self {
            root,
            worktree: Mutex::new(CommitCoalescer::new(repo, config.author.clone())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve where an object with this identity is stored.
    pub fn paths(&self, group: &str, meta: &ObjectMeta) -> StoreResult<PathPair> {
        Ok(PathPair::for_meta(&self.root, group, meta)?)
    }

    // ---- Producer operations ----

    /// Store `object` under `group` and commit the change.
    ///
    /// `object` may be any serializable value whose map form carries
    /// `metadata.namespace` and `metadata.name`.
    pub fn write<T: Serialize + ?Sized>(&self, group: &str, object: &T) -> StoreResult<CommitOutcome> {
        let worktree = self.lock();
        let record = ObjectRecord::from_serializable(object)?;
        self.write_locked(&worktree, group, &record)
    }

    /// Like [`VersionedStore::write`] for an already projected record.
    pub fn write_record(&self, group: &str, record: &ObjectRecord) -> StoreResult<CommitOutcome> {
        let worktree = self.lock();
        self.write_locked(&worktree, group, record)
    }

    /// Remove the file for `object` under `group` and commit the removal.
    ///
    /// Fails with [`StoreError::NotFound`] if the file does not exist.
    pub fn delete<T: Serialize + ?Sized>(&self, group: &str, object: &T) -> StoreResult<CommitOutcome> {
        let worktree = self.lock();
        let record = ObjectRecord::from_serializable(object)?;
        self.delete_locked(&worktree, group, record.meta())
    }

    /// Like [`VersionedStore::delete`] when only the identity is known.
    pub fn delete_meta(&self, group: &str, meta: &ObjectMeta) -> StoreResult<CommitOutcome> {
        let worktree = self.lock();
        self.delete_locked(&worktree, group, meta)
    }

    // ---- Inspection ----

    /// Read a stored object back, or `None` if it has no file.
    pub fn read(&self, group: &str, meta: &ObjectMeta) -> StoreResult<Option<ObjectRecord>> {
        let _worktree = self.lock();
        let paths = self.paths(group, meta)?;
        match fs::read(&paths.file.absolute) {
            Ok(data) => serialize::from_yaml(&data).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::fs(FsStage::ReadFile, paths.file.relative)(e)),
        }
    }

    /// Every stored object, optionally limited to one group, sorted by
    /// namespace, group and name.
    pub fn list(&self, group: Option<&str>) -> StoreResult<Vec<StoredPath>> {
        let _worktree = self.lock();
        let mut out = Vec::new();

        // Hidden entries (`.git` included) are pruned, never descended.
        let walker = WalkDir::new(&self.root)
            .max_depth(3)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                StoreError::fs(FsStage::Walk, path)(io::Error::other(e.to_string()))
            })?;
            if entry.depth() != 3 || !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if let Some(stored) = stored_path(relative) {
                if group.map_or(true, |g| g == stored.group) {
                    out.push(stored);
                }
            }
        }

        out.sort();
        Ok(out)
    }

    /// Most recent commits first.
    pub fn history(&self, limit: usize) -> StoreResult<Vec<CommitSummary>> {
        self.lock().history(limit)
    }

    // ---- Internals ----

    fn lock(&self) -> MutexGuard<'_, CommitCoalescer> {
        // A panic mid-sequence leaves the tree as an error would; keep going.
        self.worktree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_locked(
        &self,
        worktree: &CommitCoalescer,
        group: &str,
        record: &ObjectRecord,
    ) -> StoreResult<CommitOutcome> {
        let paths = self.paths(group, record.meta())?;
        let data = serialize::to_yaml(record)?;

        create_dir(&paths)?;
        replace_file(&paths, &data)?;
        debug!(path = %paths.file.relative.display(), bytes = data.len(), "wrote object");

        let message = format!("Object changed: {}", paths.file.relative.display());
        worktree.commit(&paths.file.relative, &message)
    }

    fn delete_locked(
        &self,
        worktree: &CommitCoalescer,
        group: &str,
        meta: &ObjectMeta,
    ) -> StoreResult<CommitOutcome> {
        let paths = self.paths(group, meta)?;

        match fs::remove_file(&paths.file.absolute) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(paths.file.relative));
            }
            Err(e) => return Err(StoreError::fs(FsStage::RemoveFile, paths.file.relative)(e)),
        }
        debug!(path = %paths.file.relative.display(), "removed object");

        let message = format!("Object deleted: {}", paths.file.relative.display());
        worktree.commit(&paths.file.relative, &message)
    }
}

/// Create the object's directory and any missing parents (mode 0755).
fn create_dir(paths: &PathPair) -> StoreResult<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
        .create(&paths.directory.absolute)
        .map_err(StoreError::fs(FsStage::CreateDirectory, &paths.directory.relative))
}

/// Replace the object's file atomically: write a sibling temp file, then
/// rename it over the target (mode 0644).
fn replace_file(paths: &PathPair, data: &[u8]) -> StoreResult<()> {
    let fail = || StoreError::fs(FsStage::WriteFile, &paths.file.relative);

    let mut tmp = NamedTempFile::new_in(&paths.directory.absolute).map_err(fail())?;
    tmp.write_all(data).map_err(fail())?;
    tmp.as_file().sync_all().map_err(fail())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(fail())?;
    }
    tmp.persist(&paths.file.absolute)
        .map_err(|e| fail()(e.error))?;
    Ok(())
}

/// Parse `<namespace>/<group>/<name>.yml` back into its segments.
fn stored_path(relative: &Path) -> Option<StoredPath> {
    let mut parts = relative.components().map(|c| c.as_os_str().to_str());
    let namespace = parts.next()??;
    let group = parts.next()??;
    let file = parts.next()??;
    if parts.next().is_some() {
        return None;
    }
    let name = file.strip_suffix(FILE_EXTENSION)?.strip_suffix('.')?;
    if name.is_empty() {
        return None;
    }
    Some(StoredPath {
        namespace: namespace.to_string(),
        group: group.to_string(),
        name: name.to_string(),
        relative: relative.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SerdeStage, VcsStage};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn init() -> (tempfile::TempDir, VersionedStore) {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let store = VersionedStore::open(&StoreConfig::new(dir.path())).unwrap();
        (dir, store)
    }

    fn pod(status: &str) -> Value {
        json!({
            "metadata": {"namespace": "default", "name": "web-1"},
            "status": status,
        })
    }

    fn commit_count(store: &VersionedStore) -> usize {
        store.history(usize::MAX).unwrap().len()
    }

    #[test]
    fn open_requires_existing_repository() {
        let dir = tempfile::tempdir().unwrap();
        let err = VersionedStore::open(&StoreConfig::new(dir.path())).unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
    }

    #[test]
    fn open_rejects_bare_repository() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init_bare(dir.path()).unwrap();
        let err = VersionedStore::new(repo, &StoreConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
    }

    #[test]
    fn write_creates_file_and_commit() {
        let (dir, store) = init();

        let outcome = store.write("pod", &pod("Running")).unwrap();
        assert!(outcome.is_committed());

        let file = dir.path().join("default/pod/web-1.yml");
        let text = fs::read_to_string(&file).unwrap();
        assert!(text.contains("status: Running"));
        assert!(text.contains("name: web-1"));

        let log = store.history(10).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].message, "Object changed: default/pod/web-1.yml");
        assert_eq!(Some(log[0].revision), outcome.revision());
    }

    #[test]
    fn unchanged_write_is_coalesced() {
        let (_dir, store) = init();

        store.write("pod", &pod("Running")).unwrap();
        let second = store.write("pod", &pod("Running")).unwrap();
        assert_eq!(second, CommitOutcome::SkippedClean);
        assert_eq!(commit_count(&store), 1);

        let third = store.write("pod", &pod("Pending")).unwrap();
        assert!(third.is_committed());
        let log = store.history(10).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].message, "Object changed: default/pod/web-1.yml");
    }

    #[test]
    fn delete_removes_file_and_commits() {
        let (dir, store) = init();
        store.write("pod", &pod("Running")).unwrap();

        let identity = json!({"metadata": {"namespace": "default", "name": "web-1"}});
        let outcome = store.delete("pod", &identity).unwrap();
        assert!(outcome.is_committed());
        assert!(!dir.path().join("default/pod/web-1.yml").exists());

        let log = store.history(10).unwrap();
        assert_eq!(log[0].message, "Object deleted: default/pod/web-1.yml");

        let err = store.delete("pod", &identity).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(commit_count(&store), 2);
    }

    #[test]
    fn delete_of_unknown_object_creates_no_commit() {
        let (_dir, store) = init();
        let err = store
            .delete_meta("pod", &ObjectMeta::new("default", "ghost"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref p) if p == Path::new("default/pod/ghost.yml")));
        assert_eq!(commit_count(&store), 0);
    }

    #[test]
    fn missing_namespace_leaves_repository_untouched() {
        let (dir, store) = init();
        let obj = json!({"metadata": {"name": "web-1"}, "status": "Running"});

        let err = store.write("pod", &obj).unwrap_err();
        assert!(matches!(err, StoreError::Field(_)));
        assert_eq!(commit_count(&store), 0);

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name() != ".git")
            .collect();
        assert!(entries.is_empty());
    }

    #[test]
    fn non_map_object_is_a_serialization_error() {
        let (_dir, store) = init();
        let err = store.write("pod", &json!("just a string")).unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn non_finite_payload_is_rejected_before_any_write() {
        #[derive(Serialize)]
        struct Reading {
            metadata: ObjectMeta,
            value: f64,
        }

        let (dir, store) = init();
        let reading = Reading {
            metadata: ObjectMeta::new("default", "thermo-1"),
            value: f64::NAN,
        };
        let err = store.write("sensor", &reading).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Serialization { stage: SerdeStage::Convert, .. }
        ));
        assert!(!dir.path().join("default").exists());
        assert_eq!(commit_count(&store), 0);
    }

    #[test]
    fn locked_index_fails_staging_and_releases_the_store() {
        let (dir, store) = init();
        let index_lock = dir.path().join(".git/index.lock");
        fs::write(&index_lock, "").unwrap();

        let err = store.write("pod", &pod("Running")).unwrap_err();
        assert!(
            matches!(err, StoreError::VersionControl { stage: VcsStage::Stage, .. }),
            "{err}"
        );
        assert!(err.to_string().starts_with("failed to add file"));
        // The file was written; nothing was committed.
        assert!(dir.path().join("default/pod/web-1.yml").exists());
        assert_eq!(commit_count(&store), 0);

        fs::remove_file(&index_lock).unwrap();
        let retry = store.write("pod", &pod("Running")).unwrap();
        assert!(retry.is_committed());
        assert_eq!(commit_count(&store), 1);
    }

    #[test]
    fn traversal_segments_are_rejected() {
        let (dir, store) = init();
        let obj = json!({"metadata": {"namespace": "..", "name": "escape"}});
        let err = store.write("pod", &obj).unwrap_err();
        assert!(matches!(err, StoreError::Field(_)));
        assert!(!dir.path().parent().unwrap().join("pod/escape.yml").exists());
    }

    #[test]
    fn read_roundtrip() {
        let (_dir, store) = init();
        let meta = ObjectMeta::new("default", "web-1");
        assert!(store.read("pod", &meta).unwrap().is_none());

        store.write("pod", &pod("Running")).unwrap();
        let record = store.read("pod", &meta).unwrap().unwrap();
        assert_eq!(record.meta(), &meta);
        assert_eq!(record.fields()["status"], "Running");
    }

    #[test]
    fn list_walks_stored_objects() {
        let (dir, store) = init();
        store.write("pod", &pod("Running")).unwrap();
        store
            .write("service", &json!({"metadata": {"namespace": "default", "name": "web"}}))
            .unwrap();
        store
            .write("pod", &json!({"metadata": {"namespace": "kube-system", "name": "dns"}}))
            .unwrap();
        fs::write(dir.path().join("README.md"), "not an object").unwrap();

        let all = store.list(None).unwrap();
        let names: Vec<(&str, &str, &str)> = all
            .iter()
            .map(|s| (s.namespace.as_str(), s.group.as_str(), s.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("default", "pod", "web-1"),
                ("default", "service", "web"),
                ("kube-system", "pod", "dns"),
            ]
        );

        let pods = store.list(Some("pod")).unwrap();
        assert_eq!(pods.len(), 2);
        assert_eq!(pods[0].relative, PathBuf::from("default/pod/web-1.yml"));
    }

    #[cfg(unix)]
    #[test]
    fn file_and_directory_modes() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, store) = init();
        store.write("pod", &pod("Running")).unwrap();

        let file_mode = fs::metadata(dir.path().join("default/pod/web-1.yml"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(file_mode & 0o777, 0o644);

        let dir_mode = fs::metadata(dir.path().join("default/pod"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o700, 0o700);
    }

    #[test]
    fn concurrent_writes_never_interleave() {
        let (_dir, store) = init();
        let store = Arc::new(store);
        const CALLERS: usize = 8;

        std::thread::scope(|s| {
            for i in 0..CALLERS {
                let store = Arc::clone(&store);
                s.spawn(move || {
                    let obj = json!({
                        "metadata": {"namespace": "default", "name": format!("web-{i}")},
                        "status": "Running",
                    });
                    let outcome = store.write("pod", &obj).unwrap();
                    assert!(outcome.is_committed());
                });
            }
        });

        assert_eq!(commit_count(&store), CALLERS);

        // Each commit introduces exactly one file on top of its parent.
        let guard = store.lock();
        let repo = guard.repository();
        let mut walk = repo.revwalk().unwrap();
        walk.push_head().unwrap();
        for oid in walk {
            let commit = repo.find_commit(oid.unwrap()).unwrap();
            let tree = commit.tree().unwrap();
            let parent_tree = commit.parent(0).ok().map(|p| p.tree().unwrap());
            let diff = repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
                .unwrap();
            assert_eq!(diff.deltas().count(), 1);
        }
    }
}
