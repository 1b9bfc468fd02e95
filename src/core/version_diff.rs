/*
 * Change statistics between texts and between whole bundles, and the restore
 * workflow that copies a past snapshot into the working set.
 *
 * The line comparison is positional: line `i` of the old text is compared
 * with line `i` of the new one. It overcounts whenever lines are inserted or
 * removed mid-file, which is acceptable for summary statistics.
 */
use crate::core::editing_session::{EditingSession, Result as SessionResult};
use crate::core::file_tree::build_file_tree;
use crate::core::models::FileRecord;
use crate::core::serial::Serial;
use crate::core::stencil_store::{Result as StoreResult, StencilStoreOperations};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStat {
    pub additions: usize,
    pub deletions: usize,
}

impl DiffStat {
    pub fn is_empty(&self) -> bool {
        self.additions == 0 && self.deletions == 0
    }
}

impl AddAssign for DiffStat {
    fn add_assign(&mut self, other: DiffStat) {
        self.additions += other.additions;
        self.deletions += other.deletions;
    }
}

pub fn diff_stat(old_text: &str, new_text: &str) -> DiffStat {
    let old_lines: Vec<&str> = old_text.split('\n').collect();
    let new_lines: Vec<&str> = new_text.split('\n').collect();
    let mut stat = DiffStat::default();
    for i in 0..old_lines.len().max(new_lines.len()) {
        if i >= old_lines.len() {
            stat.additions += 1;
        } else if i >= new_lines.len() {
            stat.deletions += 1;
        } else if old_lines[i] != new_lines[i] {
            stat.additions += 1;
            stat.deletions += 1;
        }
    }
    stat
}

/* Number of lines in `text`; an empty text has none. */
pub fn line_count(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.split('\n').count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Removed,
    Modified,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub path: String,
    pub status: FileStatus,
    pub stat: DiffStat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BundleDiff {
    pub files: Vec<FileDiff>,
    pub total: DiffStat,
}

impl BundleDiff {
    pub fn changed(&self) -> impl Iterator<Item = &FileDiff> {
        self.files
            .iter()
            .filter(|f| f.status != FileStatus::Unchanged)
    }

    pub fn file(&self, path: &str) -> Option<&FileDiff> {
        self.files.iter().find(|f| f.path == path)
    }
}

/*
 * Compares two file lists path by path. Files are listed in the order they
 * appear in the tree built from both lists together.
 */
pub fn diff_bundles(old_files: &[FileRecord], new_files: &[FileRecord]) -> BundleDiff {
    let old_by_path: HashMap<&str, &FileRecord> =
        old_files.iter().map(|f| (f.path.as_str(), f)).collect();
    let new_by_path: HashMap<&str, &FileRecord> =
        new_files.iter().map(|f| (f.path.as_str(), f)).collect();

    let mut union: Vec<FileRecord> = new_files.to_vec();
    union.extend(
        old_files
            .iter()
            .filter(|f| !new_by_path.contains_key(f.path.as_str()))
            .cloned(),
    );

    let mut diff = BundleDiff::default();
    for path in build_file_tree(&union).file_paths() {
        let old = old_by_path.get(path.as_str());
        let new = new_by_path.get(path.as_str());
        let (status, stat) = match (old, new) {
            (None, Some(n)) => (
                FileStatus::Added,
                DiffStat {
                    additions: line_count(&n.content),
                    deletions: 0,
                },
            ),
            (Some(o), None) => (
                FileStatus::Removed,
                DiffStat {
                    additions: 0,
                    deletions: line_count(&o.content),
                },
            ),
            (Some(o), Some(n)) if o.content == n.content => {
                (FileStatus::Unchanged, DiffStat::default())
            }
            (Some(o), Some(n)) => (FileStatus::Modified, diff_stat(&o.content, &n.content)),
            (None, None) => continue,
        };
        diff.total += stat;
        diff.files.push(FileDiff { path, status, stat });
    }
    diff
}

/* Loads two snapshots of a stencil and compares them. */
pub fn compare_versions(
    store: &dyn StencilStoreOperations,
    stencil_id: &str,
    old_serial: &Serial,
    new_serial: &Serial,
) -> StoreResult<BundleDiff> {
    let old = store.load_snapshot(stencil_id, old_serial)?;
    let new = store.load_snapshot(stencil_id, new_serial)?;
    let diff = diff_bundles(&old.files, &new.files);
    log::debug!(
        "VersionDiff: {old_serial} -> {new_serial}: {} changed file(s), +{} -{}",
        diff.changed().count(),
        diff.total.additions,
        diff.total.deletions
    );
    Ok(diff)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored_serial: Serial,
    pub dirty_paths: Vec<String>,
    pub closed_paths: Vec<String>,
}

/*
 * Copies the files of a past snapshot into the session's working set. The
 * snapshot itself is not touched and nothing is saved; the operator must save
 * explicitly to create a new version. When the snapshot cannot be fetched the
 * working set is left as it was.
 */
pub fn restore_snapshot(
    session: &mut EditingSession,
    store: &dyn StencilStoreOperations,
    serial: &Serial,
) -> SessionResult<RestoreReport> {
    let snapshot = store.load_snapshot(session.stencil_id(), serial)?;
    log::debug!(
        "VersionDiff: Restoring {} file(s) from {serial} into '{}'",
        snapshot.files.len(),
        session.stencil_id()
    );
    let change = session.install_working_set(snapshot.files);
    Ok(RestoreReport {
        restored_serial: serial.clone(),
        dirty_paths: change.dirty_paths,
        closed_paths: change.closed_paths,
    })
}
