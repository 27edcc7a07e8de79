//! Commit-range diff model.
//!
//! Wraps a git2 diff between two commits and exposes the changed-file list,
//! per-file hunk sequences, and row-in-hunk queries. Everything is computed
//! once at setup and is read-only afterwards.

use crate::core::error::{Error, Result};
use git2::{Delta, Repository};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// How a file changed between the target and source commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File exists only in the source commit.
    Added,
    /// File exists in both commits with different content.
    Modified,
    /// File exists only in the target commit. Never linted.
    Deleted,
    /// File was moved; the new path is recorded.
    Renamed,
}

/// One changed file in the commit range.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    /// Repository-relative path (the new path for renames).
    pub path: String,
    /// Change kind.
    pub kind: ChangeKind,
}

/// A contiguous block of a unified diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hunk {
    /// First line of the old range.
    pub old_start: u32,
    /// Length of the old range.
    pub old_lines: u32,
    /// First line of the new range.
    pub new_start: u32,
    /// Length of the new range.
    pub new_lines: u32,
}

impl Hunk {
    /// Returns true if `row` (1-based, new file) falls inside this hunk.
    #[must_use]
    pub const fn contains_row(&self, row: u32) -> bool {
        self.new_start <= row && row < self.new_start + self.new_lines
    }
}

/// Ordered hunk sequence for one changed file.
///
/// Each hunk carries the number of diff-body lines it occupies (context lines
/// included), which is what review-comment positions are counted in.
#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    hunks: Vec<(Hunk, u32)>,
}

impl FilePatch {
    /// Builds a patch from hunks paired with their diff-body line counts.
    #[must_use]
    pub fn new(hunks: Vec<(Hunk, u32)>) -> Self {
        Self { hunks }
    }

    /// Returns the hunks in diff order.
    #[must_use]
    pub fn hunks(&self) -> impl Iterator<Item = &Hunk> {
        self.hunks.iter().map(|(h, _)| h)
    }

    /// Finds the first hunk containing `row` together with the cumulative
    /// diff-body line count of every hunk scanned before it.
    ///
    /// Returns `None` when the row falls between hunks; such rows are
    /// unchanged context the diff never emitted and must not be commented on.
    #[must_use]
    pub fn hunk_containing(&self, row: u32) -> Option<(Hunk, u32)> {
        let mut offset = 0u32;
        for (hunk, num_lines) in &self.hunks {
            if hunk.contains_row(row) {
                return Some((*hunk, offset));
            }
            offset += num_lines;
        }
        None
    }
}

/// The computed diff between the target and source commits.
#[derive(Debug, Default)]
pub struct DiffModel {
    changed_files: Vec<ChangedFile>,
    patches: HashMap<String, FilePatch>,
}

impl DiffModel {
    /// Opens the repository at `repo_path` and diffs `target..source`.
    ///
    /// Fails with a git error when the repository cannot be opened, either
    /// revision does not resolve, or HEAD is not at the source commit (the
    /// working tree must match what the tools will read from disk).
    pub fn build(repo_path: &Path, target: &str, source: &str) -> Result<Self> {
        let repo = Repository::open(repo_path).map_err(|_| Error::NotGitRepo {
            path: PathBuf::from(repo_path),
        })?;

        let target_commit = repo.revparse_single(target)?.peel_to_commit()?;
        let source_commit = repo.revparse_single(source)?.peel_to_commit()?;

        let head = repo.head()?.peel_to_commit()?;
        if head.id() != source_commit.id() {
            return Err(Error::HeadMismatch {
                head: head.id().to_string(),
                expected: source_commit.id().to_string(),
            });
        }

        let mut diff = repo.diff_tree_to_tree(
            Some(&target_commit.tree()?),
            Some(&source_commit.tree()?),
            None,
        )?;
        diff.find_similar(None)?;

        let mut changed_files = Vec::new();
        let mut patches = HashMap::new();

        for (idx, delta) in diff.deltas().enumerate() {
            let kind = match delta.status() {
                Delta::Added => ChangeKind::Added,
                Delta::Deleted => ChangeKind::Deleted,
                Delta::Renamed => ChangeKind::Renamed,
                _ => ChangeKind::Modified,
            };

            let file = if kind == ChangeKind::Deleted {
                delta.old_file()
            } else {
                delta.new_file()
            };
            let Some(path) = file.path().map(|p| p.to_string_lossy().into_owned()) else {
                continue;
            };

            if kind != ChangeKind::Deleted {
                if let Some(patch) = git2::Patch::from_diff(&diff, idx)? {
                    let mut hunks = Vec::with_capacity(patch.num_hunks());
                    for h in 0..patch.num_hunks() {
                        let (hunk, num_lines) = patch.hunk(h)?;
                        hunks.push((
                            Hunk {
                                old_start: hunk.old_start(),
                                old_lines: hunk.old_lines(),
                                new_start: hunk.new_start(),
                                new_lines: hunk.new_lines(),
                            },
                            u32::try_from(num_lines).unwrap_or(u32::MAX),
                        ));
                    }
                    patches.insert(path.clone(), FilePatch::new(hunks));
                }
            }

            changed_files.push(ChangedFile { path, kind });
        }

        tracing::debug!(
            files = changed_files.len(),
            target = %target_commit.id(),
            source = %source_commit.id(),
            "Computed commit-range diff"
        );

        Ok(Self {
            changed_files,
            patches,
        })
    }

    /// Returns every changed file in diff order.
    #[must_use]
    pub fn changed_files(&self) -> &[ChangedFile] {
        &self.changed_files
    }

    /// Returns the hunk sequence for a changed file, if it has one.
    #[must_use]
    pub fn patch_for(&self, path: &str) -> Option<&FilePatch> {
        self.patches.get(path)
    }

    /// Consumes the model into its parts for the runtime context.
    #[must_use]
    pub fn into_parts(self) -> (Vec<ChangedFile>, HashMap<String, FilePatch>) {
        (self.changed_files, self.patches)
    }
}
