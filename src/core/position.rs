//! Diagnostic-to-diff position mapping.
//!
//! GitHub anchors an inline review comment with a 1-based offset counted
//! through a file's entire diff body, not from the hunk the line sits in.

use crate::core::git::FilePatch;

/// Maps a diagnostic row (1-based, new file) to a review-comment position.
///
/// Walks the hunks in order; for the first hunk containing `row` the position
/// is the diff-body line count of all earlier hunks plus the row's offset
/// inside its own hunk. Returns `None` when no hunk contains the row, in
/// which case the caller must drop the comment.
#[must_use]
pub fn map_position(patch: &FilePatch, row: u32) -> Option<u32> {
    patch
        .hunk_containing(row)
        .map(|(hunk, offset)| offset + (row - hunk.new_start + 1))
}
