//! Runtime context shared by every component.
//!
//! Assembled once at startup from CLI options, GitHub Actions environment
//! variables, and the computed diff. Read-only for the rest of the run.

use crate::core::git::{ChangedFile, FilePatch};
use std::collections::HashMap;
use std::path::PathBuf;

/// Which report sinks are enabled for this run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportToggles {
    /// Append `tool_failed_number=<N>` lines to the action-output file.
    pub action_output: bool,
    /// Append detail text to the step-summary file.
    pub step_summary: bool,
    /// Post (or update) the summary comment on the pull request.
    pub comment_on_issue: bool,
    /// Submit a pull-request review with inline comments.
    pub pull_request_review: bool,
}

/// GitHub Actions coordinates read from the runner environment.
#[derive(Debug, Clone, Default)]
pub struct GithubEnv {
    /// The `owner/name` repository pair.
    pub repository: String,
    /// API token.
    pub token: String,
    /// Pull request number, when the ref identifies one.
    pub pr_number: Option<u64>,
    /// Path of the append-only action-output file.
    pub action_output_path: Option<PathBuf>,
    /// Path of the append-only step-summary file.
    pub step_summary_path: Option<PathBuf>,
}

impl GithubEnv {
    /// Reads the GitHub Actions environment variables.
    #[must_use]
    pub fn read() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            repository: var("GITHUB_REPOSITORY").unwrap_or_default(),
            token: var("GITHUB_TOKEN").unwrap_or_default(),
            pr_number: var("GITHUB_REF").as_deref().and_then(parse_pr_number),
            action_output_path: var("GITHUB_OUTPUT").map(PathBuf::from),
            step_summary_path: var("GITHUB_STEP_SUMMARY").map(PathBuf::from),
        }
    }
}

/// Extracts the pull request number from a `refs/pull/<n>/merge` ref.
fn parse_pr_number(github_ref: &str) -> Option<u64> {
    let rest = github_ref.strip_prefix("refs/pull/")?;
    let number = rest.split('/').next()?;
    number.parse().ok()
}

/// Immutable-after-setup bundle driving one process invocation.
#[derive(Debug, Default)]
pub struct RuntimeContext {
    /// Repository checkout on disk.
    pub repo_path: PathBuf,
    /// Target (base) revision the diff is computed against.
    pub target: String,
    /// Source (head) revision; must match the repository HEAD.
    pub source: String,
    /// Changed files in diff order.
    pub changed_files: Vec<ChangedFile>,
    /// Hunk sequences keyed by changed-file path.
    pub patches: HashMap<String, FilePatch>,
    /// Enabled report sinks.
    pub toggles: ReportToggles,
    /// Exit 0 even when a tool fails.
    pub disable_errors: bool,
    /// Optional per-subprocess timeout in seconds.
    pub tool_timeout: Option<u64>,
    /// GitHub runner coordinates.
    pub github: GithubEnv,
}

impl RuntimeContext {
    /// Returns the absolute path of a changed file on disk.
    #[must_use]
    pub fn file_on_disk(&self, relative: &str) -> PathBuf {
        self.repo_path.join(relative)
    }
}
