//! Tool pipeline: Creator -> Option -> Tool -> Result -> Reporter.
//!
//! The supported linter set is fixed and small, so tools and reporters are
//! closed enums rather than trait objects. Each tool follows the same
//! lifecycle: a creator validates user settings into an option, `check` runs
//! the linter over the changed files, and the reporter is a read-only view
//! over the option and result.

pub mod clang_format;
pub mod clang_tidy;

use crate::core::context::RuntimeContext;
use crate::core::error::{Error, Result};
use crate::core::git::{ChangeKind, ChangedFile};
use crate::report::github::ReviewComment;
use regex::Regex;
use std::path::PathBuf;

/// Default file filter: C/C++ sources and headers.
pub const DEFAULT_FILE_IREGEX: &str = r".*\.(c|cc|cpp|cxx|h|hh|hpp|hxx)$";

/// User-facing settings shared by every tool, straight from the CLI.
#[derive(Debug, Clone, Default)]
pub struct ToolSettings {
    /// Whether the tool runs at all.
    pub enabled: bool,
    /// Binary name or path; defaults to the tool name.
    pub binary: Option<String>,
    /// Version constraint, e.g. `18` or `18.1.3`.
    pub version: Option<String>,
    /// Case-insensitive file-filter regex.
    pub file_iregex: Option<String>,
}

/// clang-tidy specific settings on top of the common ones.
#[derive(Debug, Clone, Default)]
pub struct ClangTidySettings {
    /// Common tool settings.
    pub common: ToolSettings,
    /// Comma-separated checks list passed through to the linter.
    pub checks: Option<String>,
    /// Compilation database directory (`-p`).
    pub database: Option<String>,
    /// Header filter regex.
    pub header_filter: Option<String>,
    /// Explicit configuration file.
    pub config_file: Option<String>,
    /// Do not fail when the checks list matches nothing.
    pub allow_no_checks: bool,
}

/// A validated tool configuration. Created once, never mutated.
#[derive(Debug, Clone)]
pub struct ToolOption {
    /// Resolved absolute binary path.
    pub binary: PathBuf,
    /// Version reported by the binary, or `unknown`.
    pub version: String,
    /// Compiled case-insensitive file filter.
    pub file_filter: Regex,
}

impl ToolOption {
    /// Validates common settings into an option.
    ///
    /// Fails before any tool runs when the binary cannot be resolved, the
    /// version constraint is unparseable, or the resolved binary reports a
    /// version outside the constraint.
    pub fn validate(tool: &str, settings: &ToolSettings) -> Result<Self> {
        let constraint = settings
            .version
            .as_deref()
            .map(|v| parse_version_constraint(tool, v))
            .transpose()?;

        let binary = resolve_binary(tool, settings.binary.as_deref(), constraint.as_deref())?;
        let version = probe_version(&binary);

        if let (Some(constraint), Some(version)) = (constraint.as_deref(), version.as_deref()) {
            if !version_matches(version, constraint) {
                return Err(Error::ConfigInvalid {
                    field: format!("{tool}-version"),
                    message: format!("binary reports version {version}, expected {constraint}"),
                });
            }
        }

        let pattern = settings.file_iregex.as_deref().unwrap_or(DEFAULT_FILE_IREGEX);
        let file_filter = Regex::new(&format!("(?i){pattern}")).map_err(|e| Error::ConfigInvalid {
            field: format!("{tool}-file-iregex"),
            message: e.to_string(),
        })?;

        Ok(Self {
            binary,
            version: version.unwrap_or_else(|| "unknown".to_string()),
            file_filter,
        })
    }

    /// Basename of the binary, used as the display name in reports.
    #[must_use]
    pub fn tool_name(&self) -> String {
        self.binary
            .file_name()
            .map_or_else(|| self.binary.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Checks a version constraint is plain dotted digits.
fn parse_version_constraint(tool: &str, version: &str) -> Result<String> {
    let valid = !version.is_empty()
        && version
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
        && version.split('.').count() <= 3;
    if valid {
        Ok(version.to_string())
    } else {
        Err(Error::InvalidVersion {
            tool: tool.to_string(),
            version: version.to_string(),
        })
    }
}

/// Resolves the tool binary through `PATH`.
///
/// When only a version constraint is given, a suffixed binary such as
/// `clang-format-18` is preferred over the plain name.
fn resolve_binary(tool: &str, binary: Option<&str>, constraint: Option<&str>) -> Result<PathBuf> {
    if let Some(binary) = binary {
        return which::which(binary).map_err(|_| Error::BinaryNotFound {
            tool: tool.to_string(),
            binary: binary.to_string(),
        });
    }

    if let Some(major) = constraint.and_then(|c| c.split('.').next()) {
        let suffixed = format!("{tool}-{major}");
        if let Ok(path) = which::which(&suffixed) {
            return Ok(path);
        }
    }

    which::which(tool).map_err(|_| Error::BinaryNotFound {
        tool: tool.to_string(),
        binary: tool.to_string(),
    })
}

/// Asks the binary for its version; `None` when it cannot be determined.
fn probe_version(binary: &std::path::Path) -> Option<String> {
    let output = std::process::Command::new(binary)
        .arg("--version")
        .output()
        .ok()?;
    let text = String::from_utf8_lossy(&output.stdout);
    extract_version(&text)
}

/// Pulls the first dotted version number out of a `--version` banner.
fn extract_version(text: &str) -> Option<String> {
    let re = Regex::new(r"(\d+\.\d+\.\d+)").ok()?;
    re.captures(text).map(|c| c[1].to_string())
}

/// True when `version` sits inside `constraint` (prefix match on components).
fn version_matches(version: &str, constraint: &str) -> bool {
    let version: Vec<&str> = version.split('.').collect();
    let constraint: Vec<&str> = constraint.split('.').collect();
    constraint.len() <= version.len() && version.starts_with(&constraint[..])
}

/// One issue reported by a linter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Repository-relative file path.
    pub file: String,
    /// 1-based row in the new file.
    pub row: u32,
    /// 1-based column.
    pub column: u32,
    /// Severity as printed by the linter (`error`, `warning`, ...).
    pub severity: String,
    /// Comma-separated check identifiers.
    pub checks: String,
    /// Human-readable message.
    pub message: String,
}

/// Per-tool outcome, built incrementally while files are checked.
///
/// Every file lands in exactly one of `passes`/`fails`/`ignored`; entry order
/// is insertion order by path so detail reports stay reproducible.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    /// Files without issues inside the diff.
    pub passes: Vec<String>,
    /// Files with issues inside the diff, with their diagnostics.
    pub fails: Vec<(String, Vec<Diagnostic>)>,
    /// Files skipped by the filter or tool-specific skip rules.
    pub ignored: Vec<String>,
    /// `fails.is_empty()`, recomputed by [`ToolResult::finish`].
    pub final_passed: bool,
    /// Command lines whose subprocess failed to run.
    pub failed_commands: Vec<String>,
}

impl ToolResult {
    /// Records a passing file.
    pub fn mark_passed(&mut self, path: impl Into<String>) {
        self.passes.push(path.into());
    }

    /// Records a failing file with its diagnostics.
    pub fn mark_failed(&mut self, path: impl Into<String>, diagnostics: Vec<Diagnostic>) {
        self.fails.push((path.into(), diagnostics));
    }

    /// Records an ignored file.
    pub fn mark_ignored(&mut self, path: impl Into<String>) {
        self.ignored.push(path.into());
    }

    /// Recomputes the overall verdict once all files are processed.
    pub fn finish(&mut self) {
        self.final_passed = self.fails.is_empty();
        debug_assert!(self.outcomes_disjoint(), "a file has more than one outcome");
    }

    fn outcomes_disjoint(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.passes
            .iter()
            .chain(self.fails.iter().map(|(p, _)| p))
            .chain(self.ignored.iter())
            .all(|p| seen.insert(p))
    }
}

/// Files a tool should consider: everything in the diff except deletions.
pub(crate) fn lintable_files(ctx: &RuntimeContext) -> impl Iterator<Item = &ChangedFile> {
    ctx.changed_files
        .iter()
        .filter(|f| f.kind != ChangeKind::Deleted)
}

/// The closed set of supported tools.
#[derive(Debug)]
pub enum Tool {
    /// Formatting checker.
    ClangFormat(clang_format::ClangFormat),
    /// Diagnostic linter.
    ClangTidy(clang_tidy::ClangTidy),
}

impl Tool {
    /// Canonical tool name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ClangFormat(_) => "clang-format",
            Self::ClangTidy(_) => "clang-tidy",
        }
    }

    /// Resolved binary path.
    #[must_use]
    pub fn binary(&self) -> String {
        match self {
            Self::ClangFormat(t) => t.option.binary.display().to_string(),
            Self::ClangTidy(t) => t.option.common.binary.display().to_string(),
        }
    }

    /// Version reported by the binary.
    #[must_use]
    pub fn version(&self) -> &str {
        match self {
            Self::ClangFormat(t) => &t.option.version,
            Self::ClangTidy(t) => &t.option.common.version,
        }
    }

    /// Runs the tool across the changed files and yields its reporter.
    pub async fn check(&self, ctx: &RuntimeContext) -> Reporter {
        match self {
            Self::ClangFormat(t) => Reporter::ClangFormat(t.check(ctx).await),
            Self::ClangTidy(t) => Reporter::ClangTidy(t.check(ctx).await),
        }
    }
}

/// Read-only view over one tool's option and result.
#[derive(Debug)]
pub enum Reporter {
    /// clang-format reporter.
    ClangFormat(clang_format::Reporter),
    /// clang-tidy reporter.
    ClangTidy(clang_tidy::Reporter),
}

/// The 4-tuple summarizing one tool's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BriefResult {
    /// Overall pass flag.
    pub passed: bool,
    /// Number of passing files.
    pub passed_count: usize,
    /// Number of failing files.
    pub failed_count: usize,
    /// Number of ignored files.
    pub ignored_count: usize,
}

impl Reporter {
    /// Brief pass/fail summary.
    #[must_use]
    pub fn brief(&self) -> BriefResult {
        let result = self.result();
        BriefResult {
            passed: result.final_passed,
            passed_count: result.passes.len(),
            failed_count: result.fails.len(),
            ignored_count: result.ignored.len(),
        }
    }

    /// Human-readable detail listing for summaries and comments.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::ClangFormat(r) => r.detail(),
            Self::ClangTidy(r) => r.detail(),
        }
    }

    /// Inline review comments; empty for tools without line-level output.
    #[must_use]
    pub fn review_comments(&self, ctx: &RuntimeContext) -> Vec<ReviewComment> {
        match self {
            Self::ClangFormat(_) => Vec::new(),
            Self::ClangTidy(r) => r.review_comments(ctx),
        }
    }

    /// Machine-readable `key=value` line for the action-output sink.
    #[must_use]
    pub fn action_output_line(&self) -> String {
        let key = match self {
            Self::ClangFormat(_) => "clang_format_failed_number",
            Self::ClangTidy(_) => "clang_tidy_failed_number",
        };
        format!("{key}={}", self.result().fails.len())
    }

    /// Command lines whose subprocess failed, for post-mortem display.
    #[must_use]
    pub fn failed_commands(&self) -> &[String] {
        &self.result().failed_commands
    }

    /// Display name: basename of the binary.
    #[must_use]
    pub fn tool_name(&self) -> String {
        match self {
            Self::ClangFormat(r) => r.option.tool_name(),
            Self::ClangTidy(r) => r.option.common.tool_name(),
        }
    }

    const fn result(&self) -> &ToolResult {
        match self {
            Self::ClangFormat(r) => &r.result,
            Self::ClangTidy(r) => &r.result,
        }
    }
}

/// Builds the enabled tool set from validated user settings.
///
/// This is the creator registry: each supported linter contributes one entry,
/// disabled tools yield nothing, and any validation failure aborts setup.
pub fn create_enabled_tools(
    clang_format: &ToolSettings,
    clang_tidy: &ClangTidySettings,
) -> Result<Vec<Tool>> {
    let mut tools = Vec::new();
    if let Some(tool) = clang_format::create(clang_format)? {
        tools.push(Tool::ClangFormat(tool));
    }
    if let Some(tool) = clang_tidy::create(clang_tidy)? {
        tools.push(Tool::ClangTidy(tool));
    }
    Ok(tools)
}
