//! Diagnostic linter.
//!
//! Runs clang-tidy over each changed file, parses its diagnostics, and keeps
//! only the ones landing inside the commit range's hunks. Diagnostics outside
//! the diff never fail a file and never become review comments.

use crate::core::context::RuntimeContext;
use crate::core::error::Result;
use crate::core::executor::{render_command, Executor};
use crate::core::position::map_position;
use crate::report::github::ReviewComment;
use crate::tools::{lintable_files, ClangTidySettings, Diagnostic, ToolOption, ToolResult};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// Documentation host for check identifiers.
const CHECKS_DOC_URL: &str = "https://clang.llvm.org/extra/clang-tidy/checks";

/// Creator: validates settings into a runnable tool, or nothing if disabled.
pub fn create(settings: &ClangTidySettings) -> Result<Option<ClangTidy>> {
    if !settings.common.enabled {
        return Ok(None);
    }
    let common = ToolOption::validate("clang-tidy", &settings.common)?;
    Ok(Some(ClangTidy {
        option: ClangTidyOption {
            common,
            checks: settings.checks.clone(),
            database: settings.database.clone(),
            header_filter: settings.header_filter.clone(),
            config_file: settings.config_file.clone(),
            allow_no_checks: settings.allow_no_checks,
        },
    }))
}

/// Validated clang-tidy configuration.
#[derive(Debug, Clone)]
pub struct ClangTidyOption {
    /// Binary, version, and file filter.
    pub common: ToolOption,
    /// Comma-separated checks list.
    pub checks: Option<String>,
    /// Compilation database directory.
    pub database: Option<String>,
    /// Header filter regex.
    pub header_filter: Option<String>,
    /// Explicit configuration file.
    pub config_file: Option<String>,
    /// Tolerate an empty checks selection.
    pub allow_no_checks: bool,
}

/// The diagnostic tool.
#[derive(Debug)]
pub struct ClangTidy {
    /// Validated configuration.
    pub option: ClangTidyOption,
}

impl ClangTidy {
    fn build_args(&self, file: &str) -> Vec<String> {
        let mut args = vec!["--quiet".to_string()];
        if let Some(checks) = &self.option.checks {
            args.push(format!("--checks={checks}"));
        }
        if let Some(config_file) = &self.option.config_file {
            args.push(format!("--config-file={config_file}"));
        }
        if let Some(header_filter) = &self.option.header_filter {
            args.push(format!("--header-filter={header_filter}"));
        }
        if self.option.allow_no_checks {
            args.push("--allow-no-checks".to_string());
        }
        if let Some(database) = &self.option.database {
            args.push("-p".to_string());
            args.push(database.clone());
        }
        args.push(file.to_string());
        args
    }

    /// Checks every lintable changed file and classifies it.
    pub async fn check(&self, ctx: &RuntimeContext) -> Reporter {
        let executor = Executor::new(ctx.tool_timeout.map(Duration::from_secs));
        let envs = HashMap::new();
        let mut result = ToolResult::default();

        for file in lintable_files(ctx) {
            if !self.option.common.file_filter.is_match(&file.path) {
                tracing::debug!(file = %file.path, "Ignored by file filter");
                result.mark_ignored(&file.path);
                continue;
            }
            let Some(patch) = ctx.patches.get(&file.path) else {
                tracing::warn!(file = %file.path, "Changed file has no patch, skipping");
                result.mark_ignored(&file.path);
                continue;
            };

            let binary = self.option.common.binary.display().to_string();
            let args = self.build_args(&file.path);
            let outcome = executor
                .execute(&binary, &args, &envs, Some(&ctx.repo_path))
                .await;
            let output = match outcome {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(file = %file.path, error = %e, "Linter did not run");
                    result.failed_commands.push(render_command(&binary, &args));
                    continue;
                }
            };

            let all_diags = parse_diagnostics(&output.stdout);
            let diags: Vec<Diagnostic> = all_diags
                .into_iter()
                .filter(|d| diagnostic_names_file(&d.file, &file.path))
                .filter(|d| patch.hunk_containing(d.row).is_some())
                .collect();

            // clang-tidy exits non-zero when it reports errors; only an empty
            // parse combined with a failure exit means the run itself broke.
            if diags.is_empty() && !output.success() && !has_any_diagnostic(&output.stdout) {
                tracing::warn!(file = %file.path, code = output.exit_code, "Linter failed");
                result.failed_commands.push(render_command(&binary, &args));
                continue;
            }

            if diags.is_empty() {
                result.mark_passed(&file.path);
            } else {
                result.mark_failed(&file.path, diags);
            }
        }

        result.finish();
        Reporter {
            option: self.option.clone(),
            result,
        }
    }
}

fn diagnostic_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^(?P<file>[^\s:][^:]*):(?P<row>\d+):(?P<col>\d+): (?P<severity>error|warning): (?P<message>.*?) \[(?P<checks>[^\]\s]+)\]$",
        )
        .expect("diagnostic regex is valid")
    })
}

/// Parses clang-tidy's textual output into diagnostics.
///
/// `note:` lines and fix-it snippets are skipped; only error/warning headers
/// carry a check list.
pub(crate) fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    diagnostic_line_regex()
        .captures_iter(output)
        .filter_map(|caps| {
            Some(Diagnostic {
                file: caps["file"].to_string(),
                row: caps["row"].parse().ok()?,
                column: caps["col"].parse().ok()?,
                severity: caps["severity"].to_string(),
                message: caps["message"].to_string(),
                checks: caps["checks"].to_string(),
            })
        })
        .collect()
}

fn has_any_diagnostic(output: &str) -> bool {
    diagnostic_line_regex().is_match(output)
}

/// True when a diagnostic's (possibly absolute) path names the checked file.
fn diagnostic_names_file(diag_file: &str, relative: &str) -> bool {
    let diag_file = diag_file.strip_prefix("./").unwrap_or(diag_file);
    diag_file == relative
        || diag_file
            .strip_suffix(relative)
            .is_some_and(|prefix| prefix.ends_with('/'))
}

/// Renders a comma-separated checks list with documentation hyperlinks.
///
/// A check id with a `-` is split at the first dash into `<group>/<rest>` and
/// linked; an id without a dash passes through unchanged.
pub(crate) fn make_checks_linkage(checks: &str) -> String {
    checks
        .split(',')
        .map(|check| match check.split_once('-') {
            Some((group, rest)) => {
                format!("[{check}]({CHECKS_DOC_URL}/{group}/{rest}.html)")
            }
            None => check.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Read-only view over the lint run.
#[derive(Debug)]
pub struct Reporter {
    /// Configuration the run used.
    pub option: ClangTidyOption,
    /// Accumulated outcome.
    pub result: ToolResult,
}

impl Reporter {
    /// One entry per diagnostic: `file:row:col`, severity, linked checks,
    /// and the message as a quote.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut content = String::new();
        for (name, diags) in &self.result.fails {
            for diag in diags {
                content.push_str(&format!(
                    "- **{}:{}:{}:** {}: [{}]\n  > {}\n",
                    name,
                    diag.row,
                    diag.column,
                    diag.severity,
                    make_checks_linkage(&diag.checks),
                    diag.message,
                ));
            }
        }
        content
    }

    /// Maps every in-diff diagnostic to an inline review comment.
    ///
    /// Diagnostics whose row no hunk contains are dropped rather than pinned
    /// to a wrong line. Multiple diagnostics on one row each get their own
    /// comment.
    #[must_use]
    pub fn review_comments(&self, ctx: &RuntimeContext) -> Vec<ReviewComment> {
        let mut comments = Vec::new();
        for (name, diags) in &self.result.fails {
            let Some(patch) = ctx.patches.get(name) else {
                continue;
            };
            for diag in diags {
                if let Some(position) = map_position(patch, diag.row) {
                    comments.push(ReviewComment {
                        path: name.clone(),
                        position,
                        body: format!("{} [{}]", diag.message, diag.checks),
                    });
                }
            }
        }
        comments
    }
}
