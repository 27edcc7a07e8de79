//! Formatting checker.
//!
//! Runs the formatter restricted to the commit range's line ranges (via
//! `--lines=<from>:<to>`) and compares the output against the file content: a
//! file whose unformatted lines were never touched by this range still
//! passes, even when reformatting them would change the file's line count.

use crate::core::context::RuntimeContext;
use crate::core::error::Result;
use crate::core::executor::{render_command, Executor};
use crate::core::git::FilePatch;
use crate::tools::{lintable_files, ToolOption, ToolResult, ToolSettings};
use std::collections::HashMap;
use std::time::Duration;

/// Creator: validates settings into a runnable tool, or nothing if disabled.
pub fn create(settings: &ToolSettings) -> Result<Option<ClangFormat>> {
    if !settings.enabled {
        return Ok(None);
    }
    let option = ToolOption::validate("clang-format", settings)?;
    Ok(Some(ClangFormat { option }))
}

/// The formatting tool.
#[derive(Debug)]
pub struct ClangFormat {
    /// Validated configuration.
    pub option: ToolOption,
}

impl ClangFormat {
    /// Checks every lintable changed file and classifies it.
    pub async fn check(&self, ctx: &RuntimeContext) -> Reporter {
        let executor = Executor::new(ctx.tool_timeout.map(Duration::from_secs));
        let envs = HashMap::new();
        let mut result = ToolResult::default();

        for file in lintable_files(ctx) {
            if !self.option.file_filter.is_match(&file.path) {
                tracing::debug!(file = %file.path, "Ignored by file filter");
                result.mark_ignored(&file.path);
                continue;
            }
            let Some(patch) = ctx.patches.get(&file.path) else {
                tracing::warn!(file = %file.path, "Changed file has no patch, skipping");
                result.mark_ignored(&file.path);
                continue;
            };

            let mut args = line_filter_args(patch);
            if args.is_empty() {
                // The range only removed lines from this file.
                result.mark_passed(&file.path);
                continue;
            }

            let disk_path = ctx.file_on_disk(&file.path);
            let actual = match std::fs::read_to_string(&disk_path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(file = %file.path, error = %e, "Cannot read file, skipping");
                    result.mark_ignored(&file.path);
                    continue;
                }
            };

            let binary = self.option.binary.display().to_string();
            args.push(disk_path.display().to_string());
            let outcome = executor.execute(&binary, &args, &envs, None).await;
            let output = match outcome {
                Ok(output) if output.success() => output,
                Ok(output) => {
                    tracing::warn!(file = %file.path, code = output.exit_code, "Formatter failed");
                    result.failed_commands.push(render_command(&binary, &args));
                    continue;
                }
                Err(e) => {
                    tracing::warn!(file = %file.path, error = %e, "Formatter did not run");
                    result.failed_commands.push(render_command(&binary, &args));
                    continue;
                }
            };

            // The formatter only touched the requested ranges, so any
            // difference comes from a changed line.
            if output.stdout == actual {
                result.mark_passed(&file.path);
            } else {
                result.mark_failed(&file.path, Vec::new());
            }
        }

        result.finish();
        Reporter {
            option: self.option.clone(),
            result,
        }
    }
}

/// Builds `--lines=<from>:<to>` arguments restricting the formatter to the
/// rows the commit range touched. Hunks that only delete lines contribute no
/// range.
pub(crate) fn line_filter_args(patch: &FilePatch) -> Vec<String> {
    patch
        .hunks()
        .filter(|h| h.new_lines > 0)
        .map(|h| format!("--lines={}:{}", h.new_start, h.new_start + h.new_lines - 1))
        .collect()
}

/// Read-only view over the formatting run.
#[derive(Debug)]
pub struct Reporter {
    /// Configuration the run used.
    pub option: ToolOption,
    /// Accumulated outcome.
    pub result: ToolResult,
}

impl Reporter {
    /// One bullet per failing file; the formatter has no per-line diagnostics.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut content = String::new();
        for (name, _) in &self.result.fails {
            content.push_str(&format!("- {name}\n"));
        }
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::git::test_repo::{commit_all, init, remove_file, write_file};
    use crate::core::git::{DiffModel, Hunk};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    // =========================================================================
    // line_filter_args
    // =========================================================================

    #[test]
    fn test_line_filter_covers_each_hunk() {
        let patch = FilePatch::new(vec![
            (
                Hunk {
                    old_start: 1,
                    old_lines: 1,
                    new_start: 1,
                    new_lines: 2,
                },
                3,
            ),
            (
                Hunk {
                    old_start: 10,
                    old_lines: 3,
                    new_start: 11,
                    new_lines: 3,
                },
                6,
            ),
        ]);
        assert_eq!(line_filter_args(&patch), vec!["--lines=1:2", "--lines=11:13"]);
    }

    #[test]
    fn test_line_filter_skips_deletion_hunks() {
        let patch = FilePatch::new(vec![(
            Hunk {
                old_start: 5,
                old_lines: 2,
                new_start: 4,
                new_lines: 0,
            },
            2,
        )]);
        assert!(line_filter_args(&patch).is_empty());
    }

    // =========================================================================
    // check() against scratch repositories, with a stand-in formatter
    // =========================================================================

    /// Writes an executable that collapses runs of spaces, but only inside
    /// the requested `--lines` ranges, the way the real formatter restricts
    /// itself.
    fn fake_formatter(dir: &Path) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-format");
        let script = r#"#!/bin/sh
script=""
file=""
for a in "$@"; do
  case "$a" in
    --lines=*) r="${a#--lines=}"; script="$script${script:+;}${r%:*},${r#*:}s/   */ /g" ;;
    *) file="$a" ;;
  esac
done
[ -n "$script" ] || script='s/   */ /g'
sed "$script" "$file"
"#;
        std::fs::write(&path, script).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path.display().to_string()
    }

    fn tool_with_binary(binary: &str) -> ClangFormat {
        let settings = ToolSettings {
            enabled: true,
            binary: Some(binary.to_string()),
            version: None,
            file_iregex: None,
        };
        create(&settings).expect("create").expect("enabled")
    }

    fn context_for(repo_dir: &Path, target: &str, source: &str) -> RuntimeContext {
        let model = DiffModel::build(repo_dir, target, source).expect("diff");
        let (changed_files, patches) = model.into_parts();
        RuntimeContext {
            repo_path: repo_dir.to_path_buf(),
            target: target.to_string(),
            source: source.to_string(),
            changed_files,
            patches,
            ..RuntimeContext::default()
        }
    }

    #[tokio::test]
    async fn test_reformatted_line_fails_the_file() {
        let (temp, repo) = init();
        let bin_dir = tempfile::TempDir::new().expect("bin dir");
        let formatter = fake_formatter(bin_dir.path());

        write_file(temp.path(), "test1.cpp", "int n = 1;\n");
        let target = commit_all(&repo, "base");
        write_file(temp.path(), "test1.cpp", "int n    = 1;\n");
        let source = commit_all(&repo, "misformat");

        let ctx = context_for(temp.path(), &target, &source);
        let reporter = tool_with_binary(&formatter).check(&ctx).await;

        assert!(!reporter.result.final_passed);
        assert_eq!(reporter.result.fails.len(), 1);
        assert_eq!(reporter.result.fails[0].0, "test1.cpp");
        assert!(reporter.result.passes.is_empty());
    }

    #[tokio::test]
    async fn test_unformatted_lines_outside_hunks_still_pass() {
        let (temp, repo) = init();
        let bin_dir = tempfile::TempDir::new().expect("bin dir");
        let formatter = fake_formatter(bin_dir.path());

        // Line 1 has been unformatted since the base commit; only line 2
        // changes, and its replacement is clean. Reformatting line 1 would
        // rewrite it, but it sits outside every hunk.
        write_file(temp.path(), "test1.cpp", "int a    = 1;\nint b = 2;\n");
        let target = commit_all(&repo, "base");
        write_file(temp.path(), "test1.cpp", "int a    = 1;\nint c = 3;\n");
        let source = commit_all(&repo, "clean change");

        let ctx = context_for(temp.path(), &target, &source);
        let reporter = tool_with_binary(&formatter).check(&ctx).await;

        assert!(reporter.result.final_passed);
        assert_eq!(reporter.result.passes, vec!["test1.cpp".to_string()]);
        assert!(reporter.result.fails.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_files_are_never_checked() {
        let (temp, repo) = init();
        let bin_dir = tempfile::TempDir::new().expect("bin dir");
        let formatter = fake_formatter(bin_dir.path());

        write_file(temp.path(), "test1.cpp", "int n    = 1;\n");
        write_file(temp.path(), "test2.cpp", "int m = 2;\n");
        let target = commit_all(&repo, "base");
        remove_file(temp.path(), "test1.cpp");
        let source = commit_all(&repo, "delete");

        let ctx = context_for(temp.path(), &target, &source);
        let reporter = tool_with_binary(&formatter).check(&ctx).await;

        assert!(reporter.result.final_passed);
        assert!(reporter.result.passes.is_empty());
        assert!(reporter.result.fails.is_empty());
        assert!(reporter.result.ignored.is_empty());
    }

    #[tokio::test]
    async fn test_added_unformatted_file_fails_alongside_formatted_one() {
        let (temp, repo) = init();
        let bin_dir = tempfile::TempDir::new().expect("bin dir");
        let formatter = fake_formatter(bin_dir.path());

        write_file(temp.path(), "base.cpp", "int b = 0;\n");
        let target = commit_all(&repo, "base");
        write_file(temp.path(), "test3.cpp", "int n    = 1;\n");
        write_file(temp.path(), "test4.cpp", "int n = 1;\n");
        let source = commit_all(&repo, "add");

        let ctx = context_for(temp.path(), &target, &source);
        let reporter = tool_with_binary(&formatter).check(&ctx).await;

        let brief = (
            reporter.result.final_passed,
            reporter.result.passes.len(),
            reporter.result.fails.len(),
            reporter.result.ignored.len(),
        );
        assert_eq!(brief, (false, 1, 1, 0));
        assert_eq!(reporter.result.fails[0].0, "test3.cpp");
    }

    #[tokio::test]
    async fn test_non_source_extension_is_ignored() {
        let (temp, repo) = init();
        let bin_dir = tempfile::TempDir::new().expect("bin dir");
        let formatter = fake_formatter(bin_dir.path());

        write_file(temp.path(), "base.cpp", "int b = 0;\n");
        let target = commit_all(&repo, "base");
        write_file(temp.path(), "notes.md", "-  hello\n");
        let source = commit_all(&repo, "docs");

        let ctx = context_for(temp.path(), &target, &source);
        let reporter = tool_with_binary(&formatter).check(&ctx).await;

        assert!(reporter.result.final_passed);
        assert_eq!(reporter.result.ignored, vec!["notes.md".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_formatter_lands_in_failed_commands() {
        use std::os::unix::fs::PermissionsExt;
        let (temp, repo) = init();
        let bin_dir = tempfile::TempDir::new().expect("bin dir");
        let broken = bin_dir.path().join("broken-format");
        std::fs::write(&broken, "#!/bin/sh\nexit 2\n").expect("write script");
        std::fs::set_permissions(&broken, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");

        write_file(temp.path(), "base.cpp", "int b = 0;\n");
        let target = commit_all(&repo, "base");
        write_file(temp.path(), "test1.cpp", "int n = 1;\n");
        let source = commit_all(&repo, "add");

        let ctx = context_for(temp.path(), &target, &source);
        let reporter = tool_with_binary(&broken.display().to_string()).check(&ctx).await;

        assert_eq!(reporter.result.failed_commands.len(), 1);
        assert!(reporter.result.failed_commands[0].contains("test1.cpp"));
        // A process failure is not a lint failure.
        assert!(reporter.result.final_passed);
    }

    #[test]
    fn test_detail_lists_failing_files() {
        let settings = ToolSettings {
            enabled: true,
            binary: Some("sh".to_string()),
            ..ToolSettings::default()
        };
        let tool = create(&settings).expect("create").expect("enabled");
        let mut result = ToolResult::default();
        result.mark_failed("file1.cpp", Vec::new());
        result.mark_failed("file2.cpp", Vec::new());
        result.finish();

        let reporter = Reporter {
            option: tool.option,
            result,
        };
        assert_eq!(reporter.detail(), "- file1.cpp\n- file2.cpp\n");
    }
}
