//! Command-line interface for diff-lint.
//!
//! One invocation covers the whole pipeline: compute the diff of a commit
//! range, run the enabled linters against the changed lines, and publish the
//! results to the enabled sinks.

use crate::core::context::{GithubEnv, ReportToggles, RuntimeContext};
use crate::core::error::Result;
use crate::core::git::DiffModel;
use crate::report;
use crate::report::github::GithubClient;
use crate::tools::{create_enabled_tools, ClangTidySettings, Reporter, Tool, ToolSettings};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Diff-aware clang-format and clang-tidy runner for CI.
#[derive(Debug, Parser)]
#[command(
    name = "diff-lint",
    author,
    version,
    about = "Runs clang-format and clang-tidy against the changed lines of a commit range",
    long_about = r#"
diff-lint computes the diff between two revisions, runs clang-format and
clang-tidy over the files that changed, and judges only the lines the range
actually touched. Issues outside the diff never fail the run.

Results can be published to GitHub Actions outputs, the step summary, a
pull-request comment, and an inline pull-request review.

Environment variables:
  GITHUB_REPOSITORY   owner/name pair for API calls
  GITHUB_TOKEN        API token for comment and review sinks
  GITHUB_SHA          default source revision
  GITHUB_REF          pull request number (refs/pull/<n>/...)
  GITHUB_WORKSPACE    default repository path
  GITHUB_OUTPUT       action-output file
  GITHUB_STEP_SUMMARY step-summary file
"#,
    propagate_version = true
)]
pub struct Cli {
    /// Base revision the diff is computed against.
    #[arg(long, value_name = "REV")]
    pub target_revision: String,

    /// Head revision; defaults to GITHUB_SHA, then HEAD.
    #[arg(long, value_name = "REV", env = "GITHUB_SHA", default_value = "HEAD")]
    pub source_revision: String,

    /// Repository checkout; defaults to GITHUB_WORKSPACE, then the cwd.
    #[arg(long, value_name = "DIR", env = "GITHUB_WORKSPACE", default_value = ".")]
    pub repo_path: PathBuf,

    /// Run clang-format.
    #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
    pub enable_clang_format: bool,

    /// clang-format binary name or path.
    #[arg(long, value_name = "BIN")]
    pub clang_format_binary: Option<String>,

    /// Required clang-format version, e.g. 18 or 18.1.3.
    #[arg(long, value_name = "VER")]
    pub clang_format_version: Option<String>,

    /// Case-insensitive regex selecting files for clang-format.
    #[arg(long, value_name = "REGEX")]
    pub clang_format_file_iregex: Option<String>,

    /// Run clang-tidy.
    #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
    pub enable_clang_tidy: bool,

    /// clang-tidy binary name or path.
    #[arg(long, value_name = "BIN")]
    pub clang_tidy_binary: Option<String>,

    /// Required clang-tidy version, e.g. 18 or 18.1.3.
    #[arg(long, value_name = "VER")]
    pub clang_tidy_version: Option<String>,

    /// Case-insensitive regex selecting files for clang-tidy.
    #[arg(long, value_name = "REGEX")]
    pub clang_tidy_file_iregex: Option<String>,

    /// Comma-separated checks list passed to clang-tidy.
    #[arg(long, value_name = "CHECKS", allow_hyphen_values = true)]
    pub clang_tidy_checks: Option<String>,

    /// Compilation database directory passed as -p.
    #[arg(long, value_name = "DIR")]
    pub clang_tidy_database: Option<String>,

    /// Header filter regex passed to clang-tidy.
    #[arg(long, value_name = "REGEX", allow_hyphen_values = true)]
    pub clang_tidy_header_filter: Option<String>,

    /// Explicit clang-tidy configuration file.
    #[arg(long, value_name = "FILE")]
    pub clang_tidy_config_file: Option<String>,

    /// Pass --allow-no-checks to clang-tidy.
    #[arg(long)]
    pub clang_tidy_allow_no_checks: bool,

    /// Append failure counts to the action-output file.
    #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
    pub enable_action_output: bool,

    /// Append the detail report to the step summary.
    #[arg(long, action = ArgAction::Set, default_value_t = false, value_name = "BOOL")]
    pub enable_step_summary: bool,

    /// Post or update the summary comment on the pull request.
    #[arg(long, action = ArgAction::Set, default_value_t = false, value_name = "BOOL")]
    pub enable_comment_on_issue: bool,

    /// Submit an inline pull-request review.
    #[arg(long, action = ArgAction::Set, default_value_t = false, value_name = "BOOL")]
    pub enable_pull_request_review: bool,

    /// Exit 0 even when a linter reports issues.
    #[arg(long)]
    pub disable_errors: bool,

    /// Kill any linter subprocess running longer than this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub tool_timeout: Option<u64>,

    /// Log filter, e.g. info or debug; overrides -v and -q.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Use color output.
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,
}

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Always use color.
    Always,
    /// Auto-detect color support.
    #[default]
    Auto,
    /// Never use color.
    Never,
}

impl Cli {
    fn clang_format_settings(&self) -> ToolSettings {
        ToolSettings {
            enabled: self.enable_clang_format,
            binary: self.clang_format_binary.clone(),
            version: self.clang_format_version.clone(),
            file_iregex: self.clang_format_file_iregex.clone(),
        }
    }

    fn clang_tidy_settings(&self) -> ClangTidySettings {
        ClangTidySettings {
            common: ToolSettings {
                enabled: self.enable_clang_tidy,
                binary: self.clang_tidy_binary.clone(),
                version: self.clang_tidy_version.clone(),
                file_iregex: self.clang_tidy_file_iregex.clone(),
            },
            checks: self.clang_tidy_checks.clone(),
            database: self.clang_tidy_database.clone(),
            header_filter: self.clang_tidy_header_filter.clone(),
            config_file: self.clang_tidy_config_file.clone(),
            allow_no_checks: self.clang_tidy_allow_no_checks,
        }
    }

    fn toggles(&self) -> ReportToggles {
        ReportToggles {
            action_output: self.enable_action_output,
            step_summary: self.enable_step_summary,
            comment_on_issue: self.enable_comment_on_issue,
            pull_request_review: self.enable_pull_request_review,
        }
    }
}

/// Runs the CLI.
pub async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref(), cli.verbose, cli.quiet);
    setup_color(cli.color);

    // Setup failures abort before any linter runs.
    let tools = create_enabled_tools(&cli.clang_format_settings(), &cli.clang_tidy_settings())?;
    print_tools_info(&tools);

    let github = GithubEnv::read();
    let model = DiffModel::build(&cli.repo_path, &cli.target_revision, &cli.source_revision)?;
    let (changed_files, patches) = model.into_parts();
    tracing::info!(
        target = %cli.target_revision,
        source = %cli.source_revision,
        files = changed_files.len(),
        "Computed diff"
    );

    let ctx = RuntimeContext {
        repo_path: cli.repo_path.clone(),
        target: cli.target_revision.clone(),
        source: cli.source_revision.clone(),
        changed_files,
        patches,
        toggles: cli.toggles(),
        disable_errors: cli.disable_errors,
        tool_timeout: cli.tool_timeout,
        github,
    };

    let mut reporters = Vec::with_capacity(tools.len());
    for tool in &tools {
        let reporter = tool.check(&ctx).await;
        print_brief_result(&reporter);
        reporters.push(reporter);
    }

    dispatch_reports(&ctx, &reporters).await;

    let passed = report::all_passed(&reporters);
    if passed || ctx.disable_errors {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Publishes the reports to every enabled sink.
///
/// Reporting failures are logged and swallowed; they never change the lint
/// verdict or the exit code.
async fn dispatch_reports(ctx: &RuntimeContext, reporters: &[Reporter]) {
    if ctx.toggles.action_output {
        if let Err(e) = report::write_action_output(ctx, reporters) {
            tracing::error!(error = %e, "Failed to write action output");
        }
    }
    if ctx.toggles.step_summary {
        if let Err(e) = report::write_step_summary(ctx, reporters) {
            tracing::error!(error = %e, "Failed to write step summary");
        }
    }

    if !ctx.toggles.comment_on_issue && !ctx.toggles.pull_request_review {
        return;
    }
    if ctx.github.token.is_empty() || ctx.github.repository.is_empty() {
        tracing::warn!("GITHUB_TOKEN or GITHUB_REPOSITORY missing, skipping API sinks");
        return;
    }
    let client = GithubClient::new(&ctx.github.token, &ctx.github.repository);

    if ctx.toggles.comment_on_issue {
        if let Err(e) = report::comment_on_issue(ctx, &client, reporters).await {
            tracing::error!(error = %e, "Failed to post issue comment");
        }
    }
    if ctx.toggles.pull_request_review {
        if let Err(e) = report::post_pull_request_review(ctx, &client, reporters).await {
            tracing::error!(error = %e, "Failed to post review");
        }
    }
}

fn print_tools_info(tools: &[Tool]) {
    for tool in tools {
        tracing::info!(
            tool = tool.name(),
            binary = %tool.binary(),
            version = tool.version(),
            "Enabled"
        );
    }
}

fn print_brief_result(reporter: &Reporter) {
    let brief = reporter.brief();
    let verdict = if brief.passed {
        console::style("passed").green()
    } else {
        console::style("failed").red()
    };
    tracing::info!(
        tool = %reporter.tool_name(),
        passed = brief.passed_count,
        failed = brief.failed_count,
        ignored = brief.ignored_count,
        "Check {verdict}"
    );
}

/// Sets up logging based on verbosity flags.
fn setup_logging(level: Option<&str>, verbose: bool, quiet: bool) {
    let filter = if let Some(level) = level {
        level
    } else if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Sets up color output.
fn setup_color(choice: ColorChoice) {
    match choice {
        ColorChoice::Always => console::set_colors_enabled(true),
        ColorChoice::Never => console::set_colors_enabled(false),
        ColorChoice::Auto => {},
    }
}
