//! Result aggregation and report fan-out.
//!
//! Collects every reporter's output and dispatches it to the enabled sinks:
//! the action-output file, the step summary, the pull-request comment, and
//! the inline review. Each sink is toggled independently.

pub mod github;

use crate::core::context::RuntimeContext;
use crate::core::error::{Error, Result};
use crate::tools::Reporter;
use github::GithubClient;
use std::io::Write;
use std::path::Path;

/// Logical AND of every reporter's brief pass flag.
#[must_use]
pub fn all_passed(reporters: &[Reporter]) -> bool {
    reporters.iter().all(|r| r.brief().passed)
}

/// Concatenates every reporter's detail text, tool-labeled.
///
/// Shared by the step summary and the issue comment. Failed commands are
/// surfaced per tool for post-mortem display.
#[must_use]
pub fn assemble_details(reporters: &[Reporter]) -> String {
    let mut body = String::new();
    for reporter in reporters {
        let brief = reporter.brief();
        body.push_str(&format!("## {}\n", reporter.tool_name()));
        if brief.passed {
            body.push_str(":white_check_mark: no issues in changed lines\n");
        } else {
            body.push_str(&reporter.detail());
        }
        let failed_commands = reporter.failed_commands();
        if !failed_commands.is_empty() {
            body.push_str("\nFailed commands:\n");
            for command in failed_commands {
                body.push_str(&format!("- `{command}`\n"));
            }
        }
        body.push('\n');
    }
    body
}

fn append_to(path: &Path, content: &str, what: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(format!("open {what}"), e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| Error::io(format!("write {what}"), e))
}

/// Appends each reporter's `key=value` line to the action-output file.
pub fn write_action_output(ctx: &RuntimeContext, reporters: &[Reporter]) -> Result<()> {
    let Some(path) = &ctx.github.action_output_path else {
        tracing::warn!("GITHUB_OUTPUT is not set, skipping action output");
        return Ok(());
    };
    let mut content = String::new();
    for reporter in reporters {
        content.push_str(&reporter.action_output_line());
        content.push('\n');
    }
    append_to(path, &content, "action output")
}

/// Appends the concatenated detail text to the step-summary file.
pub fn write_step_summary(ctx: &RuntimeContext, reporters: &[Reporter]) -> Result<()> {
    let Some(path) = &ctx.github.step_summary_path else {
        tracing::warn!("GITHUB_STEP_SUMMARY is not set, skipping step summary");
        return Ok(());
    };
    append_to(path, &assemble_details(reporters), "step summary")
}

/// Posts or updates the single summary comment on the pull request.
pub async fn comment_on_issue(
    ctx: &RuntimeContext,
    client: &GithubClient,
    reporters: &[Reporter],
) -> Result<()> {
    let Some(pr_number) = ctx.github.pr_number else {
        tracing::warn!("No pull request number, skipping issue comment");
        return Ok(());
    };
    client
        .upsert_issue_comment(pr_number, &assemble_details(reporters))
        .await
}

/// Submits one review bundling every reporter's inline comments.
///
/// Nothing is submitted when no tool produced a review comment.
pub async fn post_pull_request_review(
    ctx: &RuntimeContext,
    client: &GithubClient,
    reporters: &[Reporter],
) -> Result<()> {
    let Some(pr_number) = ctx.github.pr_number else {
        tracing::warn!("No pull request number, skipping review");
        return Ok(());
    };
    let comments: Vec<_> = reporters
        .iter()
        .flat_map(|r| r.review_comments(ctx))
        .collect();
    if comments.is_empty() {
        tracing::info!("No review comments to post");
        return Ok(());
    }
    client.create_pull_request_review(pr_number, &comments).await
}
