//! diff-lint: diff-aware clang-format and clang-tidy runner for CI.
//!
//! The pipeline has four stages:
//! 1. [`core::git`] computes the changed files and hunks of a commit range.
//! 2. [`tools`] runs the enabled linters and keeps only issues whose rows
//!    fall inside those hunks.
//! 3. [`report`] fans the results out to the enabled sinks: action output,
//!    step summary, pull-request comment, and inline review.
//! 4. [`cli`] wires the stages together and maps the verdict to an exit code.

pub mod cli;
pub mod core;
pub mod report;
pub mod tools;

pub use crate::core::error::{Error, Result};
