//! Core functionality: diff model, context, subprocess execution, errors.

pub mod context;
pub mod error;
pub mod executor;
pub mod git;
pub mod position;

pub use context::{GithubEnv, ReportToggles, RuntimeContext};
pub use error::{Error, Result};
pub use executor::{CommandResult, Executor};
pub use git::{ChangeKind, ChangedFile, DiffModel, FilePatch, Hunk};
