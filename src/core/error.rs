//! Error types for diff-lint.
//!
//! Setup-time errors (configuration, git) abort the run; per-file process
//! errors are folded into a tool's result instead, and reporting errors never
//! change the lint verdict.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in diff-lint.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Configuration errors (fatal before any tool runs)
    // =========================================================================
    /// A tool binary could not be resolved.
    #[error("Cannot resolve binary for {tool}: {binary}")]
    BinaryNotFound {
        /// Tool name.
        tool: String,
        /// Binary path or name the user supplied.
        binary: String,
    },

    /// A version constraint could not be parsed.
    #[error("Invalid version for {tool}: {version}")]
    InvalidVersion {
        /// Tool name.
        tool: String,
        /// The unparseable version string.
        version: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {field} - {message}")]
    ConfigInvalid {
        /// Field name that is invalid.
        field: String,
        /// Description of why it's invalid.
        message: String,
    },

    // =========================================================================
    // Git errors (fatal, abort the whole run)
    // =========================================================================
    /// Not in a Git repository.
    #[error("Not a Git repository: {path}")]
    NotGitRepo {
        /// Path that was searched.
        path: PathBuf,
    },

    /// Repository HEAD does not match the expected source commit.
    #[error("Repository HEAD {head} doesn't match source commit {expected}")]
    HeadMismatch {
        /// Current HEAD commit id.
        head: String,
        /// Expected source commit id.
        expected: String,
    },

    /// Git operation failed.
    #[error("Git operation failed: {operation} - {message}")]
    GitOperation {
        /// Name of the operation that failed.
        operation: String,
        /// Error message.
        message: String,
    },

    // =========================================================================
    // Process errors (per-file, recorded into failed_commands)
    // =========================================================================
    /// Failed to spawn or read a linter subprocess.
    #[error("Process failed: {command} - {message}")]
    Process {
        /// The command line that failed.
        command: String,
        /// What went wrong.
        message: String,
    },

    /// A linter subprocess exceeded the configured timeout.
    #[error("Process timed out after {seconds}s: {command}")]
    ProcessTimeout {
        /// The command line that was killed.
        command: String,
        /// Timeout in seconds.
        seconds: u64,
    },

    // =========================================================================
    // Reporting errors (fatal for the reporting step only)
    // =========================================================================
    /// Non-1xx/2xx status from the GitHub API.
    #[error("GitHub API error: status {status} for {path}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Request path.
        path: String,
    },

    /// The GitHub API returned an unexpected body.
    #[error("Unexpected GitHub response: {message}")]
    HttpBody {
        /// What was wrong with the body.
        message: String,
    },

    // =========================================================================
    // I/O errors
    // =========================================================================
    /// File I/O error.
    #[error("I/O error: {message}")]
    Io {
        /// Description of what failed.
        message: String,
        /// Source error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Creates a new Git operation error.
    pub fn git(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GitOperation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a new process error.
    pub fn process(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates a new I/O error with context.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Returns an exit code appropriate for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::BinaryNotFound { .. }
            | Self::InvalidVersion { .. }
            | Self::ConfigInvalid { .. } => 78, // EX_CONFIG
            Self::NotGitRepo { .. } | Self::HeadMismatch { .. } | Self::GitOperation { .. } => 65, // EX_DATAERR
            _ => 1,
        }
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Self::GitOperation {
            operation: format!("{:?}", err.code()),
            message: err.message().to_string(),
        }
    }
}
