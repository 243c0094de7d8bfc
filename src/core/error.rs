//! Error handling for gitdep
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`GitdepError`]) for precise handling in code
//! 2. **User-friendly presentation** ([`ErrorContext`]) with actionable
//!    suggestions for terminal users
//!
//! Errors carrying subprocess output keep the captured stderr as structured
//! data. The checkout engine relies on this: the shallow-clone fallback and
//! the old-git compatibility path classify failures by matching against the
//! stderr of a failed git invocation, and the proxy diagnostic augmenter
//! appends remediation text to it without reclassifying the error.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for gitdep operations.
///
/// Each variant represents a specific failure mode with enough context to act
/// on it. Errors produced by git subprocesses keep the command's captured
/// stderr so recovery logic can inspect it.
#[derive(Error, Debug, Clone)]
pub enum GitdepError {
    /// A git command returned a non-zero exit code.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g., "fetch", "ls-remote")
        operation: String,
        /// The error output captured from the git command
        stderr: String,
    },

    /// Git executable not found in PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Repository clone failed.
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// The repository URL that failed to clone
        url: String,
        /// The captured stderr explaining the failure
        reason: String,
    },

    /// Checkout of a specific reference failed.
    #[error("Failed to checkout reference '{reference}'")]
    GitCheckoutFailed {
        /// The git reference (branch, tag, or commit) that failed to checkout
        reference: String,
        /// The captured stderr explaining the failure
        reason: String,
    },

    /// A git command did not complete within the configured timeout.
    #[error("Git operation timed out: {operation}")]
    GitTimeout {
        /// The git operation that timed out
        operation: String,
        /// The timeout that was exceeded, in seconds
        seconds: u64,
    },

    /// The operator declined to discard uncommitted changes during an
    /// in-place update. The whole checkout aborts; nothing was fetched or
    /// reset.
    #[error("Update of '{path}' declined: uncommitted changes were not discarded")]
    UpdateDeclined {
        /// The working directory whose update was declined
        path: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },
}

impl GitdepError {
    /// Returns the captured subprocess stderr, when this error carries one.
    ///
    /// Used by the checkout engine to classify failures (shallow rejection,
    /// branch-not-found) and by the proxy diagnostic augmenter.
    #[must_use]
    pub fn stderr_detail(&self) -> Option<&str> {
        match self {
            Self::GitCommandError {
                stderr, ..
            } => Some(stderr),
            Self::GitCloneFailed {
                reason, ..
            }
            | Self::GitCheckoutFailed {
                reason, ..
            } => Some(reason),
            _ => None,
        }
    }

    /// Appends extra text to the captured stderr detail, preserving the
    /// error's classification. No-op for variants without subprocess detail.
    #[must_use]
    pub fn with_appended_detail(self, extra: &str) -> Self {
        match self {
            Self::GitCommandError {
                operation,
                stderr,
            } => Self::GitCommandError {
                operation,
                stderr: format!("{}\n\n{extra}", stderr.trim_end()),
            },
            Self::GitCloneFailed {
                url,
                reason,
            } => Self::GitCloneFailed {
                url,
                reason: format!("{}\n\n{extra}", reason.trim_end()),
            },
            Self::GitCheckoutFailed {
                reference,
                reason,
            } => Self::GitCheckoutFailed {
                reference,
                reason: format!("{}\n\n{extra}", reason.trim_end()),
            },
            other => other,
        }
    }
}

/// User-facing error wrapper with optional details and a suggestion.
///
/// This is how gitdep presents failures to terminal users: the error itself
/// in red, additional details in yellow, and an actionable suggestion in
/// green.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying gitdep error
    pub error: GitdepError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a [`GitdepError`].
    #[must_use]
    pub const fn new(error: GitdepError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_detail_present_for_subprocess_errors() {
        let err = GitdepError::GitCloneFailed {
            url: "https://example.com/repo.git".to_string(),
            reason: "fatal: early EOF".to_string(),
        };
        assert_eq!(err.stderr_detail(), Some("fatal: early EOF"));

        let err = GitdepError::UpdateDeclined {
            path: "/tmp/pkg".to_string(),
        };
        assert!(err.stderr_detail().is_none());
    }

    #[test]
    fn test_with_appended_detail_keeps_classification() {
        let err = GitdepError::GitCommandError {
            operation: "clone".to_string(),
            stderr: "fatal: unable to connect\n".to_string(),
        };
        let augmented = err.with_appended_detail("Try https:// instead of git://");
        match augmented {
            GitdepError::GitCommandError {
                operation,
                stderr,
            } => {
                assert_eq!(operation, "clone");
                assert!(stderr.starts_with("fatal: unable to connect"));
                assert!(stderr.ends_with("Try https:// instead of git://"));
            }
            other => panic!("classification changed: {other:?}"),
        }
    }

    #[test]
    fn test_error_context_display_format() {
        let ctx = ErrorContext::new(GitdepError::GitNotFound)
            .with_details("gitdep drives the system git binary")
            .with_suggestion("Install git from https://git-scm.com/");
        let rendered = format!("{ctx}");
        assert!(rendered.contains("not installed"));
        assert!(rendered.contains("Details:"));
        assert!(rendered.contains("Suggestion:"));
    }
}
