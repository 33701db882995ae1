//! Error types for ff
//!
//! Every user-visible failure maps to a stable exit code:
//!
//! - 0: success
//! - 1: `--fail` was given and there were no results
//! - 2: error in the command-line arguments
//! - 3: one or more `-x`/`-X` subprocesses failed
//! - 4: internal walker error
//! - 10: a plugin had an unrecoverable error
//! - 11: unknown or ambiguous attribute
//! - 12: error in a test definition
//!
//! Per-entry failures (unreadable files, missing attribute values) are
//! never fatal; they are handled inside the walker and the evaluator.

use thiserror::Error;

/// Exit code constants, see the module docs.
pub const EX_OK: u8 = 0;
pub const EX_FAIL_EMPTY: u8 = 1;
pub const EX_USAGE: u8 = 2;
pub const EX_SUBPROCESS: u8 = 3;
pub const EX_PROCESS: u8 = 4;
pub const EX_BAD_PLUGIN: u8 = 10;
pub const EX_BAD_ATTRIBUTE: u8 = 11;
pub const EX_EXPRESSION: u8 = 12;

/// Top-level error type for the ff application
#[derive(Error, Debug)]
pub enum Error {
    /// There was an error in the arguments provided by the user.
    #[error("{0}")]
    Usage(String),

    /// A sequence of test tokens could not be parsed.
    #[error("unable to parse tests: {0}")]
    TestSyntax(String),

    /// An attribute was specified that does not exist or is ambiguous.
    #[error("{0}")]
    Attribute(String),

    /// A test uses an operator or a value that its type does not support.
    #[error("{0}")]
    Expression(String),

    /// A plugin had an unrecoverable error.
    #[error("plugin {name:?}: {reason}")]
    Plugin { name: String, reason: String },

    /// One or more worker threads had unrecoverable errors.
    #[error("internal walker error: {0}")]
    Walk(String),

    /// One or more `-x`/`-X` subprocesses had errors.
    #[error("one or more -x/-X commands had errors")]
    Subprocess,

    /// The metadata cache could not be opened or queried.
    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    /// I/O errors outside the walk (e.g. a missing reference file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The exit code this error maps to.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usage(_) => EX_USAGE,
            Error::TestSyntax(_) => EX_USAGE,
            Error::Attribute(_) => EX_BAD_ATTRIBUTE,
            Error::Expression(_) => EX_EXPRESSION,
            Error::Plugin { .. } => EX_BAD_PLUGIN,
            Error::Walk(_) => EX_PROCESS,
            Error::Subprocess => EX_SUBPROCESS,
            Error::Cache(_) => EX_PROCESS,
            Error::Io(_) => EX_USAGE,
        }
    }
}

/// Result type alias for the ff crate
pub type Result<T> = std::result::Result<T, Error>;
