//! Error types shared by the shell's modules.

use std::path::PathBuf;

/// Result alias for operations that fail with a [`ShellError`].
pub type Result<T> = std::result::Result<T, ShellError>;

/// Failures the shell reports to the user before continuing with the next line.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// A builtin was called without an argument it needs.
    #[error("expected argument to \"{command}\"")]
    MissingArgument { command: &'static str },

    /// A builtin argument was present but could not be used.
    #[error("invalid argument to \"{command}\": {reason}")]
    InvalidArgument {
        command: &'static str,
        reason: String,
    },

    /// Lookup into the history log failed.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// The input line could not be split into words.
    #[error(transparent)]
    Lex(#[from] LexError),

    /// `fork(2)` itself failed.
    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),

    /// Waiting on a child process failed.
    #[error("wait failed for pid {pid}: {source}")]
    Wait {
        pid: i32,
        #[source]
        source: std::io::Error,
    },

    /// The program image could not be started.
    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A filesystem call on a specific path failed.
    #[error("{}: {source}", .path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors produced by [`crate::history::HistoryLog`] lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// The requested 1-based index is outside `[1, count]`.
    #[error("history index {index} out of range (1..={count})")]
    OutOfRange { index: i64, count: usize },
}

/// Errors produced while tokenizing an input line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    /// A single or double quote was opened but never closed.
    #[error("unterminated {0} quote")]
    UnfinishedQuote(&'static str),
}
