//! Errors surfaced by the command-line front-end.

use std::io;
use std::path::PathBuf;

use richacl::AclError;
use thiserror::Error;

/// Exit code for a command that ran but answered "no".
pub const EXIT_NEGATIVE: i32 = 1;

/// Exit code for usage, input and I/O errors.
pub const EXIT_FAILURE: i32 = 2;

/// Failure of a single CLI invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// Rejected by the argument parser, or a help or version request.
    #[error(transparent)]
    Arguments(#[from] clap::Error),

    /// The command line could not be interpreted.
    #[error("{0}")]
    Usage(String),

    /// An input or output file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// File involved, `-` for the standard streams.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The ACL engine rejected the input.
    #[error(transparent)]
    Acl(#[from] AclError),

    /// JSON output could not be produced.
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code reported for this error.
    ///
    /// Help and version output exit with `0`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(err) if !err.use_stderr() => 0,
            _ => EXIT_FAILURE,
        }
    }
}
