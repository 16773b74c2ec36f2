#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `cli` implements the `richacl` command-line tool. It reads ACLs in their
//! text form or as raw `system.richacl` xattr values and runs the engine
//! operations on them: decoding and encoding, class mask computation,
//! permission checks, chmod, mode equivalence, inheritance and file creation.
//!
//! # Design
//!
//! The crate exposes [`run`] as the primary entry point. The function accepts
//! an iterator of arguments together with handles for standard output and
//! error, so tests drive it with in-memory buffers. A
//! [`clap`](https://docs.rs/clap/) builder command (see [`clap_command`])
//! performs the parse into [`ParsedArgs`]; options such as `--mode` or
//! `--uid` are global and may appear before or after the subcommand.
//!
//! # Invariants
//!
//! - `run` never panics; failures surface as non-zero exit codes.
//! - Results go to stdout, diagnostics to stderr, prefixed with `richacl:`.
//!
//! # Errors
//!
//! Exit code `1` means the command ran but answered "no": a check was
//! denied or an ACL has no equivalent mode. Exit code `2` reports usage,
//! input and I/O errors.
//!
//! # Examples
//!
//! ```
//! let mut stdout = Vec::new();
//! let mut stderr = Vec::new();
//! let exit_code = cli::run(["richacl", "--version"], &mut stdout, &mut stderr);
//!
//! assert_eq!(exit_code, 0);
//! assert!(!stdout.is_empty());
//! assert!(stderr.is_empty());
//! ```
//!
//! # See also
//!
//! - `src/bin/richacl.rs` for the binary that wires [`run`] into `main`.

use std::ffi::OsString;
use std::io::Write;

mod args;
mod commands;
mod error;
mod logging;

pub use args::{Action, ParsedArgs, clap_command, parse_args};
pub use error::{CliError, EXIT_FAILURE, EXIT_NEGATIVE};
pub use logging::LOG_ENV;

/// Maximum exit code representable by a Unix process.
const MAX_EXIT_CODE: i32 = u8::MAX as i32;

/// Parses `arguments`, runs the selected command and returns its exit code.
pub fn run<I, S, Out, Err>(arguments: I, stdout: &mut Out, stderr: &mut Err) -> i32
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
    Out: Write,
    Err: Write,
{
    let parsed = match parse_args(arguments) {
        Ok(parsed) => parsed,
        Err(CliError::Arguments(err)) if !err.use_stderr() => {
            let _ = write!(stdout, "{err}");
            return 0;
        }
        Err(err) => return report(&err, stderr),
    };

    logging::init(parsed.verbosity);
    match commands::execute(&parsed, stdout) {
        Ok(code) => code,
        Err(err) => report(&err, stderr),
    }
}

fn report<Err: Write>(error: &CliError, stderr: &mut Err) -> i32 {
    tracing::debug!(error = %error, "command failed");
    let _ = match error {
        CliError::Arguments(err) => write!(stderr, "{err}"),
        other => writeln!(stderr, "richacl: {other}"),
    };
    error.exit_code()
}

/// Converts a status returned by [`run`] into an [`ExitCode`](std::process::ExitCode).
pub fn exit_code_from(status: i32) -> std::process::ExitCode {
    let clamped = status.clamp(0, MAX_EXIT_CODE);
    std::process::ExitCode::from(clamped as u8)
}

#[cfg(test)]
mod tests;
