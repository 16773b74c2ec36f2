//! crates/richacl/src/error.rs
//!
//! Error types surfaced by the ACL engine, the xattr codec and the text parser.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors returned by ACL construction, transformation and encoding.
///
/// Every fallible operation leaves its input untouched; a failed clone or
/// decode never exposes a partially built ACL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AclError {
    /// Allocating storage for the entries of a new ACL failed.
    #[error("out of memory while allocating an ACL with {entries} entries")]
    OutOfMemory {
        /// Number of entries the ACL was being sized for.
        entries: usize,
    },
    /// An ACL would exceed [`MAX_ENTRIES`](crate::MAX_ENTRIES).
    #[error("ACL has {count} entries, the maximum is {max}")]
    TooManyEntries {
        /// Requested entry count.
        count: usize,
        /// Hard entry limit.
        max: usize,
    },
    /// A mask contained bits outside [`AccessMask::all`](crate::AccessMask::all).
    #[error("access mask {0:#x} contains undefined permission bits")]
    InvalidMask(u32),
    /// The binary xattr representation was malformed.
    #[error("invalid richacl xattr: {0}")]
    InvalidEncoding(#[from] DecodeError),
    /// The caller-provided output buffer cannot hold the encoded ACL.
    #[error("buffer of {available} bytes cannot hold {required} encoded bytes")]
    BufferTooSmall {
        /// Bytes needed for the encoded ACL.
        required: usize,
        /// Bytes available in the buffer.
        available: usize,
    },
    /// The operation targets a file that cannot carry an ACL, or a required
    /// hook is missing.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
    /// The caller is not allowed to perform the operation.
    #[error("operation not permitted: {0}")]
    PermissionDenied(&'static str),
    /// The textual ACL representation was malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl AclError {
    pub(crate) fn out_of_memory(entries: usize, _source: TryReserveError) -> Self {
        Self::OutOfMemory { entries }
    }

    /// Returns the decode failure when this error came from the xattr codec.
    #[must_use]
    pub const fn decode_error(&self) -> Option<&DecodeError> {
        match self {
            Self::InvalidEncoding(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` if the error reports an allocation failure.
    #[must_use]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

/// Reasons an xattr buffer is rejected by [`decode`](crate::xattr::decode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer is shorter than the fixed header.
    #[error("buffer of {len} bytes is shorter than the {header} byte header")]
    Truncated {
        /// Observed buffer length.
        len: usize,
        /// Header size.
        header: usize,
    },
    /// The version byte does not match [`XATTR_VERSION`](crate::xattr::XATTR_VERSION).
    #[error("unsupported xattr version {0}")]
    BadVersion(u8),
    /// The ACL flags byte has undefined bits set.
    #[error("ACL flags {0:#04x} contain undefined bits")]
    InvalidAclFlags(u8),
    /// The header advertises more entries than allowed.
    #[error("entry count {count} exceeds the maximum of {max}")]
    TooManyEntries {
        /// Advertised entry count.
        count: usize,
        /// Hard entry limit.
        max: usize,
    },
    /// The payload length does not match the advertised entry count.
    #[error("expected {expected} bytes for the advertised entries, found {actual}")]
    LengthMismatch {
        /// Length implied by the header.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },
    /// One of the owner/group/other masks has undefined bits set.
    #[error("{class} mask {value:#x} contains undefined permission bits")]
    InvalidClassMask {
        /// Which class mask was rejected.
        class: &'static str,
        /// Raw mask value.
        value: u32,
    },
    /// An entry type is neither allow nor deny.
    #[error("entry {index}: invalid type {value}")]
    InvalidEntryType {
        /// Position of the entry.
        index: usize,
        /// Raw type value.
        value: u16,
    },
    /// An entry carries undefined flag bits.
    #[error("entry {index}: flags {value:#06x} contain undefined bits")]
    InvalidEntryFlags {
        /// Position of the entry.
        index: usize,
        /// Raw flags value.
        value: u16,
    },
    /// An entry mask carries undefined permission bits.
    #[error("entry {index}: mask {value:#x} contains undefined permission bits")]
    InvalidEntryMask {
        /// Position of the entry.
        index: usize,
        /// Raw mask value.
        value: u32,
    },
    /// A special identifier is not owner@, group@ or everyone@.
    #[error("entry {index}: unknown special identifier {value}")]
    InvalidSpecialId {
        /// Position of the entry.
        index: usize,
        /// Raw identifier value.
        value: u32,
    },
    /// A user or group id has no mapping in the caller's namespace.
    #[error("entry {index}: id {value} has no mapping")]
    UnmappedId {
        /// Position of the entry.
        index: usize,
        /// Raw identifier value.
        value: u32,
    },
}

/// Error produced when the textual ACL form cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    line: usize,
    reason: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }

    /// Returns the 1-based line number that failed to parse.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// Returns the human readable reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
