#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `richacl` evaluates rich access control lists: ordered allow/deny entries
//! in the NFSv4 style, extended with owner, group and other class masks that
//! keep the ACL consistent with the POSIX file mode. The crate is a pure,
//! synchronous decision engine. It holds no global state, performs no I/O and
//! knows nothing about any particular file system; callers supply file
//! attributes and caller identity through small traits.
//!
//! # Design
//!
//! - [`RichAcl`] and [`RichAce`] form the in-memory model. Entries are kept in
//!   evaluation order and every transformation builds a new value, so an ACL
//!   shared behind an [`Arc`](std::sync::Arc) is never modified underneath a
//!   reader.
//! - [`compute_max_masks`] derives the upper-bound class masks without knowing
//!   who owns the file. [`chmod`] and [`equiv_mode`] connect those masks to
//!   the permission bits of a mode.
//! - [`check_permission`] walks the entries for one requester and intent,
//!   applying the class masks of masked ACLs.
//! - [`inherit`] and [`create`] produce the ACL and mode of new files.
//! - [`xattr`] encodes and decodes the little-endian `system.richacl` value;
//!   [`text`] renders and parses the human-readable form.
//! - [`inode`] wires the engine to a file: permission checks with a mode
//!   fallback, the "may set ACL" policy and snapshot-based ACL storage.
//!
//! # Invariants
//!
//! - An ACL never holds more than [`MAX_ENTRIES`] entries, and every mask only
//!   uses defined permission bits.
//! - The [`AceFlags::SPECIAL_WHO`] and [`AceFlags::IDENTIFIER_GROUP`] flags of
//!   an entry always agree with its [`Who`].
//! - Operations that fail leave their inputs untouched.
//!
//! # Errors
//!
//! Fallible operations return [`AclError`]. Decoding failures carry a
//! [`DecodeError`] naming the first invalid field; text parsing failures
//! carry a [`ParseError`] with the offending line.
//!
//! # Examples
//!
//! Deny the owner write access ahead of a broader allow entry:
//!
//! ```
//! use richacl::{AccessIntent, AccessMask, Credentials, Gid, RichAce, RichAcl, Uid, Who};
//!
//! let acl = RichAcl::from_entries([
//!     RichAce::deny(Who::Owner, AccessMask::WRITE_DATA),
//!     RichAce::allow(Who::Owner, AccessMask::READ_DATA | AccessMask::WRITE_DATA),
//! ])
//! .expect("two entries fit");
//!
//! let owner = Credentials::new(Uid::new(1000), Gid::new(1000));
//! let requester = owner.for_file(Uid::new(1000), Gid::new(100));
//! assert!(!richacl::check_permission(&acl, &requester, AccessIntent::WRITE).is_granted());
//! assert!(richacl::check_permission(&acl, &requester, AccessIntent::READ).is_granted());
//! ```
//!
//! # See also
//!
//! - [`debug_acl`] for the tracing hooks enabled by the `tracing` feature.

mod ace;
mod acl;
pub mod debug_acl;
mod error;
mod identity;
mod inherit;
pub mod inode;
mod masks;
mod mode;
mod permission;
pub mod text;
pub mod xattr;

pub use ace::{
    AccessMask, AceFlags, AceType, EVERYONE_SPECIAL_ID, GROUP_SPECIAL_ID, OWNER_SPECIAL_ID,
    RichAce, Who,
};
pub use acl::{AclFlags, MAX_ENTRIES, RichAcl};
pub use error::{AclError, DecodeError, ParseError};
pub use identity::{
    Gid, INVALID_ID, IdMapper, InitNamespace, RangeMapper, Uid, translate_gid,
    translate_uid,
};
pub use inherit::{Created, create, inherit};
pub use masks::{ClassMasks, compute_max_masks, max_masks};
pub use mode::{Mode, chmod, equiv_mode, mask_to_mode, masks_to_mode, mode_to_mask};
pub use permission::{
    AccessIntent, Credentials, Decision, Evaluation, FileClass, FileRequester, Requester,
    check_permission, denied_mask, evaluate,
};
pub use xattr::{decode, encode, encoded_len};

#[cfg(test)]
mod tests;
