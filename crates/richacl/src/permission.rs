//! crates/richacl/src/permission.rs
//!
//! Per-request permission checks.
//!
//! A requester falls into one of three file classes:
//!
//! - the **owner** class if it owns the file,
//! - the **group** class if it is in the owning group or matches any
//!   group@, named user or named group entry,
//! - the **other** class otherwise.
//!
//! The class only matters for masked ACLs, where it selects which class mask
//! bounds the result.

use crate::ace::{AccessMask, Who};
use crate::acl::RichAcl;
use crate::debug_acl;
use crate::identity::{Gid, Uid};

bitflags::bitflags! {
    /// What a caller intends to do with a file, as passed to `inode_permission`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AccessIntent: u32 {
        /// Execute a file or search a directory.
        const EXEC = 0x0001;
        /// Modify data.
        const WRITE = 0x0002;
        /// Read data or list a directory.
        const READ = 0x0004;
        /// Append data.
        const APPEND = 0x0008;
        /// Create a file in a directory.
        const CREATE_FILE = 0x0100;
        /// Create a subdirectory.
        const CREATE_DIR = 0x0200;
        /// Remove an entry from a directory.
        const DELETE_CHILD = 0x0400;
        /// Remove the file itself.
        const DELETE_SELF = 0x0800;
        /// Change the owner.
        const TAKE_OWNERSHIP = 0x1000;
        /// Change the mode or ACL.
        const CHMOD = 0x2000;
        /// Set timestamps.
        const SET_TIMES = 0x4000;
    }
}

impl AccessIntent {
    /// Maps the intent to the permission bits it requires.
    ///
    /// Plain [`WRITE`](Self::WRITE) means "modify data" only when none of the
    /// more specific write-like intents is present; directory modifications
    /// carry `WRITE` alongside them.
    #[must_use]
    pub fn to_mask(self) -> AccessMask {
        let mut mask = AccessMask::empty();
        let pairs = [
            (Self::READ, AccessMask::READ_DATA),
            (Self::DELETE_SELF, AccessMask::DELETE),
            (Self::TAKE_OWNERSHIP, AccessMask::WRITE_OWNER),
            (Self::CHMOD, AccessMask::WRITE_ACL),
            (Self::SET_TIMES, AccessMask::WRITE_ATTRIBUTES),
            (Self::EXEC, AccessMask::EXECUTE),
        ];
        for (intent, bits) in pairs {
            if self.contains(intent) {
                mask |= bits;
            }
        }

        let specific = [
            (Self::APPEND, AccessMask::APPEND_DATA),
            (Self::CREATE_FILE, AccessMask::ADD_FILE),
            (Self::CREATE_DIR, AccessMask::ADD_SUBDIRECTORY),
            (Self::DELETE_CHILD, AccessMask::DELETE_CHILD),
        ];
        if specific.iter().any(|&(intent, _)| self.contains(intent)) {
            for (intent, bits) in specific {
                if self.contains(intent) {
                    mask |= bits;
                }
            }
        } else if self.contains(Self::WRITE) {
            mask |= AccessMask::WRITE_DATA;
        }
        mask
    }
}

/// Who is asking, relative to the file being checked.
pub trait Requester {
    /// The requester owns the file.
    fn is_owner(&self) -> bool;
    /// The requester is a member of the file's owning group.
    fn in_owning_group(&self) -> bool;
    /// The requester is user `uid`.
    fn is_user(&self, uid: Uid) -> bool;
    /// The requester is a member of group `gid`.
    fn in_group(&self, gid: Gid) -> bool;
}

/// The identity a process acts with: fsuid, fsgid and supplementary groups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    uid: Uid,
    gid: Gid,
    groups: Vec<Gid>,
}

impl Credentials {
    /// Creates credentials with no supplementary groups.
    #[must_use]
    pub const fn new(uid: Uid, gid: Gid) -> Self {
        Self {
            uid,
            gid,
            groups: Vec::new(),
        }
    }

    /// Returns the credentials with `groups` as supplementary groups.
    #[must_use]
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = Gid>) -> Self {
        self.groups = groups.into_iter().collect();
        self
    }

    /// File-system user id.
    #[must_use]
    pub const fn uid(&self) -> Uid {
        self.uid
    }

    /// File-system group id.
    #[must_use]
    pub const fn gid(&self) -> Gid {
        self.gid
    }

    /// Supplementary groups.
    #[must_use]
    pub fn groups(&self) -> &[Gid] {
        &self.groups
    }

    /// Membership test covering the primary and supplementary groups.
    #[must_use]
    pub fn in_group(&self, gid: Gid) -> bool {
        self.gid == gid || self.groups.contains(&gid)
    }

    /// Binds the credentials to a file owned by `owner` and `group`.
    #[must_use]
    pub const fn for_file(&self, owner: Uid, group: Gid) -> FileRequester<'_> {
        FileRequester {
            creds: self,
            owner,
            group,
        }
    }
}

/// [`Credentials`] evaluated against one file's owner and group.
#[derive(Clone, Copy, Debug)]
pub struct FileRequester<'a> {
    creds: &'a Credentials,
    owner: Uid,
    group: Gid,
}

impl Requester for FileRequester<'_> {
    fn is_owner(&self) -> bool {
        self.creds.uid == self.owner
    }

    fn in_owning_group(&self) -> bool {
        self.creds.in_group(self.group)
    }

    fn is_user(&self, uid: Uid) -> bool {
        self.creds.uid == uid
    }

    fn in_group(&self, gid: Gid) -> bool {
        self.creds.in_group(gid)
    }
}

/// File class a requester was placed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileClass {
    /// The file owner.
    Owner,
    /// The owning group or any matching group@/named entry.
    Group,
    /// Everybody else.
    Other,
}

/// Outcome of a permission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Every requested bit is granted.
    Granted,
    /// At least one requested bit is denied.
    Denied,
}

impl Decision {
    /// Returns `true` for [`Decision::Granted`].
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Detailed result of [`evaluate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Evaluation {
    /// Requested bits that are not granted.
    pub denied: AccessMask,
    /// File class the requester was placed in. Only guaranteed to be exact
    /// for masked ACLs; unmasked evaluation stops as soon as the request is
    /// resolved.
    pub class: FileClass,
}

impl Evaluation {
    /// Converts the evaluation into a grant/deny decision.
    #[must_use]
    pub const fn decision(&self) -> Decision {
        if self.denied.is_empty() {
            Decision::Granted
        } else {
            Decision::Denied
        }
    }
}

/// How an entry's identifier matched the requester.
#[derive(Clone, Copy)]
enum Match {
    Owner,
    Group,
    Everyone,
}

/// Checks whether `requester` is granted everything `intent` requires.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "trace", skip(acl, requester), fields(entries = acl.len()))
)]
pub fn check_permission<R>(acl: &RichAcl, requester: &R, intent: AccessIntent) -> Decision
where
    R: Requester + ?Sized,
{
    evaluate(acl, requester, intent.to_mask()).decision()
}

/// Returns the subset of `requested` that `acl` does not grant to `requester`.
#[must_use]
pub fn denied_mask<R>(acl: &RichAcl, requester: &R, requested: AccessMask) -> AccessMask
where
    R: Requester + ?Sized,
{
    evaluate(acl, requester, requested).denied
}

/// Evaluates `acl` for `requested` bits and reports which bits are denied.
///
/// Entries are walked in order, so an earlier deny beats a later allow for the
/// same bit. Bits no entry resolves are denied. For masked ACLs the class mask
/// of the requester's file class then bounds the result; under
/// [`WRITE_THROUGH`](crate::AclFlags::WRITE_THROUGH) the owner and other masks
/// replace it outright.
pub fn evaluate<R>(acl: &RichAcl, requester: &R, requested: AccessMask) -> Evaluation
where
    R: Requester + ?Sized,
{
    let masked = acl.is_masked();
    let is_owner = requester.is_owner();

    if masked && acl.is_write_through() && is_owner {
        let denied = requested.difference(acl.owner_mask());
        debug_acl::trace_permission(requested, denied, FileClass::Owner);
        return Evaluation {
            denied,
            class: FileClass::Owner,
        };
    }

    let in_owning_group = requester.in_owning_group();
    let mut in_group_class = in_owning_group;
    let mut remaining = requested;
    let mut denied = AccessMask::empty();

    for ace in acl.iter() {
        if ace.is_inherit_only() {
            continue;
        }
        let mut ace_mask = ace.mask();

        let matched = match ace.who() {
            Who::Owner => is_owner.then_some(Match::Owner),
            Who::Group => in_owning_group.then_some(Match::Group),
            Who::User(uid) if requester.is_user(uid) => {
                Some(if is_owner { Match::Owner } else { Match::Group })
            }
            Who::User(_) => None,
            Who::UnixGroup(gid) => requester.in_group(gid).then_some(Match::Group),
            Who::Everyone => Some(Match::Everyone),
        };
        match matched {
            None => continue,
            Some(Match::Everyone) => {}
            Some(Match::Owner) => in_group_class = true,
            Some(Match::Group) => {
                // Keep the result consistent with the masks from `max_masks`:
                // a group@ rw entry must not grant rw to an owner that is
                // also in the owning group when the group mask says r.
                if masked && ace.is_allow() {
                    ace_mask &= acl.group_mask();
                }
                in_group_class = true;
            }
        }

        if ace.is_deny() {
            denied |= ace_mask & remaining;
        }
        remaining.remove(ace_mask);

        if remaining.is_empty() && (in_group_class || !masked) {
            break;
        }
    }
    denied |= remaining;

    let class = if is_owner {
        FileClass::Owner
    } else if in_group_class {
        FileClass::Group
    } else {
        FileClass::Other
    };

    if masked {
        match class {
            FileClass::Owner => denied |= requested.difference(acl.owner_mask()),
            FileClass::Group => denied |= requested.difference(acl.group_mask()),
            FileClass::Other if acl.is_write_through() => {
                denied = requested.difference(acl.other_mask());
            }
            FileClass::Other => denied |= requested.difference(acl.other_mask()),
        }
    }

    debug_acl::trace_permission(requested, denied, class);
    Evaluation { denied, class }
}
