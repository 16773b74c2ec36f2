//! crates/richacl/src/mode.rs
//!
//! Mapping between POSIX file mode permission bits and richacls.
//!
//! [`chmod`] applies a mode to an ACL by rewriting its class masks,
//! [`equiv_mode`] detects ACLs that carry no information beyond a mode, and
//! [`RichAcl::from_mode`] builds the smallest ACL equivalent to a mode.

use std::borrow::Cow;
use std::fmt;

use crate::ace::{AccessMask, AceFlags, RichAce, Who};
use crate::acl::{AclFlags, RichAcl};
use crate::debug_acl;
use crate::error::AclError;

/// A POSIX file mode: file type bits plus permission bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Mode(u32);

impl Mode {
    /// File type bits.
    pub const S_IFMT: u32 = 0o170_000;
    /// Directory.
    pub const S_IFDIR: u32 = 0o040_000;
    /// Regular file.
    pub const S_IFREG: u32 = 0o100_000;
    /// Symbolic link.
    pub const S_IFLNK: u32 = 0o120_000;
    /// Owner, group and other permission bits.
    pub const S_IRWXUGO: u32 = 0o777;

    /// Wraps a raw mode value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// A directory with permission bits `perm`.
    #[must_use]
    pub const fn dir(perm: u32) -> Self {
        Self(Self::S_IFDIR | (perm & Self::S_IRWXUGO))
    }

    /// A regular file with permission bits `perm`.
    #[must_use]
    pub const fn file(perm: u32) -> Self {
        Self(Self::S_IFREG | (perm & Self::S_IRWXUGO))
    }

    /// Raw value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// The `0o777` permission bits.
    #[must_use]
    pub const fn permissions(self) -> u32 {
        self.0 & Self::S_IRWXUGO
    }

    /// The mode with its permission bits replaced.
    #[must_use]
    pub const fn with_permissions(self, perm: u32) -> Self {
        Self((self.0 & !Self::S_IRWXUGO) | (perm & Self::S_IRWXUGO))
    }

    /// The mode with `umask` bits removed from its permissions.
    #[must_use]
    pub const fn without(self, umask: u32) -> Self {
        Self(self.0 & !(umask & Self::S_IRWXUGO))
    }

    /// Directory.
    #[must_use]
    pub const fn is_dir(self) -> bool {
        self.0 & Self::S_IFMT == Self::S_IFDIR
    }

    /// Symbolic link.
    #[must_use]
    pub const fn is_symlink(self) -> bool {
        self.0 & Self::S_IFMT == Self::S_IFLNK
    }

    const fn owner(self) -> u32 {
        (self.0 >> 6) & 0o7
    }

    const fn group(self) -> u32 {
        (self.0 >> 3) & 0o7
    }

    const fn other(self) -> u32 {
        self.0 & 0o7
    }

    /// Bits that carry no meaning for this file type.
    const fn ignored_mask(self) -> AccessMask {
        if self.is_dir() {
            AccessMask::empty()
        } else {
            AccessMask::DELETE_CHILD
        }
    }
}

impl From<u32> for Mode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:o}", self.0)
    }
}

/// Maps one `rwx` triad (the low three bits of `triad`) to permission bits.
#[must_use]
pub const fn mode_to_mask(triad: u32) -> AccessMask {
    let mut mask = AccessMask::empty();
    if triad & 0o4 != 0 {
        mask = mask.union(AccessMask::POSIX_READ);
    }
    if triad & 0o2 != 0 {
        mask = mask.union(AccessMask::POSIX_WRITE);
    }
    if triad & 0o1 != 0 {
        mask = mask.union(AccessMask::POSIX_EXEC);
    }
    mask
}

/// Maps permission bits to an `rwx` triad. A triad bit is set when any of the
/// permission bits it stands for is present.
#[must_use]
pub const fn mask_to_mode(mask: AccessMask) -> u32 {
    let mut triad = 0;
    if mask.intersects(AccessMask::POSIX_READ) {
        triad |= 0o4;
    }
    if mask.intersects(AccessMask::POSIX_WRITE) {
        triad |= 0o2;
    }
    if mask.intersects(AccessMask::POSIX_EXEC) {
        triad |= 0o1;
    }
    triad
}

/// Derives the `0o777` permission bits from the class masks of `acl`.
#[must_use]
pub const fn masks_to_mode(acl: &RichAcl) -> u32 {
    (mask_to_mode(acl.owner_mask()) << 6)
        | (mask_to_mode(acl.group_mask()) << 3)
        | mask_to_mode(acl.other_mask())
}

/// Applies `mode` to `acl`.
///
/// The class masks become the mode's permissions and [`AclFlags::MASKED`] and
/// [`AclFlags::WRITE_THROUGH`] are set, so the file's access is bounded by
/// the mode exactly. An auto-inherited ACL is also marked
/// [`AclFlags::PROTECTED`]. The entries are left alone. When the ACL already
/// matches, it is returned unchanged without copying.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "trace", skip(acl), fields(entries = acl.len()))
)]
pub fn chmod(acl: &RichAcl, mode: Mode) -> Result<Cow<'_, RichAcl>, AclError> {
    let ignored = mode.ignored_mask();
    let owner = mode_to_mask(mode.owner()).difference(ignored);
    let group = mode_to_mask(mode.group()).difference(ignored);
    let other = mode_to_mask(mode.other()).difference(ignored);

    let enforced = AclFlags::MASKED | AclFlags::WRITE_THROUGH;
    if acl.owner_mask() == owner
        && acl.group_mask() == group
        && acl.other_mask() == other
        && acl.flags().contains(enforced)
        && (!acl.is_auto_inherit() || acl.is_protected())
    {
        debug_acl::trace_chmod(mode.bits(), false);
        return Ok(Cow::Borrowed(acl));
    }

    let mut updated = acl.try_clone()?;
    let mut flags = updated.flags() | enforced;
    if updated.is_auto_inherit() {
        flags |= AclFlags::PROTECTED;
    }
    updated.set_flags(flags);
    updated.set_masks(owner, group, other);
    debug_acl::trace_chmod(mode.bits(), true);
    Ok(Cow::Owned(updated))
}

/// Allowed and decided bits for one class while scanning for equivalence.
#[derive(Clone, Copy)]
struct ClassState {
    allowed: AccessMask,
    defined: AccessMask,
}

impl ClassState {
    const fn defined(defined: AccessMask) -> Self {
        Self {
            allowed: AccessMask::empty(),
            defined,
        }
    }
}

/// Checks whether `acl` is fully described by a file mode.
///
/// Returns `mode` with its permission bits replaced by the equivalent ones, or
/// `None` when the ACL grants or denies something a mode cannot express: ACL
/// flags other than the enforcement flags, inheritance flags, named user or
/// group entries, or a permission split a mode cannot represent.
///
/// Bits every POSIX file grants anyway (attribute and ACL reads, plus
/// attribute, ownership and ACL writes for the owner) are ignored, as is
/// [`AccessMask::DELETE_CHILD`] on non-directories.
#[must_use]
pub fn equiv_mode(acl: &RichAcl, mode: Mode) -> Option<Mode> {
    let ignored = mode.ignored_mask();
    let mut owner = ClassState::defined(
        AccessMask::POSIX_ALWAYS_ALLOWED | AccessMask::POSIX_OWNER_ALLOWED | ignored,
    );
    let mut group = ClassState::defined(AccessMask::POSIX_ALWAYS_ALLOWED | ignored);
    let mut everyone = ClassState::defined(AccessMask::POSIX_ALWAYS_ALLOWED | ignored);

    if !(AclFlags::MASKED | AclFlags::WRITE_THROUGH).contains(acl.flags()) {
        return None;
    }

    for ace in acl.iter() {
        if !ace.flags().difference(AceFlags::SPECIAL_WHO).is_empty() {
            return None;
        }
        let mask = ace.mask();
        match ace.who() {
            Who::Owner | Who::Everyone => {
                let fresh = mask.difference(owner.defined);
                if ace.is_allow() {
                    let group_denied = group.defined.difference(group.allowed);
                    if fresh.intersects(group_denied) {
                        return None;
                    }
                    owner.allowed |= fresh;
                } else if fresh.intersects(group.allowed) {
                    return None;
                }
                owner.defined |= fresh;

                if ace.is_everyone() {
                    if ace.is_allow() {
                        group.allowed |= mask.difference(group.defined);
                        everyone.allowed |= mask.difference(everyone.defined);
                    }
                    group.defined |= mask;
                    everyone.defined |= mask;
                }
            }
            Who::Group => {
                let fresh = mask.difference(group.defined);
                if ace.is_allow() {
                    group.allowed |= fresh;
                }
                group.defined |= fresh;
            }
            Who::User(_) | Who::UnixGroup(_) => return None,
        }
    }

    if !group.allowed.difference(owner.defined).is_empty() {
        return None;
    }

    if acl.is_masked() {
        if acl.is_write_through() {
            owner.allowed = acl.owner_mask();
            everyone.allowed = acl.other_mask();
        } else {
            owner.allowed &= acl.owner_mask();
            everyone.allowed &= acl.other_mask();
        }
        group.allowed &= acl.group_mask();
    }

    let perm = (mask_to_mode(owner.allowed) << 6)
        | (mask_to_mode(group.allowed) << 3)
        | mask_to_mode(everyone.allowed);
    let result = mode.with_permissions(perm);

    let exact = |triad: u32, allowed: AccessMask| {
        (mode_to_mask(triad).symmetric_difference(allowed))
            .difference(ignored)
            .is_empty()
    };
    if exact(result.owner(), owner.allowed)
        && exact(result.group(), group.allowed)
        && exact(result.other(), everyone.allowed)
    {
        Some(result)
    } else {
        None
    }
}

impl RichAcl {
    /// Builds the minimal ACL equivalent to `mode`: one everyone@ entry
    /// allowing everything, bounded by write-through class masks.
    pub fn from_mode(mode: Mode) -> Result<Self, AclError> {
        let ignored = mode.ignored_mask();
        let mut acl = Self::with_capacity(1)?;
        acl.push(RichAce::allow(Who::Everyone, AccessMask::all()))?;
        acl.set_flags(AclFlags::MASKED | AclFlags::WRITE_THROUGH);
        acl.set_masks(
            mode_to_mask(mode.owner()).difference(ignored),
            mode_to_mask(mode.group()).difference(ignored),
            mode_to_mask(mode.other()).difference(ignored),
        );
        Ok(acl)
    }
}
