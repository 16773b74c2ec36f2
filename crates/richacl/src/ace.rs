//! crates/richacl/src/ace.rs
//!
//! Access control entries.
//!
//! A [`RichAce`] pairs an allow/deny [`AceType`] with an identifier
//! ([`Who`]), inheritance [`AceFlags`] and an [`AccessMask`]. The identity
//! flags [`AceFlags::SPECIAL_WHO`] and [`AceFlags::IDENTIFIER_GROUP`] are
//! derived from the identifier and cannot disagree with it.

use std::fmt;

use crate::identity::{Gid, Uid};

/// Whether an entry grants or withholds its mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u16)]
pub enum AceType {
    /// Access allowed.
    Allow = 0,
    /// Access denied.
    Deny = 1,
}

impl AceType {
    /// Returns the on-disk value.
    #[must_use]
    pub const fn as_raw(self) -> u16 {
        self as u16
    }

    /// Parses the on-disk value, rejecting audit/alarm and unknown types.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Allow),
            1 => Some(Self::Deny),
            _ => None,
        }
    }
}

impl fmt::Display for AceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        })
    }
}

bitflags::bitflags! {
    /// Per-entry flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct AceFlags: u16 {
        /// Inherited by non-directories created in this directory.
        const FILE_INHERIT = 0x0001;
        /// Inherited by directories created in this directory.
        const DIRECTORY_INHERIT = 0x0002;
        /// Inheritance stops at the immediate children.
        const NO_PROPAGATE_INHERIT = 0x0004;
        /// Only used for inheritance; ignored by permission checks.
        const INHERIT_ONLY = 0x0008;
        /// The identifier is a group.
        const IDENTIFIER_GROUP = 0x0040;
        /// The entry was inherited from the parent directory.
        const INHERITED = 0x0080;
        /// The identifier is owner@, group@ or everyone@.
        const SPECIAL_WHO = 0x4000;
    }
}

impl AceFlags {
    /// Flags that control or record inheritance.
    pub const INHERITANCE: Self = Self::FILE_INHERIT
        .union(Self::DIRECTORY_INHERIT)
        .union(Self::NO_PROPAGATE_INHERIT)
        .union(Self::INHERIT_ONLY)
        .union(Self::INHERITED);

    /// Flags that describe the kind of identifier.
    pub const IDENTITY: Self = Self::SPECIAL_WHO.union(Self::IDENTIFIER_GROUP);
}

bitflags::bitflags! {
    /// Permission bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct AccessMask: u32 {
        /// Read file data.
        const READ_DATA = 0x0000_0001;
        /// List directory contents.
        const LIST_DIRECTORY = 0x0000_0001;
        /// Write file data.
        const WRITE_DATA = 0x0000_0002;
        /// Create a file in a directory.
        const ADD_FILE = 0x0000_0002;
        /// Append to file data.
        const APPEND_DATA = 0x0000_0004;
        /// Create a subdirectory.
        const ADD_SUBDIRECTORY = 0x0000_0004;
        /// Read named attributes.
        const READ_NAMED_ATTRS = 0x0000_0008;
        /// Write named attributes.
        const WRITE_NAMED_ATTRS = 0x0000_0010;
        /// Execute a file or search a directory.
        const EXECUTE = 0x0000_0020;
        /// Remove an entry from a directory.
        const DELETE_CHILD = 0x0000_0040;
        /// Read basic attributes.
        const READ_ATTRIBUTES = 0x0000_0080;
        /// Change timestamps.
        const WRITE_ATTRIBUTES = 0x0000_0100;
        /// Change the retention period.
        const WRITE_RETENTION = 0x0000_0200;
        /// Change the retention hold.
        const WRITE_RETENTION_HOLD = 0x0000_0400;
        /// Delete the file itself.
        const DELETE = 0x0001_0000;
        /// Read the ACL.
        const READ_ACL = 0x0002_0000;
        /// Replace the ACL or change the mode.
        const WRITE_ACL = 0x0004_0000;
        /// Take ownership.
        const WRITE_OWNER = 0x0008_0000;
        /// Synchronous access.
        const SYNCHRONIZE = 0x0010_0000;
    }
}

impl AccessMask {
    /// Bits granted by the POSIX read permission.
    pub const POSIX_READ: Self = Self::READ_DATA;
    /// Bits granted by the POSIX write permission.
    pub const POSIX_WRITE: Self = Self::WRITE_DATA
        .union(Self::APPEND_DATA)
        .union(Self::DELETE_CHILD);
    /// Bits granted by the POSIX execute permission.
    pub const POSIX_EXEC: Self = Self::EXECUTE;
    /// Every bit expressible through POSIX permission bits.
    pub const POSIX_ALL: Self = Self::POSIX_READ
        .union(Self::POSIX_WRITE)
        .union(Self::POSIX_EXEC);
    /// Bits POSIX grants to everybody regardless of the mode.
    pub const POSIX_ALWAYS_ALLOWED: Self = Self::SYNCHRONIZE
        .union(Self::READ_ATTRIBUTES)
        .union(Self::READ_ACL);
    /// Bits POSIX grants to the owner regardless of the mode.
    pub const POSIX_OWNER_ALLOWED: Self = Self::WRITE_ATTRIBUTES
        .union(Self::WRITE_OWNER)
        .union(Self::WRITE_ACL);
}

/// Special identifier numbers used on disk.
pub const OWNER_SPECIAL_ID: u32 = 0;
/// Special identifier number of group@.
pub const GROUP_SPECIAL_ID: u32 = 1;
/// Special identifier number of everyone@.
pub const EVERYONE_SPECIAL_ID: u32 = 2;

/// The identifier an entry applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Who {
    /// owner@: the file owner.
    Owner,
    /// group@: members of the owning group.
    Group,
    /// everyone@: all requesters, including the owner and group.
    Everyone,
    /// A specific user.
    User(Uid),
    /// A specific group.
    UnixGroup(Gid),
}

impl Who {
    /// Returns the special identifier number for owner@, group@ and everyone@.
    #[must_use]
    pub const fn special_id(self) -> Option<u32> {
        match self {
            Self::Owner => Some(OWNER_SPECIAL_ID),
            Self::Group => Some(GROUP_SPECIAL_ID),
            Self::Everyone => Some(EVERYONE_SPECIAL_ID),
            Self::User(_) | Self::UnixGroup(_) => None,
        }
    }

    /// Looks up a special identifier by number.
    #[must_use]
    pub const fn from_special_id(id: u32) -> Option<Self> {
        match id {
            OWNER_SPECIAL_ID => Some(Self::Owner),
            GROUP_SPECIAL_ID => Some(Self::Group),
            EVERYONE_SPECIAL_ID => Some(Self::Everyone),
            _ => None,
        }
    }

    /// Returns `true` for owner@, group@ and everyone@.
    #[must_use]
    pub const fn is_special(self) -> bool {
        self.special_id().is_some()
    }

    const fn identity_flags(self) -> AceFlags {
        match self {
            Self::Owner | Self::Group | Self::Everyone => AceFlags::SPECIAL_WHO,
            Self::UnixGroup(_) => AceFlags::IDENTIFIER_GROUP,
            Self::User(_) => AceFlags::empty(),
        }
    }
}

/// One access control entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RichAce {
    kind: AceType,
    flags: AceFlags,
    mask: AccessMask,
    who: Who,
}

impl RichAce {
    /// Creates an entry without inheritance flags.
    #[must_use]
    pub const fn new(kind: AceType, who: Who, mask: AccessMask) -> Self {
        Self {
            kind,
            flags: who.identity_flags(),
            mask,
            who,
        }
    }

    /// Creates an allow entry.
    #[must_use]
    pub const fn allow(who: Who, mask: AccessMask) -> Self {
        Self::new(AceType::Allow, who, mask)
    }

    /// Creates a deny entry.
    #[must_use]
    pub const fn deny(who: Who, mask: AccessMask) -> Self {
        Self::new(AceType::Deny, who, mask)
    }

    /// Returns the entry with its non-identity flags replaced by `flags`.
    ///
    /// Identity flags in `flags` are ignored; they always follow [`Self::who`].
    #[must_use]
    pub const fn with_flags(mut self, flags: AceFlags) -> Self {
        self.flags = flags
            .difference(AceFlags::IDENTITY)
            .union(self.who.identity_flags());
        self
    }

    /// Returns the entry with `mask` as its permission bits.
    #[must_use]
    pub const fn with_mask(mut self, mask: AccessMask) -> Self {
        self.mask = mask;
        self
    }

    /// Entry type.
    #[must_use]
    pub const fn kind(&self) -> AceType {
        self.kind
    }

    /// All entry flags, including the identity flags.
    #[must_use]
    pub const fn flags(&self) -> AceFlags {
        self.flags
    }

    /// Permission bits.
    #[must_use]
    pub const fn mask(&self) -> AccessMask {
        self.mask
    }

    /// Identifier the entry applies to.
    #[must_use]
    pub const fn who(&self) -> Who {
        self.who
    }

    pub(crate) fn insert_flags(&mut self, flags: AceFlags) {
        self.flags |= flags.difference(AceFlags::IDENTITY);
    }

    pub(crate) fn remove_flags(&mut self, flags: AceFlags) {
        self.flags.remove(flags.difference(AceFlags::IDENTITY));
    }

    pub(crate) fn remove_mask(&mut self, mask: AccessMask) {
        self.mask.remove(mask);
    }

    /// owner@ entry.
    #[must_use]
    pub const fn is_owner(&self) -> bool {
        matches!(self.who, Who::Owner)
    }

    /// group@ entry.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        matches!(self.who, Who::Group)
    }

    /// everyone@ entry.
    #[must_use]
    pub const fn is_everyone(&self) -> bool {
        matches!(self.who, Who::Everyone)
    }

    /// Entry for a specific user.
    #[must_use]
    pub const fn is_unix_user(&self) -> bool {
        matches!(self.who, Who::User(_))
    }

    /// Entry for a specific group.
    #[must_use]
    pub const fn is_unix_group(&self) -> bool {
        matches!(self.who, Who::UnixGroup(_))
    }

    /// Entries with [`AceFlags::INHERIT_ONLY`] have no effect on permission
    /// checks.
    #[must_use]
    pub const fn is_inherit_only(&self) -> bool {
        self.flags.contains(AceFlags::INHERIT_ONLY)
    }

    /// Inherited by files or directories created below.
    #[must_use]
    pub const fn is_inheritable(&self) -> bool {
        self.flags
            .intersects(AceFlags::FILE_INHERIT.union(AceFlags::DIRECTORY_INHERIT))
    }

    /// Allow entry.
    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self.kind, AceType::Allow)
    }

    /// Deny entry.
    #[must_use]
    pub const fn is_deny(&self) -> bool {
        matches!(self.kind, AceType::Deny)
    }

    /// Both entries apply to the same identifier.
    #[must_use]
    pub fn is_same_identifier(&self, other: &Self) -> bool {
        self.who == other.who
    }
}

// Identity flags follow `who` as in `RichAce::new`; undefined mask bits are an error.
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RichAce {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Fields {
            kind: AceType,
            flags: AceFlags,
            mask: AccessMask,
            who: Who,
        }

        let fields = Fields::deserialize(deserializer)?;
        if fields.mask.bits() & !AccessMask::all().bits() != 0 {
            return Err(serde::de::Error::custom(format_args!(
                "invalid access mask {:#x}",
                fields.mask.bits()
            )));
        }
        Ok(Self::new(fields.kind, fields.who, fields.mask)
            .with_flags(fields.flags.intersection(AceFlags::all())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_flags_follow_who() {
        let owner = RichAce::allow(Who::Owner, AccessMask::READ_DATA);
        assert_eq!(owner.flags(), AceFlags::SPECIAL_WHO);

        let group = RichAce::deny(Who::UnixGroup(Gid::new(5)), AccessMask::WRITE_DATA);
        assert_eq!(group.flags(), AceFlags::IDENTIFIER_GROUP);

        let user = RichAce::allow(Who::User(Uid::new(5)), AccessMask::EXECUTE);
        assert!(user.flags().is_empty());
    }

    #[test]
    fn with_flags_cannot_forge_identity() {
        let ace = RichAce::allow(Who::User(Uid::new(1)), AccessMask::READ_DATA)
            .with_flags(AceFlags::SPECIAL_WHO | AceFlags::FILE_INHERIT);
        assert_eq!(ace.flags(), AceFlags::FILE_INHERIT);

        let ace = RichAce::allow(Who::Everyone, AccessMask::READ_DATA)
            .with_flags(AceFlags::IDENTIFIER_GROUP);
        assert_eq!(ace.flags(), AceFlags::SPECIAL_WHO);
    }

    #[test]
    fn predicates() {
        let ace = RichAce::allow(Who::Group, AccessMask::READ_DATA)
            .with_flags(AceFlags::DIRECTORY_INHERIT | AceFlags::INHERIT_ONLY);
        assert!(ace.is_group());
        assert!(ace.is_allow());
        assert!(!ace.is_deny());
        assert!(ace.is_inherit_only());
        assert!(ace.is_inheritable());
        assert!(!ace.is_unix_group());
    }

    #[test]
    fn same_identifier_compares_who_only() {
        let a = RichAce::allow(Who::User(Uid::new(3)), AccessMask::READ_DATA);
        let b = RichAce::deny(Who::User(Uid::new(3)), AccessMask::WRITE_DATA);
        let c = RichAce::deny(Who::UnixGroup(Gid::new(3)), AccessMask::WRITE_DATA);
        assert!(a.is_same_identifier(&b));
        assert!(!a.is_same_identifier(&c));
    }

    #[test]
    fn ace_type_raw_values() {
        assert_eq!(AceType::from_raw(0), Some(AceType::Allow));
        assert_eq!(AceType::from_raw(1), Some(AceType::Deny));
        assert_eq!(AceType::from_raw(2), None);
        assert_eq!(AceType::Deny.as_raw(), 1);
    }

    #[test]
    fn special_ids_round_trip() {
        for who in [Who::Owner, Who::Group, Who::Everyone] {
            let id = who.special_id().expect("special");
            assert_eq!(Who::from_special_id(id), Some(who));
        }
        assert_eq!(Who::from_special_id(3), None);
        assert!(!Who::User(Uid::new(0)).is_special());
    }

    #[test]
    fn posix_write_covers_directory_modification() {
        assert!(AccessMask::POSIX_WRITE.contains(AccessMask::ADD_FILE));
        assert!(AccessMask::POSIX_WRITE.contains(AccessMask::ADD_SUBDIRECTORY));
        assert!(AccessMask::POSIX_WRITE.contains(AccessMask::DELETE_CHILD));
        assert!(!AccessMask::POSIX_ALL.contains(AccessMask::DELETE));
    }
}
