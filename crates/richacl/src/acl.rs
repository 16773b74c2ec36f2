//! crates/richacl/src/acl.rs
//!
//! The [`RichAcl`] container: an ordered entry list plus the owner, group and
//! other class masks.

use std::slice;

use crate::ace::{AccessMask, RichAce};
use crate::error::AclError;
use crate::xattr::{ENTRY_LEN, HEADER_LEN, XATTR_SIZE_MAX};

/// Largest number of entries an ACL may hold: as many as fit into one
/// maximum-sized extended attribute.
pub const MAX_ENTRIES: usize = (XATTR_SIZE_MAX - HEADER_LEN) / ENTRY_LEN;

bitflags::bitflags! {
    /// ACL-wide flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct AclFlags: u8 {
        /// Inheritable entries propagate automatically.
        const AUTO_INHERIT = 0x01;
        /// The ACL is detached from automatic inheritance.
        const PROTECTED = 0x02;
        /// The ACL was assigned by default rather than inherited.
        const DEFAULTED = 0x04;
        /// Owner and other masks replace, rather than cap, entry results.
        const WRITE_THROUGH = 0x40;
        /// The class masks apply during permission checks.
        const MASKED = 0x80;
    }
}

/// An ordered access control list.
///
/// Earlier entries take precedence over later ones. The class masks are only
/// consulted when [`AclFlags::MASKED`] is set. Values are never shared
/// mutably: operations that change an ACL take `&self` and build a new value,
/// and every allocation is fallible.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RichAcl {
    flags: AclFlags,
    owner_mask: AccessMask,
    group_mask: AccessMask,
    other_mask: AccessMask,
    entries: Vec<RichAce>,
}

impl RichAcl {
    /// Creates an empty ACL.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flags: AclFlags::empty(),
            owner_mask: AccessMask::empty(),
            group_mask: AccessMask::empty(),
            other_mask: AccessMask::empty(),
            entries: Vec::new(),
        }
    }

    /// Creates an empty ACL with room for `count` entries.
    pub fn with_capacity(count: usize) -> Result<Self, AclError> {
        check_count(count)?;
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(count)
            .map_err(|err| AclError::out_of_memory(count, err))?;
        Ok(Self {
            entries,
            ..Self::new()
        })
    }

    /// Builds an ACL from a list of entries.
    pub fn from_entries<I>(entries: I) -> Result<Self, AclError>
    where
        I: IntoIterator<Item = RichAce>,
    {
        let entries = entries.into_iter();
        let mut acl = Self::with_capacity(entries.size_hint().0.min(MAX_ENTRIES))?;
        for ace in entries {
            acl.push(ace)?;
        }
        Ok(acl)
    }

    /// Copies the ACL, reporting allocation failure instead of aborting.
    pub fn try_clone(&self) -> Result<Self, AclError> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(self.entries.len())
            .map_err(|err| AclError::out_of_memory(self.entries.len(), err))?;
        entries.extend_from_slice(&self.entries);
        Ok(Self {
            flags: self.flags,
            owner_mask: self.owner_mask,
            group_mask: self.group_mask,
            other_mask: self.other_mask,
            entries,
        })
    }

    /// Appends an entry.
    pub fn push(&mut self, ace: RichAce) -> Result<(), AclError> {
        check_count(self.entries.len() + 1)?;
        check_mask(ace.mask())?;
        self.entries
            .try_reserve(1)
            .map_err(|err| AclError::out_of_memory(self.entries.len() + 1, err))?;
        self.entries.push(ace);
        Ok(())
    }

    /// Returns the ACL with `flags` as its flags.
    #[must_use]
    pub fn with_flags(mut self, flags: AclFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Returns the ACL with the given class masks.
    #[must_use]
    pub fn with_masks(mut self, owner: AccessMask, group: AccessMask, other: AccessMask) -> Self {
        self.set_masks(owner, group, other);
        self
    }

    /// Replaces the class masks.
    pub fn set_masks(&mut self, owner: AccessMask, group: AccessMask, other: AccessMask) {
        self.owner_mask = owner;
        self.group_mask = group;
        self.other_mask = other;
    }

    /// Replaces the ACL flags.
    pub fn set_flags(&mut self, flags: AclFlags) {
        self.flags = flags;
    }

    /// ACL flags.
    #[must_use]
    pub const fn flags(&self) -> AclFlags {
        self.flags
    }

    /// Upper bound for the owner class.
    #[must_use]
    pub const fn owner_mask(&self) -> AccessMask {
        self.owner_mask
    }

    /// Upper bound for the group class.
    #[must_use]
    pub const fn group_mask(&self) -> AccessMask {
        self.group_mask
    }

    /// Upper bound for the other class.
    #[must_use]
    pub const fn other_mask(&self) -> AccessMask {
        self.other_mask
    }

    /// Entries in evaluation order.
    #[must_use]
    pub fn entries(&self) -> &[RichAce] {
        &self.entries
    }

    /// Iterates over the entries in evaluation order.
    pub fn iter(&self) -> slice::Iter<'_, RichAce> {
        self.entries.iter()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [RichAce] {
        &mut self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the ACL has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The class masks apply during permission checks.
    #[must_use]
    pub const fn is_masked(&self) -> bool {
        self.flags.contains(AclFlags::MASKED)
    }

    /// Owner and other masks replace entry results.
    #[must_use]
    pub const fn is_write_through(&self) -> bool {
        self.flags.contains(AclFlags::WRITE_THROUGH)
    }

    /// Inheritable entries propagate automatically.
    #[must_use]
    pub const fn is_auto_inherit(&self) -> bool {
        self.flags.contains(AclFlags::AUTO_INHERIT)
    }

    /// Detached from automatic inheritance.
    #[must_use]
    pub const fn is_protected(&self) -> bool {
        self.flags.contains(AclFlags::PROTECTED)
    }

    /// Checks the model invariants: entry count and mask validity.
    pub fn validate(&self) -> Result<(), AclError> {
        check_count(self.entries.len())?;
        for mask in [self.owner_mask, self.group_mask, self.other_mask] {
            check_mask(mask)?;
        }
        self.entries
            .iter()
            .try_for_each(|ace| check_mask(ace.mask()))
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RichAcl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Fields {
            flags: AclFlags,
            owner_mask: AccessMask,
            group_mask: AccessMask,
            other_mask: AccessMask,
            entries: Vec<RichAce>,
        }

        let fields = Fields::deserialize(deserializer)?;
        let acl = Self::from_entries(fields.entries)
            .map_err(serde::de::Error::custom)?
            .with_flags(fields.flags.intersection(AclFlags::all()))
            .with_masks(fields.owner_mask, fields.group_mask, fields.other_mask);
        acl.validate().map_err(serde::de::Error::custom)?;
        Ok(acl)
    }
}

impl<'a> IntoIterator for &'a RichAcl {
    type Item = &'a RichAce;
    type IntoIter = slice::Iter<'a, RichAce>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn check_count(count: usize) -> Result<(), AclError> {
    if count > MAX_ENTRIES {
        return Err(AclError::TooManyEntries {
            count,
            max: MAX_ENTRIES,
        });
    }
    Ok(())
}

fn check_mask(mask: AccessMask) -> Result<(), AclError> {
    if mask.bits() & !AccessMask::all().bits() != 0 {
        return Err(AclError::InvalidMask(mask.bits()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ace::Who;

    #[test]
    fn max_entries_fits_one_xattr() {
        assert_eq!(MAX_ENTRIES, 5460);
        assert!(HEADER_LEN + MAX_ENTRIES * ENTRY_LEN <= XATTR_SIZE_MAX);
    }

    #[test]
    fn from_entries_preserves_order() {
        let acl = RichAcl::from_entries([
            RichAce::deny(Who::Owner, AccessMask::WRITE_DATA),
            RichAce::allow(Who::Everyone, AccessMask::READ_DATA),
        ])
        .expect("acl");
        assert_eq!(acl.len(), 2);
        assert!(acl.entries()[0].is_deny());
        assert!(acl.entries()[1].is_everyone());
    }

    #[test]
    fn push_rejects_too_many_entries() {
        let mut acl = RichAcl::with_capacity(MAX_ENTRIES).expect("capacity");
        for _ in 0..MAX_ENTRIES {
            acl.push(RichAce::allow(Who::Everyone, AccessMask::READ_DATA))
                .expect("push");
        }
        let err = acl
            .push(RichAce::allow(Who::Everyone, AccessMask::READ_DATA))
            .unwrap_err();
        assert_eq!(
            err,
            AclError::TooManyEntries {
                count: MAX_ENTRIES + 1,
                max: MAX_ENTRIES
            }
        );
        assert_eq!(acl.len(), MAX_ENTRIES);
    }

    #[test]
    fn with_capacity_rejects_oversized_request() {
        assert!(matches!(
            RichAcl::with_capacity(MAX_ENTRIES + 1),
            Err(AclError::TooManyEntries { .. })
        ));
    }

    #[test]
    fn push_rejects_undefined_mask_bits() {
        let mut acl = RichAcl::new();
        let bogus = AccessMask::from_bits_retain(0x8000_0000);
        let err = acl
            .push(RichAce::allow(Who::Everyone, bogus))
            .unwrap_err();
        assert_eq!(err, AclError::InvalidMask(0x8000_0000));
        assert!(acl.is_empty());
    }

    #[test]
    fn try_clone_is_independent_copy() {
        let original = RichAcl::from_entries([RichAce::allow(Who::Owner, AccessMask::READ_DATA)])
            .expect("acl")
            .with_flags(AclFlags::MASKED)
            .with_masks(AccessMask::READ_DATA, AccessMask::empty(), AccessMask::empty());
        let mut copy = original.try_clone().expect("clone");
        assert_eq!(copy, original);

        copy.set_flags(AclFlags::empty());
        assert!(original.is_masked());
        assert!(!copy.is_masked());
    }

    #[test]
    fn validate_checks_class_masks() {
        let acl = RichAcl::new().with_masks(
            AccessMask::from_bits_retain(0x0000_0800),
            AccessMask::empty(),
            AccessMask::empty(),
        );
        assert_eq!(acl.validate(), Err(AclError::InvalidMask(0x0000_0800)));
        assert!(RichAcl::new().validate().is_ok());
    }

    #[test]
    fn flag_predicates() {
        let acl = RichAcl::new().with_flags(AclFlags::AUTO_INHERIT | AclFlags::WRITE_THROUGH);
        assert!(acl.is_auto_inherit());
        assert!(acl.is_write_through());
        assert!(!acl.is_masked());
        assert!(!acl.is_protected());
    }

    #[cfg(feature = "serde")]
    mod serde_input {
        use super::super::*;
        use crate::ace::{AceFlags, Who};
        use crate::identity::Uid;
        use serde_json::Value;

        fn named() -> RichAcl {
            RichAcl::from_entries([RichAce::allow(Who::User(Uid::new(7)), AccessMask::READ_DATA)])
                .expect("acl")
        }

        fn to_value(acl: &RichAcl) -> Value {
            serde_json::to_value(acl).expect("serialize")
        }

        #[test]
        fn json_round_trip() {
            let acl = named()
                .with_flags(AclFlags::MASKED)
                .with_masks(AccessMask::READ_DATA, AccessMask::READ_DATA, AccessMask::empty());
            let parsed: RichAcl = serde_json::from_value(to_value(&acl)).expect("deserialize");
            assert_eq!(parsed, acl);
        }

        #[test]
        fn forged_identity_flags_follow_who() {
            let mut value = to_value(&named());
            value["entries"][0]["flags"] =
                serde_json::to_value(AceFlags::IDENTIFIER_GROUP | AceFlags::FILE_INHERIT)
                    .expect("flags");
            let parsed: RichAcl = serde_json::from_value(value).expect("deserialize");
            assert_eq!(parsed.entries()[0].flags(), AceFlags::FILE_INHERIT);
        }

        #[test]
        fn undefined_mask_bits_are_rejected() {
            let mut value = to_value(&named());
            value["entries"][0]["mask"] =
                serde_json::to_value(AccessMask::from_bits_retain(0x8000_0000)).expect("mask");
            assert!(serde_json::from_value::<RichAcl>(value).is_err());

            let masked = RichAcl::new().with_masks(
                AccessMask::empty(),
                AccessMask::from_bits_retain(0x0000_0800),
                AccessMask::empty(),
            );
            assert!(serde_json::from_value::<RichAcl>(to_value(&masked)).is_err());
        }

        #[test]
        fn entry_limit_applies() {
            let mut value = to_value(&named());
            let entry = value["entries"][0].clone();
            value["entries"] = Value::Array(vec![entry; MAX_ENTRIES + 1]);
            assert!(serde_json::from_value::<RichAcl>(value).is_err());
        }
    }
}
