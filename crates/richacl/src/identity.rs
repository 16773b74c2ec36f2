//! crates/richacl/src/identity.rs
//!
//! Opaque user and group identifiers plus the namespace translation hook used
//! when ids cross the xattr boundary.
//!
//! The engine only ever compares identifiers for equality. How a raw on-disk
//! number relates to an engine identifier is decided by an [`IdMapper`], which
//! plays the role of a user namespace: [`InitNamespace`] maps every number to
//! itself, while [`RangeMapper`] models a single `uid_map`/`gid_map` extent.

use std::fmt;

/// Raw value reserved as "no such id".
pub const INVALID_ID: u32 = u32::MAX;

macro_rules! define_id {
    ($name:ident, $what:literal) => {
        #[doc = concat!("Engine-side ", $what, " identifier.")]
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(u32);

        impl $name {
            #[doc = concat!("Creates a ", $what, " identifier from its raw value.")]
            #[must_use]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Returns the raw identifier value.
            #[must_use]
            pub const fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns `false` for the reserved [`INVALID_ID`] value.
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.0 != INVALID_ID
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

define_id!(Uid, "user");
define_id!(Gid, "group");

/// Translates raw ids between a namespace and the engine's identifiers.
///
/// `map_*` turns a raw number found in an xattr into an engine identifier and
/// returns `None` when the number has no mapping; `unmap_*` is the reverse
/// direction used when encoding.
pub trait IdMapper {
    /// Maps a raw user id into an engine identifier.
    fn map_uid(&self, raw: u32) -> Option<Uid>;
    /// Maps a raw group id into an engine identifier.
    fn map_gid(&self, raw: u32) -> Option<Gid>;
    /// Maps an engine user identifier back into a raw id.
    fn unmap_uid(&self, uid: Uid) -> Option<u32>;
    /// Maps an engine group identifier back into a raw id.
    fn unmap_gid(&self, gid: Gid) -> Option<u32>;
}

/// The initial namespace: every raw id except [`INVALID_ID`] maps to itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InitNamespace;

impl IdMapper for InitNamespace {
    fn map_uid(&self, raw: u32) -> Option<Uid> {
        Some(Uid::new(raw)).filter(|uid| uid.is_valid())
    }

    fn map_gid(&self, raw: u32) -> Option<Gid> {
        Some(Gid::new(raw)).filter(|gid| gid.is_valid())
    }

    fn unmap_uid(&self, uid: Uid) -> Option<u32> {
        uid.is_valid().then_some(uid.as_raw())
    }

    fn unmap_gid(&self, gid: Gid) -> Option<u32> {
        gid.is_valid().then_some(gid.as_raw())
    }
}

/// A namespace with a single contiguous id extent, as written to
/// `/proc/<pid>/uid_map`: ids `inside..inside + count` correspond to
/// engine ids `outside..outside + count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeMapper {
    inside: u32,
    outside: u32,
    count: u32,
}

impl RangeMapper {
    /// Creates a mapper for one extent. Ids whose translation would overflow
    /// have no mapping.
    #[must_use]
    pub const fn new(inside: u32, outside: u32, count: u32) -> Self {
        Self {
            inside,
            outside,
            count,
        }
    }

    fn forward(&self, raw: u32) -> Option<u32> {
        let offset = raw.checked_sub(self.inside)?;
        if offset >= self.count {
            return None;
        }
        self.outside
            .checked_add(offset)
            .filter(|&id| id != INVALID_ID)
    }

    fn backward(&self, id: u32) -> Option<u32> {
        let offset = id.checked_sub(self.outside)?;
        if offset >= self.count {
            return None;
        }
        self.inside
            .checked_add(offset)
            .filter(|&raw| raw != INVALID_ID)
    }
}

impl IdMapper for RangeMapper {
    fn map_uid(&self, raw: u32) -> Option<Uid> {
        self.forward(raw).map(Uid::new)
    }

    fn map_gid(&self, raw: u32) -> Option<Gid> {
        self.forward(raw).map(Gid::new)
    }

    fn unmap_uid(&self, uid: Uid) -> Option<u32> {
        self.backward(uid.as_raw())
    }

    fn unmap_gid(&self, gid: Gid) -> Option<u32> {
        self.backward(gid.as_raw())
    }
}

/// Translates a raw user id from one namespace into another.
///
/// Returns `None` when either side has no mapping for the id.
pub fn translate_uid(from: &dyn IdMapper, to: &dyn IdMapper, raw: u32) -> Option<u32> {
    from.map_uid(raw).and_then(|uid| to.unmap_uid(uid))
}

/// Translates a raw group id from one namespace into another.
pub fn translate_gid(from: &dyn IdMapper, to: &dyn IdMapper, raw: u32) -> Option<u32> {
    from.map_gid(raw).and_then(|gid| to.unmap_gid(gid))
}
