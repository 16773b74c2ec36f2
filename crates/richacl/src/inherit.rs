//! crates/richacl/src/inherit.rs
//!
//! ACL inheritance for newly created files and directories.

use crate::ace::{AccessMask, AceFlags, RichAce};
use crate::acl::{AclFlags, RichAcl};
use crate::debug_acl;
use crate::error::AclError;
use crate::masks::compute_max_masks;
use crate::mode::{Mode, equiv_mode, mode_to_mask};

/// Builds the ACL a new child of a directory with ACL `parent` inherits.
///
/// A directory child inherits every entry carrying
/// [`AceFlags::FILE_INHERIT`] or [`AceFlags::DIRECTORY_INHERIT`]:
///
/// - entries with [`AceFlags::NO_PROPAGATE_INHERIT`] lose all inheritance
///   flags and apply to the child only;
/// - otherwise entries with `DIRECTORY_INHERIT` apply to the child and keep
///   propagating;
/// - the remaining (file-only) entries become
///   [`AceFlags::INHERIT_ONLY`] so they reach files created further down.
///
/// A non-directory child inherits the `FILE_INHERIT` entries with all
/// inheritance flags and [`AccessMask::DELETE_CHILD`] removed.
///
/// When `parent` is [`AclFlags::AUTO_INHERIT`], the result is too and every
/// entry is marked [`AceFlags::INHERITED`]. Returns `Ok(None)` when no entry
/// is inherited.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "trace", skip(parent), fields(entries = parent.len()))
)]
pub fn inherit(parent: &RichAcl, is_dir: bool) -> Result<Option<RichAcl>, AclError> {
    let selected = |ace: &&RichAce| {
        if is_dir {
            ace.is_inheritable()
        } else {
            ace.flags().contains(AceFlags::FILE_INHERIT)
        }
    };

    let count = parent.iter().filter(selected).count();
    if count == 0 {
        debug_acl::trace_inherit(is_dir, 0);
        return Ok(None);
    }

    let mut acl = RichAcl::with_capacity(count)?;
    for parent_ace in parent.iter().filter(selected) {
        let mut ace = *parent_ace;
        if !is_dir {
            ace.remove_flags(AceFlags::INHERITANCE);
            ace.remove_mask(AccessMask::DELETE_CHILD);
        } else if parent_ace.flags().contains(AceFlags::NO_PROPAGATE_INHERIT) {
            ace.remove_flags(AceFlags::INHERITANCE);
        } else if parent_ace.flags().contains(AceFlags::DIRECTORY_INHERIT) {
            ace.remove_flags(AceFlags::INHERIT_ONLY);
        } else {
            ace.insert_flags(AceFlags::INHERIT_ONLY);
        }
        acl.push(ace)?;
    }

    if parent.is_auto_inherit() {
        acl.set_flags(AclFlags::AUTO_INHERIT);
        for ace in acl.entries_mut() {
            ace.insert_flags(AceFlags::INHERITED);
        }
    }

    debug_acl::trace_inherit(is_dir, acl.len());
    Ok(Some(acl))
}

/// Mode and ACL of a newly created file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Created {
    /// Mode the file is created with.
    pub mode: Mode,
    /// ACL to store, or `None` when the mode says everything.
    pub acl: Option<RichAcl>,
}

/// Decides the mode and ACL of a new file created with `mode` in a directory
/// whose ACL is `parent`.
///
/// Without an inherited ACL the umask applies. An inherited ACL that a mode
/// can express is folded into the mode instead of being stored. Otherwise the
/// inherited ACL is masked so that it grants nothing beyond `mode`; the umask
/// is ignored in that case.
pub fn create(mode: Mode, parent: Option<&RichAcl>, umask: u32) -> Result<Created, AclError> {
    if mode.is_symlink() {
        return Ok(Created { mode, acl: None });
    }

    let inherited = match parent {
        Some(parent) => inherit(parent, mode.is_dir())?,
        None => None,
    };
    let Some(inherited) = inherited else {
        return Ok(Created {
            mode: mode.without(umask),
            acl: None,
        });
    };

    if let Some(equiv) = equiv_mode(&inherited, mode) {
        return Ok(Created {
            mode: Mode::new(mode.bits() & equiv.bits()),
            acl: None,
        });
    }

    let mut acl = compute_max_masks(&inherited)?;
    acl.set_flags(acl.flags() | AclFlags::MASKED);
    let perm = mode.permissions();
    acl.set_masks(
        acl.owner_mask() & mode_to_mask(perm >> 6),
        acl.group_mask() & mode_to_mask(perm >> 3),
        acl.other_mask() & mode_to_mask(perm),
    );
    Ok(Created {
        mode,
        acl: Some(acl),
    })
}
