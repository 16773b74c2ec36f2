//! crates/richacl/src/masks.rs
//!
//! Upper-bound owner, group and other class masks.
//!
//! The masks are computed without knowing who the owner is or which groups a
//! requester belongs to, so every entry is assumed to possibly match the owner.
//! That way the owner can change without invalidating the masks or the mode
//! bits derived from them.

use crate::ace::{AccessMask, AceType, RichAce, Who};
use crate::acl::{AclFlags, RichAcl};
use crate::debug_acl;
use crate::error::AclError;

/// Owner, group and other class masks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClassMasks {
    /// Maximum permissions of the file owner.
    pub owner: AccessMask,
    /// Maximum permissions of the group class.
    pub group: AccessMask,
    /// Maximum permissions of everybody else.
    pub other: AccessMask,
}

impl ClassMasks {
    /// Reads the class masks stored in `acl`.
    #[must_use]
    pub const fn of(acl: &RichAcl) -> Self {
        Self {
            owner: acl.owner_mask(),
            group: acl.group_mask(),
            other: acl.other_mask(),
        }
    }
}

/// Returns a copy of `acl` carrying its upper-bound class masks.
///
/// [`AclFlags::MASKED`] and [`AclFlags::WRITE_THROUGH`] are cleared on the
/// result; callers re-assert them once they decide to enforce the masks.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "trace", skip(acl), fields(entries = acl.len()))
)]
pub fn compute_max_masks(acl: &RichAcl) -> Result<RichAcl, AclError> {
    let masks = max_masks(acl);
    let mut result = acl.try_clone()?;
    result.set_masks(masks.owner, masks.group, masks.other);
    result.set_flags(
        acl.flags()
            .difference(AclFlags::MASKED | AclFlags::WRITE_THROUGH),
    );
    Ok(result)
}

/// Computes the upper-bound class masks of `acl` without allocating.
///
/// Entries are processed from last to first. `gmask`, the set of permissions
/// the group class can ever be granted, starts unconstrained; the first deny
/// entry for group@ or a named identifier computes it and restarts the scan.
/// This keeps everyone@ allow entries from raising the group mask above what
/// other entries always deny the group class, e.g. for
///
/// ```text
/// group@:w::deny
/// everyone@:rw::allow
/// ```
///
/// which would otherwise yield a group mask of `rw`.
#[must_use]
pub fn max_masks(acl: &RichAcl) -> ClassMasks {
    let mut gmask: Option<AccessMask> = None;

    'restart: loop {
        let bound = gmask.unwrap_or(AccessMask::all());
        let mut masks = ClassMasks::default();

        for ace in acl.iter().rev() {
            if ace.is_inherit_only() {
                continue;
            }
            let mask = ace.mask();
            match (ace.who(), ace.kind()) {
                (Who::Owner, AceType::Allow) => masks.owner |= mask,
                (Who::Owner, AceType::Deny) => masks.owner.remove(mask),
                (Who::Everyone, AceType::Allow) => {
                    masks.owner |= mask;
                    masks.group |= mask & bound;
                    masks.other |= mask;
                }
                (Who::Everyone, AceType::Deny) => {
                    masks.owner.remove(mask);
                    masks.group.remove(mask);
                    masks.other.remove(mask);
                }
                (_, AceType::Allow) => {
                    masks.owner |= mask & bound;
                    masks.group |= mask & bound;
                }
                (_, AceType::Deny) => {
                    if gmask.is_none() {
                        let allowed = group_class_allowed(acl);
                        debug_acl::trace_gmask_restart(allowed);
                        gmask = Some(allowed);
                        continue 'restart;
                    }
                }
            }
        }

        debug_acl::trace_max_masks(masks.owner, masks.group, masks.other, gmask.is_some());
        return masks;
    }
}

/// Permissions `who` is granted, taking everyone@ entries into account.
fn allowed_to_who(acl: &RichAcl, who: &RichAce) -> AccessMask {
    let mut allowed = AccessMask::empty();
    for ace in acl.iter().rev() {
        if ace.is_inherit_only() {
            continue;
        }
        if ace.is_same_identifier(who) || ace.is_everyone() {
            match ace.kind() {
                AceType::Allow => allowed |= ace.mask(),
                AceType::Deny => allowed.remove(ace.mask()),
            }
        }
    }
    allowed
}

/// Maximum permissions any member of the group class can be granted.
pub(crate) fn group_class_allowed(acl: &RichAcl) -> AccessMask {
    let mut everyone_allowed = AccessMask::empty();
    let mut group_class_allowed = AccessMask::empty();
    let mut had_group_ace = false;

    for ace in acl.iter().rev() {
        if ace.is_inherit_only() || ace.is_owner() {
            continue;
        }
        if ace.is_everyone() {
            match ace.kind() {
                AceType::Allow => everyone_allowed |= ace.mask(),
                AceType::Deny => everyone_allowed.remove(ace.mask()),
            }
        } else {
            group_class_allowed |= allowed_to_who(acl, ace);
            had_group_ace |= ace.is_group();
        }
    }

    // Without group@ entries, everyone@ permissions also reach the owning group.
    if !had_group_ace {
        group_class_allowed |= everyone_allowed;
    }
    group_class_allowed
}
