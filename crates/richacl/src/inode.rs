//! crates/richacl/src/inode.rs
//!
//! Glue between the engine and a file system object.
//!
//! A file exposes its owner, group and mode through [`FileContext`]; the
//! calling process exposes its identity through [`Environment`]. The file's
//! ACL lives in an [`AclHandle`], an immutable snapshot that readers clone
//! cheaply and writers replace in one step, so no reader ever sees a
//! partially built ACL.

use std::sync::{Arc, RwLock};

use crate::acl::RichAcl;
use crate::debug_acl;
use crate::error::AclError;
use crate::identity::{Gid, IdMapper, Uid};
use crate::inherit::{Created, create};
use crate::mode::{Mode, chmod, equiv_mode, masks_to_mode};
use crate::permission::{AccessIntent, Credentials, Decision, check_permission};
use crate::xattr;

/// Attributes of a file the engine needs.
pub trait FileContext {
    /// Owning user.
    fn owner(&self) -> Uid;
    /// Owning group.
    fn group(&self) -> Gid;
    /// File type and permission bits.
    fn mode(&self) -> Mode;
    /// The file is a directory.
    fn is_dir(&self) -> bool {
        self.mode().is_dir()
    }
}

/// The calling process.
pub trait Environment {
    /// Credentials the caller acts with.
    fn current_identity(&self) -> Credentials;
    /// Namespace raw ids supplied by or returned to the caller belong to.
    fn id_mapper(&self) -> &dyn IdMapper;
    /// The caller may override file ownership checks (`CAP_FOWNER`).
    fn can_override_owner(&self) -> bool {
        false
    }
}

/// Shared, atomically replaceable ACL of one file.
#[derive(Debug, Default)]
pub struct AclHandle {
    acl: RwLock<Option<Arc<RichAcl>>>,
}

impl AclHandle {
    /// Creates a handle holding `acl`.
    #[must_use]
    pub fn new(acl: Option<RichAcl>) -> Self {
        Self {
            acl: RwLock::new(acl.map(Arc::new)),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn get(&self) -> Option<Arc<RichAcl>> {
        self.acl
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Installs `acl` and returns the previous snapshot.
    pub fn replace(&self, acl: Option<RichAcl>) -> Option<Arc<RichAcl>> {
        let next = acl.map(Arc::new);
        let mut slot = self.acl.write().unwrap_or_else(|poison| poison.into_inner());
        std::mem::replace(&mut *slot, next)
    }
}

/// Checks whether `creds` may perform `intent` on `file`.
///
/// Files without an ACL are checked against the ACL equivalent to their mode,
/// which gives the classic owner/group/other semantics.
///
/// # Errors
///
/// Returns [`AclError::Unsupported`] for symbolic links.
pub fn permission(
    file: &dyn FileContext,
    acl: Option<&RichAcl>,
    creds: &Credentials,
    intent: AccessIntent,
) -> Result<Decision, AclError> {
    let mode = file.mode();
    if mode.is_symlink() {
        return Err(AclError::Unsupported("symbolic links do not carry ACLs"));
    }
    let requester = creds.for_file(file.owner(), file.group());
    match acl {
        Some(acl) => Ok(check_permission(acl, &requester, intent)),
        None => {
            let acl = RichAcl::from_mode(mode)?;
            Ok(check_permission(&acl, &requester, intent))
        }
    }
}

/// Checks whether the caller may replace the ACL of `file`.
///
/// The owner always may; anybody else needs `WRITE_ACL` or the ability to
/// override ownership checks.
///
/// # Errors
///
/// Returns [`AclError::PermissionDenied`] when none of the above applies.
pub fn may_set_acl(
    file: &dyn FileContext,
    acl: Option<&RichAcl>,
    env: &dyn Environment,
) -> Result<(), AclError> {
    let creds = env.current_identity();
    if creds.uid() == file.owner()
        || permission(file, acl, &creds, AccessIntent::CHMOD)?.is_granted()
        || env.can_override_owner()
    {
        return Ok(());
    }
    Err(AclError::PermissionDenied(
        "only the owner or a holder of WRITE_ACL may change the ACL",
    ))
}

/// Stores `acl` on `file` and returns the file's new mode.
///
/// An ACL that a mode can express is dropped and folded into the returned
/// mode. Otherwise the ACL is kept and the permission bits of the mode are
/// derived from its class masks. Passing `None` removes the ACL and leaves the
/// mode alone.
pub fn set_acl(
    file: &dyn FileContext,
    handle: &AclHandle,
    acl: Option<RichAcl>,
) -> Result<Mode, AclError> {
    let mode = file.mode();
    if mode.is_symlink() {
        return Err(AclError::Unsupported("symbolic links do not carry ACLs"));
    }
    let Some(acl) = acl else {
        handle.replace(None);
        return Ok(mode);
    };

    if let Some(equiv) = equiv_mode(&acl, mode) {
        handle.replace(None);
        debug_acl::trace_set_acl(equiv.bits(), false);
        return Ok(equiv);
    }

    let mode = mode.with_permissions(masks_to_mode(&acl));
    handle.replace(Some(acl));
    debug_acl::trace_set_acl(mode.bits(), true);
    Ok(mode)
}

/// Applies a mode change to the ACL of a file, if it has one.
pub fn chmod_acl(handle: &AclHandle, mode: Mode) -> Result<(), AclError> {
    let Some(current) = handle.get() else {
        return Ok(());
    };
    let updated = chmod(&current, mode)?;
    if let std::borrow::Cow::Owned(acl) = updated {
        handle.replace(Some(acl));
    }
    Ok(())
}

/// Computes the mode and ACL of a new file created with `mode` in directory
/// `dir`.
///
/// When an inherited ACL is kept, the permission bits of the returned mode
/// are those implied by its class masks, as [`set_acl`] would store them.
pub fn init_acl(dir: &AclHandle, mode: Mode, umask: u32) -> Result<Created, AclError> {
    let parent = dir.get();
    let Created { mode, acl } = create(mode, parent.as_deref(), umask)?;
    let Some(acl) = acl else {
        return Ok(Created { mode, acl: None });
    };

    if let Some(equiv) = equiv_mode(&acl, mode) {
        debug_acl::trace_set_acl(equiv.bits(), false);
        return Ok(Created {
            mode: equiv,
            acl: None,
        });
    }

    let mode = mode.with_permissions(masks_to_mode(&acl));
    debug_acl::trace_set_acl(mode.bits(), true);
    Ok(Created {
        mode,
        acl: Some(acl),
    })
}

/// Returns the xattr value of the file's ACL in the caller's namespace, or
/// `None` when the file has no ACL.
pub fn get_xattr(
    file: &dyn FileContext,
    handle: &AclHandle,
    env: &dyn Environment,
) -> Result<Option<Vec<u8>>, AclError> {
    if file.mode().is_symlink() {
        return Err(AclError::Unsupported("symbolic links do not carry ACLs"));
    }
    handle
        .get()
        .map(|acl| xattr::encode(&acl, env.id_mapper()))
        .transpose()
}

/// Replaces the file's ACL from an xattr value supplied by the caller and
/// returns the file's new mode. `None` removes the ACL.
pub fn set_xattr(
    file: &dyn FileContext,
    handle: &AclHandle,
    env: &dyn Environment,
    value: Option<&[u8]>,
) -> Result<Mode, AclError> {
    may_set_acl(file, handle.get().as_deref(), env)?;
    let acl = value
        .map(|bytes| xattr::decode(bytes, env.id_mapper()))
        .transpose()?;
    set_acl(file, handle, acl)
}
