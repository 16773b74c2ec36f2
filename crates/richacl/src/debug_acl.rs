//! Tracing for ACL evaluation, mask computation and codec operations.
//!
//! All tracing is conditionally compiled behind the `tracing` feature flag
//! and produces no-op inline functions when disabled. Events are emitted
//! under the `richacl::acl` target, so `RICHACL_LOG=richacl::acl=trace`
//! selects them.
//!
//! # Examples
//!
//! ```rust,ignore
//! use richacl::debug_acl::{AclTracer, trace_permission};
//!
//! let mut tracer = AclTracer::new();
//! tracer.record_decision(true);
//! tracer.record_decision(false);
//! tracer.summary();
//! ```

use crate::ace::AccessMask;
use crate::acl::RichAcl;
use crate::error::DecodeError;
use crate::permission::FileClass;

/// Target name for tracing events.
#[cfg(feature = "tracing")]
const ACL_TARGET: &str = "richacl::acl";

// ============================================================================
// Tracing functions (feature-gated)
// ============================================================================

/// Traces the group-class bound computed before the mask scan restarts.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_gmask_restart(group_class_allowed: AccessMask) {
    tracing::trace!(
        target: ACL_TARGET,
        group_class_allowed = ?group_class_allowed,
        "gmask_restart"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_gmask_restart(_group_class_allowed: AccessMask) {}

/// Traces the result of a class mask computation.
///
/// # Arguments
///
/// * `owner`, `group`, `other` - The computed class masks
/// * `restarted` - Whether a deny entry forced a second scan
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_max_masks(owner: AccessMask, group: AccessMask, other: AccessMask, restarted: bool) {
    tracing::debug!(
        target: ACL_TARGET,
        owner = ?owner,
        group = ?group,
        other = ?other,
        restarted = restarted,
        "max_masks"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_max_masks(_owner: AccessMask, _group: AccessMask, _other: AccessMask, _restarted: bool) {}

/// Traces the outcome of a permission evaluation.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_permission(requested: AccessMask, denied: AccessMask, class: FileClass) {
    tracing::trace!(
        target: ACL_TARGET,
        requested = ?requested,
        denied = ?denied,
        class = ?class,
        granted = denied.is_empty(),
        "permission"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_permission(_requested: AccessMask, _denied: AccessMask, _class: FileClass) {}

/// Traces a chmod applied to an ACL.
///
/// # Arguments
///
/// * `mode` - The raw mode applied
/// * `changed` - Whether a new ACL had to be built
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_chmod(mode: u32, changed: bool) {
    tracing::debug!(
        target: ACL_TARGET,
        mode = format_args!("{mode:o}"),
        changed = changed,
        "chmod"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_chmod(_mode: u32, _changed: bool) {}

/// Traces inheritance from a parent directory ACL.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_inherit(is_dir: bool, inherited: usize) {
    tracing::debug!(
        target: ACL_TARGET,
        is_dir = is_dir,
        inherited = inherited,
        "inherit"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_inherit(_is_dir: bool, _inherited: usize) {}

/// Traces a successfully decoded xattr value.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_decoded(acl: &RichAcl) {
    tracing::trace!(
        target: ACL_TARGET,
        entries = acl.len(),
        flags = ?acl.flags(),
        "xattr_decoded"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_decoded(_acl: &RichAcl) {}

/// Traces an xattr value rejected by the decoder.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_decode_rejected(len: usize, reason: &DecodeError) {
    tracing::debug!(
        target: ACL_TARGET,
        len = len,
        reason = %reason,
        "xattr_rejected"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_decode_rejected(_len: usize, _reason: &DecodeError) {}

/// Traces the decision to store an ACL or fold it into the file mode.
///
/// # Arguments
///
/// * `mode` - The resulting raw mode
/// * `stored` - Whether the ACL is kept alongside the mode
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_set_acl(mode: u32, stored: bool) {
    tracing::debug!(
        target: ACL_TARGET,
        mode = format_args!("{mode:o}"),
        stored = stored,
        "set_acl"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_set_acl(_mode: u32, _stored: bool) {}

/// Traces summary statistics for a batch of permission checks.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_decision_summary(total: usize, granted: usize, denied: usize) {
    tracing::info!(
        target: ACL_TARGET,
        total = total,
        granted = granted,
        denied = denied,
        "decision_summary"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_decision_summary(_total: usize, _granted: usize, _denied: usize) {}

// ============================================================================
// AclTracer - stateful tracer for aggregating decisions
// ============================================================================

/// Aggregates permission decisions across several checks.
///
/// # Examples
///
/// ```
/// # use richacl::debug_acl::AclTracer;
/// let mut tracer = AclTracer::new();
/// tracer.record_decision(true);
/// tracer.record_decision(false);
/// tracer.record_decision(true);
///
/// tracer.summary();
/// assert_eq!(tracer.total(), 3);
/// assert_eq!(tracer.granted(), 2);
/// assert_eq!(tracer.denied(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AclTracer {
    granted: usize,
    denied: usize,
}

impl AclTracer {
    /// Creates a tracer with zero counts.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            granted: 0,
            denied: 0,
        }
    }

    /// Records one decision.
    pub fn record_decision(&mut self, granted: bool) {
        if granted {
            self.granted += 1;
        } else {
            self.denied += 1;
        }
    }

    /// Emits a summary trace event with the accumulated counts.
    pub fn summary(&self) {
        trace_decision_summary(self.total(), self.granted, self.denied);
    }

    /// Number of decisions recorded.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.granted + self.denied
    }

    /// Number of granted decisions.
    #[must_use]
    pub const fn granted(&self) -> usize {
        self.granted
    }

    /// Number of denied decisions.
    #[must_use]
    pub const fn denied(&self) -> usize {
        self.denied
    }
}

// ============================================================================
// Tests
// ============================================================================
