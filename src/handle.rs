// ── Owned OS handles ──────────────────────────────────────────────────────────
//
// `SafeHandle<P>` owns exactly one raw handle value and closes it through the
// release policy `P` exactly once.  Some handle types have two distinct
// "no object" values (null, and a sentinel such as `INVALID_HANDLE_VALUE`);
// the policy names both, and neither is ever closed.

use std::{fmt, marker::PhantomData, mem};

/// How to close one kind of raw handle.
///
/// Implementors are stateless marker types.
pub trait ReleasePolicy {
    /// The raw handle representation.
    type Raw: Copy + PartialEq + fmt::Debug;

    /// The "absent" value; a `SafeHandle` holding it owns nothing.
    const NULL: Self::Raw;

    /// A second non-owning value distinct from `NULL`, if the handle type has
    /// one.
    fn is_sentinel(_raw: Self::Raw) -> bool {
        false
    }

    /// Close a handle that is neither `NULL` nor a sentinel.
    fn close(raw: Self::Raw);
}

/// Single-owner wrapper around a raw handle.
///
/// Not `Clone`.  A Rust move transfers ownership; [`SafeHandle::take`] moves
/// out of a place that must stay usable and leaves `NULL` behind.
pub struct SafeHandle<P: ReleasePolicy> {
    raw: P::Raw,
    _policy: PhantomData<fn() -> P>,
}

impl<P: ReleasePolicy> SafeHandle<P> {
    /// Take ownership of `raw`.
    pub fn new(raw: P::Raw) -> Self {
        Self {
            raw,
            _policy: PhantomData,
        }
    }

    /// A handle that owns nothing.
    pub fn null() -> Self {
        Self::new(P::NULL)
    }

    /// The raw value, still owned by `self`.
    pub fn get(&self) -> P::Raw {
        self.raw
    }

    /// `true` unless the value is `NULL` or a sentinel.
    pub fn is_owned(&self) -> bool {
        self.raw != P::NULL && !P::is_sentinel(self.raw)
    }

    /// Relinquish ownership without closing; the caller becomes responsible
    /// for the returned value.
    pub fn into_raw(mut self) -> P::Raw {
        mem::replace(&mut self.raw, P::NULL)
    }

    /// Move ownership out, leaving this handle `NULL`.
    pub fn take(&mut self) -> Self {
        Self::new(mem::replace(&mut self.raw, P::NULL))
    }

    /// Close the current value (if owned) and adopt `raw`.
    pub fn reset(&mut self, raw: P::Raw) {
        let previous = mem::replace(&mut self.raw, raw);
        drop(Self::new(previous));
    }
}

impl<P: ReleasePolicy> Default for SafeHandle<P> {
    fn default() -> Self {
        Self::null()
    }
}

impl<P: ReleasePolicy> Drop for SafeHandle<P> {
    fn drop(&mut self) {
        if self.is_owned() {
            P::close(self.raw);
            self.raw = P::NULL;
        }
    }
}

impl<P: ReleasePolicy> fmt::Debug for SafeHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SafeHandle").field(&self.raw).finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
