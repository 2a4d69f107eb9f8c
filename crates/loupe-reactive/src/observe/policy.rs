#![forbid(unsafe_code)]

//! Wrapping eligibility.
//!
//! A pure predicate with no side effects. The rules, in order:
//!
//! 1. Primitives are never observable.
//! 2. Host-framework infrastructure objects (`INTERNAL`) are never
//!    observable, so the observation layer cannot wrap its own plumbing.
//! 3. The runtime kind must be on the whitelist: record, sequence, set,
//!    weak set, map, weak map. Functions, opaque handles, and wrappers
//!    are excluded.
//! 4. Objects marked `NON_OBSERVABLE` are excluded regardless of kind.

use loupe_value::{ObjFlags, ObjKind, Value};

/// True iff `value` is eligible for wrapping.
#[must_use]
pub fn is_observable(value: &Value) -> bool {
    let Some(obj) = value.as_obj() else {
        return false;
    };
    if obj.has_flag(ObjFlags::INTERNAL) {
        return false;
    }
    if !matches!(
        obj.kind(),
        ObjKind::Record
            | ObjKind::Sequence
            | ObjKind::Set
            | ObjKind::WeakSet
            | ObjKind::Map
            | ObjKind::WeakMap
    ) {
        return false;
    }
    !obj.has_flag(ObjFlags::NON_OBSERVABLE)
}
