#![forbid(unsafe_code)]

//! The wrap factory and its runtime handle.
//!
//! # Design
//!
//! [`Reactivity`] owns the identity registry, the dependency slot map, the
//! observer tracker, and the four trap bundles (base/collection ×
//! mutable/read-only). Cloning the handle shares the same interior. The
//! bundles hold a weak back-reference to the interior so they can track,
//! trigger, and lazily wrap nested reads without keeping the runtime alive.
//!
//! The wrap procedure registers the raw↔wrapper pair *before* creating the
//! dependency table, so any re-entrant wrap request for the same object
//! hits the registry fast path and returns the identical wrapper.
//!
//! # Invariants
//!
//! 1. Wrapping the same raw object twice with the same kind returns the
//!    identical wrapper.
//! 2. Wrapping a wrapper (either kind, either entry point) is a no-op.
//! 3. A read-only wrapper fed to `to_mutable` comes back unchanged:
//!    read-only is sticky through the mutable entry point. The reverse
//!    direction is *not* sticky: `to_readonly` of a mutable wrapper
//!    unwraps it and wraps the raw object read-only. The asymmetry is
//!    intentional.
//! 4. Primitives and non-observable values pass through unchanged.
//!
//! # Failure Modes
//!
//! - **Wrapping a primitive**: documented no-op; logs a warning in debug
//!   builds, silent in release.
//! - **Duplicate registration**: panics; it would mean the fast-path
//!   checks are broken and duplicate wrappers could coexist.

use std::rc::Rc;

use loupe_value::{EntryTraps, Obj, ObjFlags, PropertyTraps, TrapSet, Value, WrapKind};
use tracing::{trace, warn};

use crate::effect::Effect;
use crate::handlers::base::BasePropertyTraps;
use crate::handlers::collection::CollectionEntryTraps;
use crate::observe::deps::{DepKey, DepMap, DepTable, SubscriberRc, Subscription};
use crate::observe::policy::is_observable;
use crate::observe::registry::IdentityRegistry;
use crate::tracking::Tracker;

pub(crate) struct ReactivityInner {
    pub(crate) registry: IdentityRegistry,
    pub(crate) deps: DepMap,
    pub(crate) tracker: Tracker,
    base_mutable: Rc<dyn PropertyTraps>,
    base_readonly: Rc<dyn PropertyTraps>,
    entries_mutable: Rc<dyn EntryTraps>,
    entries_readonly: Rc<dyn EntryTraps>,
}

/// The observation runtime. Cloning shares the same interior state.
#[derive(Clone)]
pub struct Reactivity {
    pub(crate) shared: Rc<ReactivityInner>,
}

impl Default for Reactivity {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Reactivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactivity")
            .field("registry", &self.shared.registry)
            .field("deps", &self.shared.deps)
            .finish()
    }
}

impl Reactivity {
    #[must_use]
    pub fn new() -> Self {
        let shared = Rc::new_cyclic(|weak| ReactivityInner {
            registry: IdentityRegistry::new(),
            deps: DepMap::new(),
            tracker: Tracker::new(),
            base_mutable: Rc::new(BasePropertyTraps::new(weak.clone(), WrapKind::Mutable)),
            base_readonly: Rc::new(BasePropertyTraps::new(weak.clone(), WrapKind::Readonly)),
            entries_mutable: Rc::new(CollectionEntryTraps::new(weak.clone(), WrapKind::Mutable)),
            entries_readonly: Rc::new(CollectionEntryTraps::new(weak.clone(), WrapKind::Readonly)),
        });
        Reactivity { shared }
    }

    /// Mutable observation wrapper for `value`.
    ///
    /// Primitives and ineligible objects come back unchanged. A read-only
    /// wrapper comes back unchanged (stickiness); an object marked
    /// forced-readonly is redirected to [`to_readonly`](Self::to_readonly).
    pub fn to_mutable(&self, value: Value) -> Value {
        to_mutable(&self.shared, value)
    }

    /// Read-only observation wrapper for `value`.
    ///
    /// A mutable wrapper is unwrapped first: read-only-ness is always
    /// computed from the raw object, never layered over another wrapper.
    pub fn to_readonly(&self, value: Value) -> Value {
        to_readonly(&self.shared, value)
    }

    /// True iff `value` is registered as a wrapper of either kind.
    #[must_use]
    pub fn is_observed(&self, value: &Value) -> bool {
        let Some(obj) = value.as_obj() else {
            return false;
        };
        self.shared
            .registry
            .lookup_raw(obj, WrapKind::Mutable)
            .is_some()
            || self
                .shared
                .registry
                .lookup_raw(obj, WrapKind::Readonly)
                .is_some()
    }

    /// True iff `value` is registered specifically as a read-only wrapper.
    #[must_use]
    pub fn is_readonly_wrapper(&self, value: &Value) -> bool {
        let Some(obj) = value.as_obj() else {
            return false;
        };
        self.shared
            .registry
            .lookup_raw(obj, WrapKind::Readonly)
            .is_some()
    }

    /// The raw object behind a wrapper of either kind; any other value
    /// comes back unchanged.
    pub fn unwrap(&self, value: Value) -> Value {
        unwrap_value(&self.shared, value)
    }

    /// Mark `value` so every future wrap request yields the read-only
    /// variant. Idempotent; returns its input for chaining.
    pub fn mark_forced_readonly(&self, value: Value) -> Value {
        mark(&value, ObjFlags::FORCED_READONLY);
        value
    }

    /// Mark `value` as never eligible for wrapping. Idempotent; returns
    /// its input for chaining.
    pub fn mark_non_observable(&self, value: Value) -> Value {
        mark(&value, ObjFlags::NON_OBSERVABLE);
        value
    }

    /// Read access to the dependency slot table of `value` (resolved to
    /// its raw object first), if one was ever created.
    #[must_use]
    pub fn deps_of(&self, value: &Value) -> Option<Rc<DepTable>> {
        let obj = resolve_raw(&self.shared, value)?;
        self.shared.deps.lookup(&obj)
    }

    /// Attach a subscriber to one object+key slot. The target may be a
    /// wrapper or the raw object. Dropping the returned guard detaches.
    pub fn subscribe(
        &self,
        target: &Value,
        key: DepKey,
        callback: impl Fn(&crate::tracking::Change) + 'static,
    ) -> Subscription {
        let Some(obj) = resolve_raw(&self.shared, target) else {
            if cfg!(debug_assertions) {
                warn!(kind = target.kind_str(), "subscribe target is not composite");
            }
            return Subscription::inert();
        };
        let strong: SubscriberRc = Rc::new(callback);
        self.shared
            .deps
            .ensure(&obj)
            .slot(&key)
            .attach(Rc::downgrade(&strong));
        Subscription::holding(strong)
    }

    /// Run `body` now and re-run it whenever any value it read changes.
    pub fn effect(&self, body: impl Fn() + 'static) -> Effect {
        Effect::new(self, body)
    }
}

/// Resolve a value to the raw object it denotes: wrappers resolve to their
/// registered raw object, raw objects to themselves, primitives to `None`.
fn resolve_raw(shared: &Rc<ReactivityInner>, value: &Value) -> Option<Obj> {
    let obj = value.as_obj()?;
    Some(
        shared
            .registry
            .lookup_raw(obj, WrapKind::Mutable)
            .or_else(|| shared.registry.lookup_raw(obj, WrapKind::Readonly))
            .unwrap_or_else(|| obj.clone()),
    )
}

pub(crate) fn unwrap_value(shared: &Rc<ReactivityInner>, value: Value) -> Value {
    match value.as_obj().and_then(|obj| {
        shared
            .registry
            .lookup_raw(obj, WrapKind::Mutable)
            .or_else(|| shared.registry.lookup_raw(obj, WrapKind::Readonly))
    }) {
        Some(raw) => Value::Obj(raw),
        None => value,
    }
}

fn mark(value: &Value, flag: ObjFlags) {
    match value.as_obj() {
        Some(obj) => obj.add_flags(flag),
        None => {
            if cfg!(debug_assertions) {
                warn!(kind = value.kind_str(), "marker on a primitive has no effect");
            }
        }
    }
}

/// Wrap `value` with the given view kind, entering through the matching
/// entry point so its redirection rules apply.
pub(crate) fn wrap_as(shared: &Rc<ReactivityInner>, value: Value, kind: WrapKind) -> Value {
    match kind {
        WrapKind::Mutable => to_mutable(shared, value),
        WrapKind::Readonly => to_readonly(shared, value),
    }
}

pub(crate) fn to_mutable(shared: &Rc<ReactivityInner>, value: Value) -> Value {
    if let Some(obj) = value.as_obj() {
        // A read-only view is never downgraded by the mutable entry point.
        if shared.registry.lookup_raw(obj, WrapKind::Readonly).is_some() {
            return value;
        }
        // Out-of-band forced-readonly redirects to the read-only path.
        let raw = shared
            .registry
            .lookup_raw(obj, WrapKind::Mutable)
            .unwrap_or_else(|| obj.clone());
        if raw.has_flag(ObjFlags::FORCED_READONLY) {
            return to_readonly(shared, value);
        }
    }
    create_wrapper(shared, value, WrapKind::Mutable)
}

pub(crate) fn to_readonly(shared: &Rc<ReactivityInner>, value: Value) -> Value {
    if let Some(obj) = value.as_obj() {
        // Redundant with the wrapper no-op rule below; kept so both entry
        // points read symmetrically.
        if shared.registry.lookup_raw(obj, WrapKind::Readonly).is_some() {
            return value;
        }
        // Read-only-ness is computed from the raw object: unwrap first.
        if let Some(raw) = shared.registry.lookup_raw(obj, WrapKind::Mutable) {
            return create_wrapper(shared, Value::Obj(raw), WrapKind::Readonly);
        }
    }
    create_wrapper(shared, value, WrapKind::Readonly)
}

fn create_wrapper(shared: &Rc<ReactivityInner>, value: Value, kind: WrapKind) -> Value {
    // 1. Non-composite values cannot be wrapped; diagnosable caller misuse.
    let Some(raw) = value.as_obj() else {
        if cfg!(debug_assertions) {
            warn!(kind = value.kind_str(), "cannot wrap a primitive; returning it unchanged");
        }
        return value;
    };

    // 2. Identity stability: an existing wrapper is always reused.
    if let Some(existing) = shared.registry.lookup_wrapper(raw, kind) {
        return Value::Obj(existing);
    }

    // 3. Wrapping a wrapper of either kind is a no-op.
    if shared.registry.lookup_raw(raw, WrapKind::Mutable).is_some()
        || shared.registry.lookup_raw(raw, WrapKind::Readonly).is_some()
    {
        return value;
    }

    // 4. Eligibility.
    if !is_observable(&value) {
        return value;
    }

    // 5–6. Bind the trap bundle matching the runtime kind.
    let traps = if raw.kind().is_entry_kind() {
        TrapSet::Entries(match kind {
            WrapKind::Mutable => Rc::clone(&shared.entries_mutable),
            WrapKind::Readonly => Rc::clone(&shared.entries_readonly),
        })
    } else {
        TrapSet::Base(match kind {
            WrapKind::Mutable => Rc::clone(&shared.base_mutable),
            WrapKind::Readonly => Rc::clone(&shared.base_readonly),
        })
    };
    let wrapper = Obj::wrapper(raw.clone(), kind, traps);

    // 7. Register before the slot table exists, so a re-entrant wrap of
    //    this object already hits the fast path above.
    shared.registry.register(raw, &wrapper, kind);

    // 8. The slot table is created empty; the tracking layer populates it.
    shared.deps.ensure(raw);

    trace!(obj = %raw.id(), wrapper = %wrapper.id(), kind = ?kind, "wrapper created");
    Value::Obj(wrapper)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
