#![forbid(unsafe_code)]

//! Dependency tracking: who read what, and who to tell on writes.
//!
//! # Design
//!
//! The trap bundles call [`Tracker::track`] on reads and
//! [`Tracker::trigger`] on writes. `track` attaches the currently active
//! observer (if any) to the object+key slot being read; `trigger` collects
//! the live subscribers of every affected slot and invokes them, in
//! registration order, after all interior borrows are released, so a
//! callback may freely subscribe, track, or mutate other objects.
//!
//! # Invariants
//!
//! 1. `track` with no active observer is a no-op.
//! 2. A subscriber notified through several affected slots of one mutation
//!    is invoked once.
//! 3. Notification order is registration order within a slot; slots are
//!    visited in the order the trap named them.
//!
//! # Failure Modes
//!
//! - **Mutating the notified object from its own callback**: allowed; the
//!   write happens after the original borrow is released. The resulting
//!   nested notification runs synchronously inside the outer one.
//! - **Callback panics**: the observer stack unwinds via RAII; remaining
//!   subscribers of the current notification are skipped.

use std::cell::RefCell;
use std::rc::Rc;

use loupe_value::{Obj, Value};

use crate::observe::deps::{DepKey, DepMap, SubscriberRc};

/// What happened to an object, delivered to every affected subscriber.
#[derive(Debug, Clone)]
pub struct Change {
    /// The raw object that changed (never the wrapper).
    pub target: Obj,
    /// The primary slot the mutation addressed.
    pub key: DepKey,
    pub op: ChangeOp,
    /// The newly stored value; `Null` for removals and clears.
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    /// An existing slot was overwritten.
    Set,
    /// A key or entry was added.
    Add,
    /// A key or entry was removed.
    Remove,
    /// A collection was emptied.
    Clear,
}

#[cfg(test)]
impl Change {
    pub(crate) fn test_stub() -> Self {
        Change {
            target: Obj::record(),
            key: DepKey::Iterate,
            op: ChangeOp::Set,
            value: Value::Null,
        }
    }
}

/// Observer stack plus the track/trigger pair.
pub(crate) struct Tracker {
    observers: RefCell<Vec<SubscriberRc>>,
}

impl Tracker {
    pub(crate) fn new() -> Self {
        Tracker {
            observers: RefCell::new(Vec::new()),
        }
    }

    /// Install `observer` as the active observer until the guard drops.
    /// Observers nest; the innermost one receives the tracked reads.
    pub(crate) fn scoped(&self, observer: SubscriberRc) -> ObserverGuard<'_> {
        self.observers.borrow_mut().push(observer);
        ObserverGuard { tracker: self }
    }

    /// Record that the active observer read `key` of `target`.
    pub(crate) fn track(&self, deps: &DepMap, target: &Obj, key: DepKey) {
        let observers = self.observers.borrow();
        let Some(active) = observers.last() else {
            return;
        };
        tracing::trace!(obj = %target.id(), key = ?key, "track");
        deps.ensure(target).slot(&key).attach(Rc::downgrade(active));
    }

    /// Notify every live subscriber attached to any of `keys`, once each.
    pub(crate) fn trigger(&self, deps: &DepMap, change: &Change, keys: &[DepKey]) {
        let Some(table) = deps.lookup(&change.target) else {
            return;
        };
        // Collect first, invoke after every borrow is released.
        let mut pending: Vec<SubscriberRc> = Vec::new();
        for key in keys {
            let Some(slot) = table.peek(key) else {
                continue;
            };
            for subscriber in slot.live() {
                if !pending.iter().any(|seen| Rc::ptr_eq(seen, &subscriber)) {
                    pending.push(subscriber);
                }
            }
        }
        if pending.is_empty() {
            return;
        }
        tracing::trace!(
            obj = %change.target.id(),
            key = ?change.key,
            op = ?change.op,
            subscribers = pending.len(),
            "trigger"
        );
        for subscriber in &pending {
            subscriber(change);
        }
    }
}

/// RAII guard popping the observer stack, panic-safe.
pub(crate) struct ObserverGuard<'a> {
    tracker: &'a Tracker,
}

impl Drop for ObserverGuard<'_> {
    fn drop(&mut self) {
        self.tracker.observers.borrow_mut().pop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
