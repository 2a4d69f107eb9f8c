#![forbid(unsafe_code)]

//! Per-object, per-key dependency slots.
//!
//! # Design
//!
//! [`DepMap`] associates a raw object (weakly, by id) with a lazily created
//! [`DepTable`]; the table maps a [`DepKey`] to a [`SubscriberSet`] of weak
//! callbacks. The wrap procedure creates the table (empty) on first wrap;
//! the tracking layer attaches and notifies subscribers. This module never
//! runs a callback itself.
//!
//! Subscribers are stored as weak references to `Rc<dyn Fn(&Change)>`
//! handles; a [`Subscription`] guard owns the strong handle, so dropping
//! the guard unsubscribes (the callback may linger in the list until the
//! next notification cycle prunes it).
//!
//! # Invariants
//!
//! 1. `ensure` is idempotent: one table per raw object, ever.
//! 2. Subscribers are collected in registration order.
//! 3. Attaching the same handle to one slot twice is a no-op.
//! 4. Dead subscribers are pruned lazily during collection; dead tables are
//!    swept when the map grows past its watermark.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use loupe_value::{EntryKey, Obj, ObjId, PropKey, WeakObj};

use crate::tracking::Change;

/// Subscriber callback, stored strong in a [`Subscription`] guard and weak
/// in the slot it is attached to.
pub type SubscriberRc = Rc<dyn Fn(&Change)>;
pub type SubscriberWeak = Weak<dyn Fn(&Change)>;

/// Which aspect of an object a subscriber depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// One property of a record or sequence.
    Prop(PropKey),
    /// One entry of a set or map.
    Entry(EntryKey),
    /// Sequence length.
    Len,
    /// Structural iteration: key sets, entry sets, collection size.
    Iterate,
}

impl DepKey {
    /// Property slot for a named record key.
    pub fn prop(name: &str) -> Self {
        DepKey::Prop(PropKey::name(name))
    }

    /// Property slot for a sequence index.
    pub fn index(index: usize) -> Self {
        DepKey::Prop(PropKey::Index(index))
    }
}

/// Ordered set of weak subscriber handles for one slot.
pub struct SubscriberSet {
    subscribers: RefCell<Vec<SubscriberWeak>>,
}

impl SubscriberSet {
    fn new() -> Self {
        SubscriberSet {
            subscribers: RefCell::new(Vec::new()),
        }
    }

    /// Attach a handle. Re-attaching the same handle is a no-op, so one
    /// observer reading one slot many times is notified once.
    pub fn attach(&self, weak: SubscriberWeak) {
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.iter().any(|existing| existing.ptr_eq(&weak)) {
            return;
        }
        subscribers.push(weak);
    }

    /// Collect live handles in registration order, pruning dead ones.
    pub fn live(&self) -> Vec<SubscriberRc> {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|weak| weak.strong_count() > 0);
        subscribers.iter().filter_map(Weak::upgrade).collect()
    }

    /// Number of handles currently in the slot, including dead ones not
    /// yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }
}

impl std::fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("len", &self.len())
            .finish()
    }
}

/// Per-object slot table: `DepKey` → subscriber set, created on demand.
pub struct DepTable {
    slots: RefCell<HashMap<DepKey, Rc<SubscriberSet>>>,
}

impl DepTable {
    fn new() -> Self {
        DepTable {
            slots: RefCell::new(HashMap::new()),
        }
    }

    /// The slot for `key`, created empty if absent.
    pub fn slot(&self, key: &DepKey) -> Rc<SubscriberSet> {
        let mut slots = self.slots.borrow_mut();
        if let Some(existing) = slots.get(key) {
            return Rc::clone(existing);
        }
        let fresh = Rc::new(SubscriberSet::new());
        slots.insert(key.clone(), Rc::clone(&fresh));
        fresh
    }

    /// The slot for `key` if it exists, without creating it.
    #[must_use]
    pub fn peek(&self, key: &DepKey) -> Option<Rc<SubscriberSet>> {
        self.slots.borrow().get(key).map(Rc::clone)
    }

    /// Number of distinct keys with a slot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}

impl std::fmt::Debug for DepTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepTable").field("slots", &self.len()).finish()
    }
}

struct DepAnchor {
    /// Liveness anchor; the table dies with its raw object.
    anchor: WeakObj,
    table: Rc<DepTable>,
}

/// Weak association from raw object to its slot table.
pub struct DepMap {
    tables: RefCell<HashMap<ObjId, DepAnchor>>,
    high_water: Cell<usize>,
}

impl Default for DepMap {
    fn default() -> Self {
        Self::new()
    }
}

impl DepMap {
    #[must_use]
    pub fn new() -> Self {
        DepMap {
            tables: RefCell::new(HashMap::new()),
            high_water: Cell::new(16),
        }
    }

    /// The slot table for `raw`, created empty on first call.
    pub fn ensure(&self, raw: &Obj) -> Rc<DepTable> {
        self.maybe_sweep();
        let mut tables = self.tables.borrow_mut();
        let entry = tables.entry(raw.id()).or_insert_with(|| DepAnchor {
            anchor: raw.downgrade(),
            table: Rc::new(DepTable::new()),
        });
        Rc::clone(&entry.table)
    }

    /// The slot table for `raw`, if one was ever created.
    #[must_use]
    pub fn lookup(&self, raw: &Obj) -> Option<Rc<DepTable>> {
        self.tables
            .borrow()
            .get(&raw.id())
            .map(|entry| Rc::clone(&entry.table))
    }

    fn maybe_sweep(&self) {
        let mut tables = self.tables.borrow_mut();
        if tables.len() < self.high_water.get() {
            return;
        }
        tables.retain(|_, entry| entry.anchor.is_alive());
        self.high_water.set(tables.len() * 2 + 16);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.borrow().is_empty()
    }
}

impl std::fmt::Debug for DepMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepMap").field("tables", &self.len()).finish()
    }
}

/// RAII guard for an attached subscriber.
///
/// Dropping the guard drops the strong callback handle; every slot the
/// callback was attached to loses its referent and prunes it on the next
/// notification cycle.
pub struct Subscription {
    /// Type-erased strong reference keeping the callback `Rc` alive.
    _guard: Box<dyn std::any::Any>,
}

impl Subscription {
    pub(crate) fn holding(strong: SubscriberRc) -> Self {
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// A guard attached to nothing; dropping it is a no-op.
    pub(crate) fn inert() -> Self {
        Subscription {
            _guard: Box::new(()),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
