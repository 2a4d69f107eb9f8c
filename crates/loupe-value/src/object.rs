#![forbid(unsafe_code)]

//! Heap objects with stable identity.
//!
//! # Design
//!
//! An [`Obj`] is a shared handle (`Rc`) to an object cell. Each cell carries
//! a process-unique [`ObjId`] assigned at construction; every identity table
//! in the system keys on that id rather than on addresses, so identity
//! survives allocator reuse. Storage lives behind `RefCell` and is mutated
//! only through the access surface below.
//!
//! Two access surfaces exist:
//!
//! - `raw_*` methods go straight to storage and never involve interception.
//! - The plain methods (`get`, `set`, `entry`, ...) dispatch: on a raw
//!   object they fall through to `raw_*`; on a wrapper they route through
//!   the bound trap bundle.
//!
//! Kind-mismatched calls (a property op on a set, an entry op on a record)
//! are inert no-ops returning `Null`/`false`/empty; there is no error
//! surface on this layer.
//!
//! # Failure Modes
//!
//! - **Re-entrant mutation**: mutating an object from inside an iteration
//!   over the same object panics (RefCell borrow rules). This is
//!   intentional: it indicates a design bug in the caller.
//! - **Dead weak members**: weak collections surface only live members;
//!   dead entries are pruned during size/iteration/clear.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::flags::ObjFlags;
use crate::key::{EntryKey, PropKey};
use crate::traps::{TrapSet, WrapKind};
use crate::value::Value;

/// Stable, process-unique object identity.
///
/// Ids are allocated from a monotonically increasing per-thread counter and
/// are never reused, so an id uniquely names one object for the life of the
/// thread. Id 0 is reserved and never allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjId(u64);

impl ObjId {
    /// Raw numeric form, for diagnostics.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

thread_local! {
    static NEXT_OBJ_ID: Cell<u64> = const { Cell::new(1) };
}

fn next_obj_id() -> ObjId {
    NEXT_OBJ_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        ObjId(id)
    })
}

/// Runtime kind of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjKind {
    /// String-keyed, insertion-independent ordered properties.
    Record,
    /// Index-keyed vector.
    Sequence,
    /// Value-keyed set.
    Set,
    /// Value-keyed map.
    Map,
    /// Set holding its object members weakly.
    WeakSet,
    /// Map holding its object keys weakly.
    WeakMap,
    /// Opaque callable.
    Function,
    /// Host-defined foreign handle.
    Opaque,
    /// Interception wrapper bound over another object.
    Wrapper,
}

impl ObjKind {
    /// Stable lowercase name for diagnostics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ObjKind::Record => "record",
            ObjKind::Sequence => "sequence",
            ObjKind::Set => "set",
            ObjKind::Map => "map",
            ObjKind::WeakSet => "weakset",
            ObjKind::WeakMap => "weakmap",
            ObjKind::Function => "function",
            ObjKind::Opaque => "opaque",
            ObjKind::Wrapper => "wrapper",
        }
    }

    /// True for the kinds addressed through entry access (set/map family).
    #[must_use]
    pub fn is_entry_kind(self) -> bool {
        matches!(
            self,
            ObjKind::Set | ObjKind::Map | ObjKind::WeakSet | ObjKind::WeakMap
        )
    }
}

impl fmt::Display for ObjKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a raw write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// The key did not exist before; structure changed.
    Created,
    /// An existing slot was overwritten.
    Updated,
    /// The write did not apply (kind mismatch, invalid key).
    Rejected,
}

struct MapSlot {
    /// Original key value, retained so iteration reproduces object keys.
    key: Value,
    value: Value,
}

struct WeakSlot {
    key: WeakObj,
    value: Value,
}

type NativeFn = Rc<dyn Fn(&[Value]) -> Value>;

enum Payload {
    Record(RefCell<BTreeMap<Rc<str>, Value>>),
    Sequence(RefCell<Vec<Value>>),
    Set(RefCell<BTreeMap<EntryKey, Value>>),
    Map(RefCell<BTreeMap<EntryKey, MapSlot>>),
    WeakSet(RefCell<BTreeMap<ObjId, WeakObj>>),
    WeakMap(RefCell<BTreeMap<ObjId, WeakSlot>>),
    Function(NativeFn),
    Opaque(Rc<dyn Any>),
    Wrapper(WrapperCell),
}

struct WrapperCell {
    /// A wrapper keeps its subject alive, like any facade.
    target: Obj,
    kind: WrapKind,
    traps: TrapSet,
}

struct ObjCell {
    id: ObjId,
    flags: Cell<ObjFlags>,
    payload: Payload,
}

/// Shared handle to a heap object. Cloning shares the same cell; equality
/// is identity.
#[derive(Clone)]
pub struct Obj {
    cell: Rc<ObjCell>,
}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Eq for Obj {}

impl Hash for Obj {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Obj")
            .field("id", &self.id().get())
            .field("kind", &self.kind().as_str())
            .finish_non_exhaustive()
    }
}

/// Non-owning handle to an object, with its id cached so tables can keep
/// keying dead entries until they are pruned.
#[derive(Clone)]
pub struct WeakObj {
    id: ObjId,
    cell: Weak<ObjCell>,
}

impl WeakObj {
    #[must_use]
    pub fn id(&self) -> ObjId {
        self.id
    }

    #[must_use]
    pub fn upgrade(&self) -> Option<Obj> {
        self.cell.upgrade().map(|cell| Obj { cell })
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.cell.strong_count() > 0
    }
}

impl fmt::Debug for WeakObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObj")
            .field("id", &self.id.get())
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Obj {
    fn from_payload(payload: Payload) -> Self {
        Obj {
            cell: Rc::new(ObjCell {
                id: next_obj_id(),
                flags: Cell::new(ObjFlags::empty()),
                payload,
            }),
        }
    }

    /// Empty record.
    #[must_use]
    pub fn record() -> Self {
        Self::from_payload(Payload::Record(RefCell::new(BTreeMap::new())))
    }

    /// Empty sequence.
    #[must_use]
    pub fn sequence() -> Self {
        Self::from_payload(Payload::Sequence(RefCell::new(Vec::new())))
    }

    /// Sequence seeded with `items`.
    #[must_use]
    pub fn sequence_from(items: Vec<Value>) -> Self {
        Self::from_payload(Payload::Sequence(RefCell::new(items)))
    }

    /// Empty set.
    #[must_use]
    pub fn new_set() -> Self {
        Self::from_payload(Payload::Set(RefCell::new(BTreeMap::new())))
    }

    /// Empty map.
    #[must_use]
    pub fn map() -> Self {
        Self::from_payload(Payload::Map(RefCell::new(BTreeMap::new())))
    }

    /// Empty weak set. Members must be objects and are held weakly.
    #[must_use]
    pub fn weak_set() -> Self {
        Self::from_payload(Payload::WeakSet(RefCell::new(BTreeMap::new())))
    }

    /// Empty weak map. Keys must be objects and are held weakly.
    #[must_use]
    pub fn weak_map() -> Self {
        Self::from_payload(Payload::WeakMap(RefCell::new(BTreeMap::new())))
    }

    /// Opaque callable.
    #[must_use]
    pub fn function(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self::from_payload(Payload::Function(Rc::new(f)))
    }

    /// Host-defined foreign handle.
    #[must_use]
    pub fn opaque(handle: Rc<dyn Any>) -> Self {
        Self::from_payload(Payload::Opaque(handle))
    }

    /// Interception wrapper over `target`, bound to a trap bundle.
    ///
    /// Normally constructed only by the observation layer; the wrapper has
    /// its own identity, distinct from `target`'s.
    #[must_use]
    pub fn wrapper(target: Obj, kind: WrapKind, traps: TrapSet) -> Self {
        Self::from_payload(Payload::Wrapper(WrapperCell {
            target,
            kind,
            traps,
        }))
    }
}

// ---------------------------------------------------------------------------
// Identity, kind, flags
// ---------------------------------------------------------------------------

impl Obj {
    #[must_use]
    pub fn id(&self) -> ObjId {
        self.cell.id
    }

    #[must_use]
    pub fn kind(&self) -> ObjKind {
        match &self.cell.payload {
            Payload::Record(_) => ObjKind::Record,
            Payload::Sequence(_) => ObjKind::Sequence,
            Payload::Set(_) => ObjKind::Set,
            Payload::Map(_) => ObjKind::Map,
            Payload::WeakSet(_) => ObjKind::WeakSet,
            Payload::WeakMap(_) => ObjKind::WeakMap,
            Payload::Function(_) => ObjKind::Function,
            Payload::Opaque(_) => ObjKind::Opaque,
            Payload::Wrapper(_) => ObjKind::Wrapper,
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakObj {
        WeakObj {
            id: self.cell.id,
            cell: Rc::downgrade(&self.cell),
        }
    }

    #[must_use]
    pub fn flags(&self) -> ObjFlags {
        self.cell.flags.get()
    }

    /// Add markers. Markers are add-only; there is no removal.
    pub fn add_flags(&self, add: ObjFlags) {
        self.cell.flags.set(self.cell.flags.get() | add);
    }

    #[must_use]
    pub fn has_flag(&self, flag: ObjFlags) -> bool {
        self.cell.flags.get().contains(flag)
    }

    #[must_use]
    pub fn is_wrapper(&self) -> bool {
        matches!(self.cell.payload, Payload::Wrapper(_))
    }

    /// Wrap kind, if this object is a wrapper.
    #[must_use]
    pub fn wrap_kind(&self) -> Option<WrapKind> {
        match &self.cell.payload {
            Payload::Wrapper(w) => Some(w.kind),
            _ => None,
        }
    }

    /// The wrapped object, if this object is a wrapper.
    #[must_use]
    pub fn wrapper_target(&self) -> Option<Obj> {
        match &self.cell.payload {
            Payload::Wrapper(w) => Some(w.target.clone()),
            _ => None,
        }
    }

    /// Invoke a callable. Non-callables return `Null`.
    pub fn call(&self, args: &[Value]) -> Value {
        match &self.cell.payload {
            Payload::Function(f) => f(args),
            _ => Value::Null,
        }
    }

    /// Downcast access to an opaque handle.
    #[must_use]
    pub fn opaque_handle(&self) -> Option<Rc<dyn Any>> {
        match &self.cell.payload {
            Payload::Opaque(h) => Some(Rc::clone(h)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw property access (records, sequences)
// ---------------------------------------------------------------------------

impl Obj {
    /// Read a property from storage. Missing or kind-mismatched keys read
    /// as `Null`.
    pub fn raw_get(&self, key: &PropKey) -> Value {
        match (&self.cell.payload, key) {
            (Payload::Record(map), PropKey::Name(name)) => map
                .borrow()
                .get(&**name)
                .cloned()
                .unwrap_or(Value::Null),
            (Payload::Sequence(items), PropKey::Index(index)) => items
                .borrow()
                .get(*index)
                .cloned()
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Write a property to storage.
    ///
    /// Sequence writes one past the end append; writes further out fill the
    /// gap with `Null`.
    pub fn raw_set(&self, key: &PropKey, value: Value) -> WriteKind {
        match (&self.cell.payload, key) {
            (Payload::Record(map), PropKey::Name(name)) => {
                if map.borrow_mut().insert(Rc::clone(name), value).is_some() {
                    WriteKind::Updated
                } else {
                    WriteKind::Created
                }
            }
            (Payload::Sequence(items), PropKey::Index(index)) => {
                let mut items = items.borrow_mut();
                if *index < items.len() {
                    items[*index] = value;
                    WriteKind::Updated
                } else {
                    items.resize(*index, Value::Null);
                    items.push(value);
                    WriteKind::Created
                }
            }
            _ => WriteKind::Rejected,
        }
    }

    pub fn raw_has(&self, key: &PropKey) -> bool {
        match (&self.cell.payload, key) {
            (Payload::Record(map), PropKey::Name(name)) => map.borrow().contains_key(&**name),
            (Payload::Sequence(items), PropKey::Index(index)) => *index < items.borrow().len(),
            _ => false,
        }
    }

    /// Delete a property. Sequence removal shifts later elements down.
    pub fn raw_remove(&self, key: &PropKey) -> bool {
        match (&self.cell.payload, key) {
            (Payload::Record(map), PropKey::Name(name)) => {
                map.borrow_mut().remove(&**name).is_some()
            }
            (Payload::Sequence(items), PropKey::Index(index)) => {
                let mut items = items.borrow_mut();
                if *index < items.len() {
                    items.remove(*index);
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Property keys in storage order. Collections and atoms have none.
    pub fn raw_keys(&self) -> Vec<PropKey> {
        match &self.cell.payload {
            Payload::Record(map) => map
                .borrow()
                .keys()
                .map(|name| PropKey::Name(Rc::clone(name)))
                .collect(),
            Payload::Sequence(items) => (0..items.borrow().len()).map(PropKey::Index).collect(),
            _ => Vec::new(),
        }
    }

    /// Structural size: property count, sequence length, or live entry
    /// count. Weak collections are pruned first.
    pub fn raw_len(&self) -> usize {
        match &self.cell.payload {
            Payload::Record(map) => map.borrow().len(),
            Payload::Sequence(items) => items.borrow().len(),
            Payload::Set(entries) => entries.borrow().len(),
            Payload::Map(entries) => entries.borrow().len(),
            Payload::WeakSet(entries) => {
                let mut entries = entries.borrow_mut();
                entries.retain(|_, member| member.is_alive());
                entries.len()
            }
            Payload::WeakMap(entries) => {
                let mut entries = entries.borrow_mut();
                entries.retain(|_, slot| slot.key.is_alive());
                entries.len()
            }
            _ => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw entry access (sets, maps, weak variants)
// ---------------------------------------------------------------------------

impl Obj {
    /// Look up an entry. For sets this returns the stored element; for maps
    /// the stored value. Missing entries read as `Null`.
    pub fn raw_entry(&self, key: &Value) -> Value {
        match &self.cell.payload {
            Payload::Set(entries) => entries
                .borrow()
                .get(&EntryKey::of(key))
                .cloned()
                .unwrap_or(Value::Null),
            Payload::Map(entries) => entries
                .borrow()
                .get(&EntryKey::of(key))
                .map(|slot| slot.value.clone())
                .unwrap_or(Value::Null),
            Payload::WeakSet(entries) => match EntryKey::of(key).as_obj_id() {
                Some(id) => entries
                    .borrow()
                    .get(&id)
                    .and_then(WeakObj::upgrade)
                    .map(Value::Obj)
                    .unwrap_or(Value::Null),
                None => Value::Null,
            },
            Payload::WeakMap(entries) => match EntryKey::of(key).as_obj_id() {
                Some(id) => entries
                    .borrow()
                    .get(&id)
                    .filter(|slot| slot.key.is_alive())
                    .map(|slot| slot.value.clone())
                    .unwrap_or(Value::Null),
                None => Value::Null,
            },
            _ => Value::Null,
        }
    }

    /// Insert an entry. Set-like kinds take the element as `key` and ignore
    /// `value`. Weak kinds reject primitive keys.
    pub fn raw_insert(&self, key: Value, value: Value) -> WriteKind {
        match &self.cell.payload {
            Payload::Set(entries) => {
                let entry_key = EntryKey::of(&key);
                if entries.borrow_mut().insert(entry_key, key).is_some() {
                    WriteKind::Updated
                } else {
                    WriteKind::Created
                }
            }
            Payload::Map(entries) => {
                let entry_key = EntryKey::of(&key);
                if entries
                    .borrow_mut()
                    .insert(entry_key, MapSlot { key, value })
                    .is_some()
                {
                    WriteKind::Updated
                } else {
                    WriteKind::Created
                }
            }
            Payload::WeakSet(entries) => match &key {
                Value::Obj(obj) => {
                    let member = obj.downgrade();
                    if entries.borrow_mut().insert(obj.id(), member).is_some() {
                        WriteKind::Updated
                    } else {
                        WriteKind::Created
                    }
                }
                _ => WriteKind::Rejected,
            },
            Payload::WeakMap(entries) => match &key {
                Value::Obj(obj) => {
                    let slot = WeakSlot {
                        key: obj.downgrade(),
                        value,
                    };
                    if entries.borrow_mut().insert(obj.id(), slot).is_some() {
                        WriteKind::Updated
                    } else {
                        WriteKind::Created
                    }
                }
                _ => WriteKind::Rejected,
            },
            _ => WriteKind::Rejected,
        }
    }

    pub fn raw_contains(&self, key: &Value) -> bool {
        match &self.cell.payload {
            Payload::Set(entries) => entries.borrow().contains_key(&EntryKey::of(key)),
            Payload::Map(entries) => entries.borrow().contains_key(&EntryKey::of(key)),
            Payload::WeakSet(entries) => match EntryKey::of(key).as_obj_id() {
                Some(id) => entries
                    .borrow()
                    .get(&id)
                    .is_some_and(WeakObj::is_alive),
                None => false,
            },
            Payload::WeakMap(entries) => match EntryKey::of(key).as_obj_id() {
                Some(id) => entries
                    .borrow()
                    .get(&id)
                    .is_some_and(|slot| slot.key.is_alive()),
                None => false,
            },
            _ => false,
        }
    }

    pub fn raw_remove_entry(&self, key: &Value) -> bool {
        match &self.cell.payload {
            Payload::Set(entries) => entries.borrow_mut().remove(&EntryKey::of(key)).is_some(),
            Payload::Map(entries) => entries.borrow_mut().remove(&EntryKey::of(key)).is_some(),
            Payload::WeakSet(entries) => match EntryKey::of(key).as_obj_id() {
                Some(id) => entries.borrow_mut().remove(&id).is_some(),
                None => false,
            },
            Payload::WeakMap(entries) => match EntryKey::of(key).as_obj_id() {
                Some(id) => entries.borrow_mut().remove(&id).is_some(),
                None => false,
            },
            _ => false,
        }
    }

    /// Remove every entry, returning the keys that were present. `None` for
    /// non-collection kinds.
    pub fn raw_clear(&self) -> Option<Vec<EntryKey>> {
        match &self.cell.payload {
            Payload::Set(entries) => {
                let mut entries = entries.borrow_mut();
                let keys = entries.keys().cloned().collect();
                entries.clear();
                Some(keys)
            }
            Payload::Map(entries) => {
                let mut entries = entries.borrow_mut();
                let keys = entries.keys().cloned().collect();
                entries.clear();
                Some(keys)
            }
            Payload::WeakSet(entries) => {
                let mut entries = entries.borrow_mut();
                let keys = entries
                    .iter()
                    .filter(|(_, member)| member.is_alive())
                    .map(|(id, _)| EntryKey::Obj(*id))
                    .collect();
                entries.clear();
                Some(keys)
            }
            Payload::WeakMap(entries) => {
                let mut entries = entries.borrow_mut();
                let keys = entries
                    .iter()
                    .filter(|(_, slot)| slot.key.is_alive())
                    .map(|(id, _)| EntryKey::Obj(*id))
                    .collect();
                entries.clear();
                Some(keys)
            }
            _ => None,
        }
    }

    /// Live (key, value) pairs. Sets yield each element twice; weak
    /// collections prune dead members as a side effect.
    pub fn raw_entries(&self) -> Vec<(Value, Value)> {
        match &self.cell.payload {
            Payload::Set(entries) => entries
                .borrow()
                .values()
                .map(|element| (element.clone(), element.clone()))
                .collect(),
            Payload::Map(entries) => entries
                .borrow()
                .values()
                .map(|slot| (slot.key.clone(), slot.value.clone()))
                .collect(),
            Payload::WeakSet(entries) => {
                let mut entries = entries.borrow_mut();
                entries.retain(|_, member| member.is_alive());
                entries
                    .values()
                    .filter_map(WeakObj::upgrade)
                    .map(|obj| (Value::Obj(obj.clone()), Value::Obj(obj)))
                    .collect()
            }
            Payload::WeakMap(entries) => {
                let mut entries = entries.borrow_mut();
                entries.retain(|_, slot| slot.key.is_alive());
                entries
                    .values()
                    .filter_map(|slot| {
                        slot.key
                            .upgrade()
                            .map(|key| (Value::Obj(key), slot.value.clone()))
                    })
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatching access surface
// ---------------------------------------------------------------------------

impl Obj {
    /// Read a property; wrappers route through their trap bundle.
    pub fn get(&self, key: &PropKey) -> Value {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Base(traps) => traps.get(&w.target, key),
                TrapSet::Entries(_) => Value::Null,
            },
            _ => self.raw_get(key),
        }
    }

    /// Write a property; wrappers route through their trap bundle. Returns
    /// whether the write applied.
    pub fn set(&self, key: &PropKey, value: Value) -> bool {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Base(traps) => traps.set(&w.target, key, value),
                TrapSet::Entries(_) => false,
            },
            _ => !matches!(self.raw_set(key, value), WriteKind::Rejected),
        }
    }

    pub fn has(&self, key: &PropKey) -> bool {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Base(traps) => traps.has(&w.target, key),
                TrapSet::Entries(_) => false,
            },
            _ => self.raw_has(key),
        }
    }

    pub fn remove(&self, key: &PropKey) -> bool {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Base(traps) => traps.remove(&w.target, key),
                TrapSet::Entries(_) => false,
            },
            _ => self.raw_remove(key),
        }
    }

    pub fn keys(&self) -> Vec<PropKey> {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Base(traps) => traps.keys(&w.target),
                TrapSet::Entries(_) => Vec::new(),
            },
            _ => self.raw_keys(),
        }
    }

    /// Structural size through whichever surface this object exposes.
    pub fn len(&self) -> usize {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Base(traps) => traps.len(&w.target),
                TrapSet::Entries(traps) => traps.len(&w.target),
            },
            _ => self.raw_len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append to a sequence. Returns whether the write applied.
    pub fn push(&self, value: Value) -> bool {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Base(traps) => {
                    let end = w.target.raw_len();
                    traps.set(&w.target, &PropKey::Index(end), value)
                }
                TrapSet::Entries(_) => false,
            },
            Payload::Sequence(_) => {
                let end = self.raw_len();
                !matches!(self.raw_set(&PropKey::Index(end), value), WriteKind::Rejected)
            }
            _ => false,
        }
    }

    pub fn entry(&self, key: &Value) -> Value {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Entries(traps) => traps.entry(&w.target, key),
                TrapSet::Base(_) => Value::Null,
            },
            _ => self.raw_entry(key),
        }
    }

    pub fn insert(&self, key: Value, value: Value) -> bool {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Entries(traps) => traps.insert(&w.target, key, value),
                TrapSet::Base(_) => false,
            },
            _ => !matches!(self.raw_insert(key, value), WriteKind::Rejected),
        }
    }

    /// Add an element to a set-like object.
    pub fn add(&self, element: Value) -> bool {
        self.insert(element, Value::Null)
    }

    pub fn contains(&self, key: &Value) -> bool {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Entries(traps) => traps.contains(&w.target, key),
                TrapSet::Base(_) => false,
            },
            _ => self.raw_contains(key),
        }
    }

    pub fn remove_entry(&self, key: &Value) -> bool {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Entries(traps) => traps.remove_entry(&w.target, key),
                TrapSet::Base(_) => false,
            },
            _ => self.raw_remove_entry(key),
        }
    }

    pub fn clear(&self) -> bool {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Entries(traps) => traps.clear(&w.target),
                TrapSet::Base(_) => false,
            },
            _ => self.raw_clear().is_some(),
        }
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        match &self.cell.payload {
            Payload::Wrapper(w) => match &w.traps {
                TrapSet::Entries(traps) => traps.entries(&w.target),
                TrapSet::Base(_) => Vec::new(),
            },
            _ => self.raw_entries(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_monotonic() {
        let a = Obj::record();
        let b = Obj::record();
        assert_ne!(a.id(), b.id());
        assert!(a.id() < b.id());
    }

    #[test]
    fn identity_equality() {
        let a = Obj::record();
        let b = a.clone();
        let c = Obj::record();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn record_get_set_remove() {
        let rec = Obj::record();
        let key = PropKey::name("title");
        assert_eq!(rec.raw_get(&key), Value::Null);
        assert_eq!(rec.raw_set(&key, Value::Int(7)), WriteKind::Created);
        assert_eq!(rec.raw_get(&key), Value::Int(7));
        assert_eq!(rec.raw_set(&key, Value::Int(8)), WriteKind::Updated);
        assert!(rec.raw_has(&key));
        assert!(rec.raw_remove(&key));
        assert!(!rec.raw_has(&key));
    }

    #[test]
    fn sequence_append_and_gap_fill() {
        let seq = Obj::sequence();
        assert_eq!(seq.raw_set(&PropKey::Index(0), Value::Int(1)), WriteKind::Created);
        assert_eq!(seq.raw_set(&PropKey::Index(0), Value::Int(2)), WriteKind::Updated);
        assert_eq!(seq.raw_set(&PropKey::Index(3), Value::Int(9)), WriteKind::Created);
        assert_eq!(seq.raw_len(), 4);
        assert_eq!(seq.raw_get(&PropKey::Index(1)), Value::Null);
        assert_eq!(seq.raw_get(&PropKey::Index(3)), Value::Int(9));
    }

    #[test]
    fn sequence_remove_shifts() {
        let seq = Obj::sequence_from(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(seq.raw_remove(&PropKey::Index(0)));
        assert_eq!(seq.raw_len(), 2);
        assert_eq!(seq.raw_get(&PropKey::Index(0)), Value::Int(2));
    }

    #[test]
    fn kind_mismatch_is_inert() {
        let set = Obj::new_set();
        assert_eq!(set.raw_get(&PropKey::name("x")), Value::Null);
        assert_eq!(
            set.raw_set(&PropKey::name("x"), Value::Int(1)),
            WriteKind::Rejected
        );
        let rec = Obj::record();
        assert_eq!(rec.raw_insert(Value::Int(1), Value::Int(2)), WriteKind::Rejected);
        assert!(!rec.raw_contains(&Value::Int(1)));
    }

    #[test]
    fn set_membership() {
        let set = Obj::new_set();
        assert_eq!(set.raw_insert(Value::Int(1), Value::Null), WriteKind::Created);
        assert_eq!(set.raw_insert(Value::Int(1), Value::Null), WriteKind::Updated);
        assert!(set.raw_contains(&Value::Int(1)));
        assert_eq!(set.raw_len(), 1);
        assert!(set.raw_remove_entry(&Value::Int(1)));
        assert!(set.raw_clear().is_some_and(|keys| keys.is_empty()));
    }

    #[test]
    fn map_object_keys_by_identity() {
        let map = Obj::map();
        let k1 = Obj::record();
        let k2 = Obj::record();
        map.raw_insert(Value::Obj(k1.clone()), Value::Int(1));
        map.raw_insert(Value::Obj(k2.clone()), Value::Int(2));
        assert_eq!(map.raw_entry(&Value::Obj(k1.clone())), Value::Int(1));
        assert_eq!(map.raw_entry(&Value::Obj(k2)), Value::Int(2));
        assert_eq!(map.raw_len(), 2);
        let entries = map.raw_entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|(k, _)| *k == Value::Obj(k1.clone())));
    }

    #[test]
    fn weak_set_drops_dead_members() {
        let ws = Obj::weak_set();
        let member = Obj::record();
        assert_eq!(
            ws.raw_insert(Value::Obj(member.clone()), Value::Null),
            WriteKind::Created
        );
        assert!(ws.raw_contains(&Value::Obj(member.clone())));
        assert_eq!(ws.raw_len(), 1);
        drop(member);
        assert_eq!(ws.raw_len(), 0);
    }

    #[test]
    fn weak_map_rejects_primitive_keys() {
        let wm = Obj::weak_map();
        assert_eq!(
            wm.raw_insert(Value::Int(1), Value::Int(2)),
            WriteKind::Rejected
        );
        let key = Obj::record();
        assert_eq!(
            wm.raw_insert(Value::Obj(key.clone()), Value::Int(2)),
            WriteKind::Created
        );
        assert_eq!(wm.raw_entry(&Value::Obj(key)), Value::Int(2));
    }

    #[test]
    fn flags_are_add_only() {
        let obj = Obj::record();
        assert!(obj.flags().is_empty());
        obj.add_flags(ObjFlags::NON_OBSERVABLE);
        obj.add_flags(ObjFlags::NON_OBSERVABLE);
        assert!(obj.has_flag(ObjFlags::NON_OBSERVABLE));
        assert!(!obj.has_flag(ObjFlags::FORCED_READONLY));
    }

    #[test]
    fn weak_obj_upgrade() {
        let obj = Obj::record();
        let weak = obj.downgrade();
        assert_eq!(weak.id(), obj.id());
        assert!(weak.upgrade().is_some());
        drop(obj);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn function_call() {
        let double = Obj::function(|args| match args.first() {
            Some(Value::Int(i)) => Value::Int(i * 2),
            _ => Value::Null,
        });
        assert_eq!(double.call(&[Value::Int(21)]), Value::Int(42));
        assert_eq!(Obj::record().call(&[]), Value::Null);
    }

    #[test]
    fn keys_in_storage_order() {
        let seq = Obj::sequence_from(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(seq.raw_keys(), vec![PropKey::Index(0), PropKey::Index(1)]);
        let rec = Obj::record();
        rec.raw_set(&PropKey::name("b"), Value::Int(1));
        rec.raw_set(&PropKey::name("a"), Value::Int(2));
        let keys = rec.raw_keys();
        assert_eq!(keys.len(), 2);
    }
}
