#![forbid(unsafe_code)]

//! The trap seam: capability bundles a wrapper binds at construction.
//!
//! A wrapper does not carry behavior of its own. It binds exactly one trap
//! bundle ([`PropertyTraps`] for records and sequences, [`EntryTraps`] for
//! the set/map family) and [`Obj`]'s access surface dispatches into it.
//! Bundle implementations live in the observation layer; this crate only
//! defines the seam.

use std::rc::Rc;

use crate::key::PropKey;
use crate::object::Obj;
use crate::value::Value;

/// Which view a wrapper presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapKind {
    Mutable,
    Readonly,
}

/// Interception capabilities for property-addressed objects.
///
/// `target` is always the wrapped raw object; implementations read and
/// write it through the `raw_*` surface.
pub trait PropertyTraps {
    fn get(&self, target: &Obj, key: &PropKey) -> Value;
    fn set(&self, target: &Obj, key: &PropKey, value: Value) -> bool;
    fn has(&self, target: &Obj, key: &PropKey) -> bool;
    fn remove(&self, target: &Obj, key: &PropKey) -> bool;
    fn keys(&self, target: &Obj) -> Vec<PropKey>;
    fn len(&self, target: &Obj) -> usize;
}

/// Interception capabilities for entry-addressed objects (set/map family).
pub trait EntryTraps {
    fn entry(&self, target: &Obj, key: &Value) -> Value;
    fn insert(&self, target: &Obj, key: Value, value: Value) -> bool;
    fn contains(&self, target: &Obj, key: &Value) -> bool;
    fn remove_entry(&self, target: &Obj, key: &Value) -> bool;
    fn clear(&self, target: &Obj) -> bool;
    fn entries(&self, target: &Obj) -> Vec<(Value, Value)>;
    fn len(&self, target: &Obj) -> usize;
}

/// The bundle a wrapper binds: exactly one of the two capability sets.
#[derive(Clone)]
pub enum TrapSet {
    Base(Rc<dyn PropertyTraps>),
    Entries(Rc<dyn EntryTraps>),
}

impl std::fmt::Debug for TrapSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrapSet::Base(_) => f.write_str("TrapSet::Base"),
            TrapSet::Entries(_) => f.write_str("TrapSet::Entries"),
        }
    }
}
