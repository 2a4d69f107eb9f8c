#![forbid(unsafe_code)]

//! Property and entry keys.
//!
//! Two key families address the two access surfaces:
//!
//! - [`PropKey`] addresses records (by name) and sequences (by index).
//! - [`EntryKey`] is the canonical, orderable form of an arbitrary [`Value`]
//!   used to key set and map storage: primitives collapse to their value,
//!   objects collapse to their identity.
//!
//! # Invariants
//!
//! 1. `EntryKey::of(v) == EntryKey::of(w)` iff `v` and `w` are the same key
//!    under lookup semantics (`-0.0` and `0.0` are one key; every NaN is one
//!    key; objects are keyed by identity, never by content).
//! 2. The ordering on `EntryKey` is a total order suitable for ordered-map
//!    storage. For floats it is representational (bit order), not numeric.

use std::fmt;
use std::rc::Rc;

use crate::object::ObjId;
use crate::value::Value;

/// Key into a record (by name) or a sequence (by index).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropKey {
    Name(Rc<str>),
    Index(usize),
}

impl PropKey {
    /// Named key for record properties.
    pub fn name(name: &str) -> Self {
        PropKey::Name(Rc::from(name))
    }

    /// Positional key for sequence elements.
    pub fn index(index: usize) -> Self {
        PropKey::Index(index)
    }
}

impl From<&str> for PropKey {
    fn from(name: &str) -> Self {
        PropKey::name(name)
    }
}

impl From<usize> for PropKey {
    fn from(index: usize) -> Self {
        PropKey::Index(index)
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Name(name) => write!(f, "{name}"),
            PropKey::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Canonical form of a [`Value`] used as a set element or map key.
///
/// Primitives are keyed by value, objects by identity. Floats are stored as
/// canonicalized bits so that `-0.0` folds onto `0.0` and all NaN payloads
/// collapse to a single key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Obj(ObjId),
}

impl EntryKey {
    /// Canonicalize a value into its entry-key form.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => EntryKey::Null,
            Value::Bool(b) => EntryKey::Bool(*b),
            Value::Int(i) => EntryKey::Int(*i),
            Value::Float(f) => EntryKey::Float(canonical_float_bits(*f)),
            Value::Str(s) => EntryKey::Str(Rc::clone(s)),
            Value::Obj(obj) => EntryKey::Obj(obj.id()),
        }
    }

    /// The object identity behind this key, if it keys an object.
    pub fn as_obj_id(&self) -> Option<ObjId> {
        match self {
            EntryKey::Obj(id) => Some(*id),
            _ => None,
        }
    }
}

/// Fold a float onto its canonical bit pattern: one key per NaN, one key for
/// both zeroes.
fn canonical_float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
