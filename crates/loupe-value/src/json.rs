#![forbid(unsafe_code)]

//! Conversion between value graphs and `serde_json` trees.
//!
//! `from_json` builds raw records and sequences; it never produces
//! collections or wrappers. `to_json` reads wrappers transparently
//! (through their raw target, without tripping interception) and lowers
//! sets to arrays and maps to `[key, value]` pair arrays. Cycles lower to
//! `null` at the revisited node.

use std::collections::HashSet;
use std::rc::Rc;

use crate::key::PropKey;
use crate::object::{Obj, ObjId, ObjKind};
use crate::value::Value;

/// Build a raw value graph from a JSON tree.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Str(Rc::from(s.as_str())),
        serde_json::Value::Array(items) => {
            let seq = Obj::sequence_from(items.iter().map(from_json).collect());
            Value::Obj(seq)
        }
        serde_json::Value::Object(fields) => {
            let rec = Obj::record();
            for (name, field) in fields {
                rec.raw_set(&PropKey::name(name), from_json(field));
            }
            Value::Obj(rec)
        }
    }
}

/// Lower a value graph to a JSON tree.
pub fn to_json(value: &Value) -> serde_json::Value {
    let mut visited = HashSet::new();
    lower(value, &mut visited)
}

fn lower(value: &Value, visited: &mut HashSet<ObjId>) -> serde_json::Value {
    let obj = match value {
        Value::Null => return serde_json::Value::Null,
        Value::Bool(b) => return serde_json::Value::Bool(*b),
        Value::Int(i) => return serde_json::Value::from(*i),
        Value::Float(f) => {
            return serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null);
        }
        Value::Str(s) => return serde_json::Value::String(s.to_string()),
        Value::Obj(obj) => obj,
    };

    // Read wrappers through their raw target.
    let obj = obj.wrapper_target().unwrap_or_else(|| obj.clone());
    if !visited.insert(obj.id()) {
        return serde_json::Value::Null;
    }
    let lowered = match obj.kind() {
        ObjKind::Record => {
            let mut fields = serde_json::Map::new();
            for key in obj.raw_keys() {
                if let PropKey::Name(name) = &key {
                    fields.insert(name.to_string(), lower(&obj.raw_get(&key), visited));
                }
            }
            serde_json::Value::Object(fields)
        }
        ObjKind::Sequence => serde_json::Value::Array(
            obj.raw_keys()
                .iter()
                .map(|key| lower(&obj.raw_get(key), visited))
                .collect(),
        ),
        ObjKind::Set | ObjKind::WeakSet => serde_json::Value::Array(
            obj.raw_entries()
                .iter()
                .map(|(element, _)| lower(element, visited))
                .collect(),
        ),
        ObjKind::Map | ObjKind::WeakMap => serde_json::Value::Array(
            obj.raw_entries()
                .iter()
                .map(|(key, val)| {
                    serde_json::Value::Array(vec![lower(key, visited), lower(val, visited)])
                })
                .collect(),
        ),
        ObjKind::Function | ObjKind::Opaque | ObjKind::Wrapper => serde_json::Value::Null,
    };
    visited.remove(&obj.id());
    lowered
}
