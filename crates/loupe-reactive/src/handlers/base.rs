#![forbid(unsafe_code)]

//! Property interception for records and sequences.
//!
//! Reads track the property slot and lazily wrap composite results with
//! the reading view's kind; writes store the raw form of the value (a
//! wrapper never leaks into raw storage) and trigger the affected slots:
//! the property itself, plus iteration (and sequence length) when the
//! write changes structure. The read-only variant never tracks and
//! rejects every mutation.

use std::rc::Weak;

use loupe_value::{Obj, ObjKind, PropKey, PropertyTraps, Value, WrapKind, WriteKind};
use tracing::warn;

use crate::observe::deps::DepKey;
use crate::observe::factory::{self, ReactivityInner};
use crate::tracking::{Change, ChangeOp};

pub(crate) struct BasePropertyTraps {
    runtime: Weak<ReactivityInner>,
    kind: WrapKind,
}

impl BasePropertyTraps {
    pub(crate) fn new(runtime: Weak<ReactivityInner>, kind: WrapKind) -> Self {
        BasePropertyTraps { runtime, kind }
    }

    fn readonly(&self) -> bool {
        self.kind == WrapKind::Readonly
    }

    fn reject_write(&self, target: &Obj, key: &PropKey) -> bool {
        if cfg!(debug_assertions) {
            warn!(obj = %target.id(), key = %key, "write through read-only wrapper ignored");
        }
        false
    }
}

impl PropertyTraps for BasePropertyTraps {
    fn get(&self, target: &Obj, key: &PropKey) -> Value {
        let result = target.raw_get(key);
        let Some(rt) = self.runtime.upgrade() else {
            return result;
        };
        if !self.readonly() {
            rt.tracker.track(&rt.deps, target, DepKey::Prop(key.clone()));
        }
        if result.is_composite() {
            return factory::wrap_as(&rt, result, self.kind);
        }
        result
    }

    fn set(&self, target: &Obj, key: &PropKey, value: Value) -> bool {
        if self.readonly() {
            return self.reject_write(target, key);
        }
        let Some(rt) = self.runtime.upgrade() else {
            return !matches!(target.raw_set(key, value), WriteKind::Rejected);
        };
        let stored = factory::unwrap_value(&rt, value);
        match target.raw_set(key, stored.clone()) {
            WriteKind::Rejected => false,
            WriteKind::Updated => {
                let prop = DepKey::Prop(key.clone());
                let change = Change {
                    target: target.clone(),
                    key: prop.clone(),
                    op: ChangeOp::Set,
                    value: stored,
                };
                rt.tracker.trigger(&rt.deps, &change, &[prop]);
                true
            }
            WriteKind::Created => {
                let prop = DepKey::Prop(key.clone());
                let mut affected = vec![prop.clone(), DepKey::Iterate];
                if target.kind() == ObjKind::Sequence {
                    affected.push(DepKey::Len);
                }
                let change = Change {
                    target: target.clone(),
                    key: prop,
                    op: ChangeOp::Add,
                    value: stored,
                };
                rt.tracker.trigger(&rt.deps, &change, &affected);
                true
            }
        }
    }

    fn has(&self, target: &Obj, key: &PropKey) -> bool {
        if !self.readonly() {
            if let Some(rt) = self.runtime.upgrade() {
                rt.tracker.track(&rt.deps, target, DepKey::Prop(key.clone()));
            }
        }
        target.raw_has(key)
    }

    fn remove(&self, target: &Obj, key: &PropKey) -> bool {
        if self.readonly() {
            return self.reject_write(target, key);
        }
        if !target.raw_remove(key) {
            return false;
        }
        if let Some(rt) = self.runtime.upgrade() {
            let prop = DepKey::Prop(key.clone());
            let mut affected = vec![prop.clone(), DepKey::Iterate];
            if target.kind() == ObjKind::Sequence {
                affected.push(DepKey::Len);
            }
            let change = Change {
                target: target.clone(),
                key: prop,
                op: ChangeOp::Remove,
                value: Value::Null,
            };
            rt.tracker.trigger(&rt.deps, &change, &affected);
        }
        true
    }

    fn keys(&self, target: &Obj) -> Vec<PropKey> {
        if !self.readonly() {
            if let Some(rt) = self.runtime.upgrade() {
                rt.tracker.track(&rt.deps, target, DepKey::Iterate);
            }
        }
        target.raw_keys()
    }

    fn len(&self, target: &Obj) -> usize {
        if !self.readonly() {
            if let Some(rt) = self.runtime.upgrade() {
                let key = if target.kind() == ObjKind::Sequence {
                    DepKey::Len
                } else {
                    DepKey::Iterate
                };
                rt.tracker.track(&rt.deps, target, key);
            }
        }
        target.raw_len()
    }
}
