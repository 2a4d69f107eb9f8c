#![forbid(unsafe_code)]

//! Entry interception for the set/map family.
//!
//! Keys are resolved to their raw form before canonicalization, so a
//! wrapper key and its raw object address the same entry. Lookups track
//! the entry slot; size and iteration track the structural slot; writes
//! trigger the affected slots. Clearing a collection triggers every entry
//! that was present plus iteration. The read-only variant never tracks
//! and rejects every mutation.

use std::rc::Weak;

use loupe_value::{EntryKey, EntryTraps, Obj, Value, WrapKind, WriteKind};
use tracing::warn;

use crate::observe::deps::DepKey;
use crate::observe::factory::{self, ReactivityInner};
use crate::tracking::{Change, ChangeOp};

pub(crate) struct CollectionEntryTraps {
    runtime: Weak<ReactivityInner>,
    kind: WrapKind,
}

impl CollectionEntryTraps {
    pub(crate) fn new(runtime: Weak<ReactivityInner>, kind: WrapKind) -> Self {
        CollectionEntryTraps { runtime, kind }
    }

    fn readonly(&self) -> bool {
        self.kind == WrapKind::Readonly
    }

    fn reject_write(&self, target: &Obj) -> bool {
        if cfg!(debug_assertions) {
            warn!(obj = %target.id(), "write through read-only wrapper ignored");
        }
        false
    }
}

impl EntryTraps for CollectionEntryTraps {
    fn entry(&self, target: &Obj, key: &Value) -> Value {
        let Some(rt) = self.runtime.upgrade() else {
            return target.raw_entry(key);
        };
        let raw_key = factory::unwrap_value(&rt, key.clone());
        if !self.readonly() {
            rt.tracker
                .track(&rt.deps, target, DepKey::Entry(EntryKey::of(&raw_key)));
        }
        let result = target.raw_entry(&raw_key);
        if result.is_composite() {
            return factory::wrap_as(&rt, result, self.kind);
        }
        result
    }

    fn insert(&self, target: &Obj, key: Value, value: Value) -> bool {
        if self.readonly() {
            return self.reject_write(target);
        }
        let Some(rt) = self.runtime.upgrade() else {
            return !matches!(target.raw_insert(key, value), WriteKind::Rejected);
        };
        let raw_key = factory::unwrap_value(&rt, key);
        let stored = factory::unwrap_value(&rt, value);
        let entry = DepKey::Entry(EntryKey::of(&raw_key));
        match target.raw_insert(raw_key, stored.clone()) {
            WriteKind::Rejected => {
                if cfg!(debug_assertions) {
                    warn!(obj = %target.id(), "entry insert rejected; weak collections take object keys only");
                }
                false
            }
            WriteKind::Updated => {
                let change = Change {
                    target: target.clone(),
                    key: entry.clone(),
                    op: ChangeOp::Set,
                    value: stored,
                };
                rt.tracker.trigger(&rt.deps, &change, &[entry]);
                true
            }
            WriteKind::Created => {
                let change = Change {
                    target: target.clone(),
                    key: entry.clone(),
                    op: ChangeOp::Add,
                    value: stored,
                };
                rt.tracker
                    .trigger(&rt.deps, &change, &[entry, DepKey::Iterate]);
                true
            }
        }
    }

    fn contains(&self, target: &Obj, key: &Value) -> bool {
        let Some(rt) = self.runtime.upgrade() else {
            return target.raw_contains(key);
        };
        let raw_key = factory::unwrap_value(&rt, key.clone());
        if !self.readonly() {
            rt.tracker
                .track(&rt.deps, target, DepKey::Entry(EntryKey::of(&raw_key)));
        }
        target.raw_contains(&raw_key)
    }

    fn remove_entry(&self, target: &Obj, key: &Value) -> bool {
        if self.readonly() {
            return self.reject_write(target);
        }
        let Some(rt) = self.runtime.upgrade() else {
            return target.raw_remove_entry(key);
        };
        let raw_key = factory::unwrap_value(&rt, key.clone());
        if !target.raw_remove_entry(&raw_key) {
            return false;
        }
        let entry = DepKey::Entry(EntryKey::of(&raw_key));
        let change = Change {
            target: target.clone(),
            key: entry.clone(),
            op: ChangeOp::Remove,
            value: Value::Null,
        };
        rt.tracker
            .trigger(&rt.deps, &change, &[entry, DepKey::Iterate]);
        true
    }

    fn clear(&self, target: &Obj) -> bool {
        if self.readonly() {
            return self.reject_write(target);
        }
        let Some(removed) = target.raw_clear() else {
            return false;
        };
        if removed.is_empty() {
            return true;
        }
        if let Some(rt) = self.runtime.upgrade() {
            let mut affected: Vec<DepKey> = removed.into_iter().map(DepKey::Entry).collect();
            affected.push(DepKey::Iterate);
            let change = Change {
                target: target.clone(),
                key: DepKey::Iterate,
                op: ChangeOp::Clear,
                value: Value::Null,
            };
            rt.tracker.trigger(&rt.deps, &change, &affected);
        }
        true
    }

    fn entries(&self, target: &Obj) -> Vec<(Value, Value)> {
        let Some(rt) = self.runtime.upgrade() else {
            return target.raw_entries();
        };
        if !self.readonly() {
            rt.tracker.track(&rt.deps, target, DepKey::Iterate);
        }
        target
            .raw_entries()
            .into_iter()
            .map(|(key, value)| {
                let key = if key.is_composite() {
                    factory::wrap_as(&rt, key, self.kind)
                } else {
                    key
                };
                let value = if value.is_composite() {
                    factory::wrap_as(&rt, value, self.kind)
                } else {
                    value
                };
                (key, value)
            })
            .collect()
    }

    fn len(&self, target: &Obj) -> usize {
        if !self.readonly() {
            if let Some(rt) = self.runtime.upgrade() {
                rt.tracker.track(&rt.deps, target, DepKey::Iterate);
            }
        }
        target.raw_len()
    }
}
