#![forbid(unsafe_code)]

//! Auto-tracking observers.
//!
//! # Design
//!
//! An [`Effect`] runs its body once at construction with itself installed
//! as the active observer; every tracked read the body performs (through a
//! mutable wrapper) attaches the effect to that object+key slot. When any
//! of those slots triggers, the body re-runs and re-collects its
//! dependencies from scratch.
//!
//! Each run installs a *fresh* subscriber handle and drops the previous
//! one, so slots recorded by earlier runs lose their referent and are
//! pruned lazily. A branch the body no longer reads stops re-running it,
//! with no explicit cleanup pass.
//!
//! # Invariants
//!
//! 1. The body observes only reads made through wrappers; raw access is
//!    invisible to it.
//! 2. A change to a slot the latest run did not read does not re-run the
//!    body.
//! 3. A body that writes a slot it also reads does not recurse into
//!    itself (the run-in-progress flag absorbs the self-trigger).
//!
//! # Failure Modes
//!
//! - **Body panics**: the observer stack unwinds, but the effect stays
//!   marked running and will not fire again. Panics in effect bodies are
//!   design bugs.
//! - **Runtime dropped**: the effect becomes inert; `run` is a no-op.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::observe::deps::SubscriberRc;
use crate::observe::factory::{Reactivity, ReactivityInner};
use crate::tracking::Change;

/// RAII handle for an auto-tracking observer. Dropping it stops the
/// effect.
pub struct Effect {
    inner: Rc<EffectInner>,
}

struct EffectInner {
    runtime: Weak<ReactivityInner>,
    body: Box<dyn Fn()>,
    /// Strong handle identifying the latest run in the dependency slots.
    handle: RefCell<Option<SubscriberRc>>,
    running: Cell<bool>,
    stopped: Cell<bool>,
}

impl Effect {
    /// Run `body` now, tracking its reads, and re-run it on every change
    /// to a tracked slot.
    pub fn new(runtime: &Reactivity, body: impl Fn() + 'static) -> Self {
        let inner = Rc::new(EffectInner {
            runtime: Rc::downgrade(&runtime.shared),
            body: Box::new(body),
            handle: RefCell::new(None),
            running: Cell::new(false),
            stopped: Cell::new(false),
        });
        EffectInner::run(&inner);
        Effect { inner }
    }

    /// Re-run the body immediately, re-collecting dependencies.
    pub fn run(&self) {
        EffectInner::run(&self.inner);
    }

    /// Detach from every slot and never run again.
    pub fn stop(&self) {
        self.inner.stopped.set(true);
        self.inner.handle.borrow_mut().take();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.get()
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("stopped", &self.inner.stopped.get())
            .finish_non_exhaustive()
    }
}

impl EffectInner {
    fn run(this: &Rc<EffectInner>) {
        if this.stopped.get() || this.running.get() {
            return;
        }
        let Some(rt) = this.runtime.upgrade() else {
            return;
        };
        let weak = Rc::downgrade(this);
        let subscriber: SubscriberRc = Rc::new(move |_change: &Change| {
            if let Some(inner) = weak.upgrade() {
                EffectInner::run(&inner);
            }
        });
        // Replacing the handle orphans every slot the previous run
        // attached to.
        *this.handle.borrow_mut() = Some(Rc::clone(&subscriber));
        this.running.set(true);
        {
            let _observing = rt.tracker.scoped(subscriber);
            (this.body)();
        }
        this.running.set(false);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use loupe_value::{Obj, PropKey, Value};

    fn wrapped_record(rt: &Reactivity) -> Obj {
        rt.to_mutable(Value::Obj(Obj::record()))
            .into_obj()
            .expect("wrapper")
    }

    #[test]
    fn runs_once_at_construction() {
        let rt = Reactivity::new();
        let runs = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&runs);
        let _effect = rt.effect(move || {
            counter.set(counter.get() + 1);
        });
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn reruns_when_a_read_slot_changes() {
        let rt = Reactivity::new();
        let m = wrapped_record(&rt);
        let key = PropKey::name("count");
        m.set(&key, Value::Int(0));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let reader = m.clone();
        let _effect = rt.effect(move || {
            sink.borrow_mut().push(reader.get(&PropKey::name("count")));
        });
        assert_eq!(seen.borrow().len(), 1);

        m.set(&key, Value::Int(1));
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[1], Value::Int(1));
    }

    #[test]
    fn unrelated_slots_do_not_rerun() {
        let rt = Reactivity::new();
        let m = wrapped_record(&rt);
        m.set(&PropKey::name("a"), Value::Int(0));
        m.set(&PropKey::name("b"), Value::Int(0));

        let runs = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&runs);
        let reader = m.clone();
        let _effect = rt.effect(move || {
            counter.set(counter.get() + 1);
            let _ = reader.get(&PropKey::name("a"));
        });
        assert_eq!(runs.get(), 1);

        m.set(&PropKey::name("b"), Value::Int(9));
        assert_eq!(runs.get(), 1);
        m.set(&PropKey::name("a"), Value::Int(9));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn stale_branches_stop_tracking() {
        let rt = Reactivity::new();
        let m = wrapped_record(&rt);
        m.set(&PropKey::name("use_a"), Value::Bool(true));
        m.set(&PropKey::name("a"), Value::Int(0));
        m.set(&PropKey::name("b"), Value::Int(0));

        let runs = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&runs);
        let reader = m.clone();
        let _effect = rt.effect(move || {
            counter.set(counter.get() + 1);
            if reader.get(&PropKey::name("use_a")) == Value::Bool(true) {
                let _ = reader.get(&PropKey::name("a"));
            } else {
                let _ = reader.get(&PropKey::name("b"));
            }
        });
        assert_eq!(runs.get(), 1);

        // Flip to the `b` branch: run 2.
        m.set(&PropKey::name("use_a"), Value::Bool(false));
        assert_eq!(runs.get(), 2);

        // `a` is no longer read by the latest run; changing it is silent.
        m.set(&PropKey::name("a"), Value::Int(7));
        assert_eq!(runs.get(), 2);

        // `b` is read now.
        m.set(&PropKey::name("b"), Value::Int(7));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn drop_stops_the_effect() {
        let rt = Reactivity::new();
        let m = wrapped_record(&rt);
        m.set(&PropKey::name("x"), Value::Int(0));

        let runs = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&runs);
        let reader = m.clone();
        let effect = rt.effect(move || {
            counter.set(counter.get() + 1);
            let _ = reader.get(&PropKey::name("x"));
        });
        assert_eq!(runs.get(), 1);

        drop(effect);
        m.set(&PropKey::name("x"), Value::Int(1));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn self_write_does_not_recurse() {
        let rt = Reactivity::new();
        let m = wrapped_record(&rt);
        m.set(&PropKey::name("n"), Value::Int(0));

        let runs = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&runs);
        let cell = m.clone();
        let _effect = rt.effect(move || {
            counter.set(counter.get() + 1);
            let n = cell.get(&PropKey::name("n")).as_int().unwrap_or(0);
            cell.set(&PropKey::name("n"), Value::Int(n + 1));
        });
        assert_eq!(runs.get(), 1);

        // An outside write still re-runs it (once).
        m.set(&PropKey::name("n"), Value::Int(100));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn raw_access_is_invisible() {
        let rt = Reactivity::new();
        let raw = Obj::record();
        raw.raw_set(&PropKey::name("x"), Value::Int(0));
        let _wrapper = rt.to_mutable(Value::Obj(raw.clone()));

        let runs = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&runs);
        let reader = raw.clone();
        let _effect = rt.effect(move || {
            counter.set(counter.get() + 1);
            let _ = reader.raw_get(&PropKey::name("x"));
        });
        assert_eq!(runs.get(), 1);

        raw.raw_set(&PropKey::name("x"), Value::Int(1));
        assert_eq!(runs.get(), 1);
    }
}
