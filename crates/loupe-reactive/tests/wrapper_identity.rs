//! End-to-end identity and consistency scenarios for the wrap factory.
//!
//! These exercise the public surface the way a host framework would:
//! wrap, re-wrap, convert between views, unwrap, and read/write through
//! the wrappers, asserting the identity guarantees hold at every step.

use loupe_reactive::Reactivity;
use loupe_value::{Obj, PropKey, Value, WrapKind};

fn obj(value: &Value) -> &Obj {
    value.as_obj().expect("expected an object value")
}

#[test]
fn record_scenario_mutable_and_readonly_views() {
    let rt = Reactivity::new();
    let x = Value::Obj(Obj::record());
    obj(&x).raw_set(&PropKey::name("a"), Value::Int(1));

    let m = rt.to_mutable(x.clone());
    let r = rt.to_readonly(x.clone());

    assert_ne!(m, r);
    assert_eq!(rt.unwrap(m.clone()), x);
    assert_eq!(rt.unwrap(r.clone()), x);
    assert!(rt.is_readonly_wrapper(&r));
    assert!(!rt.is_readonly_wrapper(&m));
    assert!(rt.is_observed(&m));
    assert!(rt.is_observed(&r));

    // Both views read the same underlying property.
    assert_eq!(obj(&m).get(&PropKey::name("a")), Value::Int(1));
    assert_eq!(obj(&r).get(&PropKey::name("a")), Value::Int(1));
}

#[test]
fn sequence_scenario_same_wrapper_every_time() {
    let rt = Reactivity::new();
    let y = Value::Obj(Obj::sequence_from(vec![
        Value::Int(1),
        Value::Int(2),
        Value::Int(3),
    ]));
    let m1 = rt.to_mutable(y.clone());
    let m2 = rt.to_mutable(y.clone());
    assert_eq!(m1, m2);
    assert_eq!(obj(&m1).len(), 3);
}

#[test]
fn forced_readonly_scenario() {
    let rt = Reactivity::new();
    let z = rt.mark_forced_readonly(Value::Obj(Obj::record()));
    let w = rt.to_mutable(z.clone());
    assert!(rt.is_readonly_wrapper(&w));
    assert_eq!(w, rt.to_readonly(z));
}

#[test]
fn function_values_are_not_wrapped() {
    let rt = Reactivity::new();
    let f = Value::Obj(Obj::function(|args| args.first().cloned().unwrap_or(Value::Null)));
    let wrapped = rt.to_mutable(f.clone());
    assert_eq!(wrapped, f);
    assert_eq!(
        obj(&wrapped).call(&[Value::Int(5)]),
        Value::Int(5)
    );
}

#[test]
fn readonly_wrapper_rejects_writes_and_raw_is_untouched() {
    let rt = Reactivity::new();
    let x = Value::Obj(Obj::record());
    obj(&x).raw_set(&PropKey::name("a"), Value::Int(1));

    let r = rt.to_readonly(x.clone());
    assert!(!obj(&r).set(&PropKey::name("a"), Value::Int(2)));
    assert!(!obj(&r).remove(&PropKey::name("a")));
    assert_eq!(obj(&x).raw_get(&PropKey::name("a")), Value::Int(1));
}

#[test]
fn nested_reads_wrap_lazily_and_stably() {
    let rt = Reactivity::new();
    let inner = Obj::record();
    inner.raw_set(&PropKey::name("leaf"), Value::Int(7));
    let outer = Obj::record();
    outer.raw_set(&PropKey::name("inner"), Value::Obj(inner.clone()));

    let m = rt.to_mutable(Value::Obj(outer.clone()));
    let nested1 = obj(&m).get(&PropKey::name("inner"));
    let nested2 = obj(&m).get(&PropKey::name("inner"));

    // Nested reads yield the mutable wrapper of the nested raw object,
    // and the identical one on every read.
    assert!(rt.is_observed(&nested1));
    assert!(!rt.is_readonly_wrapper(&nested1));
    assert_eq!(nested1, nested2);
    assert_eq!(rt.unwrap(nested1.clone()), Value::Obj(inner.clone()));
    assert_eq!(obj(&nested1).get(&PropKey::name("leaf")), Value::Int(7));

    // The raw storage still holds the raw object, not the wrapper.
    assert_eq!(outer.raw_get(&PropKey::name("inner")), Value::Obj(inner));
}

#[test]
fn nested_reads_through_readonly_are_readonly() {
    let rt = Reactivity::new();
    let inner = Obj::record();
    let outer = Obj::record();
    outer.raw_set(&PropKey::name("inner"), Value::Obj(inner));

    let r = rt.to_readonly(Value::Obj(outer));
    let nested = obj(&r).get(&PropKey::name("inner"));
    assert!(rt.is_readonly_wrapper(&nested));
    assert!(!obj(&nested).set(&PropKey::name("x"), Value::Int(1)));
}

#[test]
fn wrapper_values_written_through_a_wrapper_are_stored_raw() {
    let rt = Reactivity::new();
    let child_raw = Obj::record();
    let child_wrapper = rt.to_mutable(Value::Obj(child_raw.clone()));
    let parent_raw = Obj::record();
    let parent = rt.to_mutable(Value::Obj(parent_raw.clone()));

    assert!(obj(&parent).set(&PropKey::name("child"), child_wrapper.clone()));
    // Raw storage holds the raw child; reading back through the wrapper
    // re-wraps it to the identical wrapper.
    assert_eq!(
        parent_raw.raw_get(&PropKey::name("child")),
        Value::Obj(child_raw)
    );
    assert_eq!(obj(&parent).get(&PropKey::name("child")), child_wrapper);
}

#[test]
fn readonly_of_mutable_converts_through_the_raw_object() {
    let rt = Reactivity::new();
    let x = Value::Obj(Obj::record());
    let m = rt.to_mutable(x.clone());
    let r_from_m = rt.to_readonly(m.clone());
    let r_from_x = rt.to_readonly(x.clone());
    assert_eq!(r_from_m, r_from_x);
    assert_ne!(r_from_m, m);
    // And the sticky direction: the read-only view survives the mutable
    // entry point unchanged.
    assert_eq!(rt.to_mutable(r_from_x.clone()), r_from_x);
}

#[test]
fn collection_wrappers_use_the_entry_surface() {
    let rt = Reactivity::new();
    let s = rt.to_mutable(Value::Obj(Obj::new_set()));
    let set = obj(&s);
    assert_eq!(set.wrap_kind(), Some(WrapKind::Mutable));

    assert!(set.add(Value::Int(1)));
    assert!(set.add(Value::Int(2)));
    assert!(set.contains(&Value::Int(1)));
    assert_eq!(set.len(), 2);

    // The property surface is inert on an entry-kind wrapper.
    assert_eq!(set.get(&PropKey::name("x")), Value::Null);
    assert!(!set.set(&PropKey::name("x"), Value::Int(1)));
}

#[test]
fn map_wrapper_accepts_wrapper_keys() {
    let rt = Reactivity::new();
    let key_raw = Obj::record();
    let key_wrapper = rt.to_mutable(Value::Obj(key_raw.clone()));

    let m = rt.to_mutable(Value::Obj(Obj::map()));
    let map = obj(&m);
    assert!(map.insert(key_wrapper.clone(), Value::Int(10)));

    // The raw key and its wrapper address the same entry.
    assert_eq!(map.entry(&Value::Obj(key_raw.clone())), Value::Int(10));
    assert_eq!(map.entry(&key_wrapper), Value::Int(10));
    assert!(map.contains(&Value::Obj(key_raw)));
}

#[test]
fn weak_map_wrapper_rejects_primitive_keys() {
    let rt = Reactivity::new();
    let wm = rt.to_mutable(Value::Obj(Obj::weak_map()));
    assert!(!obj(&wm).insert(Value::Int(1), Value::Int(2)));

    let key = Obj::record();
    assert!(obj(&wm).insert(Value::Obj(key.clone()), Value::Int(2)));
    assert_eq!(obj(&wm).entry(&Value::Obj(key)), Value::Int(2));
}

#[test]
fn slot_table_exists_after_any_wrap() {
    let rt = Reactivity::new();
    for value in [
        Value::Obj(Obj::record()),
        Value::Obj(Obj::sequence()),
        Value::Obj(Obj::new_set()),
        Value::Obj(Obj::map()),
    ] {
        assert!(rt.deps_of(&value).is_none());
        let _wrapper = rt.to_readonly(value.clone());
        let table = rt.deps_of(&value).expect("table created by wrap");
        assert!(table.is_empty());
    }
}

#[test]
fn runtimes_are_independent() {
    let rt_a = Reactivity::new();
    let rt_b = Reactivity::new();
    let x = Value::Obj(Obj::record());
    let wa = rt_a.to_mutable(x.clone());
    let wb = rt_b.to_mutable(x.clone());
    // Each runtime keeps its own identity tables.
    assert_ne!(wa, wb);
    assert!(rt_a.is_observed(&wa));
    assert!(!rt_a.is_observed(&wb));
}
