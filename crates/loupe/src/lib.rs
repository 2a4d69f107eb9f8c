#![forbid(unsafe_code)]

//! Loupe public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use loupe_reactive as reactive;
pub use loupe_value as value;

pub mod prelude {
    pub use loupe_reactive::{
        Change, ChangeOp, DepKey, Effect, Reactivity, Subscription, is_observable,
    };
    pub use loupe_value::{Obj, ObjFlags, ObjId, ObjKind, PropKey, Value, WrapKind};
}
