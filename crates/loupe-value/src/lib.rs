#![forbid(unsafe_code)]

//! Value model: dynamic values, object identity, and access dispatch.
//!
//! # Role in Loupe
//! `loupe-value` is the substrate layer. It owns the dynamic [`Value`] type,
//! heap objects with stable identity ([`Obj`]), runtime-kind discrimination
//! ([`ObjKind`]), per-object marker flags, and the trap seam through which
//! the observation layer intercepts property and entry access.
//!
//! # Primary responsibilities
//! - **Value**: primitives plus shared-identity heap objects.
//! - **Obj**: records, sequences, sets, maps, weak collections, callables,
//!   opaque host handles, and interception wrappers.
//! - **Keys**: property keys (name/index) and canonical entry keys.
//! - **Trap seam**: [`PropertyTraps`]/[`EntryTraps`] capability bundles that
//!   a wrapper binds; this crate only dispatches to them.
//!
//! # How it fits in the system
//! The observation layer (`loupe-reactive`) consumes identities and kinds
//! from this crate and supplies the trap bundles. Nothing here depends on
//! the observation layer; a raw object is fully usable on its own.

pub mod flags;
pub mod key;
pub mod object;
pub mod traps;
pub mod value;

#[cfg(feature = "json")]
pub mod json;

pub use flags::ObjFlags;
pub use key::{EntryKey, PropKey};
pub use object::{Obj, ObjId, ObjKind, WeakObj, WriteKind};
pub use traps::{EntryTraps, PropertyTraps, TrapSet, WrapKind};
pub use value::Value;
