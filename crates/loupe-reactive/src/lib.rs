#![forbid(unsafe_code)]

//! Observation layer: identity-preserving wrappers and dependency tracking.
//!
//! # Role in Loupe
//! `loupe-reactive` turns raw objects from `loupe-value` into interception
//! wrappers and keeps the identity bookkeeping honest: wrapping the same
//! object twice returns the identical wrapper, wrapping a wrapper is a
//! no-op, and the mutable and read-only views of one object are
//! independent, stable, and mutually convertible.
//!
//! # Primary responsibilities
//! - **[`Reactivity`]**: the runtime handle with the two entry points,
//!   `to_mutable` and `to_readonly`, plus `unwrap`, the wrapper predicates,
//!   and the out-of-band markers.
//! - **Identity registry**: weak raw↔wrapper associations per view kind.
//! - **Dependency slots**: a lazily created per-object, per-key subscriber
//!   table that the tracking layer populates and consumes.
//! - **Trap bundles**: the property/entry interception behavior bound into
//!   wrappers: track on read, trigger on write, lazy nested wrapping.
//! - **[`Effect`]**: an auto-tracking observer that re-runs when any value
//!   it read changes.
//!
//! # Concurrency model
//! Single-threaded and synchronous: every operation runs to completion on
//! the calling thread. All shared state is `Rc`/`RefCell`; re-entrant
//! mutation of one object from inside its own notification is a design bug
//! and panics via RefCell borrow rules.

pub mod effect;
pub mod observe;
pub mod tracking;

mod handlers;

pub use effect::Effect;
pub use observe::deps::{DepKey, DepTable, SubscriberSet, Subscription};
pub use observe::factory::Reactivity;
pub use observe::policy::is_observable;
pub use observe::registry::IdentityRegistry;
pub use tracking::{Change, ChangeOp};
