#![forbid(unsafe_code)]

//! Trap bundle implementations bound into wrappers by the factory.
//!
//! One bundle instance exists per (surface, view kind) pair, shared by
//! every wrapper of that shape. A bundle that outlives its runtime
//! degrades to untracked raw access.

pub mod base;
pub mod collection;
