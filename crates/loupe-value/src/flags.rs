#![forbid(unsafe_code)]

//! Per-object marker flags.
//!
//! Flags record out-of-band caller intent directly on the object cell, so
//! they live exactly as long as the object and can never leak past it.
//! Flags are add-only: once set, a marker stays for the object's lifetime.

use bitflags::bitflags;

bitflags! {
    /// Markers attached to an object before (or independent of) wrapping.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ObjFlags: u8 {
        /// Every wrap request for this object yields the read-only variant.
        const FORCED_READONLY = 1 << 0;
        /// This object is never eligible for wrapping.
        const NON_OBSERVABLE = 1 << 1;
        /// Host-framework infrastructure object; excluded from wrapping so
        /// the observation layer cannot wrap its own plumbing.
        const INTERNAL = 1 << 2;
    }
}
