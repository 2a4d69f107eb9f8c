#![forbid(unsafe_code)]

//! Weak raw↔wrapper identity associations.
//!
//! # Design
//!
//! Four tables, two per view kind: raw→wrapper and wrapper→raw, keyed by
//! [`ObjId`]. Every entry holds only a `Weak` handle, so the registry never
//! extends the lifetime of a raw object or a wrapper. Registration is
//! write-once per (raw, kind): a second registration for a live entry means
//! the factory's fast-path checks are broken, which is an unrecoverable
//! internal-consistency fault and panics.
//!
//! # Invariants
//!
//! 1. For every raw `r` with a live wrapper `w` of kind `k`:
//!    `lookup_wrapper(r, k) == w` and `lookup_raw(w, k) == r` hold
//!    simultaneously.
//! 2. No raw object maps to more than one live wrapper of the same kind;
//!    no wrapper maps back to more than one raw object.
//! 3. Ids are never reused, so a dead entry can only ever belong to a dead
//!    object.
//!
//! # Failure Modes
//!
//! - **Dropped wrapper, live raw**: the raw→wrapper entry goes dead; a
//!   later wrap request allocates a fresh wrapper. The old one is
//!   unreachable at that point, so two live wrappers of one kind can never
//!   be observed.
//! - **Untouched dead entries**: pruned by an amortized sweep when a table
//!   grows past its watermark, so unreferenced ids cannot accumulate.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use loupe_value::{Obj, ObjId, WeakObj, WrapKind};

/// One weak `ObjId`-keyed table with lazy pruning and amortized sweeps.
struct WeakTable {
    entries: RefCell<HashMap<ObjId, WeakObj>>,
    high_water: Cell<usize>,
}

impl WeakTable {
    fn new() -> Self {
        WeakTable {
            entries: RefCell::new(HashMap::new()),
            high_water: Cell::new(16),
        }
    }

    /// Look up a live peer; dead entries are removed on the way.
    fn get(&self, id: ObjId) -> Option<Obj> {
        let mut entries = self.entries.borrow_mut();
        match entries.get(&id) {
            Some(weak) => match weak.upgrade() {
                Some(obj) => Some(obj),
                None => {
                    entries.remove(&id);
                    None
                }
            },
            None => None,
        }
    }

    /// Insert a peer. Returns false if a live entry already exists.
    fn insert(&self, id: ObjId, peer: &Obj) -> bool {
        self.maybe_sweep();
        let mut entries = self.entries.borrow_mut();
        if let Some(existing) = entries.get(&id) {
            if existing.is_alive() {
                return false;
            }
        }
        entries.insert(id, peer.downgrade());
        true
    }

    fn maybe_sweep(&self) {
        let mut entries = self.entries.borrow_mut();
        if entries.len() < self.high_water.get() {
            return;
        }
        entries.retain(|_, weak| weak.is_alive());
        self.high_water.set(entries.len() * 2 + 16);
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// The two tables for one view kind.
struct KindTables {
    wrapper_of_raw: WeakTable,
    raw_of_wrapper: WeakTable,
}

impl KindTables {
    fn new() -> Self {
        KindTables {
            wrapper_of_raw: WeakTable::new(),
            raw_of_wrapper: WeakTable::new(),
        }
    }
}

/// Bidirectional, weak raw↔wrapper registry for both view kinds.
pub struct IdentityRegistry {
    mutable: KindTables,
    readonly: KindTables,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityRegistry {
    #[must_use]
    pub fn new() -> Self {
        IdentityRegistry {
            mutable: KindTables::new(),
            readonly: KindTables::new(),
        }
    }

    fn tables(&self, kind: WrapKind) -> &KindTables {
        match kind {
            WrapKind::Mutable => &self.mutable,
            WrapKind::Readonly => &self.readonly,
        }
    }

    /// The live wrapper of `raw` for this kind, if one exists.
    #[must_use]
    pub fn lookup_wrapper(&self, raw: &Obj, kind: WrapKind) -> Option<Obj> {
        self.tables(kind).wrapper_of_raw.get(raw.id())
    }

    /// The raw object behind `value`, if `value` is a live wrapper of this
    /// kind. Doubles as the "is this already a wrapper" test.
    #[must_use]
    pub fn lookup_raw(&self, value: &Obj, kind: WrapKind) -> Option<Obj> {
        self.tables(kind).raw_of_wrapper.get(value.id())
    }

    /// Establish both directions. Write-once per (raw, kind).
    ///
    /// # Panics
    ///
    /// Panics if `raw` already has a live wrapper of this kind, or if
    /// `wrapper` is already registered to another raw object. Either means
    /// the factory's fast-path checks failed and duplicate wrappers could
    /// coexist.
    pub fn register(&self, raw: &Obj, wrapper: &Obj, kind: WrapKind) {
        let tables = self.tables(kind);
        assert!(
            tables.wrapper_of_raw.insert(raw.id(), wrapper),
            "identity registry: object {} already has a {kind:?} wrapper",
            raw.id(),
        );
        assert!(
            tables.raw_of_wrapper.insert(wrapper.id(), raw),
            "identity registry: wrapper {} is already bound to a raw object",
            wrapper.id(),
        );
    }

    /// Total live+dead entries across the raw→wrapper direction, for
    /// diagnostics and tests.
    #[must_use]
    pub fn len(&self, kind: WrapKind) -> usize {
        self.tables(kind).wrapper_of_raw.len()
    }

    #[must_use]
    pub fn is_empty(&self, kind: WrapKind) -> bool {
        self.len(kind) == 0
    }
}

impl std::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("mutable", &self.mutable.wrapper_of_raw.len())
            .field("readonly", &self.readonly.wrapper_of_raw.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
