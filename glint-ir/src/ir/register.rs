//! Registers: mutable value stores with use/def bookkeeping.

use crate::ir::entities::{IfNode, Inst};
use std::collections::BTreeMap;

/// A register: a mutable store of 1–4 components, optionally an indexable
/// array of such vectors.
///
/// The `uses`/`defs`/`if_uses` multisets are shared state between this
/// module and every instruction referencing the register. They are mutated
/// only through the builder's insert/remove paths; the validator rebuilds
/// them independently and compares, so any direct mutation is caught as a
/// compiler bug.
pub struct RegisterData {
    /// Number of vector components, 1–4.
    pub num_components: u8,
    /// Size of the array dimension, or 0 for a plain scalar/vector.
    pub num_array_elems: u32,
    /// Index for liveness analysis, assigned by the owning allocation
    /// counter (the shader's for globals, the implementation's for locals).
    pub index: u32,
    /// Only for debug purposes, may be absent.
    pub name: Option<String>,
    /// Whether this register is per-shader rather than per-function.
    pub is_global: bool,
    /// Instructions that read this register, with multiplicity.
    pub uses: BTreeMap<Inst, u32>,
    /// Instructions that write this register, with multiplicity.
    pub defs: BTreeMap<Inst, u32>,
    /// `if` nodes whose condition reads this register, with multiplicity.
    pub if_uses: BTreeMap<IfNode, u32>,
}

impl RegisterData {
    /// A fresh unused register.
    pub fn new(index: u32, is_global: bool) -> Self {
        Self {
            num_components: 0,
            num_array_elems: 0,
            index,
            name: None,
            is_global,
            uses: BTreeMap::new(),
            defs: BTreeMap::new(),
            if_uses: BTreeMap::new(),
        }
    }

    /// Total number of recorded reads.
    pub fn total_uses(&self) -> u32 {
        self.uses.values().sum()
    }

    /// Total number of recorded writes.
    pub fn total_defs(&self) -> u32 {
        self.defs.values().sum()
    }
}

/// Add one occurrence of `key` to a bookkeeping multiset.
pub(crate) fn multiset_add<K: Ord>(set: &mut BTreeMap<K, u32>, key: K) {
    *set.entry(key).or_insert(0) += 1;
}

/// Remove one occurrence of `key` from a bookkeeping multiset. Removing a
/// key that is not present is a no-op, mirroring hash-table removal of a
/// missing entry.
pub(crate) fn multiset_remove<K: Ord>(set: &mut BTreeMap<K, u32>, key: &K) {
    if let Some(count) = set.get_mut(key) {
        *count -= 1;
        if *count == 0 {
            set.remove(key);
        }
    }
}
