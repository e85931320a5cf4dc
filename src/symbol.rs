//! Interned constants for the miner.
//!
//! Every entity and relation label in the fact store is identified by a
//! [`SymbolId`]. The [`SymbolTable`] provides thread-safe interning in both
//! directions. A handful of well-known relations are pre-interned with fixed
//! ids (see [`well_known`]) so that rules can recognise them without a table.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::SymbolError;

/// Unique, niche-optimized identifier for an interned constant.
///
/// Uses `NonZeroU64` so that `Option<SymbolId>` is the same size as `SymbolId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SymbolId(NonZeroU64);

impl SymbolId {
    /// Create a `SymbolId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(SymbolId)
    }

    /// Compile-time constructor for the reserved ids in [`well_known`].
    const fn reserved(raw: u64) -> Self {
        match NonZeroU64::new(raw) {
            Some(n) => SymbolId(n),
            None => panic!("reserved symbol ids start at 1"),
        }
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sym:{}", self.0)
    }
}

/// Relations with a fixed meaning for the miner.
pub mod well_known {
    use super::SymbolId;

    /// `equals(x, y)`: built-in identity, evaluated by the store.
    pub const EQUALS: SymbolId = SymbolId::reserved(1);
    /// `differentFrom(x, y)`: built-in inequality, evaluated by the store.
    pub const DIFFERENT_FROM: SymbolId = SymbolId::reserved(2);
    /// `rdf:type`
    pub const TYPE: SymbolId = SymbolId::reserved(3);
    /// `rdfs:subClassOf`
    pub const SUB_CLASS_OF: SymbolId = SymbolId::reserved(4);
    /// `rdfs:domain`
    pub const DOMAIN: SymbolId = SymbolId::reserved(5);
    /// `rdfs:range`
    pub const RANGE: SymbolId = SymbolId::reserved(6);
    /// `<linksTo>`: wiki-link relation used by link prediction.
    pub const LINKS_TO: SymbolId = SymbolId::reserved(7);

    /// Labels of the reserved ids, in id order.
    pub const LABELS: [(SymbolId, &str); 7] = [
        (EQUALS, "equals"),
        (DIFFERENT_FROM, "differentFrom"),
        (TYPE, "rdf:type"),
        (SUB_CLASS_OF, "rdfs:subClassOf"),
        (DOMAIN, "rdfs:domain"),
        (RANGE, "rdfs:range"),
        (LINKS_TO, "<linksTo>"),
    ];

    /// Special relations do not count towards closure or rule length.
    pub fn is_special(relation: SymbolId) -> bool {
        relation == EQUALS || relation == DIFFERENT_FROM
    }
}

/// Thread-safe bidirectional label ↔ id interner.
///
/// Labels are matched exactly (relation names such as `rdf:type` are case
/// sensitive in fact files). The well-known relations are always present.
#[derive(Debug)]
pub struct SymbolTable {
    id_to_label: DashMap<SymbolId, String>,
    label_to_id: DashMap<String, SymbolId>,
    next: AtomicU64,
}

impl SymbolTable {
    /// Create a table holding only the well-known relations.
    pub fn new() -> Self {
        let table = Self {
            id_to_label: DashMap::new(),
            label_to_id: DashMap::new(),
            next: AtomicU64::new(well_known::LABELS.len() as u64 + 1),
        };
        for (id, label) in well_known::LABELS {
            table.id_to_label.insert(id, label.to_string());
            table.label_to_id.insert(label.to_string(), id);
        }
        table
    }

    /// Return the id of `label`, allocating one if it was never seen.
    pub fn intern(&self, label: &str) -> Result<SymbolId, SymbolError> {
        if let Some(id) = self.label_to_id.get(label) {
            return Ok(*id.value());
        }
        // The entry API holds the shard lock, so two racing callers get one id.
        let entry = self.label_to_id.entry(label.to_string());
        match entry {
            dashmap::mapref::entry::Entry::Occupied(e) => Ok(*e.get()),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                let raw = self.next.fetch_add(1, Ordering::Relaxed);
                let id = SymbolId::new(raw).ok_or(SymbolError::AllocatorExhausted)?;
                self.id_to_label.insert(id, label.to_string());
                e.insert(id);
                Ok(id)
            }
        }
    }

    /// Look up the id of a label without interning it.
    pub fn lookup(&self, label: &str) -> Option<SymbolId> {
        self.label_to_id.get(label).map(|r| *r.value())
    }

    /// Label of an id, falling back to `sym:{id}`.
    pub fn label(&self, id: SymbolId) -> String {
        self.id_to_label
            .get(&id)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Number of interned symbols, well-known relations included.
    pub fn len(&self) -> usize {
        self.id_to_label.len()
    }

    /// Whether only the well-known relations are present.
    pub fn is_empty(&self) -> bool {
        self.len() == well_known::LABELS.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
