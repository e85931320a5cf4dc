//! Class hierarchy used by type specialization.
//!
//! Built from `rdfs:subClassOf` facts. Only immediate subclasses are kept:
//! the type-specialized operator narrows one level per refinement, so the
//! search itself walks the lattice downwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::rule::{TriplePattern, Var};
use crate::store::FactStore;
use crate::symbol::{SymbolId, well_known};

/// Immediate `rdfs:subClassOf` edges, indexed by superclass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeHierarchy {
    subclasses: HashMap<SymbolId, Vec<SymbolId>>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `sub rdfs:subClassOf sup`. Self loops are ignored.
    pub fn add_subclass(&mut self, sub: SymbolId, sup: SymbolId) {
        if sub == sup {
            return;
        }
        let subs = self.subclasses.entry(sup).or_default();
        if !subs.contains(&sub) {
            subs.push(sub);
        }
    }

    /// Read every `rdfs:subClassOf` fact of `store`.
    pub fn from_store(store: &dyn FactStore) -> StoreResult<Self> {
        let (sub, sup) = (Var(0), Var(1));
        let pattern = [TriplePattern::new(sub, well_known::SUB_CLASS_OF, sup)];
        let mut hierarchy = Self::new();
        for class in store.frequent_bindings_of(sup, sub, &pattern)?.into_keys() {
            let children = [TriplePattern::new(sub, well_known::SUB_CLASS_OF, class)];
            for child in store.frequent_bindings_of(sub, sub, &children)?.into_keys() {
                hierarchy.add_subclass(child, class);
            }
        }
        for subs in hierarchy.subclasses.values_mut() {
            subs.sort();
        }
        tracing::info!(classes = hierarchy.subclasses.len(), "type hierarchy built");
        Ok(hierarchy)
    }

    /// Immediate subclasses of `class`.
    pub fn subtypes(&self, class: SymbolId) -> &[SymbolId] {
        self.subclasses.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.subclasses.is_empty()
    }
}
