//! Read-only relation statistics captured once per mining run.

use std::collections::HashMap;

use crate::error::StoreResult;
use crate::rule::{Position, TriplePattern, Var};
use crate::store::{Column, FactStore};
use crate::symbol::SymbolId;

/// Fact count and distinct subjects/objects of one relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationSizes {
    pub facts: u64,
    pub subjects: u64,
    pub objects: u64,
}

/// Relation sizes and entity counts, frozen at construction.
#[derive(Debug, Clone, Default)]
pub struct RelationSnapshot {
    relation_sizes: HashMap<SymbolId, RelationSizes>,
    total_subjects: u64,
    total_objects: u64,
    fact_count: u64,
}

impl RelationSnapshot {
    pub fn build(store: &dyn FactStore) -> StoreResult<Self> {
        let relation_sizes: HashMap<SymbolId, RelationSizes> = store
            .relations()
            .into_iter()
            .map(|r| {
                let sizes = RelationSizes {
                    facts: store.relation_size(r),
                    subjects: store.relation_column_size(r, Column::Subject),
                    objects: store.relation_column_size(r, Column::Object),
                };
                (r, sizes)
            })
            .collect();
        let all = [TriplePattern::new(Var(0), Var(1), Var(2))];
        let total_subjects = store.count_distinct(Var(0), &all)?;
        let total_objects = store.count_distinct(Var(2), &all)?;
        let snapshot = Self {
            relation_sizes,
            total_subjects,
            total_objects,
            fact_count: store.size(),
        };
        tracing::info!(
            relations = snapshot.relation_sizes.len(),
            subjects = snapshot.total_subjects,
            objects = snapshot.total_objects,
            facts = snapshot.fact_count,
            "relation snapshot built"
        );
        Ok(snapshot)
    }

    /// Facts of `relation`; zero for relations the store never held.
    pub fn relation_size(&self, relation: SymbolId) -> u64 {
        self.sizes(relation).facts
    }

    pub fn sizes(&self, relation: SymbolId) -> RelationSizes {
        self.relation_sizes.get(&relation).copied().unwrap_or_default()
    }

    /// Distinct entities of `relation` at `position`.
    pub fn column_size(&self, relation: SymbolId, position: Position) -> u64 {
        let sizes = self.sizes(relation);
        match position {
            Position::Object => sizes.objects,
            _ => sizes.subjects,
        }
    }

    /// Distinct entities that can fill `position` in any fact.
    pub fn total_count(&self, position: Position) -> u64 {
        match position {
            Position::Object => self.total_objects,
            _ => self.total_subjects,
        }
    }

    pub fn fact_count(&self) -> u64 {
        self.fact_count
    }

    /// Relations with their sizes, largest first.
    pub fn relations_by_size(&self) -> Vec<(SymbolId, u64)> {
        let mut out: Vec<(SymbolId, u64)> = self
            .relation_sizes
            .iter()
            .map(|(r, sizes)| (*r, sizes.facts))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        out
    }
}
