//! The fact store contract consumed by the miner.
//!
//! The miner never inspects facts directly: every statistic goes through the
//! aggregate queries of [`FactStore`]. Implementations must be safe for
//! concurrent reads; the mining pipeline calls them from many workers.
//!
//! [`MemStore`](mem::MemStore) is an indexed in-memory implementation.

pub mod mem;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::rule::{Position, Term, TriplePattern, Var};
use crate::symbol::SymbolId;

pub use mem::MemStore;

/// One side of a relation's facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Subject,
    Object,
}

impl Column {
    /// The column an argument position reads from. `Relation` has no column.
    pub fn of(position: Position) -> Option<Column> {
        match position {
            Position::Subject => Some(Column::Subject),
            Position::Object => Some(Column::Object),
            Position::Relation => None,
        }
    }

    pub fn opposite(self) -> Column {
        match self {
            Column::Subject => Column::Object,
            Column::Object => Column::Subject,
        }
    }
}

/// How two relations are joined when measuring their overlap.
///
/// `SubjectObject` compares the subjects of the first relation with the
/// objects of the second, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinMode {
    SubjectSubject,
    SubjectObject,
    ObjectSubject,
    ObjectObject,
}

impl JoinMode {
    pub fn from_columns(first: Column, second: Column) -> JoinMode {
        match (first, second) {
            (Column::Subject, Column::Subject) => JoinMode::SubjectSubject,
            (Column::Subject, Column::Object) => JoinMode::SubjectObject,
            (Column::Object, Column::Subject) => JoinMode::ObjectSubject,
            (Column::Object, Column::Object) => JoinMode::ObjectObject,
        }
    }

    /// Join mode for two argument positions; `None` if either is the relation.
    pub fn from_positions(first: Position, second: Position) -> Option<JoinMode> {
        Some(Self::from_columns(Column::of(first)?, Column::of(second)?))
    }

    pub fn columns(self) -> (Column, Column) {
        match self {
            JoinMode::SubjectSubject => (Column::Subject, Column::Subject),
            JoinMode::SubjectObject => (Column::Subject, Column::Object),
            JoinMode::ObjectSubject => (Column::Object, Column::Subject),
            JoinMode::ObjectObject => (Column::Object, Column::Object),
        }
    }
}

/// Shape of a two-atom body that makes the exact denominator expensive.
///
/// `first_atom` and `second_atom` index the body (head excluded); the join
/// positions say where the shared variable sits in each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardQueryInfo {
    pub first_join: Position,
    pub second_join: Position,
    pub first_atom: usize,
    pub second_atom: usize,
}

/// Aggregate queries over `(subject, relation, object)` facts.
///
/// Pattern lists are conjunctions. Variables may appear in any position,
/// including the relation. The special relations `equals` and
/// `differentFrom` are evaluated as built-ins; a store that cannot evaluate a
/// shape reports [`StoreError::Unsupported`](crate::error::StoreError::Unsupported).
pub trait FactStore: Send + Sync {
    /// Distinct bindings of `var` satisfying all `patterns`.
    fn count_distinct(&self, var: Var, patterns: &[TriplePattern]) -> StoreResult<u64>;

    /// Distinct `(a, b)` binding pairs satisfying all `patterns`.
    fn count_distinct_pairs(&self, a: Var, b: Var, patterns: &[TriplePattern]) -> StoreResult<u64>;

    /// Number of solutions (full variable assignments) of `patterns`.
    fn count(&self, patterns: &[TriplePattern]) -> StoreResult<u64>;

    /// For every value of `target`, the number of distinct bindings of
    /// `counting` that satisfy `patterns` together with it.
    fn frequent_bindings_of(
        &self,
        target: Var,
        counting: Var,
        patterns: &[TriplePattern],
    ) -> StoreResult<HashMap<SymbolId, u64>>;

    /// For every value of `projection`, the number of distinct bindings of
    /// the head's variables that satisfy `head` and `body` together.
    fn count_projection_bindings(
        &self,
        head: &TriplePattern,
        body: &[TriplePattern],
        projection: Var,
    ) -> StoreResult<HashMap<SymbolId, u64>>;

    /// Fraction of subjects of `relation` mapped to one object, in `[0, 1]`.
    fn functionality(&self, relation: SymbolId) -> f64;

    /// Fraction of objects of `relation` mapped from one subject, in `[0, 1]`.
    fn inverse_functionality(&self, relation: SymbolId) -> f64;

    /// Number of entities in both the `mode` columns of `a` and `b`.
    fn overlap(&self, a: SymbolId, b: SymbolId, mode: JoinMode) -> u64;

    /// Distinct entities in one column of `relation`.
    fn relation_column_size(&self, relation: SymbolId, column: Column) -> u64;

    /// Number of facts with `relation`.
    fn relation_size(&self, relation: SymbolId) -> u64;

    /// Every relation with at least one fact.
    fn relations(&self) -> Vec<SymbolId>;

    /// Total number of facts.
    fn size(&self) -> u64;

    /// Functionality read in the given direction: `inverted` swaps the roles
    /// of subject and object.
    fn directed_functionality(&self, relation: SymbolId, inverted: bool) -> f64 {
        if inverted {
            self.inverse_functionality(relation)
        } else {
            self.functionality(relation)
        }
    }

    /// Functionality keyed on `column`: how often an entity of that column
    /// maps to a single entity of the other one.
    fn column_functionality(&self, relation: SymbolId, column: Column) -> f64 {
        match column {
            Column::Subject => self.functionality(relation),
            Column::Object => self.inverse_functionality(relation),
        }
    }

    fn identify_hard_query_type_i(&self, body: &[TriplePattern]) -> Option<HardQueryInfo> {
        hard_query_type_i(body)
    }

    fn identify_hard_query_type_iii(&self, body: &[TriplePattern]) -> Option<HardQueryInfo> {
        hard_query_type_iii(body)
    }
}

/// The single variable shared by two atoms, with its argument positions.
fn shared_variable(a: &TriplePattern, b: &TriplePattern) -> Option<(Position, Position)> {
    let mut found = None;
    for pa in Position::ARGUMENTS {
        let Term::Var(v) = a.get(pa) else {
            return None;
        };
        for pb in Position::ARGUMENTS {
            if b.get(pb) == Term::Var(v) {
                if found.is_some() {
                    return None;
                }
                found = Some((pa, pb));
            }
        }
    }
    found
}

fn two_variable_atoms(body: &[TriplePattern]) -> Option<(&TriplePattern, &TriplePattern)> {
    let [a, b] = body else { return None };
    let simple = |p: &TriplePattern| {
        p.relation_id().is_some() && p.subject.is_var() && p.object.is_var() && p.subject != p.object
    };
    (simple(a) && simple(b)).then_some((a, b))
}

/// `r(x, z) r(y, z)` or `r(z, x) r(z, y)`: two atoms of one relation joined
/// on the same column, all other arguments distinct variables.
pub fn hard_query_type_i(body: &[TriplePattern]) -> Option<HardQueryInfo> {
    let (a, b) = two_variable_atoms(body)?;
    if a.relation != b.relation {
        return None;
    }
    let (pa, pb) = shared_variable(a, b)?;
    (pa == pb).then_some(HardQueryInfo {
        first_join: pa,
        second_join: pb,
        first_atom: 0,
        second_atom: 1,
    })
}

/// `r(x, z) s(z, y)` and its variants: two atoms of different relations
/// sharing exactly one variable.
pub fn hard_query_type_iii(body: &[TriplePattern]) -> Option<HardQueryInfo> {
    let (a, b) = two_variable_atoms(body)?;
    if a.relation == b.relation {
        return None;
    }
    let (pa, pb) = shared_variable(a, b)?;
    Some(HardQueryInfo {
        first_join: pa,
        second_join: pb,
        first_atom: 0,
        second_atom: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(raw: u64) -> SymbolId {
        SymbolId::new(raw).unwrap()
    }

    #[test]
    fn join_mode_from_positions() {
        assert_eq!(
            JoinMode::from_positions(Position::Subject, Position::Object),
            Some(JoinMode::SubjectObject)
        );
        assert_eq!(JoinMode::from_positions(Position::Relation, Position::Object), None);
        assert_eq!(
            JoinMode::ObjectSubject.columns(),
            (Column::Object, Column::Subject)
        );
    }

    #[test]
    fn type_i_needs_same_relation_and_column() {
        let r = sym(10);
        let body = [
            TriplePattern::new(Var(0), r, Var(2)),
            TriplePattern::new(Var(1), r, Var(2)),
        ];
        let info = hard_query_type_i(&body).unwrap();
        assert_eq!(info.first_join, Position::Object);
        assert_eq!(info.second_join, Position::Object);

        let crossed = [
            TriplePattern::new(Var(0), r, Var(2)),
            TriplePattern::new(Var(2), r, Var(1)),
        ];
        assert!(hard_query_type_i(&crossed).is_none());
        assert!(hard_query_type_iii(&crossed).is_none());
    }

    #[test]
    fn type_iii_needs_different_relations() {
        let body = [
            TriplePattern::new(Var(0), sym(10), Var(2)),
            TriplePattern::new(Var(2), sym(11), Var(1)),
        ];
        let info = hard_query_type_iii(&body).unwrap();
        assert_eq!(info.first_join, Position::Object);
        assert_eq!(info.second_join, Position::Subject);
        assert!(hard_query_type_i(&body).is_none());
    }

    #[test]
    fn hard_queries_reject_constants_and_double_joins() {
        let with_constant = [
            TriplePattern::new(Var(0), sym(10), sym(50)),
            TriplePattern::new(Var(1), sym(10), sym(50)),
        ];
        assert!(hard_query_type_i(&with_constant).is_none());

        let parallel = [
            TriplePattern::new(Var(0), sym(10), Var(1)),
            TriplePattern::new(Var(0), sym(11), Var(1)),
        ];
        assert!(hard_query_type_iii(&parallel).is_none());

        let three = [
            TriplePattern::new(Var(0), sym(10), Var(2)),
            TriplePattern::new(Var(1), sym(10), Var(2)),
            TriplePattern::new(Var(1), sym(11), Var(3)),
        ];
        assert!(hard_query_type_i(&three).is_none());
    }
}
