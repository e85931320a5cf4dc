//! Candidate rules: a head pattern implied by a conjunction of body patterns.
//!
//! A [`Rule`] is an ordered sequence of [`TriplePattern`]s where index 0 is the
//! head and the rest form the body. Besides the atoms it caches the statistics
//! computed by the mining assistant (support, body sizes, bounds).
//!
//! Rules are never mutated in place by refinement: [`Rule::add_atom`] and
//! friends return a fresh child whose statistics are reset and whose parent
//! link points at the receiver's [`RuleId`] (when it has one).

pub mod arena;
pub mod pattern;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{RuleError, RuleResult};
use crate::symbol::{SymbolId, well_known};

pub use arena::RuleArena;
pub use pattern::{Position, Term, TriplePattern, Var};

// ---------------------------------------------------------------------------
// Identity and bookkeeping types
// ---------------------------------------------------------------------------

/// Stable arena index of a scored rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub u64);

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rule:{}", self.0)
    }
}

/// Which confidence measure drives output decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceMetric {
    Standard,
    #[default]
    Pca,
}

/// Lifecycle of a candidate. Every state after `Scored` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateState {
    Seeded,
    Scored,
    BoundRejected,
    ApproxRejected,
    ThresholdRejected,
    Dominated,
    Emitted,
}

impl CandidateState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CandidateState::Seeded | CandidateState::Scored)
    }
}

/// Head atom with variables erased; rules sharing it can subsume each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadSignature {
    pub relation: Option<SymbolId>,
    pub subject: Option<SymbolId>,
    pub object: Option<SymbolId>,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A candidate Horn rule with its cached statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    triples: Vec<TriplePattern>,
    functional_var: Var,
    functional_position: Position,
    support: u64,
    body_size: Option<u64>,
    pca_body_size: Option<u64>,
    head_coverage: Option<f64>,
    support_ratio: f64,
    std_confidence_upper_bound: Option<f64>,
    pca_confidence_upper_bound: Option<f64>,
    pca_estimation: Option<f64>,
    generation: usize,
    id: Option<RuleId>,
    parents: Vec<RuleId>,
}

impl Rule {
    /// Create a one-atom rule `=> head` counting on `functional_position`.
    pub fn seed(head: TriplePattern, functional_position: Position, support: u64) -> RuleResult<Self> {
        Self::from_atoms(vec![head], functional_position, support)
    }

    /// Create a rule from explicit atoms (head first).
    pub fn from_atoms(
        triples: Vec<TriplePattern>,
        functional_position: Position,
        support: u64,
    ) -> RuleResult<Self> {
        let Some(head) = triples.first() else {
            return Err(RuleError::EmptyRule {
                operation: "from_atoms",
            });
        };
        if head.relation_id().is_none() {
            return Err(RuleError::UnboundRelation {
                atom: head.to_string(),
            });
        }
        let Some(functional_var) = head.get(functional_position).as_var() else {
            return Err(RuleError::NotAVariable {
                rule: head.to_string(),
                position: functional_position.to_string(),
            });
        };
        Ok(Self {
            triples,
            functional_var,
            functional_position,
            support,
            body_size: None,
            pca_body_size: None,
            head_coverage: None,
            support_ratio: 0.0,
            std_confidence_upper_bound: None,
            pca_confidence_upper_bound: None,
            pca_estimation: None,
            generation: 1,
            id: None,
            parents: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Atoms
    // -----------------------------------------------------------------------

    pub fn triples(&self) -> &[TriplePattern] {
        &self.triples
    }

    pub fn head(&self) -> &TriplePattern {
        &self.triples[0]
    }

    pub fn body(&self) -> &[TriplePattern] {
        &self.triples[1..]
    }

    pub fn head_relation(&self) -> Option<SymbolId> {
        self.head().relation_id()
    }

    pub fn last_atom(&self) -> &TriplePattern {
        &self.triples[self.triples.len() - 1]
    }

    /// Number of body atoms.
    pub fn length(&self) -> usize {
        self.triples.len() - 1
    }

    /// Head plus body atoms.
    pub fn atom_count(&self) -> usize {
        self.triples.len()
    }

    fn is_auxiliary(atom: &TriplePattern, auxiliary: &[SymbolId]) -> bool {
        atom.relation_id()
            .is_some_and(|r| well_known::is_special(r) || auxiliary.contains(&r))
    }

    /// Atoms that count towards the length limit: the head plus every body atom
    /// whose relation is neither special nor listed in `auxiliary`.
    pub fn real_length(&self, auxiliary: &[SymbolId]) -> usize {
        1 + self
            .body()
            .iter()
            .filter(|a| !Self::is_auxiliary(a, auxiliary))
            .count()
    }

    /// Index of the last atom that is not auxiliary (the head when none is).
    pub fn last_real_index(&self, auxiliary: &[SymbolId]) -> usize {
        (1..self.triples.len())
            .rev()
            .find(|&i| !Self::is_auxiliary(&self.triples[i], auxiliary))
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    /// The head variable counted by support and confidence.
    pub fn functional_variable(&self) -> Var {
        self.functional_var
    }

    pub fn functional_position(&self) -> Position {
        self.functional_position
    }

    /// The head argument that is not counted.
    pub fn non_functional_position(&self) -> Position {
        self.functional_position.opposite()
    }

    /// Distinct variables in order of first appearance.
    pub fn variables(&self) -> Vec<Var> {
        let mut out = Vec::new();
        for atom in &self.triples {
            for v in atom.variables() {
                if !out.contains(&v) {
                    out.push(v);
                }
            }
        }
        out
    }

    pub fn head_variables(&self) -> Vec<Var> {
        self.head().variables()
    }

    fn occurrences(&self) -> HashMap<Var, usize> {
        let mut counts: HashMap<Var, usize> = HashMap::new();
        for (i, atom) in self.triples.iter().enumerate() {
            if i > 0 && atom.relation_id().is_some_and(well_known::is_special) {
                continue;
            }
            for v in atom.variables() {
                *counts.entry(v).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Variables occurring in fewer than two non-special atoms.
    pub fn open_variables(&self) -> Vec<Var> {
        let counts = self.occurrences();
        self.variables()
            .into_iter()
            .filter(|v| counts.get(v).copied().unwrap_or(0) < 2)
            .collect()
    }

    /// Every variable occurs in at least two non-special atoms.
    pub fn is_closed(&self) -> bool {
        self.open_variables().is_empty()
    }

    /// First variable slot not used by the rule.
    pub fn fresh_variable(&self) -> Var {
        self.variables()
            .into_iter()
            .max()
            .map(Var::next)
            .unwrap_or(Var(0))
    }

    // -----------------------------------------------------------------------
    // Language bias and redundancy
    // -----------------------------------------------------------------------

    /// How many atoms already use `relation`.
    pub fn cardinality_for_relation(&self, relation: SymbolId) -> usize {
        self.triples
            .iter()
            .filter(|a| a.relation_id() == Some(relation))
            .count()
    }

    pub fn contains_relation(&self, relation: SymbolId) -> bool {
        self.cardinality_for_relation(relation) > 0
    }

    /// Whether any two atoms could match the same fact.
    pub fn contains_unifiable_patterns(&self) -> bool {
        self.triples.iter().enumerate().any(|(i, a)| {
            self.triples[i + 1..].iter().any(|b| a.unifies_with(b))
        })
    }

    /// The last atom restates an atom already present (same relation, same
    /// terms, same direction).
    pub fn is_redundant_recursive(&self) -> bool {
        !self.redundant_atoms().is_empty()
    }

    /// Indices of earlier atoms identical to the last one.
    pub fn redundant_atoms(&self) -> Vec<usize> {
        let last = self.triples.len() - 1;
        let target = self.triples[last];
        (0..last).filter(|&i| self.triples[i] == target).collect()
    }

    /// Whether the body contains two sub-graphs that are identical up to the
    /// renaming of one non-head variable into another, e.g.
    /// `r(x, z) s(z, y) r(x, w) s(w, y) => h(x, y)`.
    pub fn contains_level2_redundant_subgraphs(&self) -> bool {
        let head_vars = self.head_variables();
        let inner: Vec<Var> = self
            .variables()
            .into_iter()
            .filter(|v| !head_vars.contains(v))
            .collect();
        let atoms_with = |v: Var| -> Vec<TriplePattern> {
            self.body()
                .iter()
                .filter(|a| a.contains_var(v))
                .copied()
                .collect()
        };
        for (i, &u) in inner.iter().enumerate() {
            let with_u = atoms_with(u);
            for &w in &inner[i + 1..] {
                let with_w = atoms_with(w);
                if with_u.is_empty() || with_u.len() != with_w.len() {
                    continue;
                }
                if with_u.iter().any(|a| a.contains_var(w)) {
                    continue;
                }
                let renamed: HashSet<TriplePattern> = with_u
                    .iter()
                    .map(|a| rename(a, u, w))
                    .collect();
                let target: HashSet<TriplePattern> = with_w.into_iter().collect();
                if renamed == target {
                    return true;
                }
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    /// Argument positions at which `a` and `b` share a variable.
    pub fn join_positions(a: &TriplePattern, b: &TriplePattern) -> Option<(Position, Position)> {
        for pa in Position::ARGUMENTS {
            let Term::Var(v) = a.get(pa) else { continue };
            for pb in Position::ARGUMENTS {
                if b.get(pb) == Term::Var(v) {
                    return Some((pa, pb));
                }
            }
        }
        None
    }

    /// Body atoms ordered as a chain from the functional variable to the other
    /// head variable, or `None` when the body is not a single unbranched path.
    pub fn canonical_path(&self) -> Option<Vec<TriplePattern>> {
        let head = self.head();
        let start = self.functional_var;
        let end = head.get(self.non_functional_position()).as_var()?;
        if start == end || self.body().is_empty() {
            return None;
        }
        for atom in self.body() {
            let simple = atom.relation_id().is_some_and(|r| !well_known::is_special(r))
                && atom.subject.is_var()
                && atom.object.is_var()
                && atom.subject != atom.object;
            if !simple {
                return None;
            }
        }

        let mut used = vec![false; self.body().len()];
        let mut path = Vec::with_capacity(self.body().len());
        let mut current = start;
        while current != end || path.is_empty() {
            let touching: Vec<usize> = (0..self.body().len())
                .filter(|&i| !used[i] && self.body()[i].contains_var(current))
                .collect();
            let &[idx] = touching.as_slice() else { return None };
            let atom = self.body()[idx];
            used[idx] = true;
            path.push(atom);
            current = if atom.subject == Term::Var(current) {
                atom.object.as_var()?
            } else {
                atom.subject.as_var()?
            };
            if current == start {
                return None;
            }
        }

        let consumed_all = used.iter().all(|u| *u);
        let end_only_once = self.body().iter().filter(|a| a.contains_var(end)).count() == 1;
        (consumed_all && end_only_once).then_some(path)
    }

    pub fn contains_single_path(&self) -> bool {
        self.canonical_path().is_some()
    }

    // -----------------------------------------------------------------------
    // Subsumption
    // -----------------------------------------------------------------------

    /// Whether `self` is a more general version of `other`: same head, and
    /// every body atom of `self` maps onto a distinct body atom of `other`
    /// under one substitution of non-head variables.
    pub fn subsumes(&self, other: &Rule) -> bool {
        if self.head() != other.head() || self.length() > other.length() {
            return false;
        }
        let mut binding: HashMap<Var, Term> = self
            .head_variables()
            .into_iter()
            .map(|v| (v, Term::Var(v)))
            .collect();
        let mut taken = vec![false; other.length()];
        embed(self.body(), other.body(), &mut binding, &mut taken)
    }

    pub fn head_signature(&self) -> HeadSignature {
        let head = self.head();
        HeadSignature {
            relation: head.relation_id(),
            subject: head.subject.as_const(),
            object: head.object.as_const(),
        }
    }

    // -----------------------------------------------------------------------
    // Refinement constructors
    // -----------------------------------------------------------------------

    /// Structural copy with statistics reset, one generation deeper, linked to
    /// `self` as its parent.
    fn child(&self) -> Rule {
        Rule {
            triples: self.triples.clone(),
            functional_var: self.functional_var,
            functional_position: self.functional_position,
            support: 0,
            body_size: None,
            pca_body_size: None,
            head_coverage: None,
            support_ratio: 0.0,
            std_confidence_upper_bound: None,
            pca_confidence_upper_bound: None,
            pca_estimation: None,
            generation: self.generation + 1,
            id: None,
            parents: self.id.into_iter().collect(),
        }
    }

    fn check_atom(&self, atom: &TriplePattern) -> RuleResult<()> {
        if atom.relation_id().is_none() {
            return Err(RuleError::UnboundRelation {
                atom: atom.to_string(),
            });
        }
        let vars = self.variables();
        if !atom.variables().iter().any(|v| vars.contains(v)) {
            return Err(RuleError::Disconnected {
                atom: atom.to_string(),
                rule: self.to_string(),
            });
        }
        Ok(())
    }

    /// Child rule with `atom` appended to the body and `support` recorded.
    pub fn add_atom(&self, atom: TriplePattern, support: u64) -> RuleResult<Rule> {
        self.check_atom(&atom)?;
        let mut child = self.child();
        child.triples.push(atom);
        child.support = support;
        Ok(child)
    }

    /// Child rule with two atoms appended at once (composite refinements).
    pub fn add_atoms(&self, first: TriplePattern, second: TriplePattern, support: u64) -> RuleResult<Rule> {
        self.check_atom(&first)?;
        let mut child = self.child();
        child.triples.push(first);
        child.check_atom(&second)?;
        child.triples.push(second);
        child.support = support;
        Ok(child)
    }

    /// Copy of this rule with the variable at `position` of the last atom
    /// replaced by `constant`. Generation and parents are kept: the result is
    /// a sibling of `self` in the search lattice, not a child.
    pub fn instantiate_constant(
        &self,
        position: Position,
        constant: SymbolId,
        support: u64,
    ) -> RuleResult<Rule> {
        let last = self.triples.len() - 1;
        let Term::Var(var) = self.triples[last].get(position) else {
            return Err(RuleError::NotAVariable {
                rule: self.to_string(),
                position: position.to_string(),
            });
        };
        if var == self.functional_var {
            return Err(RuleError::CountingVariable {
                rule: self.to_string(),
            });
        }
        let mut sibling = self.child();
        sibling.generation = self.generation;
        sibling.parents = self.parents.clone();
        sibling.triples[last].set(position, Term::Const(constant));
        sibling.support = support;
        Ok(sibling)
    }

    /// Child rule whose last type atom `rdf:type(x, C)` is narrowed to `subtype`.
    pub fn specialize_type_atom(&self, subtype: SymbolId, support: u64) -> RuleResult<Rule> {
        let idx = self.triples.len() - 1;
        let last = &self.triples[idx];
        if last.relation_id() != Some(well_known::TYPE) || last.object.is_var() {
            return Err(RuleError::NoTypeAtom {
                rule: self.to_string(),
            });
        }
        let mut child = self.child();
        child.triples[idx].object = Term::Const(subtype);
        child.support = support;
        Ok(child)
    }

    // -----------------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------------

    pub fn support(&self) -> u64 {
        self.support
    }

    pub fn set_support(&mut self, support: u64) {
        self.support = support;
    }

    pub fn body_size(&self) -> Option<u64> {
        self.body_size
    }

    pub fn set_body_size(&mut self, size: u64) {
        self.body_size = Some(size);
    }

    pub fn pca_body_size(&self) -> Option<u64> {
        self.pca_body_size
    }

    pub fn set_pca_body_size(&mut self, size: u64) {
        self.pca_body_size = Some(size);
    }

    /// `support / body_size`; undefined without a (non-zero) body size.
    pub fn std_confidence(&self) -> Option<f64> {
        self.body_size
            .filter(|&d| d > 0)
            .map(|d| self.support as f64 / d as f64)
    }

    /// `support / pca_body_size`; undefined without a (non-zero) PCA body size.
    pub fn pca_confidence(&self) -> Option<f64> {
        self.pca_body_size
            .filter(|&d| d > 0)
            .map(|d| self.support as f64 / d as f64)
    }

    pub fn confidence(&self, metric: ConfidenceMetric) -> Option<f64> {
        match metric {
            ConfidenceMetric::Standard => self.std_confidence(),
            ConfidenceMetric::Pca => self.pca_confidence(),
        }
    }

    pub fn head_coverage(&self) -> Option<f64> {
        self.head_coverage
    }

    pub fn set_head_coverage(&mut self, coverage: f64) {
        self.head_coverage = Some(coverage);
    }

    pub fn support_ratio(&self) -> f64 {
        self.support_ratio
    }

    pub fn set_support_ratio(&mut self, ratio: f64) {
        self.support_ratio = ratio;
    }

    pub fn std_confidence_upper_bound(&self) -> Option<f64> {
        self.std_confidence_upper_bound
    }

    pub fn pca_confidence_upper_bound(&self) -> Option<f64> {
        self.pca_confidence_upper_bound
    }

    pub fn set_confidence_upper_bounds(&mut self, std: f64, pca: f64) {
        self.std_confidence_upper_bound = Some(std);
        self.pca_confidence_upper_bound = Some(pca);
    }

    pub fn pca_estimation(&self) -> Option<f64> {
        self.pca_estimation
    }

    pub fn set_pca_estimation(&mut self, estimate: f64) {
        self.pca_estimation = Some(estimate);
    }

    // -----------------------------------------------------------------------
    // Lineage
    // -----------------------------------------------------------------------

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn id(&self) -> Option<RuleId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: RuleId) {
        self.id = Some(id);
    }

    pub fn parents(&self) -> &[RuleId] {
        &self.parents
    }

    /// Replace the parent links (instantiated atoms hang off the rule the
    /// dangling atom was added to, not off the dangling child).
    pub fn set_parents(&mut self, parents: Vec<RuleId>) {
        self.parents = parents;
    }

    pub fn add_parent(&mut self, parent: RuleId) {
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
    }

    /// Render with labels from a symbol table instead of raw ids.
    pub fn render(&self, symbols: &crate::symbol::SymbolTable) -> String {
        let term = |t: Term| match t {
            Term::Const(c) => symbols.label(c),
            Term::Var(v) => v.to_string(),
        };
        let atom = |a: &TriplePattern| format!("{} {} {}", term(a.subject), term(a.relation), term(a.object));
        let body: Vec<String> = self.body().iter().map(atom).collect();
        format!("{}   => {}", body.join("  "), atom(self.head()))
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for atom in self.body() {
            write!(f, "{atom}  ")?;
        }
        write!(f, " => {}", self.head())
    }
}

fn rename(atom: &TriplePattern, from: Var, to: Var) -> TriplePattern {
    let swap = |t: Term| if t == Term::Var(from) { Term::Var(to) } else { t };
    TriplePattern {
        subject: swap(atom.subject),
        relation: swap(atom.relation),
        object: swap(atom.object),
    }
}

/// Backtracking search for an injective embedding of `general` into `specific`.
fn embed(
    general: &[TriplePattern],
    specific: &[TriplePattern],
    binding: &mut HashMap<Var, Term>,
    taken: &mut [bool],
) -> bool {
    let Some((first, rest)) = general.split_first() else {
        return true;
    };
    for (i, target) in specific.iter().enumerate() {
        if taken[i] {
            continue;
        }
        let mut added = Vec::new();
        let mut ok = true;
        for (g, s) in first.terms().into_iter().zip(target.terms()) {
            match g {
                Term::Const(_) => ok = g == s,
                Term::Var(v) => match binding.get(&v) {
                    Some(bound) => ok = *bound == s,
                    None => {
                        binding.insert(v, s);
                        added.push(v);
                    }
                },
            }
            if !ok {
                break;
            }
        }
        if ok {
            taken[i] = true;
            if embed(rest, specific, binding, taken) {
                return true;
            }
            taken[i] = false;
        }
        for v in added {
            binding.remove(&v);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(raw: u64) -> SymbolId {
        SymbolId::new(raw).unwrap()
    }

    const X: Var = Var(0);
    const Y: Var = Var(1);
    const Z: Var = Var(2);
    const W: Var = Var(3);

    fn head() -> TriplePattern {
        TriplePattern::new(X, sym(100), Y)
    }

    fn seed() -> Rule {
        Rule::seed(head(), Position::Subject, 10).unwrap()
    }

    #[test]
    fn seed_requires_variable_at_counting_position() {
        let bound = TriplePattern::new(sym(5), sym(100), Y);
        assert!(matches!(
            Rule::seed(bound, Position::Subject, 1),
            Err(RuleError::NotAVariable { .. })
        ));
        assert!(matches!(
            Rule::from_atoms(vec![], Position::Subject, 0),
            Err(RuleError::EmptyRule { .. })
        ));
    }

    #[test]
    fn add_atom_leaves_receiver_untouched() {
        let mut parent = seed();
        parent.set_id(RuleId(7));
        parent.set_body_size(20);
        parent.set_pca_body_size(15);

        let child = parent
            .add_atom(TriplePattern::new(X, sym(101), Z), 4)
            .unwrap();
        drop(child);

        assert_eq!(parent.atom_count(), 1);
        assert_eq!(parent.support(), 10);
        assert_eq!(parent.body_size(), Some(20));
        assert_eq!(parent.pca_body_size(), Some(15));
    }

    #[test]
    fn add_atom_links_parent_and_resets_statistics() {
        let mut parent = seed();
        parent.set_id(RuleId(3));
        parent.set_body_size(20);
        let child = parent
            .add_atom(TriplePattern::new(X, sym(101), Z), 4)
            .unwrap();
        assert_eq!(child.parents(), &[RuleId(3)]);
        assert_eq!(child.generation(), 2);
        assert_eq!(child.support(), 4);
        assert_eq!(child.body_size(), None);
        assert_eq!(child.length(), 1);
        assert!(child.id().is_none());
    }

    #[test]
    fn add_atom_rejects_disconnected_and_unbound_atoms() {
        let rule = seed();
        assert!(matches!(
            rule.add_atom(TriplePattern::new(Z, sym(101), W), 1),
            Err(RuleError::Disconnected { .. })
        ));
        assert!(matches!(
            rule.add_atom(TriplePattern::new(X, Z, W), 1),
            Err(RuleError::UnboundRelation { .. })
        ));
    }

    #[test]
    fn closure_and_open_variables() {
        let rule = seed()
            .add_atom(TriplePattern::new(X, sym(101), Z), 1)
            .unwrap();
        assert_eq!(rule.open_variables(), vec![Y, Z]);
        assert!(!rule.is_closed());
        let closed = rule.add_atom(TriplePattern::new(Z, sym(102), Y), 1).unwrap();
        assert!(closed.is_closed());
        assert_eq!(closed.fresh_variable(), W);
    }

    #[test]
    fn special_body_atoms_do_not_close_variables() {
        let rule = seed()
            .add_atom(TriplePattern::new(X, well_known::DIFFERENT_FROM, Y), 1)
            .unwrap();
        assert!(!rule.is_closed());
        assert_eq!(rule.real_length(&[]), 1);
        assert_eq!(rule.length(), 1);
    }

    #[test]
    fn cardinality_for_relation_counts_head_and_body() {
        let rule = seed()
            .add_atom(TriplePattern::new(X, sym(100), Z), 1)
            .unwrap();
        assert_eq!(rule.cardinality_for_relation(sym(100)), 2);
        assert_eq!(rule.cardinality_for_relation(sym(999)), 0);
    }

    #[test]
    fn recursive_restatement_is_redundant() {
        let rule = seed().add_atom(head(), 10).unwrap();
        assert!(rule.is_redundant_recursive());
        let inverse = seed()
            .add_atom(TriplePattern::new(Y, sym(100), X), 3)
            .unwrap();
        assert!(!inverse.is_redundant_recursive());
    }

    #[test]
    fn unifiable_patterns() {
        let rule = seed()
            .add_atom(TriplePattern::new(X, sym(100), sym(50)), 1)
            .unwrap();
        assert!(rule.contains_unifiable_patterns());
        let other = seed()
            .add_atom(TriplePattern::new(X, sym(101), sym(50)), 1)
            .unwrap();
        assert!(!other.contains_unifiable_patterns());
    }

    #[test]
    fn instantiate_constant_keeps_lineage() {
        let mut parent = seed();
        parent.set_id(RuleId(1));
        let dangling = parent
            .add_atom(TriplePattern::new(X, sym(101), Z), 5)
            .unwrap();
        let bound = dangling
            .instantiate_constant(Position::Object, sym(77), 3)
            .unwrap();
        assert_eq!(bound.last_atom().object, Term::Const(sym(77)));
        assert_eq!(bound.generation(), dangling.generation());
        assert_eq!(bound.parents(), &[RuleId(1)]);
        assert_eq!(bound.support(), 3);
        assert!(matches!(
            bound.instantiate_constant(Position::Object, sym(78), 1),
            Err(RuleError::NotAVariable { .. })
        ));
    }

    #[test]
    fn instantiate_constant_protects_counting_variable() {
        let rule = seed();
        assert!(matches!(
            rule.instantiate_constant(Position::Subject, sym(5), 1),
            Err(RuleError::CountingVariable { .. })
        ));
        let object_bound = rule.instantiate_constant(Position::Object, sym(5), 2).unwrap();
        assert_eq!(object_bound.head().object, Term::Const(sym(5)));
    }

    #[test]
    fn single_path_detection() {
        // r1(x, z) r2(z, w) r3(w, y) => h(x, y)
        let chain = seed()
            .add_atom(TriplePattern::new(X, sym(101), Z), 1)
            .unwrap()
            .add_atom(TriplePattern::new(Z, sym(102), W), 1)
            .unwrap()
            .add_atom(TriplePattern::new(W, sym(103), Y), 1)
            .unwrap();
        let path = chain.canonical_path().unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0].relation_id(), Some(sym(101)));
        assert_eq!(path[2].relation_id(), Some(sym(103)));

        // Branching: a second atom on x.
        let branching = chain
            .add_atom(TriplePattern::new(X, sym(104), W), 1)
            .unwrap();
        assert!(!branching.contains_single_path());
    }

    #[test]
    fn canonical_path_follows_functional_variable() {
        // Counting on the object: the chain starts from y.
        let rule = Rule::seed(head(), Position::Object, 1)
            .unwrap()
            .add_atom(TriplePattern::new(X, sym(101), Z), 1)
            .unwrap()
            .add_atom(TriplePattern::new(Z, sym(102), Y), 1)
            .unwrap();
        let path = rule.canonical_path().unwrap();
        assert_eq!(path[0].relation_id(), Some(sym(102)));
        assert_eq!(path[1].relation_id(), Some(sym(101)));
    }

    #[test]
    fn level2_redundancy() {
        let rule = seed()
            .add_atom(TriplePattern::new(X, sym(101), Z), 1)
            .unwrap()
            .add_atom(TriplePattern::new(Z, sym(102), Y), 1)
            .unwrap()
            .add_atom(TriplePattern::new(X, sym(101), W), 1)
            .unwrap()
            .add_atom(TriplePattern::new(W, sym(102), Y), 1)
            .unwrap();
        assert!(rule.contains_level2_redundant_subgraphs());

        let distinct = seed()
            .add_atom(TriplePattern::new(X, sym(101), Z), 1)
            .unwrap()
            .add_atom(TriplePattern::new(Z, sym(102), Y), 1)
            .unwrap()
            .add_atom(TriplePattern::new(X, sym(101), W), 1)
            .unwrap()
            .add_atom(TriplePattern::new(W, sym(103), Y), 1)
            .unwrap();
        assert!(!distinct.contains_level2_redundant_subgraphs());
    }

    #[test]
    fn subsumption_up_to_renaming() {
        let general = seed()
            .add_atom(TriplePattern::new(X, sym(101), Z), 1)
            .unwrap()
            .add_atom(TriplePattern::new(Z, sym(102), Y), 1)
            .unwrap();
        // Same atoms, different fresh variable, plus one more atom.
        let specific = Rule::from_atoms(
            vec![
                head(),
                TriplePattern::new(X, sym(103), Y),
                TriplePattern::new(Var(5), sym(102), Y),
                TriplePattern::new(X, sym(101), Var(5)),
            ],
            Position::Subject,
            1,
        )
        .unwrap();
        assert!(general.subsumes(&specific));
        assert!(!specific.subsumes(&general));

        let other_head = Rule::seed(TriplePattern::new(X, sym(200), Y), Position::Subject, 1)
            .unwrap()
            .add_atom(TriplePattern::new(X, sym(101), Z), 1)
            .unwrap();
        assert!(!other_head.subsumes(&specific));
    }

    #[test]
    fn real_length_skips_auxiliary_relations() {
        let rule = seed()
            .add_atom(TriplePattern::new(X, well_known::TYPE, sym(9)), 1)
            .unwrap()
            .add_atom(TriplePattern::new(X, sym(101), Y), 1)
            .unwrap();
        assert_eq!(rule.real_length(&[]), 3);
        assert_eq!(rule.real_length(&[well_known::TYPE]), 2);
        assert_eq!(rule.last_real_index(&[]), 2);
    }

    #[test]
    fn confidence_undefined_without_denominator() {
        let mut rule = seed();
        assert_eq!(rule.std_confidence(), None);
        assert_eq!(rule.pca_confidence(), None);
        rule.set_body_size(20);
        rule.set_pca_body_size(0);
        assert_eq!(rule.std_confidence(), Some(0.5));
        assert_eq!(rule.pca_confidence(), None);
    }

    #[test]
    fn display_puts_body_before_head() {
        let rule = seed()
            .add_atom(TriplePattern::new(X, sym(101), Y), 1)
            .unwrap();
        assert_eq!(rule.to_string(), "?a sym:101 ?b   => ?a sym:100 ?b");
    }

    #[test]
    fn type_specialization_replaces_the_class() {
        let typed = seed()
            .add_atom(TriplePattern::new(X, well_known::TYPE, sym(9)), 4)
            .unwrap();
        let narrowed = typed.specialize_type_atom(sym(10), 2).unwrap();
        assert_eq!(narrowed.last_atom().object, Term::Const(sym(10)));
        assert_eq!(narrowed.length(), 1);
        assert_eq!(narrowed.generation(), typed.generation() + 1);
        assert!(matches!(
            seed().specialize_type_atom(sym(10), 1),
            Err(RuleError::NoTypeAtom { .. })
        ));
    }

    #[test]
    fn candidate_state_terminality() {
        assert!(!CandidateState::Scored.is_terminal());
        assert!(CandidateState::Dominated.is_terminal());
        assert!(CandidateState::Emitted.is_terminal());
    }
}
