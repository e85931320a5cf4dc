//! In-memory fact store with per-relation subject and object indexes.
//!
//! Conjunctive queries are answered by backtracking: at each step the pattern
//! with the fewest matching facts under the current bindings is joined next.
//! Built once, then read concurrently; all queries take `&self`.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use crate::error::{StoreError, StoreResult, SymbolError};
use crate::rule::{Term, TriplePattern, Var};
use crate::symbol::{SymbolId, SymbolTable, well_known};

use super::{Column, FactStore, JoinMode};

type Fact = [SymbolId; 3];
type Binding = HashMap<Var, SymbolId>;

#[derive(Debug, Default)]
struct RelationIndex {
    by_subject: HashMap<SymbolId, HashSet<SymbolId>>,
    by_object: HashMap<SymbolId, HashSet<SymbolId>>,
    size: u64,
}

impl RelationIndex {
    fn column(&self, column: Column) -> &HashMap<SymbolId, HashSet<SymbolId>> {
        match column {
            Column::Subject => &self.by_subject,
            Column::Object => &self.by_object,
        }
    }
}

/// Indexed triple store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemStore {
    relations: HashMap<SymbolId, RelationIndex>,
    entities: HashSet<SymbolId>,
    size: u64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fact. Returns `false` for duplicates and for the built-in
    /// relations, which are never stored.
    pub fn add(&mut self, subject: SymbolId, relation: SymbolId, object: SymbolId) -> bool {
        if well_known::is_special(relation) {
            return false;
        }
        let index = self.relations.entry(relation).or_default();
        if !index.by_subject.entry(subject).or_default().insert(object) {
            return false;
        }
        index.by_object.entry(object).or_default().insert(subject);
        index.size += 1;
        self.entities.insert(subject);
        self.entities.insert(object);
        self.size += 1;
        true
    }

    /// Intern the three labels and insert the fact.
    pub fn add_labels(
        &mut self,
        symbols: &SymbolTable,
        subject: &str,
        relation: &str,
        object: &str,
    ) -> Result<bool, SymbolError> {
        let s = symbols.intern(subject)?;
        let r = symbols.intern(relation)?;
        let o = symbols.intern(object)?;
        Ok(self.add(s, r, o))
    }

    /// Read `subject<TAB>relation<TAB>object` lines. Blank lines and lines
    /// starting with `#` are skipped; a trailing ` .` is tolerated.
    pub fn from_reader(reader: impl BufRead, symbols: &SymbolTable) -> StoreResult<Self> {
        let mut store = Self::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| StoreError::Io { source })?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line
                .strip_suffix(" .")
                .or_else(|| line.strip_suffix("\t."))
                .unwrap_or(line);
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let [s, r, o] = fields[..] else {
                return Err(StoreError::Corrupt {
                    line: i + 1,
                    message: format!("expected 3 tab-separated fields, found {}", fields.len()),
                });
            };
            store
                .add_labels(symbols, s, r, o)
                .map_err(|e| StoreError::Corrupt {
                    line: i + 1,
                    message: e.to_string(),
                })?;
        }
        tracing::info!(
            facts = store.size,
            relations = store.relations.len(),
            entities = store.entities.len(),
            "fact store loaded"
        );
        Ok(store)
    }

    pub fn load_tsv(path: &Path, symbols: &SymbolTable) -> StoreResult<Self> {
        let file = std::fs::File::open(path).map_err(|source| StoreError::Io { source })?;
        Self::from_reader(std::io::BufReader::new(file), symbols)
    }

    // -----------------------------------------------------------------------
    // Query evaluation
    // -----------------------------------------------------------------------

    fn resolve(term: Term, binding: &Binding) -> Option<SymbolId> {
        match term {
            Term::Const(c) => Some(c),
            Term::Var(v) => binding.get(&v).copied(),
        }
    }

    /// `differentFrom` can only filter; it waits until both sides are bound.
    fn is_deferred(pattern: &TriplePattern, binding: &Binding) -> bool {
        Self::resolve(pattern.relation, binding) == Some(well_known::DIFFERENT_FROM)
            && (Self::resolve(pattern.subject, binding).is_none()
                || Self::resolve(pattern.object, binding).is_none())
    }

    fn match_relation(
        &self,
        relation: SymbolId,
        subject: Option<SymbolId>,
        object: Option<SymbolId>,
        out: &mut Vec<Fact>,
    ) {
        let Some(index) = self.relations.get(&relation) else {
            return;
        };
        match (subject, object) {
            (Some(s), Some(o)) => {
                if index.by_subject.get(&s).is_some_and(|objs| objs.contains(&o)) {
                    out.push([s, relation, o]);
                }
            }
            (Some(s), None) => {
                if let Some(objs) = index.by_subject.get(&s) {
                    out.extend(objs.iter().map(|&o| [s, relation, o]));
                }
            }
            (None, Some(o)) => {
                if let Some(subjs) = index.by_object.get(&o) {
                    out.extend(subjs.iter().map(|&s| [s, relation, o]));
                }
            }
            (None, None) => {
                for (&s, objs) in &index.by_subject {
                    out.extend(objs.iter().map(|&o| [s, relation, o]));
                }
            }
        }
    }

    /// Facts (or built-in pseudo facts) consistent with the bound parts of
    /// `pattern`.
    fn matches(&self, pattern: &TriplePattern, binding: &Binding) -> StoreResult<Vec<Fact>> {
        let s = Self::resolve(pattern.subject, binding);
        let r = Self::resolve(pattern.relation, binding);
        let o = Self::resolve(pattern.object, binding);
        let mut out = Vec::new();
        match r {
            Some(rel) if rel == well_known::EQUALS => match (s, o) {
                (Some(x), Some(y)) => {
                    if x == y {
                        out.push([x, rel, y]);
                    }
                }
                (Some(x), None) | (None, Some(x)) => out.push([x, rel, x]),
                (None, None) => out.extend(self.entities.iter().map(|&e| [e, rel, e])),
            },
            Some(rel) if rel == well_known::DIFFERENT_FROM => match (s, o) {
                (Some(x), Some(y)) => {
                    if x != y {
                        out.push([x, rel, y]);
                    }
                }
                _ => {
                    return Err(StoreError::Unsupported {
                        message: format!("differentFrom with an unbound argument in '{pattern}'"),
                    });
                }
            },
            Some(rel) => self.match_relation(rel, s, o, &mut out),
            None => {
                for &rel in self.relations.keys() {
                    self.match_relation(rel, s, o, &mut out);
                }
            }
        }
        Ok(out)
    }

    /// Extend `binding` with the variables of `pattern` read from `fact`.
    /// Newly bound variables are recorded in `added` even on failure.
    fn bind(pattern: &TriplePattern, fact: Fact, binding: &mut Binding, added: &mut Vec<Var>) -> bool {
        for (term, value) in pattern.terms().into_iter().zip(fact) {
            if let Term::Var(v) = term {
                match binding.get(&v) {
                    Some(&bound) if bound != value => return false,
                    Some(_) => {}
                    None => {
                        binding.insert(v, value);
                        added.push(v);
                    }
                }
            }
        }
        true
    }

    fn solve(
        &self,
        patterns: &[TriplePattern],
        binding: &mut Binding,
        visit: &mut dyn FnMut(&Binding),
    ) -> StoreResult<()> {
        if patterns.is_empty() {
            visit(binding);
            return Ok(());
        }

        let mut best: Option<(usize, Vec<Fact>)> = None;
        for (i, pattern) in patterns.iter().enumerate() {
            if Self::is_deferred(pattern, binding) {
                continue;
            }
            let candidates = self.matches(pattern, binding)?;
            let better = best.as_ref().is_none_or(|(_, b)| candidates.len() < b.len());
            if better {
                let empty = candidates.is_empty();
                best = Some((i, candidates));
                if empty {
                    break;
                }
            }
        }
        let Some((chosen, candidates)) = best else {
            return Err(StoreError::Unsupported {
                message: format!(
                    "differentFrom over unbound variables in '{}'",
                    patterns
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("  ")
                ),
            });
        };

        let rest: Vec<TriplePattern> = patterns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != chosen)
            .map(|(_, p)| *p)
            .collect();
        for fact in candidates {
            let mut added = Vec::new();
            if Self::bind(&patterns[chosen], fact, binding, &mut added) {
                self.solve(&rest, binding, visit)?;
            }
            for v in added {
                binding.remove(&v);
            }
        }
        Ok(())
    }

    fn for_each_solution(
        &self,
        patterns: &[TriplePattern],
        mut visit: impl FnMut(&Binding),
    ) -> StoreResult<()> {
        let mut binding = Binding::new();
        self.solve(patterns, &mut binding, &mut visit)
    }
}

impl FactStore for MemStore {
    fn count_distinct(&self, var: Var, patterns: &[TriplePattern]) -> StoreResult<u64> {
        let mut seen = HashSet::new();
        self.for_each_solution(patterns, |b| {
            if let Some(&v) = b.get(&var) {
                seen.insert(v);
            }
        })?;
        Ok(seen.len() as u64)
    }

    fn count_distinct_pairs(&self, a: Var, b: Var, patterns: &[TriplePattern]) -> StoreResult<u64> {
        let mut seen = HashSet::new();
        self.for_each_solution(patterns, |binding| {
            if let (Some(&x), Some(&y)) = (binding.get(&a), binding.get(&b)) {
                seen.insert((x, y));
            }
        })?;
        Ok(seen.len() as u64)
    }

    fn count(&self, patterns: &[TriplePattern]) -> StoreResult<u64> {
        let mut n = 0u64;
        self.for_each_solution(patterns, |_| n += 1)?;
        Ok(n)
    }

    fn frequent_bindings_of(
        &self,
        target: Var,
        counting: Var,
        patterns: &[TriplePattern],
    ) -> StoreResult<HashMap<SymbolId, u64>> {
        let mut groups: HashMap<SymbolId, HashSet<SymbolId>> = HashMap::new();
        self.for_each_solution(patterns, |b| {
            if let (Some(&t), Some(&c)) = (b.get(&target), b.get(&counting)) {
                groups.entry(t).or_default().insert(c);
            }
        })?;
        Ok(groups
            .into_iter()
            .map(|(k, v)| (k, v.len() as u64))
            .collect())
    }

    fn count_projection_bindings(
        &self,
        head: &TriplePattern,
        body: &[TriplePattern],
        projection: Var,
    ) -> StoreResult<HashMap<SymbolId, u64>> {
        let head_vars: Vec<Var> = head
            .variables()
            .into_iter()
            .filter(|v| *v != projection)
            .collect();
        let mut all = Vec::with_capacity(body.len() + 1);
        all.push(*head);
        all.extend_from_slice(body);

        let mut groups: HashMap<SymbolId, HashSet<Vec<SymbolId>>> = HashMap::new();
        self.for_each_solution(&all, |b| {
            let Some(&p) = b.get(&projection) else { return };
            let key: Option<Vec<SymbolId>> = head_vars.iter().map(|v| b.get(v).copied()).collect();
            if let Some(key) = key {
                groups.entry(p).or_default().insert(key);
            }
        })?;
        Ok(groups
            .into_iter()
            .map(|(k, v)| (k, v.len() as u64))
            .collect())
    }

    fn functionality(&self, relation: SymbolId) -> f64 {
        match self.relations.get(&relation) {
            Some(index) if index.size > 0 => index.by_subject.len() as f64 / index.size as f64,
            _ => 0.0,
        }
    }

    fn inverse_functionality(&self, relation: SymbolId) -> f64 {
        match self.relations.get(&relation) {
            Some(index) if index.size > 0 => index.by_object.len() as f64 / index.size as f64,
            _ => 0.0,
        }
    }

    fn overlap(&self, a: SymbolId, b: SymbolId, mode: JoinMode) -> u64 {
        let (Some(ia), Some(ib)) = (self.relations.get(&a), self.relations.get(&b)) else {
            return 0;
        };
        let (ca, cb) = mode.columns();
        let (left, right) = (ia.column(ca), ib.column(cb));
        let (small, large) = if left.len() <= right.len() {
            (left, right)
        } else {
            (right, left)
        };
        small.keys().filter(|e| large.contains_key(e)).count() as u64
    }

    fn relation_column_size(&self, relation: SymbolId, column: Column) -> u64 {
        self.relations
            .get(&relation)
            .map(|index| index.column(column).len() as u64)
            .unwrap_or(0)
    }

    fn relation_size(&self, relation: SymbolId) -> u64 {
        self.relations.get(&relation).map(|i| i.size).unwrap_or(0)
    }

    fn relations(&self) -> Vec<SymbolId> {
        let mut out: Vec<SymbolId> = self.relations.keys().copied().collect();
        out.sort();
        out
    }

    fn size(&self) -> u64 {
        self.size
    }
}
