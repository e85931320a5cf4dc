//! Seed rules and the four standard refinement operators.
//!
//! Every operator is read-only with respect to the store and never mutates
//! the rule it refines. Store failures propagate and abort the refinement of
//! that rule only.

use std::collections::HashSet;

use crate::error::{MinerResult, RuleError};
use crate::rule::{Position, Rule, Term, TriplePattern, Var};
use crate::symbol::{SymbolId, well_known};

use super::MiningAssistant;
use super::config::MiningProfile;

/// Map entries sorted by key, so operators emit children deterministically.
fn sorted(bindings: std::collections::HashMap<SymbolId, u64>) -> Vec<(SymbolId, u64)> {
    let mut out: Vec<(SymbolId, u64)> = bindings.into_iter().collect();
    out.sort_unstable_by_key(|(k, _)| *k);
    out
}

impl MiningAssistant {
    // -----------------------------------------------------------------------
    // Seeds
    // -----------------------------------------------------------------------

    /// One-atom rules `=> r(?a, ?b)` for every relation allowed in the head
    /// whose support reaches `min_support`.
    pub fn initial_rules(&self, min_support: u64) -> MinerResult<Vec<Rule>> {
        if self.config.profile == MiningProfile::KeyMining {
            return Ok(self.key_seed(min_support)?.into_iter().collect());
        }
        let relations: Vec<SymbolId> = self
            .store
            .relations()
            .into_iter()
            .filter(|r| self.bias.allows_head(*r))
            .collect();
        self.initial_rules_from_seeds(&relations, min_support)
    }

    /// Like [`initial_rules`](Self::initial_rules) for an explicit relation list.
    /// Head exclusions do not apply: the caller chose these relations.
    pub fn initial_rules_from_seeds(
        &self,
        relations: &[SymbolId],
        min_support: u64,
    ) -> MinerResult<Vec<Rule>> {
        let mut out = Vec::new();
        for &relation in relations {
            if well_known::is_special(relation) {
                continue;
            }
            let head = TriplePattern::new(Var(0), relation, Var(1));
            let mut seed = Rule::seed(head, self.find_counting_position(&head), 0)?;
            let support = self.count_bindings(&seed, seed.triples())?;
            if support < min_support {
                continue;
            }
            seed.set_support(support);
            self.annotate(&mut seed);

            if self.config.allow_constants || self.config.enforce_constants {
                let position = seed.non_functional_position();
                self.instantiate_last_atom(&seed, position, min_support, &mut out)?;
            }
            if !self.config.enforce_constants {
                out.push(seed);
            }
        }
        tracing::debug!(seeds = out.len(), min_support, "initial rules");
        Ok(out)
    }

    /// Refinements that add an atom refuse rules already at `max_atoms`.
    pub(crate) fn ensure_room(&self, rule: &Rule) -> MinerResult<()> {
        if self.is_not_too_long(rule) {
            return Ok(());
        }
        Err(RuleError::TooLong {
            rule: rule.to_string(),
            max: self.config.max_atoms,
        }
        .into())
    }

    // -----------------------------------------------------------------------
    // Dangling atoms
    // -----------------------------------------------------------------------

    /// Children that add one atom joining an existing variable and
    /// introducing a fresh one.
    ///
    /// The result is returned even when `enforce_constants` is set, because
    /// the instantiated operator builds on it; the pipeline decides whether
    /// these children are emitted themselves.
    pub fn dangling_atoms(&self, rule: &Rule, min_support: u64) -> MinerResult<Vec<Rule>> {
        self.ensure_room(rule)?;
        let mut out = Vec::new();
        let open = rule.open_variables();
        if self.config.exploit_max_length
            && rule.real_length(&self.bias.auxiliary) + 1 == self.config.max_atoms
            && !open.is_empty()
            && !self.config.allow_constants
        {
            return Ok(out);
        }

        let join_variables = if open.is_empty() {
            rule.variables()
        } else {
            open
        };
        let relation_var = rule.fresh_variable();
        let dangling_var = relation_var.next();

        for join_position in Position::ARGUMENTS {
            let dangling_position = join_position.opposite();
            let bound_head = !rule.head().get(dangling_position).is_var();
            for &join_var in &join_variables {
                let edge = TriplePattern::new(dangling_var, relation_var, dangling_var)
                    .with(join_position, join_var);
                let mut patterns = rule.triples().to_vec();
                patterns.push(edge);

                for (relation, support) in sorted(self.bindings_by(rule, relation_var, &patterns)?) {
                    if support < min_support
                        || !self.bias.allows_body(relation)
                        || !self.recursivity_allows(rule, relation, 1)
                        || (self.config.avoid_unbound_type_atoms && relation == well_known::TYPE)
                    {
                        continue;
                    }
                    let atom = edge.with(Position::Relation, relation);
                    let mut child = rule.add_atom(atom, support)?;
                    // A dangling variable forced to a single value by a bound
                    // head is an instantiated atom in disguise.
                    if bound_head && child.contains_unifiable_patterns() {
                        let values = self.store.count_distinct(dangling_var, child.triples())?;
                        if values < 2 {
                            continue;
                        }
                    }
                    self.annotate(&mut child);
                    out.push(child);
                }
            }
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Closing atoms
    // -----------------------------------------------------------------------

    /// Children that add one atom between two variables already in the rule.
    pub fn closing_atoms(&self, rule: &Rule, min_support: u64) -> MinerResult<Vec<Rule>> {
        let variables = rule.variables();
        if variables.len() < 2 {
            return Err(RuleError::TooFewVariables {
                rule: rule.to_string(),
                found: variables.len(),
            }
            .into());
        }
        self.ensure_room(rule)?;
        let mut out = Vec::new();
        if self.config.enforce_constants {
            return Ok(out);
        }

        let open = rule.open_variables();
        let sources = if open.is_empty() { variables.clone() } else { open };
        let relation_var = rule.fresh_variable();
        let mut seen: HashSet<TriplePattern> = HashSet::new();

        for join_position in Position::ARGUMENTS {
            let close_position = join_position.opposite();
            for &source in &sources {
                for &target in variables.iter().filter(|v| **v != source) {
                    let edge = TriplePattern::new(source, relation_var, source)
                        .with(close_position, target);
                    let mut patterns = rule.triples().to_vec();
                    patterns.push(edge);

                    for (relation, support) in sorted(self.bindings_by(rule, relation_var, &patterns)?) {
                        if support < min_support
                            || !self.bias.allows_body(relation)
                            || !self.recursivity_allows(rule, relation, 1)
                        {
                            continue;
                        }
                        let atom = edge.with(Position::Relation, relation);
                        if !seen.insert(atom) {
                            continue;
                        }
                        let mut child = rule.add_atom(atom, support)?;
                        if child.is_redundant_recursive() {
                            continue;
                        }
                        self.annotate(&mut child);
                        out.push(child);
                    }
                }
            }
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Instantiated atoms
    // -----------------------------------------------------------------------

    /// Children that bind the fresh variable of each dangling child to a
    /// frequent constant. They hang off `rule`, not off the dangling child.
    pub fn instantiated_atoms(
        &self,
        rule: &Rule,
        min_support: u64,
        dangling_children: &[Rule],
    ) -> MinerResult<Vec<Rule>> {
        let mut out = Vec::new();
        if !(self.config.allow_constants || self.config.enforce_constants) {
            return Ok(out);
        }
        let room = rule.real_length(&self.bias.auxiliary) + 1 < self.config.max_atoms;
        if !(self.config.exploit_max_length || room || rule.open_variables().len() < 2) {
            return Ok(out);
        }

        let parents = rule.id().into_iter().collect::<Vec<_>>();
        for candidate in dangling_children {
            let last = candidate.last_atom();
            let fresh = candidate.open_variables();
            let position = Position::ARGUMENTS
                .into_iter()
                .find(|p| matches!(last.get(*p), Term::Var(v) if fresh.contains(&v)))
                .ok_or_else(|| RuleError::NoFreshVariable {
                    rule: candidate.to_string(),
                })?;
            let start = out.len();
            self.instantiate_last_atom(candidate, position, min_support, &mut out)?;
            for child in &mut out[start..] {
                child.set_parents(parents.clone());
            }
        }
        Ok(out)
    }

    /// Bind `position` of the last atom of `candidate` to every constant with
    /// enough support.
    fn instantiate_last_atom(
        &self,
        candidate: &Rule,
        position: Position,
        min_support: u64,
        out: &mut Vec<Rule>,
    ) -> MinerResult<()> {
        let Term::Var(var) = candidate.last_atom().get(position) else {
            return Err(RuleError::NotAVariable {
                rule: candidate.to_string(),
                position: position.to_string(),
            }
            .into());
        };
        for (constant, support) in sorted(self.bindings_by(candidate, var, candidate.triples())?) {
            if support < min_support {
                continue;
            }
            let mut child = candidate.instantiate_constant(position, constant, support)?;
            if child.redundant_atoms().is_empty() {
                self.annotate(&mut child);
                out.push(child);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Type specialization
    // -----------------------------------------------------------------------

    /// Children that narrow a trailing `rdf:type(x, C)` atom to an immediate
    /// subclass of `C`. Needs a [`TypeHierarchy`](crate::schema::TypeHierarchy).
    pub fn type_specialized_atoms(&self, rule: &Rule, min_support: u64) -> MinerResult<Vec<Rule>> {
        let mut out = Vec::new();
        let Some(hierarchy) = self.hierarchy.as_ref() else {
            return Ok(out);
        };
        let last = *rule.last_atom();
        let Some(class) = last.object.as_const() else {
            return Ok(out);
        };
        if last.relation_id() != Some(well_known::TYPE) {
            return Ok(out);
        }

        let last_index = rule.atom_count() - 1;
        for &subtype in hierarchy.subtypes(class) {
            let mut patterns = rule.triples().to_vec();
            patterns[last_index].object = Term::Const(subtype);
            let support = self.count_bindings(rule, &patterns)?;
            if support < min_support {
                continue;
            }
            let mut child = rule.specialize_type_atom(subtype, support)?;
            self.annotate(&mut child);
            out.push(child);
        }
        Ok(out)
    }
}
