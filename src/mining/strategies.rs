//! Profile-specific operators: key mining and link prediction.

use crate::error::MinerResult;
use crate::rule::{Position, Rule, TriplePattern, Var};
use crate::symbol::well_known;

use super::MiningAssistant;

impl MiningAssistant {
    /// The single key-mining seed `=> equals(?a, ?b)`.
    pub fn key_seed(&self, min_support: u64) -> MinerResult<Option<Rule>> {
        let head = TriplePattern::new(Var(0), well_known::EQUALS, Var(1));
        let mut seed = Rule::seed(head, Position::Subject, 0)?;
        let support = self.count_bindings(&seed, seed.triples())?;
        if support < min_support {
            return Ok(None);
        }
        seed.set_support(support);
        self.annotate(&mut seed);
        Ok(Some(seed))
    }

    /// Composite closing for keys: `r(x, z) r(y, z)` where `x` and `y` are
    /// the head variables, for every relation `r` with enough support.
    pub fn key_closing_atoms(&self, rule: &Rule, min_support: u64) -> MinerResult<Vec<Rule>> {
        let mut out = Vec::new();
        if self.config.enforce_constants
            || rule.real_length(&self.bias.auxiliary) + 2 > self.config.max_atoms
        {
            return Ok(out);
        }
        let Some((x, y)) = Self::head_pair(rule) else {
            return Ok(out);
        };
        let shared = rule.fresh_variable();
        let relation_var = shared.next();
        let left = TriplePattern::new(x, relation_var, shared);
        let right = TriplePattern::new(y, relation_var, shared);

        let mut probe = rule.triples().to_vec();
        probe.push(left);
        let mut promising: Vec<_> = self.bindings_by(rule, relation_var, &probe)?.into_iter().collect();
        promising.sort_unstable_by_key(|(r, _)| *r);

        for (relation, estimate) in promising {
            if estimate < min_support
                || !self.bias.allows_body(relation)
                || !self.recursivity_allows(rule, relation, 2)
            {
                continue;
            }
            let left = left.with(Position::Relation, relation);
            let right = right.with(Position::Relation, relation);
            let mut patterns = rule.triples().to_vec();
            patterns.extend([left, right]);
            let support = self.count_bindings(rule, &patterns)?;
            if support < min_support {
                continue;
            }
            let mut child = rule.add_atoms(left, right, support)?;
            self.annotate(&mut child);
            out.push(child);
        }
        Ok(out)
    }

    /// Link-prediction closing: add `<linksTo>` between the head variables
    /// in both directions while the rule has none, else close as usual.
    pub fn link_closing_atoms(&self, rule: &Rule, min_support: u64) -> MinerResult<Vec<Rule>> {
        self.ensure_room(rule)?;
        let mut out = Vec::new();
        if self.config.enforce_constants {
            return Ok(out);
        }
        // The last real slot may only close head variables.
        if rule.real_length(&self.bias.auxiliary) + 1 == self.config.max_atoms {
            let head_vars = rule.head_variables();
            if rule.open_variables().iter().any(|v| !head_vars.contains(v)) {
                return Ok(out);
            }
        }
        if rule.contains_relation(well_known::LINKS_TO) {
            return self.closing_atoms(rule, min_support);
        }
        let Some((x, y)) = Self::head_pair(rule) else {
            return Ok(out);
        };

        for atom in [
            TriplePattern::new(x, well_known::LINKS_TO, y),
            TriplePattern::new(y, well_known::LINKS_TO, x),
        ] {
            let mut patterns = rule.triples().to_vec();
            patterns.push(atom);
            let support = self.store.count_distinct_pairs(x, y, &patterns)?;
            if support < min_support {
                continue;
            }
            let mut child = rule.add_atom(atom, support)?;
            self.annotate(&mut child);
            out.push(child);
        }
        Ok(out)
    }

    /// Type both head variables at once: `type(x, C) type(y, C')`. Rules that
    /// already hold a type atom are left alone.
    pub fn head_type_atoms(&self, rule: &Rule, min_support: u64) -> MinerResult<Vec<Rule>> {
        let mut out = Vec::new();
        if rule.contains_relation(well_known::TYPE) {
            return Ok(out);
        }
        let Some((x, y)) = Self::head_pair(rule) else {
            return Ok(out);
        };
        let class = rule.fresh_variable();
        let subject_type = TriplePattern::new(x, well_known::TYPE, class);
        let object_type = TriplePattern::new(y, well_known::TYPE, class);

        let mut patterns = rule.triples().to_vec();
        patterns.push(subject_type);
        let mut subject_classes: Vec<_> = self.bindings_by(rule, class, &patterns)?.into_iter().collect();
        subject_classes.sort_unstable_by_key(|(c, _)| *c);

        for (subject_class, support) in subject_classes {
            if support < min_support {
                continue;
            }
            let typed_subject = subject_type.with(Position::Object, subject_class);
            let mut patterns = rule.triples().to_vec();
            patterns.extend([typed_subject, object_type]);
            let mut object_classes: Vec<_> = self.bindings_by(rule, class, &patterns)?.into_iter().collect();
            object_classes.sort_unstable_by_key(|(c, _)| *c);

            for (object_class, support) in object_classes {
                if support < min_support {
                    continue;
                }
                let typed_object = object_type.with(Position::Object, object_class);
                let mut child = rule.add_atoms(typed_subject, typed_object, support)?;
                self.annotate(&mut child);
                out.push(child);
            }
        }
        Ok(out)
    }
}
