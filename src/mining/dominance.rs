//! Output test: thresholds, redundancy and skyline filtering.
//!
//! A candidate that passes its own confidence thresholds is still dropped
//! when one of its ancestors that would itself be output reaches at least
//! the same confidence. The ancestors come from the [`RuleArena`]; the
//! [`DominanceIndex`] collects emitted rules by head signature and
//! generation so that earlier, more general rules reached through a
//! different derivation can be linked as extra parents.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::MinerResult;
use crate::rule::{CandidateState, HeadSignature, Rule, RuleArena};

use super::MiningAssistant;
use super::pruning::PruneVerdict;

type EmittedMap = HashMap<(HeadSignature, usize), Vec<Arc<Rule>>>;

/// Emitted rules keyed by head signature and generation.
///
/// Lookups and inserts of one evaluation happen under a single lock, so two
/// workers never both emit rules that should have been compared.
#[derive(Debug, Default)]
pub struct DominanceIndex {
    emitted: Mutex<EmittedMap>,
}

impl DominanceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EmittedMap> {
        self.emitted.lock().expect("dominance index lock poisoned")
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every emitted rule, in emission order.
    pub fn emitted(&self) -> Vec<Arc<Rule>> {
        let mut out: Vec<Arc<Rule>> = self.lock().values().flatten().cloned().collect();
        out.sort_by_key(|r| r.id());
        out
    }
}

/// Result of [`MiningAssistant::evaluate`]. The rule is published in the
/// arena whatever the state, so it can still be refined.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub state: CandidateState,
    pub rule: Arc<Rule>,
}

impl MiningAssistant {
    /// Own thresholds and level-2 redundancy, without looking at ancestors.
    /// An omitted standard confidence is not checked.
    pub fn passes_thresholds(&self, rule: &Rule) -> bool {
        if rule.contains_level2_redundant_subgraphs() {
            return false;
        }
        let std_ok = self.config.omit_std_confidence
            || rule
                .std_confidence()
                .is_some_and(|c| c >= self.config.min_std_confidence);
        std_ok
            && rule
                .pca_confidence()
                .is_some_and(|c| c >= self.config.min_pca_confidence)
    }

    /// Skyline test: an ancestor that qualifies for output with confidence at
    /// least that of `rule` makes `rule` redundant.
    pub fn is_dominated(&self, rule: &Rule, arena: &RuleArena) -> bool {
        let metric = self.config.confidence_metric;
        let Some(confidence) = rule.confidence(metric) else {
            return false;
        };
        arena.ancestors(rule).iter().any(|ancestor| {
            self.should_be_output(ancestor)
                && ancestor.confidence(metric).is_some_and(|a| confidence <= a)
        })
    }

    /// Thresholds, redundancy and skyline.
    pub fn test_confidence_thresholds(&self, rule: &Rule, arena: &RuleArena) -> bool {
        self.passes_thresholds(rule) && !self.is_dominated(rule, arena)
    }

    /// Link emitted rules of earlier generations with the same head that
    /// subsume `rule` as extra parents.
    fn link_additional_parents(&self, rule: &mut Rule, emitted: &EmittedMap) {
        let signature = rule.head_signature();
        for generation in (2..rule.generation()).rev() {
            let Some(candidates) = emitted.get(&(signature, generation)) else {
                continue;
            };
            for parent in candidates {
                if !parent.subsumes(rule) {
                    continue;
                }
                if let Some(id) = parent.id() {
                    rule.add_parent(id);
                }
            }
        }
    }

    /// Run a candidate through pruning, scoring and the output test.
    ///
    /// Seeds are published as `Seeded`. Rules that cannot be output yet
    /// (open rules, or rules missing the atoms the profile requires) are
    /// published as `Scored` without computing their confidence.
    pub fn evaluate(
        &self,
        mut rule: Rule,
        arena: &RuleArena,
        index: &DominanceIndex,
    ) -> MinerResult<Evaluation> {
        if rule.body().is_empty() {
            return Ok(Evaluation {
                state: CandidateState::Seeded,
                rule: arena.insert(rule),
            });
        }
        if !self.should_be_output(&rule) {
            return Ok(Evaluation {
                state: CandidateState::Scored,
                rule: arena.insert(rule),
            });
        }

        let state = match self.check(&mut rule)? {
            PruneVerdict::BoundRejected { .. } => Some(CandidateState::BoundRejected),
            PruneVerdict::ApproxRejected { .. } => Some(CandidateState::ApproxRejected),
            PruneVerdict::Keep => None,
        };
        if let Some(state) = state {
            return Ok(Evaluation {
                state,
                rule: arena.insert(rule),
            });
        }

        self.score(&mut rule)?;

        let mut emitted = index.lock();
        self.link_additional_parents(&mut rule, &emitted);
        let state = if !self.passes_thresholds(&rule) {
            CandidateState::ThresholdRejected
        } else if self.is_dominated(&rule, arena) {
            CandidateState::Dominated
        } else {
            CandidateState::Emitted
        };
        let rule = arena.insert(rule);
        if state == CandidateState::Emitted {
            emitted
                .entry((rule.head_signature(), rule.generation()))
                .or_default()
                .push(Arc::clone(&rule));
        }
        drop(emitted);

        tracing::debug!(rule = %rule, state = ?state, "candidate evaluated");
        Ok(Evaluation { state, rule })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::config::{ConfidenceMetric, MiningConfig};
    use crate::mining::fixtures::*;
    use crate::rule::{Position, TriplePattern, Var};

    const X: Var = Var(0);
    const Y: Var = Var(1);

    fn scored(rule: Rule, support: u64, body: u64, pca_body: u64) -> Rule {
        let mut rule = rule;
        rule.set_support(support);
        rule.set_body_size(body);
        rule.set_pca_body_size(pca_body);
        rule
    }

    fn family() -> World {
        World::new(&[
            ("a", "parentOf", "b"),
            ("a", "fatherOf", "b"),
            ("a", "guardianOf", "b"),
        ])
    }

    fn seed(world: &World) -> Rule {
        Rule::seed(TriplePattern::new(X, world.id("parentOf"), Y), Position::Subject, 20).unwrap()
    }

    #[test]
    fn thresholds_apply_to_both_metrics() {
        let world = family();
        let assistant = world.assistant(MiningConfig {
            min_std_confidence: 0.5,
            min_pca_confidence: 0.8,
            ..Default::default()
        });
        let rule = seed(&world)
            .add_atom(TriplePattern::new(X, world.id("fatherOf"), Y), 0)
            .unwrap();
        assert!(assistant.passes_thresholds(&scored(rule.clone(), 9, 10, 10)));
        assert!(!assistant.passes_thresholds(&scored(rule.clone(), 4, 10, 5)));
        assert!(!assistant.passes_thresholds(&scored(rule.clone(), 6, 10, 9)));
        assert!(!assistant.passes_thresholds(&rule));
    }

    #[test]
    fn descendants_must_beat_qualifying_ancestors() {
        let world = family();
        let assistant = world.assistant(MiningConfig::default());
        let arena = RuleArena::new();
        let parent = scored(
            seed(&world)
                .add_atom(TriplePattern::new(X, world.id("fatherOf"), Y), 19)
                .unwrap(),
            19,
            20,
            20,
        );
        let parent = arena.insert(parent);
        let child = parent
            .add_atom(TriplePattern::new(X, world.id("guardianOf"), Y), 9)
            .unwrap();
        let child = scored(child, 9, 10, 10);
        assert!(assistant.is_dominated(&child, &arena));

        let better = scored(child.clone(), 10, 10, 10);
        assert!(!assistant.is_dominated(&better, &arena));
    }

    #[test]
    fn open_ancestors_do_not_dominate() {
        let world = family();
        let assistant = world.assistant(MiningConfig {
            confidence_metric: ConfidenceMetric::Standard,
            ..Default::default()
        });
        let arena = RuleArena::new();
        let open = arena.insert(scored(
            seed(&world)
                .add_atom(TriplePattern::new(X, world.id("fatherOf"), Var(2)), 1)
                .unwrap(),
            1,
            1,
            1,
        ));
        let child = open
            .add_atom(TriplePattern::new(Var(2), world.id("guardianOf"), Y), 1)
            .unwrap();
        let child = scored(child, 1, 2, 2);
        assert!(!assistant.should_be_output(&open));
        assert!(!assistant.is_dominated(&child, &arena));
    }

    #[test]
    fn evaluate_emits_and_indexes() {
        let world = family();
        let assistant = world.assistant(MiningConfig::default());
        let arena = RuleArena::new();
        let index = DominanceIndex::new();

        let evaluation = assistant.evaluate(seed(&world), &arena, &index).unwrap();
        assert_eq!(evaluation.state, CandidateState::Seeded);
        let parent = evaluation.rule;

        let open = parent
            .add_atom(TriplePattern::new(X, world.id("fatherOf"), Var(2)), 0)
            .unwrap();
        let evaluation = assistant.evaluate(open, &arena, &index).unwrap();
        assert_eq!(evaluation.state, CandidateState::Scored);
        assert_eq!(evaluation.rule.pca_confidence(), None);

        let mut closed = parent
            .add_atom(TriplePattern::new(X, world.id("fatherOf"), Y), 0)
            .unwrap();
        assistant.compute_support(&mut closed).unwrap();
        let evaluation = assistant.evaluate(closed, &arena, &index).unwrap();
        assert_eq!(evaluation.state, CandidateState::Emitted);
        assert_eq!(evaluation.rule.pca_confidence(), Some(1.0));
        assert_eq!(index.len(), 1);

        // Same confidence one level deeper: dominated.
        let mut deeper = evaluation
            .rule
            .add_atom(TriplePattern::new(X, world.id("guardianOf"), Y), 0)
            .unwrap();
        assistant.compute_support(&mut deeper).unwrap();
        let evaluation = assistant.evaluate(deeper, &arena, &index).unwrap();
        assert_eq!(evaluation.state, CandidateState::Dominated);
        assert_eq!(index.len(), 1);
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn emitted_generalizations_become_extra_parents() {
        let world = family();
        let assistant = world.assistant(MiningConfig::default());
        let arena = RuleArena::new();
        let index = DominanceIndex::new();

        let root = arena.insert(seed(&world));
        let mut general = root
            .add_atom(TriplePattern::new(X, world.id("guardianOf"), Y), 0)
            .unwrap();
        assistant.compute_support(&mut general).unwrap();
        let general = assistant.evaluate(general, &arena, &index).unwrap();
        assert_eq!(general.state, CandidateState::Emitted);

        // Reached through fatherOf first, so guardianOf is not in its lineage.
        let via_father = arena.insert(
            root.add_atom(TriplePattern::new(X, world.id("fatherOf"), Y), 1)
                .unwrap(),
        );
        let mut specific = via_father
            .add_atom(TriplePattern::new(X, world.id("guardianOf"), Y), 0)
            .unwrap();
        assistant.compute_support(&mut specific).unwrap();
        let specific = assistant.evaluate(specific, &arena, &index).unwrap();

        assert!(specific.rule.parents().contains(&general.rule.id().unwrap()));
        assert_eq!(specific.state, CandidateState::Dominated);
    }
}
