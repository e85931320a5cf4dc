//! The mining assistant: refinement, scoring, pruning and output tests for
//! candidate rules.
//!
//! [`MiningAssistant`] bundles everything a worker needs to process one
//! candidate: the fact store, the configuration, a frozen
//! [`RelationSnapshot`](snapshot::RelationSnapshot) and the operator
//! pipeline. It holds no mutable state, so one instance is shared by all
//! workers of a run. The only shared mutable structures are the
//! [`RuleArena`](crate::rule::RuleArena) and the
//! [`DominanceIndex`](dominance::DominanceIndex), passed in explicitly.
//!
//! The per-candidate entry points are spread over the submodules:
//!
//! - [`MiningAssistant::run_pipeline`] (pipeline, operators, strategies)
//! - [`MiningAssistant::score`] (confidence)
//! - [`MiningAssistant::is_promising`] (pruning)
//! - [`MiningAssistant::is_dominated`] and [`MiningAssistant::evaluate`] (dominance)

pub mod config;
pub mod confidence;
pub mod dominance;
pub mod operators;
pub mod pipeline;
pub mod pruning;
pub mod snapshot;
pub mod strategies;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{MinerResult, StoreResult};
use crate::rule::{Position, Rule, TriplePattern, Var};
use crate::schema::TypeHierarchy;
use crate::store::FactStore;
use crate::symbol::{SymbolId, SymbolTable, well_known};

use config::{LanguageBias, MiningConfig, OutputBias};
use pipeline::OperatorPipeline;
use snapshot::RelationSnapshot;

pub struct MiningAssistant {
    store: Arc<dyn FactStore>,
    config: MiningConfig,
    bias: LanguageBias,
    snapshot: RelationSnapshot,
    pipeline: OperatorPipeline,
    hierarchy: Option<TypeHierarchy>,
}

impl std::fmt::Debug for MiningAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiningAssistant")
            .field("profile", &self.config.profile)
            .field("pipeline", &self.pipeline)
            .field("relations", &self.snapshot.relations_by_size().len())
            .field("hierarchy", &self.hierarchy.is_some())
            .finish()
    }
}

impl MiningAssistant {
    /// Validate `config`, snapshot the store and resolve the profile's pipeline.
    pub fn new(
        store: Arc<dyn FactStore>,
        config: MiningConfig,
        symbols: &SymbolTable,
    ) -> MinerResult<Self> {
        config.validate()?;
        let snapshot = RelationSnapshot::build(store.as_ref())?;
        let bias = config.language_bias(symbols);
        let pipeline = OperatorPipeline::for_profile(config.profile)?;
        Ok(Self {
            store,
            config,
            bias,
            snapshot,
            pipeline,
            hierarchy: None,
        })
    }

    /// Enable type specialization with the given class hierarchy.
    pub fn with_hierarchy(mut self, hierarchy: TypeHierarchy) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    /// Replace the profile's default pipeline.
    pub fn with_pipeline(mut self, pipeline: OperatorPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn store(&self) -> &dyn FactStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    pub fn bias(&self) -> &LanguageBias {
        &self.bias
    }

    pub fn snapshot(&self) -> &RelationSnapshot {
        &self.snapshot
    }

    pub fn pipeline(&self) -> &OperatorPipeline {
        &self.pipeline
    }

    pub fn hierarchy(&self) -> Option<&TypeHierarchy> {
        self.hierarchy.as_ref()
    }

    /// All refinements of `rule` whose support reaches `min_support`.
    pub fn run_pipeline(&self, rule: &Rule, min_support: u64) -> MinerResult<Vec<Rule>> {
        self.pipeline.run(self, rule, min_support)
    }

    // -----------------------------------------------------------------------
    // Counting
    // -----------------------------------------------------------------------

    fn head_pair(rule: &Rule) -> Option<(Var, Var)> {
        let head = rule.head();
        match (head.subject.as_var(), head.object.as_var()) {
            (Some(x), Some(y)) if x != y => Some((x, y)),
            _ => None,
        }
    }

    /// Distinct bindings of what `rule` counts (the functional variable, or
    /// the head pair for pair-counting profiles) over `patterns`.
    pub(crate) fn count_bindings(&self, rule: &Rule, patterns: &[TriplePattern]) -> StoreResult<u64> {
        match Self::head_pair(rule) {
            Some((x, y)) if self.config.profile.counts_head_pairs() => {
                self.store.count_distinct_pairs(x, y, patterns)
            }
            _ => self.store.count_distinct(rule.functional_variable(), patterns),
        }
    }

    /// [`count_bindings`](Self::count_bindings) grouped by the values of
    /// `target`. `patterns` must start with the head of `rule`.
    pub(crate) fn bindings_by(
        &self,
        rule: &Rule,
        target: Var,
        patterns: &[TriplePattern],
    ) -> StoreResult<HashMap<SymbolId, u64>> {
        if self.config.profile.counts_head_pairs() && Self::head_pair(rule).is_some() {
            if let Some((head, body)) = patterns.split_first() {
                return self.store.count_projection_bindings(head, body, target);
            }
        }
        self.store
            .frequent_bindings_of(target, rule.functional_variable(), patterns)
    }

    /// Support of the bare head: the denominator of head coverage.
    pub fn head_cardinality(&self, rule: &Rule) -> u64 {
        let Some(relation) = rule.head_relation() else {
            return 0;
        };
        if self.config.profile.counts_head_pairs() {
            self.snapshot.relation_size(relation)
        } else {
            self.snapshot.column_size(relation, rule.functional_position())
        }
    }

    /// Set head coverage and support ratio from the rule's current support.
    pub(crate) fn annotate(&self, rule: &mut Rule) {
        let support = rule.support() as f64;
        let head = self.head_cardinality(rule);
        if head > 0 {
            rule.set_head_coverage(support / head as f64);
        }
        let total = if self.config.profile.counts_head_pairs() {
            self.snapshot.fact_count()
        } else {
            self.snapshot.total_count(rule.functional_position())
        };
        if total > 0 {
            rule.set_support_ratio(support / total as f64);
        }
    }

    // -----------------------------------------------------------------------
    // Language bias
    // -----------------------------------------------------------------------

    /// Position of the counting variable for a seed head: the only variable
    /// when there is one, else the subject when the relation is at least as
    /// functional as it is inverse functional.
    pub fn find_counting_position(&self, head: &TriplePattern) -> Position {
        let vars: Vec<Position> = Position::ARGUMENTS
            .into_iter()
            .filter(|p| head.get(*p).is_var())
            .collect();
        if let [only] = vars.as_slice() {
            return *only;
        }
        if self.config.count_always_on_subject {
            return Position::Subject;
        }
        match head.relation_id() {
            Some(r) if self.store.functionality(r) < self.store.inverse_functionality(r) => {
                Position::Object
            }
            _ => Position::Subject,
        }
    }

    /// Room for at least one more non-auxiliary atom.
    pub fn is_not_too_long(&self, rule: &Rule) -> bool {
        rule.real_length(&self.bias.auxiliary) < self.config.max_atoms
    }

    pub(crate) fn recursivity_allows(&self, rule: &Rule, relation: SymbolId, added: usize) -> bool {
        rule.cardinality_for_relation(relation) + added <= self.config.effective_recursivity_limit()
    }

    /// Structural output requirement of the profile.
    pub fn should_be_output(&self, rule: &Rule) -> bool {
        match self.config.profile.output_bias() {
            OutputBias::Closed => rule.is_closed(),
            OutputBias::ClosedTypedLinked => {
                rule.is_closed()
                    && rule.contains_relation(well_known::TYPE)
                    && rule.contains_relation(well_known::LINKS_TO)
            }
        }
    }
}
