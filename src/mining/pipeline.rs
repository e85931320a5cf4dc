//! Ordered refinement operators.
//!
//! A pipeline is a list of operators, each optionally consuming the output
//! of one earlier operator (the instantiated operator refines the children
//! of the dangling operator). Dependencies form a DAG that is checked and
//! ordered once with petgraph, at construction.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{MinerResult, PipelineError};
use crate::rule::Rule;

use super::MiningAssistant;
use super::config::MiningProfile;

/// A refinement operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorId {
    Dangling,
    Closing,
    Instantiated,
    TypeSpecialized,
    /// Pair of atoms `r(x, z) r(y, z)` under an `equals(x, y)` head.
    KeyClosing,
    /// `<linksTo>` atoms between the head variables, else plain closing.
    LinkClosing,
    /// Type atoms on the head variables.
    HeadTypes,
}

impl std::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperatorId::Dangling => "dangling",
            OperatorId::Closing => "closing",
            OperatorId::Instantiated => "instantiated",
            OperatorId::TypeSpecialized => "type-specialized",
            OperatorId::KeyClosing => "key-closing",
            OperatorId::LinkClosing => "link-closing",
            OperatorId::HeadTypes => "head-types",
        };
        f.write_str(name)
    }
}

/// One pipeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorSpec {
    pub id: OperatorId,
    pub depends_on: Option<OperatorId>,
}

impl OperatorSpec {
    pub fn new(id: OperatorId) -> Self {
        Self { id, depends_on: None }
    }

    pub fn after(id: OperatorId, dependency: OperatorId) -> Self {
        Self {
            id,
            depends_on: Some(dependency),
        }
    }
}

/// Validated operator list with its execution order.
#[derive(Debug, Clone)]
pub struct OperatorPipeline {
    specs: Vec<OperatorSpec>,
    /// Indices into `specs`, dependencies first.
    order: Vec<usize>,
}

impl OperatorPipeline {
    pub fn new(specs: Vec<OperatorSpec>) -> Result<Self, PipelineError> {
        let mut dag: DiGraph<usize, ()> = DiGraph::new();
        let mut nodes: HashMap<OperatorId, NodeIndex> = HashMap::new();
        for (i, spec) in specs.iter().enumerate() {
            if nodes.insert(spec.id, dag.add_node(i)).is_some() {
                return Err(PipelineError::Duplicate {
                    operator: spec.id.to_string(),
                });
            }
        }
        for spec in &specs {
            let Some(dependency) = spec.depends_on else {
                continue;
            };
            let from = nodes
                .get(&dependency)
                .ok_or_else(|| PipelineError::UnknownDependency {
                    operator: spec.id.to_string(),
                    dependency: dependency.to_string(),
                })?;
            dag.add_edge(*from, nodes[&spec.id], ());
        }

        let order = petgraph::algo::toposort(&dag, None)
            .map_err(|_| PipelineError::Cycle)?
            .into_iter()
            .map(|node| dag[node])
            .collect();
        let pipeline = Self { specs, order };
        tracing::debug!(operators = ?pipeline.operators(), "operator pipeline built");
        Ok(pipeline)
    }

    /// Default pipeline of a mining profile.
    pub fn for_profile(profile: MiningProfile) -> Result<Self, PipelineError> {
        use OperatorId::*;
        let specs = match profile {
            MiningProfile::Standard | MiningProfile::RelationSignature => vec![
                OperatorSpec::new(Dangling),
                OperatorSpec::new(Closing),
                OperatorSpec::after(Instantiated, Dangling),
                OperatorSpec::new(TypeSpecialized),
            ],
            MiningProfile::KeyMining => vec![OperatorSpec::new(KeyClosing)],
            MiningProfile::LinkPrediction => vec![
                OperatorSpec::new(Dangling),
                OperatorSpec::new(LinkClosing),
                OperatorSpec::new(HeadTypes),
                OperatorSpec::after(Instantiated, Dangling),
            ],
        };
        Self::new(specs)
    }

    /// Operators in declaration order.
    pub fn operators(&self) -> Vec<OperatorId> {
        self.specs.iter().map(|s| s.id).collect()
    }

    /// Apply every operator to `rule` and collect the children in
    /// declaration order. Dangling children are withheld when constants are
    /// enforced; they still feed the operators that depend on them.
    pub fn run(
        &self,
        assistant: &MiningAssistant,
        rule: &Rule,
        min_support: u64,
    ) -> MinerResult<Vec<Rule>> {
        let mut produced: HashMap<OperatorId, Vec<Rule>> = HashMap::new();
        let full = !assistant.is_not_too_long(rule);
        for &i in &self.order {
            let spec = self.specs[i];
            let input: &[Rule] = spec
                .depends_on
                .and_then(|d| produced.get(&d))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let children = match spec.id {
                OperatorId::Dangling | OperatorId::Closing | OperatorId::LinkClosing if full => {
                    Vec::new()
                }
                OperatorId::Dangling => assistant.dangling_atoms(rule, min_support)?,
                OperatorId::Closing if rule.variables().len() < 2 => Vec::new(),
                OperatorId::Closing => assistant.closing_atoms(rule, min_support)?,
                OperatorId::Instantiated => assistant.instantiated_atoms(rule, min_support, input)?,
                OperatorId::TypeSpecialized => assistant.type_specialized_atoms(rule, min_support)?,
                OperatorId::KeyClosing => assistant.key_closing_atoms(rule, min_support)?,
                OperatorId::LinkClosing => assistant.link_closing_atoms(rule, min_support)?,
                OperatorId::HeadTypes => assistant.head_type_atoms(rule, min_support)?,
            };
            tracing::trace!(operator = %spec.id, children = children.len(), "operator applied");
            produced.insert(spec.id, children);
        }

        let enforce_constants = assistant.config().enforce_constants;
        let mut out = Vec::new();
        for spec in &self.specs {
            if spec.id == OperatorId::Dangling && enforce_constants {
                continue;
            }
            if let Some(children) = produced.remove(&spec.id) {
                out.extend(children);
            }
        }
        Ok(out)
    }
}
