//! Exact support and confidence.
//!
//! Standard confidence divides the support by the number of body bindings
//! of the counted variable(s). PCA confidence only counts bindings for
//! which the head relation is known to hold with *some* value, which is
//! what an existential copy of the head added to the body enforces.

use crate::error::{MinerResult, StoreError, StoreResult};
use crate::rule::{Rule, Term, TriplePattern};

use super::MiningAssistant;

impl MiningAssistant {
    /// Recount the support of `rule` from scratch and refresh head coverage
    /// and support ratio.
    pub fn compute_support(&self, rule: &mut Rule) -> StoreResult<()> {
        let support = self.count_bindings(rule, rule.triples())?;
        rule.set_support(support);
        self.annotate(rule);
        Ok(())
    }

    /// Body size and standard confidence. Rules without a body are left
    /// unscored.
    pub fn compute_standard_confidence(&self, rule: &mut Rule) -> StoreResult<Option<f64>> {
        if rule.body().is_empty() {
            return Ok(None);
        }
        if let Some(size) = self.tolerate_unsupported(rule, self.count_bindings(rule, rule.body()))? {
            rule.set_body_size(size);
        }
        Ok(rule.std_confidence())
    }

    /// The head with its non-counted argument replaced by a variable the
    /// rule does not use.
    pub fn existential_head(&self, rule: &Rule) -> TriplePattern {
        rule.head()
            .with(rule.non_functional_position(), Term::Var(rule.fresh_variable()))
    }

    /// PCA body size and PCA confidence.
    pub fn compute_pca_confidence(&self, rule: &mut Rule) -> StoreResult<Option<f64>> {
        if rule.body().is_empty() {
            return Ok(None);
        }
        let mut patterns = rule.body().to_vec();
        patterns.push(self.existential_head(rule));
        if let Some(size) = self.tolerate_unsupported(rule, self.count_bindings(rule, &patterns))? {
            rule.set_pca_body_size(size);
        }
        Ok(rule.pca_confidence())
    }

    /// Both confidences. With `omit_std_confidence` the body is not counted
    /// and standard confidence stays undefined.
    pub fn calculate_confidence_metrics(&self, rule: &mut Rule) -> StoreResult<()> {
        if !self.config.omit_std_confidence {
            self.compute_standard_confidence(rule)?;
        }
        self.compute_pca_confidence(rule)?;
        Ok(())
    }

    /// Score a refined candidate.
    pub fn score(&self, rule: &mut Rule) -> MinerResult<()> {
        self.calculate_confidence_metrics(rule)?;
        tracing::trace!(
            rule = %rule,
            support = rule.support(),
            std = ?rule.std_confidence(),
            pca = ?rule.pca_confidence(),
            "rule scored"
        );
        Ok(())
    }

    /// A query the store cannot evaluate leaves the metric undefined.
    fn tolerate_unsupported(&self, rule: &Rule, result: StoreResult<u64>) -> StoreResult<Option<u64>> {
        match result {
            Ok(size) => Ok(Some(size)),
            Err(StoreError::Unsupported { message }) => {
                tracing::debug!(rule = %rule, %message, "confidence left undefined");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
