//! Cheap rejection of candidates before their exact confidence is counted.
//!
//! Two mechanisms run in order:
//!
//! 1. **Confidence bounds** for three-atom rules whose body is two atoms of
//!    one relation joined on the same column (`r(x, z) r(y, z)`). Both
//!    bounds reuse one-atom queries instead of the expensive join.
//! 2. **Functionality approximation** (opt in), an estimate of the PCA
//!    confidence from relation statistics alone. It may discard rules that
//!    would have passed, but never changes the scores of a kept rule.
//!
//! Bounds and approximations assume the functional variable is counted, so
//! profiles that count head pairs skip this stage.

use serde::Serialize;

use crate::error::{MinerResult, StoreResult};
use crate::rule::{Position, Rule, Term, TriplePattern};
use crate::store::{Column, JoinMode};

use super::MiningAssistant;

/// Outcome of [`MiningAssistant::check`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PruneVerdict {
    Keep,
    BoundRejected { std_bound: f64, pca_bound: f64 },
    ApproxRejected { estimate: f64 },
}

impl PruneVerdict {
    pub fn is_keep(self) -> bool {
        matches!(self, PruneVerdict::Keep)
    }
}

/// `support / denominator`, or `None` when the quotient is meaningless.
fn ratio(support: u64, denominator: f64) -> Option<f64> {
    let value = support as f64 / denominator;
    (denominator > 0.0 && value.is_finite()).then_some(value)
}

impl MiningAssistant {
    /// Run the enabled pruning mechanisms. Bounds and estimates are stored on
    /// the rule whenever they are computed.
    pub fn check(&self, rule: &mut Rule) -> MinerResult<PruneVerdict> {
        if self.config.profile.counts_head_pairs() {
            return Ok(PruneVerdict::Keep);
        }
        if self.config.enable_confidence_upper_bounds {
            let verdict = self.confidence_bounds(rule)?;
            if !verdict.is_keep() {
                return Ok(verdict);
            }
        }
        if self.config.enable_functionality_heuristic {
            let length = rule.real_length(&self.bias.auxiliary);
            if length == 3 {
                return Ok(self.approximate_three_atoms(rule));
            } else if length > 3 {
                return Ok(self.approximate_general(rule));
            }
        }
        Ok(PruneVerdict::Keep)
    }

    /// `true` when no pruning mechanism found enough evidence to drop `rule`.
    pub fn is_promising(&self, rule: &mut Rule) -> MinerResult<bool> {
        Ok(self.check(rule)?.is_keep())
    }

    // -----------------------------------------------------------------------
    // Bounds
    // -----------------------------------------------------------------------

    /// Standard and PCA confidence bounds for `r(x, z) r(y, z) => h(x, y)`.
    pub fn confidence_bounds(&self, rule: &mut Rule) -> StoreResult<PruneVerdict> {
        if rule.real_length(&self.bias.auxiliary) != 3 {
            return Ok(PruneVerdict::Keep);
        }
        let Some(info) = self.store.identify_hard_query_type_i(rule.body()) else {
            return Ok(PruneVerdict::Keep);
        };
        let Some(relation) = rule.body()[info.first_atom].relation_id() else {
            return Ok(PruneVerdict::Keep);
        };

        // PCA: drop the atom without the counted variable.
        let projection = rule.functional_variable();
        let first = rule.body()[info.first_atom];
        let second = rule.body()[info.second_atom];
        let remained = if !first.contains_var(projection) {
            Some(second)
        } else if !second.contains_var(projection) {
            Some(first)
        } else {
            None
        };
        let mut easy: Vec<TriplePattern> = match remained {
            Some(atom) => vec![atom],
            None => rule.body().to_vec(),
        };
        // `h(x, z)` with the counted variable where the head holds it
        // already implies the existential head.
        let existential_is_redundant = remained.is_some_and(|atom| {
            atom.relation == rule.head().relation
                && atom.get(rule.functional_position()) == Term::Var(projection)
        });
        if !existential_is_redundant {
            easy.push(self.existential_head(rule));
        }
        let pca_denominator = self.store.count_distinct(projection, &easy)? as f64;
        let Some(pca_bound) = ratio(rule.support(), pca_denominator) else {
            return Ok(PruneVerdict::Keep);
        };

        // Standard: distinct values of the non-joined column.
        let column = match info.first_join {
            Position::Object => Column::Subject,
            _ => Column::Object,
        };
        let std_denominator = self.store.relation_column_size(relation, column) as f64;
        let Some(std_bound) = ratio(rule.support(), std_denominator) else {
            return Ok(PruneVerdict::Keep);
        };

        let std_rejects = !self.config.omit_std_confidence && std_bound < self.config.min_std_confidence;
        if pca_bound < self.config.min_pca_confidence || std_rejects {
            tracing::debug!(rule = %rule, std_bound, pca_bound, "discarded by confidence bound");
            return Ok(PruneVerdict::BoundRejected { std_bound, pca_bound });
        }
        rule.set_confidence_upper_bounds(std_bound, pca_bound);
        Ok(PruneVerdict::Keep)
    }

    // -----------------------------------------------------------------------
    // Approximations
    // -----------------------------------------------------------------------

    /// PCA estimate for a two-atom body of different relations sharing one
    /// variable, one atom holding the counted variable.
    pub fn approximate_three_atoms(&self, rule: &mut Rule) -> PruneVerdict {
        let Some(info) = self.store.identify_hard_query_type_iii(rule.body()) else {
            return PruneVerdict::Keep;
        };
        let projection = rule.functional_variable();
        let first = rule.body()[info.first_atom];
        let second = rule.body()[info.second_atom];
        let (output, input, common_in, common_out) = if !first.contains_var(projection) {
            (first, second, info.second_join, info.first_join)
        } else if !second.contains_var(projection) {
            (second, first, info.first_join, info.second_join)
        } else {
            return PruneVerdict::Keep;
        };
        let (Some(input_rel), Some(output_rel), Some(head_rel)) =
            (input.relation_id(), output.relation_id(), rule.head_relation())
        else {
            return PruneVerdict::Keep;
        };
        let (Some(in_column), Some(out_column)) = (Column::of(common_in), Column::of(common_out))
        else {
            return PruneVerdict::Keep;
        };

        let store = self.store.as_ref();
        let func_input = store.column_functionality(input_rel, in_column.opposite());
        let func_output = store.column_functionality(output_rel, out_column);
        let ifunc_output = store.column_functionality(output_rel, out_column.opposite());
        let entities = store.relation_column_size(input_rel, in_column) as f64;
        let overlap = store.overlap(input_rel, output_rel, JoinMode::from_columns(in_column, out_column)) as f64;
        let head_mode = JoinMode::from_columns(
            in_column.opposite(),
            Column::of(rule.functional_position()).unwrap_or(Column::Subject),
        );
        let overlap_head = store.overlap(input_rel, head_rel, head_mode) as f64;

        let f4 = (1.0 / func_input) * (overlap / entities);
        let denominator = overlap_head * f4 * (ifunc_output / func_output);
        self.accept_estimate(rule, denominator)
    }

    /// PCA estimate for a body that forms a single path between the head
    /// variables.
    pub fn approximate_general(&self, rule: &mut Rule) -> PruneVerdict {
        let Some(path) = rule.canonical_path() else {
            return PruneVerdict::Keep;
        };
        let store = self.store.as_ref();
        let head = *rule.head();
        let Some(head_rel) = head.relation_id() else {
            return PruneVerdict::Keep;
        };

        let first = path[0];
        let (Some(r1), Some((in_r1, in_head))) = (first.relation_id(), Rule::join_positions(&first, &head))
        else {
            return PruneVerdict::Keep;
        };
        let Some(mode) = JoinMode::from_positions(in_r1, in_head) else {
            return PruneVerdict::Keep;
        };
        let fun_r1 = store.directed_functionality(r1, in_r1 != Position::Subject);
        let mut denominator = store.overlap(r1, head_rel, mode) as f64 / fun_r1;

        for pair in path.windows(2) {
            let [previous, current] = pair else { continue };
            let (Some(r_prev), Some(r_cur), Some((in_prev, in_cur))) = (
                previous.relation_id(),
                current.relation_id(),
                Rule::join_positions(previous, current),
            ) else {
                return PruneVerdict::Keep;
            };
            let (Some(mode), Some(prev_column)) =
                (JoinMode::from_positions(in_prev, in_cur), Column::of(in_prev))
            else {
                return PruneVerdict::Keep;
            };
            let rewrite = in_cur != Position::Subject;
            let fun = store.directed_functionality(r_cur, rewrite);
            let ifun = store.directed_functionality(r_cur, !rewrite);
            let range = store.relation_column_size(r_prev, prev_column) as f64;
            let overlap = store.overlap(r_prev, r_cur, mode) as f64;
            denominator *= (overlap * ifun) / (range * fun);
        }
        self.accept_estimate(rule, denominator)
    }

    fn accept_estimate(&self, rule: &mut Rule, denominator: f64) -> PruneVerdict {
        let Some(estimate) = ratio(rule.support(), denominator) else {
            return PruneVerdict::Keep;
        };
        rule.set_pca_estimation(estimate);
        if estimate < self.config.min_pca_confidence {
            tracing::debug!(rule = %rule, estimate, "discarded by functionality heuristic");
            return PruneVerdict::ApproxRejected { estimate };
        }
        PruneVerdict::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::config::MiningConfig;
    use crate::mining::fixtures::*;
    use crate::rule::Var;

    const A: Var = Var(0);
    const B: Var = Var(1);
    const C: Var = Var(2);
    const D: Var = Var(3);

    /// `worksAt(?a, ?c) worksAt(?b, ?c) => knows(?a, ?b)` over four employees.
    fn colleagues(config: MiningConfig) -> (World, MiningAssistant, Rule) {
        let world = World::new(&[
            ("a", "worksAt", "acme"),
            ("b", "worksAt", "acme"),
            ("c", "worksAt", "acme"),
            ("d", "worksAt", "globex"),
            ("a", "knows", "b"),
            ("c", "knows", "d"),
        ]);
        let assistant = world.assistant(config);
        let works = world.id("worksAt");
        let mut rule = Rule::from_atoms(
            vec![
                TriplePattern::new(A, world.id("knows"), B),
                TriplePattern::new(A, works, C),
                TriplePattern::new(B, works, C),
            ],
            Position::Subject,
            0,
        )
        .unwrap();
        assistant.compute_support(&mut rule).unwrap();
        (world, assistant, rule)
    }

    #[test]
    fn bounds_reject_weak_type_i_rules() {
        let (_, assistant, mut rule) = colleagues(MiningConfig {
            min_pca_confidence: 0.6,
            ..Default::default()
        });
        assert_eq!(rule.support(), 1);
        let verdict = assistant.check(&mut rule).unwrap();
        assert_eq!(
            verdict,
            PruneVerdict::BoundRejected {
                std_bound: 0.25,
                pca_bound: 0.5
            }
        );
        assert!(!assistant.is_promising(&mut rule).unwrap());
    }

    #[test]
    fn bounds_are_recorded_on_kept_rules() {
        let (_, assistant, mut rule) = colleagues(MiningConfig {
            min_pca_confidence: 0.4,
            min_std_confidence: 0.2,
            ..Default::default()
        });
        assert!(assistant.is_promising(&mut rule).unwrap());
        assert_eq!(rule.std_confidence_upper_bound(), Some(0.25));
        assert_eq!(rule.pca_confidence_upper_bound(), Some(0.5));

        assistant.calculate_confidence_metrics(&mut rule).unwrap();
        assert!(rule.pca_confidence().unwrap() <= 0.5 + 1e-9);
    }

    #[test]
    fn bound_keeps_the_existential_head_unless_implied() {
        // h(?c, ?a) holds ?a as an object, so it does not imply h(?a, _).
        let world = World::new(&[("z", "h", "a"), ("z", "h", "b"), ("a", "h", "b")]);
        let assistant = world.assistant(MiningConfig::default());
        let h = world.id("h");
        let mut rule = Rule::from_atoms(
            vec![
                TriplePattern::new(A, h, B),
                TriplePattern::new(C, h, A),
                TriplePattern::new(C, h, B),
            ],
            Position::Subject,
            0,
        )
        .unwrap();
        assistant.compute_support(&mut rule).unwrap();
        assert_eq!(rule.support(), 1);
        assert!(assistant.is_promising(&mut rule).unwrap());
        assert_eq!(rule.pca_confidence_upper_bound(), Some(1.0));
        assert_eq!(rule.std_confidence_upper_bound(), Some(0.5));

        assistant.calculate_confidence_metrics(&mut rule).unwrap();
        assert_eq!(rule.pca_confidence(), Some(1.0));
        assert_eq!(rule.std_confidence(), Some(0.5));
    }

    #[test]
    fn bounds_can_be_disabled() {
        let (_, assistant, mut rule) = colleagues(MiningConfig {
            min_pca_confidence: 0.6,
            enable_confidence_upper_bounds: false,
            ..Default::default()
        });
        assert!(assistant.is_promising(&mut rule).unwrap());
        assert_eq!(rule.pca_confidence_upper_bound(), None);
    }

    /// `marriedTo(?a, ?c) livesIn(?c, ?b) => livesIn(?a, ?b)`; b lives in
    /// four cities, which inflates the estimated body size.
    fn spouses(min_pca_confidence: f64, heuristic: bool) -> (MiningAssistant, Rule) {
        let world = World::new(&[
            ("a", "marriedTo", "b"),
            ("b", "marriedTo", "a"),
            ("a", "livesIn", "paris"),
            ("b", "livesIn", "paris"),
            ("b", "livesIn", "lyon"),
            ("b", "livesIn", "nice"),
            ("b", "livesIn", "rome"),
        ]);
        let assistant = world.assistant(MiningConfig {
            min_pca_confidence,
            enable_functionality_heuristic: heuristic,
            ..Default::default()
        });
        let lives = world.id("livesIn");
        let mut rule = Rule::from_atoms(
            vec![
                TriplePattern::new(A, lives, B),
                TriplePattern::new(A, world.id("marriedTo"), C),
                TriplePattern::new(C, lives, B),
            ],
            Position::Subject,
            0,
        )
        .unwrap();
        assistant.compute_support(&mut rule).unwrap();
        (assistant, rule)
    }

    #[test]
    fn three_atom_approximation() {
        let (assistant, mut rule) = spouses(0.6, true);
        assert_eq!(rule.support(), 2);
        match assistant.check(&mut rule).unwrap() {
            PruneVerdict::ApproxRejected { estimate } => assert!((estimate - 0.5).abs() < 1e-9),
            other => panic!("expected an approximation rejection, got {other:?}"),
        }

        let (assistant, mut rule) = spouses(0.4, true);
        assert!(assistant.is_promising(&mut rule).unwrap());
        assert!((rule.pca_estimation().unwrap() - 0.5).abs() < 1e-9);
        // The estimate never replaces the exact score.
        assistant.calculate_confidence_metrics(&mut rule).unwrap();
        assert_eq!(rule.pca_confidence(), Some(1.0));
    }

    #[test]
    fn approximation_is_opt_in() {
        let (assistant, mut rule) = spouses(0.6, false);
        assert!(assistant.is_promising(&mut rule).unwrap());
        assert_eq!(rule.pca_estimation(), None);
    }

    #[test]
    fn path_approximation() {
        let world = World::new(&[
            ("a", "r1", "c"),
            ("c", "r2", "d"),
            ("d", "r3", "b"),
            ("a", "h", "b"),
        ]);
        let assistant = world.assistant(MiningConfig {
            max_atoms: 4,
            enable_functionality_heuristic: true,
            ..Default::default()
        });
        let mut rule = Rule::from_atoms(
            vec![
                TriplePattern::new(A, world.id("h"), B),
                TriplePattern::new(A, world.id("r1"), C),
                TriplePattern::new(C, world.id("r2"), D),
                TriplePattern::new(D, world.id("r3"), B),
            ],
            Position::Subject,
            0,
        )
        .unwrap();
        assistant.compute_support(&mut rule).unwrap();
        assert_eq!(rule.support(), 1);
        assert!(assistant.is_promising(&mut rule).unwrap());
        assert_eq!(rule.pca_estimation(), Some(1.0));
    }

    #[test]
    fn path_approximation_rejects_fanned_out_paths() {
        // c has four r2 successors and each one continues through r3, so
        // the estimated body is four times the support.
        let world = World::new(&[
            ("a", "h", "b"),
            ("a", "r1", "c"),
            ("c", "r2", "d"),
            ("c", "r2", "e1"),
            ("c", "r2", "e2"),
            ("c", "r2", "e3"),
            ("d", "r3", "b"),
            ("e1", "r3", "x1"),
            ("e2", "r3", "x2"),
            ("e3", "r3", "x3"),
        ]);
        let assistant = world.assistant(MiningConfig {
            max_atoms: 4,
            min_pca_confidence: 0.5,
            enable_functionality_heuristic: true,
            ..Default::default()
        });
        let mut rule = Rule::from_atoms(
            vec![
                TriplePattern::new(A, world.id("h"), B),
                TriplePattern::new(A, world.id("r1"), C),
                TriplePattern::new(C, world.id("r2"), D),
                TriplePattern::new(D, world.id("r3"), B),
            ],
            Position::Subject,
            0,
        )
        .unwrap();
        assistant.compute_support(&mut rule).unwrap();
        assert_eq!(rule.support(), 1);
        match assistant.check(&mut rule).unwrap() {
            PruneVerdict::ApproxRejected { estimate } => assert!((estimate - 0.25).abs() < 1e-9),
            other => panic!("expected an approximation rejection, got {other:?}"),
        }
        assert_eq!(rule.pca_estimation(), Some(0.25));
    }
}
