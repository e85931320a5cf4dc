//! Mining configuration: thresholds, language bias, and the mining profile.
//!
//! Loaded from TOML; every key is optional and falls back to [`Default`].
//!
//! ```toml
//! min_pca_confidence = 0.1
//! max_atoms = 3
//! profile = "link_prediction"
//! body_excluded_relations = ["hasGender"]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::symbol::{SymbolId, SymbolTable, well_known};

pub use crate::rule::ConfidenceMetric;

/// Which family of rules a run mines. Each profile brings its own operator
/// pipeline, exclusions and output bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningProfile {
    /// Dangling, closing, instantiated and type-specialized atoms.
    #[default]
    Standard,
    /// Keys: rules with head `equals(x, y)` built from pairs `r(x, z) r(y, z)`.
    KeyMining,
    /// Standard search with the schema relations kept out of rules.
    RelationSignature,
    /// Rules predicting `<linksTo>` facts, typed on both head variables.
    LinkPrediction,
}

impl MiningProfile {
    /// Relations a profile never allows in the head.
    pub fn head_exclusions(self) -> &'static [SymbolId] {
        match self {
            MiningProfile::Standard | MiningProfile::KeyMining => &[],
            MiningProfile::RelationSignature => {
                &[well_known::TYPE, well_known::DOMAIN, well_known::RANGE]
            }
            MiningProfile::LinkPrediction => &[well_known::LINKS_TO, well_known::TYPE],
        }
    }

    /// Relations a profile never lets the dangling operator add.
    pub fn body_exclusions(self) -> &'static [SymbolId] {
        self.head_exclusions()
    }

    /// Relations that do not count towards the rule length.
    pub fn auxiliary_relations(self) -> &'static [SymbolId] {
        match self {
            MiningProfile::LinkPrediction => &[well_known::LINKS_TO, well_known::TYPE],
            _ => &[],
        }
    }

    pub fn output_bias(self) -> OutputBias {
        match self {
            MiningProfile::LinkPrediction => OutputBias::ClosedTypedLinked,
            _ => OutputBias::Closed,
        }
    }

    /// Whether support counts distinct `(x, y)` head pairs instead of
    /// bindings of the functional variable.
    pub fn counts_head_pairs(self) -> bool {
        matches!(self, MiningProfile::KeyMining | MiningProfile::LinkPrediction)
    }

    /// Profiles that cap recursion below the configured limit.
    pub fn recursivity_cap(self) -> Option<usize> {
        match self {
            MiningProfile::KeyMining => Some(2),
            _ => None,
        }
    }
}

/// Structural requirement a rule must meet before it may be output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputBias {
    /// Every variable occurs at least twice.
    Closed,
    /// Closed, and the body holds both a type atom and a link atom.
    ClosedTypedLinked,
}

/// Thresholds and switches for a mining run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub min_std_confidence: f64,
    pub min_pca_confidence: f64,
    /// Maximum number of atoms, head included, measured with real length.
    pub max_atoms: usize,
    /// Maximum occurrences of one relation in a rule.
    pub recursivity_limit: usize,
    pub allow_constants: bool,
    /// Only output rules whose atoms all carry a constant.
    pub enforce_constants: bool,
    pub count_always_on_subject: bool,
    pub enable_confidence_upper_bounds: bool,
    /// Heuristic: may discard good rules, never changes a kept rule's scores.
    pub enable_functionality_heuristic: bool,
    pub exploit_max_length: bool,
    pub avoid_unbound_type_atoms: bool,
    pub omit_std_confidence: bool,
    pub confidence_metric: ConfidenceMetric,
    pub head_excluded_relations: Vec<String>,
    pub body_excluded_relations: Vec<String>,
    /// When non-empty, the dangling operator only adds these relations.
    pub body_target_relations: Vec<String>,
    pub profile: MiningProfile,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_std_confidence: 0.0,
            min_pca_confidence: 0.0,
            max_atoms: 3,
            recursivity_limit: 3,
            allow_constants: false,
            enforce_constants: false,
            count_always_on_subject: false,
            enable_confidence_upper_bounds: true,
            enable_functionality_heuristic: false,
            exploit_max_length: true,
            avoid_unbound_type_atoms: false,
            omit_std_confidence: false,
            confidence_metric: ConfidenceMetric::Pca,
            head_excluded_relations: Vec::new(),
            body_excluded_relations: Vec::new(),
            body_target_relations: Vec::new(),
            profile: MiningProfile::Standard,
        }
    }
}

impl MiningConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("min_std_confidence", self.min_std_confidence),
            ("min_pca_confidence", self.min_pca_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    message: format!("{name} = {value} is outside [0, 1]"),
                });
            }
        }
        if self.max_atoms < 2 {
            return Err(ConfigError::Invalid {
                message: format!("max_atoms = {} leaves no room for a body", self.max_atoms),
            });
        }
        if self.omit_std_confidence && self.confidence_metric == ConfidenceMetric::Standard {
            return Err(ConfigError::Invalid {
                message: "confidence_metric = \"standard\" needs standard confidence, \
                          but omit_std_confidence is set"
                    .into(),
            });
        }
        if self.recursivity_limit == 0 {
            return Err(ConfigError::Invalid {
                message: "recursivity_limit must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Recursivity limit after the profile's cap.
    pub fn effective_recursivity_limit(&self) -> usize {
        match self.profile.recursivity_cap() {
            Some(cap) => self.recursivity_limit.min(cap),
            None => self.recursivity_limit,
        }
    }

    /// Resolve relation labels against `symbols`. Labels the table has never
    /// seen cannot occur in any fact and are dropped with a warning.
    pub fn language_bias(&self, symbols: &SymbolTable) -> LanguageBias {
        let resolve = |labels: &[String], what: &str| -> Vec<SymbolId> {
            labels
                .iter()
                .filter_map(|label| {
                    let id = symbols.lookup(label);
                    if id.is_none() {
                        tracing::warn!(relation = %label, list = what, "unknown relation in config");
                    }
                    id
                })
                .collect()
        };
        let mut head_excluded = resolve(&self.head_excluded_relations, "head_excluded_relations");
        head_excluded.extend_from_slice(self.profile.head_exclusions());
        let mut body_excluded = resolve(&self.body_excluded_relations, "body_excluded_relations");
        body_excluded.extend_from_slice(self.profile.body_exclusions());
        let body_targets = resolve(&self.body_target_relations, "body_target_relations");
        LanguageBias {
            head_excluded,
            body_excluded,
            body_targets: (!body_targets.is_empty()).then_some(body_targets),
            auxiliary: self.profile.auxiliary_relations().to_vec(),
        }
    }
}

/// Relation lists of a [`MiningConfig`] resolved to ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageBias {
    pub head_excluded: Vec<SymbolId>,
    pub body_excluded: Vec<SymbolId>,
    pub body_targets: Option<Vec<SymbolId>>,
    pub auxiliary: Vec<SymbolId>,
}

impl LanguageBias {
    pub fn allows_head(&self, relation: SymbolId) -> bool {
        !self.head_excluded.contains(&relation)
    }

    pub fn allows_body(&self, relation: SymbolId) -> bool {
        !self.body_excluded.contains(&relation)
            && self
                .body_targets
                .as_ref()
                .is_none_or(|targets| targets.contains(&relation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = MiningConfig::default();
        assert_eq!(config.max_atoms, 3);
        assert_eq!(config.recursivity_limit, 3);
        assert!(config.enable_confidence_upper_bounds);
        assert!(!config.enable_functionality_heuristic);
        assert_eq!(config.confidence_metric, ConfidenceMetric::Pca);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "min_pca_confidence = 0.25\nprofile = \"key_mining\"\nconfidence_metric = \"standard\""
        )
        .unwrap();
        let config = MiningConfig::load(file.path()).unwrap();
        assert_eq!(config.min_pca_confidence, 0.25);
        assert_eq!(config.profile, MiningProfile::KeyMining);
        assert_eq!(config.confidence_metric, ConfidenceMetric::Standard);
        assert_eq!(config.max_atoms, 3);
        assert_eq!(config.effective_recursivity_limit(), 2);
    }

    #[test]
    fn load_reports_parse_and_range_errors() {
        let mut garbled = tempfile::NamedTempFile::new().unwrap();
        writeln!(garbled, "max_atoms = \"three\"").unwrap();
        assert!(matches!(
            MiningConfig::load(garbled.path()),
            Err(ConfigError::Parse { .. })
        ));

        let mut out_of_range = tempfile::NamedTempFile::new().unwrap();
        writeln!(out_of_range, "min_std_confidence = 1.5").unwrap();
        assert!(matches!(
            MiningConfig::load(out_of_range.path()),
            Err(ConfigError::Invalid { .. })
        ));

        assert!(matches!(
            MiningConfig::load(std::path::Path::new("/nonexistent/miner.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn standard_metric_needs_standard_confidence() {
        let config = MiningConfig {
            omit_std_confidence: true,
            confidence_metric: ConfidenceMetric::Standard,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn language_bias_merges_profile_exclusions() {
        let symbols = SymbolTable::new();
        let gender = symbols.intern("hasGender").unwrap();
        let config = MiningConfig {
            body_excluded_relations: vec!["hasGender".into(), "neverSeen".into()],
            profile: MiningProfile::RelationSignature,
            ..Default::default()
        };
        let bias = config.language_bias(&symbols);
        assert!(!bias.allows_body(gender));
        assert!(!bias.allows_body(well_known::TYPE));
        assert!(!bias.allows_head(well_known::DOMAIN));
        assert_eq!(bias.body_targets, None);
    }

    #[test]
    fn body_targets_restrict_the_body() {
        let symbols = SymbolTable::new();
        let born = symbols.intern("bornIn").unwrap();
        let lives = symbols.intern("livesIn").unwrap();
        let config = MiningConfig {
            body_target_relations: vec!["bornIn".into()],
            ..Default::default()
        };
        let bias = config.language_bias(&symbols);
        assert!(bias.allows_body(born));
        assert!(!bias.allows_body(lives));
        assert!(bias.allows_head(lives));
    }

    #[test]
    fn link_prediction_profile() {
        let profile = MiningProfile::LinkPrediction;
        assert_eq!(profile.output_bias(), OutputBias::ClosedTypedLinked);
        assert!(profile.auxiliary_relations().contains(&well_known::LINKS_TO));
    }
}
