//! First-match genre classification

use std::sync::Arc;

use serde::Serialize;

use super::rule::{GenreFamily, GenreRule, RuleInputs};
use super::store::{RuleStore, AUTO_DETECT};

/// Genre assigned when no rule matches
pub const DEFAULT_GENRE: &str = "Pop";

/// How a genre was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenreSource {
    Override,
    Rule,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreDecision {
    pub genre: String,
    pub family: GenreFamily,
    pub source: GenreSource,
}

impl GenreDecision {
    fn fallback() -> Self {
        Self {
            genre: DEFAULT_GENRE.to_string(),
            family: GenreFamily::Other,
            source: GenreSource::Default,
        }
    }
}

/// True for a missing choice or "Auto-detect" in any case
pub fn is_auto_detect(choice: &str) -> bool {
    let choice = choice.trim();
    choice.is_empty() || choice.eq_ignore_ascii_case(AUTO_DETECT)
}

/// Walk `rules` in order and return the first match
pub fn evaluate(rules: &[GenreRule], inputs: &RuleInputs) -> GenreDecision {
    rules
        .iter()
        .find(|rule| rule.matches(inputs))
        .map(|rule| GenreDecision {
            genre: rule.genre.clone(),
            family: rule.family,
            source: GenreSource::Rule,
        })
        .unwrap_or_else(GenreDecision::fallback)
}

/// Classifies tracks against the store's current rules
pub struct RuleEngine {
    store: Arc<dyn RuleStore>,
}

impl RuleEngine {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    /// Genre for `inputs`, or the caller's choice when one is given
    ///
    /// An explicit genre skips evaluation; its family is looked up by name in
    /// the current rules. A store that cannot be read is logged and treated
    /// as an empty rule list.
    pub fn classify(&self, inputs: &RuleInputs, genre_override: Option<&str>) -> GenreDecision {
        let rules = match self.store.load() {
            Ok(rules) => rules,
            Err(e) => {
                log::warn!("classify: Rules from {} unavailable: {}", self.store.describe(), e);
                Vec::new()
            }
        };

        if let Some(choice) = genre_override.filter(|g| !is_auto_detect(g)) {
            let choice = choice.trim();
            let family = rules
                .iter()
                .find(|r| r.genre.eq_ignore_ascii_case(choice))
                .map(|r| r.family)
                .unwrap_or_default();
            log::info!("classify: Using caller genre '{}' ({})", choice, family);
            return GenreDecision {
                genre: choice.to_string(),
                family,
                source: GenreSource::Override,
            };
        }

        let decision = evaluate(&rules, inputs);
        log::info!(
            "classify: tempo={:.1} energy={} -> {} ({:?})",
            inputs.tempo,
            inputs.energy_band,
            decision.genre,
            decision.source
        );
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::store::{default_rules, RuleStoreError, StaticRuleStore, YamlRuleStore};
    use cadence_core::EnergyBand;

    fn inputs(tempo: f64) -> RuleInputs {
        RuleInputs {
            tempo,
            energy: 0.08,
            energy_band: EnergyBand::High,
            zero_crossing_rate: 0.08,
            spectral_centroid: 2500.0,
        }
    }

    struct BrokenStore;

    impl RuleStore for BrokenStore {
        fn load(&self) -> Result<Vec<GenreRule>, RuleStoreError> {
            Err(RuleStoreError::DuplicateGenre("x".into()))
        }

        fn describe(&self) -> String {
            "broken".into()
        }
    }

    #[test]
    fn test_bundled_rules_pick_techno() {
        let decision = evaluate(&default_rules(), &inputs(130.0));
        assert_eq!(decision.genre, "Techno");
        assert_eq!(decision.family, GenreFamily::Electronic);
        assert_eq!(decision.source, GenreSource::Rule);
    }

    #[test]
    fn test_unmatched_features_default_to_pop() {
        let decision = evaluate(&default_rules(), &inputs(100.0));
        assert_eq!(decision.genre, DEFAULT_GENRE);
        assert_eq!(decision.source, GenreSource::Default);
    }

    #[test]
    fn test_earlier_rule_wins() {
        let rules = vec![
            GenreRule::tempo_range("First", GenreFamily::Band, 100.0, 140.0),
            GenreRule::tempo_range("Second", GenreFamily::Urban, 120.0, 130.0),
        ];
        assert_eq!(evaluate(&rules, &inputs(125.0)).genre, "First");
    }

    #[test]
    fn test_override_bypasses_rules() {
        let engine = RuleEngine::new(Arc::new(StaticRuleStore::bundled()));
        let decision = engine.classify(&inputs(130.0), Some("House"));
        assert_eq!(decision.genre, "House");
        assert_eq!(decision.family, GenreFamily::Electronic);
        assert_eq!(decision.source, GenreSource::Override);

        let unknown = engine.classify(&inputs(130.0), Some("Sea Shanty"));
        assert_eq!(unknown.family, GenreFamily::Other);
    }

    #[test]
    fn test_auto_detect_evaluates_rules() {
        let engine = RuleEngine::new(Arc::new(StaticRuleStore::bundled()));
        assert_eq!(engine.classify(&inputs(130.0), Some("auto-detect")).genre, "Techno");
        assert_eq!(engine.classify(&inputs(130.0), Some("  ")).genre, "Techno");
        assert_eq!(engine.classify(&inputs(130.0), None).genre, "Techno");
    }

    #[test]
    fn test_unreadable_store_defaults() {
        let engine = RuleEngine::new(Arc::new(BrokenStore));
        assert_eq!(engine.classify(&inputs(130.0), None), GenreDecision::fallback());
    }

    #[test]
    fn test_rule_file_edits_apply_to_next_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genre_rules.yaml");
        std::fs::write(&path, "- genre: Slow\n  rules:\n    tempo: {max: 90}\n").unwrap();

        let engine = RuleEngine::new(Arc::new(YamlRuleStore::new(&path)));
        assert_eq!(engine.classify(&inputs(130.0), None).genre, DEFAULT_GENRE);

        std::fs::write(
            &path,
            "- genre: Fast\n  family: electronic\n  rules:\n    tempo: {min: 120}\n",
        )
        .unwrap();
        let decision = engine.classify(&inputs(130.0), None);
        assert_eq!(decision.genre, "Fast");
        assert_eq!(decision.family, GenreFamily::Electronic);
    }
}
