//! Genre rule model
//!
//! A rule maps feature names to bounds. A map of bounds is an AND-group; a
//! list of maps is an OR of AND-groups:
//!
//! ```yaml
//! - genre: Techno
//!   family: electronic
//!   rules:
//!     tempo: { min: 124, max: 140 }
//!     energy: { not: low }
//!
//! - genre: Rock
//!   family: band
//!   rules:
//!     - { tempo: { min: 105, max: 160 }, energy: { is: high } }
//!     - { spectral_centroid: { min: 2800 } }
//! ```
//!
//! Bounds are inclusive on both ends. Unknown feature names or bound keys are
//! rejected when the file is parsed.

use cadence_core::features::FeatureBundle;
use cadence_core::EnergyBand;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad genre family, authored alongside each rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenreFamily {
    Electronic,
    Acoustic,
    Band,
    Urban,
    #[default]
    Other,
}

impl GenreFamily {
    pub fn is_electronic(self) -> bool {
        self == GenreFamily::Electronic
    }

    pub fn name(self) -> &'static str {
        match self {
            GenreFamily::Electronic => "electronic",
            GenreFamily::Acoustic => "acoustic",
            GenreFamily::Band => "band",
            GenreFamily::Urban => "urban",
            GenreFamily::Other => "other",
        }
    }
}

impl fmt::Display for GenreFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Feature values a rule is evaluated against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleInputs {
    pub tempo: f64,
    /// Raw mean RMS
    pub energy: f64,
    pub energy_band: EnergyBand,
    pub zero_crossing_rate: f64,
    pub spectral_centroid: f64,
}

impl From<&FeatureBundle> for RuleInputs {
    fn from(features: &FeatureBundle) -> Self {
        Self {
            tempo: features.tempo,
            energy: features.energy_value as f64,
            energy_band: features.energy,
            zero_crossing_rate: features.zero_crossing_rate as f64,
            spectral_centroid: features.spectral_centroid as f64,
        }
    }
}

/// Inclusive numeric range; a missing side is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumericBound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl NumericBound {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn matches(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Energy accepts numeric bounds on the raw value and band comparisons
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnergyBound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is: Option<EnergyBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<EnergyBand>,
}

impl EnergyBound {
    pub fn matches(&self, value: f64, band: EnergyBand) -> bool {
        let numeric = NumericBound {
            min: self.min,
            max: self.max,
        };
        numeric.matches(value)
            && self.is.map_or(true, |is| band == is)
            && self.not.map_or(true, |not| band != not)
    }
}

/// Every present bound must hold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<NumericBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<EnergyBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_crossing_rate: Option<NumericBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectral_centroid: Option<NumericBound>,
}

impl RuleGroup {
    pub fn matches(&self, inputs: &RuleInputs) -> bool {
        self.tempo.map_or(true, |b| b.matches(inputs.tempo))
            && self
                .energy
                .map_or(true, |b| b.matches(inputs.energy, inputs.energy_band))
            && self
                .zero_crossing_rate
                .map_or(true, |b| b.matches(inputs.zero_crossing_rate))
            && self
                .spectral_centroid
                .map_or(true, |b| b.matches(inputs.spectral_centroid))
    }
}

/// A single AND-group or an OR-list of AND-groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RulePredicate {
    AnyOf(Vec<RuleGroup>),
    AllOf(RuleGroup),
}

impl RulePredicate {
    pub fn matches(&self, inputs: &RuleInputs) -> bool {
        match self {
            RulePredicate::AnyOf(groups) => groups.iter().any(|g| g.matches(inputs)),
            RulePredicate::AllOf(group) => group.matches(inputs),
        }
    }
}

/// One entry of the ordered rule list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenreRule {
    pub genre: String,
    #[serde(default)]
    pub family: GenreFamily,
    pub rules: RulePredicate,
}

impl GenreRule {
    /// Rule matching a BPM range only
    pub fn tempo_range(genre: impl Into<String>, family: GenreFamily, min_bpm: f64, max_bpm: f64) -> Self {
        Self {
            genre: genre.into(),
            family,
            rules: RulePredicate::AllOf(RuleGroup {
                tempo: Some(NumericBound::between(min_bpm, max_bpm)),
                ..RuleGroup::default()
            }),
        }
    }

    pub fn matches(&self, inputs: &RuleInputs) -> bool {
        self.rules.matches(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(tempo: f64, band: EnergyBand) -> RuleInputs {
        RuleInputs {
            tempo,
            energy: 0.08,
            energy_band: band,
            zero_crossing_rate: 0.08,
            spectral_centroid: 2500.0,
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let bound = NumericBound::between(120.0, 130.0);
        assert!(bound.matches(120.0));
        assert!(bound.matches(130.0));
        assert!(!bound.matches(119.9));
        assert!(!bound.matches(130.1));
        assert!(NumericBound::default().matches(-5.0));
    }

    #[test]
    fn test_energy_band_comparisons() {
        let loud = EnergyBound {
            is: Some(EnergyBand::High),
            ..Default::default()
        };
        assert!(loud.matches(0.08, EnergyBand::High));
        assert!(!loud.matches(0.03, EnergyBand::Medium));

        let not_quiet = EnergyBound {
            not: Some(EnergyBand::Low),
            min: Some(0.03),
            ..Default::default()
        };
        assert!(not_quiet.matches(0.04, EnergyBand::Medium));
        assert!(!not_quiet.matches(0.025, EnergyBand::Medium));
    }

    #[test]
    fn test_parse_and_group_semantics() {
        let rule: GenreRule = serde_yaml::from_str(
            "genre: Techno\nfamily: electronic\nrules:\n  tempo: {min: 124, max: 140}\n  energy: {not: low}\n",
        )
        .unwrap();
        assert_eq!(rule.family, GenreFamily::Electronic);
        assert!(rule.matches(&inputs(130.0, EnergyBand::High)));
        assert!(!rule.matches(&inputs(130.0, EnergyBand::Low)));
        assert!(!rule.matches(&inputs(150.0, EnergyBand::High)));
    }

    #[test]
    fn test_parse_or_list_semantics() {
        let rule: GenreRule = serde_yaml::from_str(
            "genre: Rock\nrules:\n  - tempo: {min: 105, max: 160}\n  - spectral_centroid: {min: 2400}\n",
        )
        .unwrap();
        assert_eq!(rule.family, GenreFamily::Other);
        assert!(matches!(rule.rules, RulePredicate::AnyOf(ref g) if g.len() == 2));
        // Tempo fails, centroid passes
        assert!(rule.matches(&inputs(90.0, EnergyBand::Low)));
    }

    #[test]
    fn test_unknown_feature_is_rejected() {
        let parsed: Result<GenreRule, _> =
            serde_yaml::from_str("genre: Odd\nrules:\n  loudness: {min: 3}\n");
        assert!(parsed.is_err());

        let parsed: Result<GenreRule, _> =
            serde_yaml::from_str("genre: Odd\nrules:\n  tempo: {minimum: 3}\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_tempo_range_rule() {
        let rule = GenreRule::tempo_range("Polka", GenreFamily::Acoustic, 100.0, 120.0);
        assert!(rule.matches(&inputs(110.0, EnergyBand::Low)));
        assert!(!rule.matches(&inputs(121.0, EnergyBand::Low)));
    }
}
