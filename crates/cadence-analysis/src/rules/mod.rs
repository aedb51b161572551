//! Data-driven genre classification
//!
//! Rules live in a user-editable YAML file (see `default_rules.yaml` for the
//! bundled set and the format). The file is re-read for every classification.

mod engine;
mod rule;
mod store;

pub use engine::{evaluate, is_auto_detect, GenreDecision, GenreSource, RuleEngine, DEFAULT_GENRE};
pub use rule::{
    EnergyBound, GenreFamily, GenreRule, NumericBound, RuleGroup, RuleInputs, RulePredicate,
};
pub use store::{
    default_rules, genre_choices, RuleStore, RuleStoreError, StaticRuleStore, YamlRuleStore,
    AUTO_DETECT,
};
