//! Where genre rules come from
//!
//! [`YamlRuleStore`] re-reads its file on every [`RuleStore::load`] so edits
//! made while the process runs apply to the next classification. The bundled
//! rule set is used until the file exists.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::rule::GenreRule;

/// Genre choice that defers to rule evaluation
pub const AUTO_DETECT: &str = "Auto-detect";

const DEFAULT_RULES_YAML: &str = include_str!("default_rules.yaml");

#[derive(Error, Debug)]
pub enum RuleStoreError {
    #[error("Failed to read rules from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rule file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write rules to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize rules: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("A rule for genre '{0}' already exists")]
    DuplicateGenre(String),
}

/// Source of the ordered rule list
pub trait RuleStore: Send + Sync {
    /// Current rules, in evaluation order
    fn load(&self) -> Result<Vec<GenreRule>, RuleStoreError>;

    /// Short description for log messages
    fn describe(&self) -> String;
}

/// The rule set compiled into the binary
pub fn default_rules() -> Vec<GenreRule> {
    match serde_yaml::from_str(DEFAULT_RULES_YAML) {
        Ok(rules) => rules,
        Err(e) => {
            log::error!("default_rules: Bundled rules failed to parse: {}", e);
            Vec::new()
        }
    }
}

/// "Auto-detect" followed by every genre name, sorted
///
/// Names differing only in case are listed once, first spelling wins.
pub fn genre_choices(rules: &[GenreRule]) -> Vec<String> {
    let mut names: Vec<String> = rules.iter().map(|r| r.genre.clone()).collect();
    names.sort_by_key(|n| n.to_lowercase());
    names.dedup_by(|a, b| a.to_lowercase() == b.to_lowercase());
    std::iter::once(AUTO_DETECT.to_string()).chain(names).collect()
}

/// Rules kept in a YAML file
#[derive(Debug, Clone)]
pub struct YamlRuleStore {
    path: PathBuf,
}

impl YamlRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a rule and persist the whole list
    ///
    /// When the file does not exist yet the bundled rules are written along
    /// with the new one. Genre names must be unique (case-insensitive).
    pub fn append_rule(&self, rule: GenreRule) -> Result<(), RuleStoreError> {
        let mut rules = self.load()?;
        if rules.iter().any(|r| r.genre.eq_ignore_ascii_case(&rule.genre)) {
            return Err(RuleStoreError::DuplicateGenre(rule.genre));
        }
        log::info!("append_rule: Adding '{}' to {:?}", rule.genre, self.path);
        rules.push(rule);
        self.write(&rules)
    }

    /// Write `rules`, replacing the file via a temporary sibling
    pub fn write(&self, rules: &[GenreRule]) -> Result<(), RuleStoreError> {
        let write_err = |source| RuleStoreError::Write {
            path: self.path.clone(),
            source,
        };

        let yaml = serde_yaml::to_string(rules).map_err(RuleStoreError::Serialize)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let temp_path = self.path.with_extension("yaml.tmp");
        std::fs::write(&temp_path, yaml).map_err(write_err)?;
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(write_err(e));
        }
        Ok(())
    }

    /// Choices for a genre picker; falls back to the bundled rules on error
    pub fn genre_choices(&self) -> Vec<String> {
        let rules = self.load().unwrap_or_else(|e| {
            log::warn!("genre_choices: {}, listing bundled genres", e);
            default_rules()
        });
        genre_choices(&rules)
    }
}

impl RuleStore for YamlRuleStore {
    fn load(&self) -> Result<Vec<GenreRule>, RuleStoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("load: {:?} not found, using bundled rules", self.path);
                return Ok(default_rules());
            }
            Err(source) => {
                return Err(RuleStoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_yaml::from_str(&contents).map_err(|source| RuleStoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        format!("{:?}", self.path)
    }
}

/// Fixed in-memory rules
#[derive(Debug, Clone, Default)]
pub struct StaticRuleStore {
    rules: Vec<GenreRule>,
}

impl StaticRuleStore {
    pub fn new(rules: Vec<GenreRule>) -> Self {
        Self { rules }
    }

    pub fn bundled() -> Self {
        Self::new(default_rules())
    }
}

impl RuleStore for StaticRuleStore {
    fn load(&self) -> Result<Vec<GenreRule>, RuleStoreError> {
        Ok(self.rules.clone())
    }

    fn describe(&self) -> String {
        format!("{} static rules", self.rules.len())
    }
}
