//! YAML file helpers shared by every configuration and rule file

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a YAML file, falling back to `T::default()`
///
/// A missing file is normal (first run) and logged at info level; an
/// unreadable or unparsable file is logged as a warning.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return T::default();
    }

    match read_yaml(path) {
        Ok(config) => {
            log::info!("load_config: Loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: {:#}, using defaults", e);
            T::default()
        }
    }
}

/// Read and parse a YAML file, reporting any failure
pub fn read_yaml<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))
}

/// Write a value as YAML, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    log::info!("save_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write {:?}", path))?;

    log::info!("save_config: Saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Sample {
        workers: u8,
        label: String,
    }

    #[test]
    fn test_missing_file_gives_default() {
        let loaded: Sample = load_config(Path::new("/nonexistent/cadence/config.yaml"));
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_invalid_yaml_gives_default_but_read_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "workers: [not a number").unwrap();

        let loaded: Sample = load_config(&path);
        assert_eq!(loaded, Sample::default());
        assert!(read_yaml::<Sample>(&path).is_err());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let value = Sample {
            workers: 4,
            label: "batch".to_string(),
        };

        save_config(&value, &path).unwrap();
        let loaded: Sample = load_config(&path);
        assert_eq!(loaded, value);
    }
}
