//! Default locations of cadence files
//!
//! Uses `dirs` so the layout follows platform conventions
//! (XDG on Linux, `~/Library` on macOS, `%APPDATA%` on Windows).

use std::path::PathBuf;

const APP_DIR: &str = "cadence";

/// `~/.config/cadence`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// `~/.config/cadence/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

/// `~/.config/cadence/genre_rules.yaml`
pub fn default_rules_path() -> PathBuf {
    default_config_path("genre_rules.yaml")
}

/// `~/.cache/cadence/models`
pub fn default_models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("models")
}

/// `<tmp>/cadence-stems`, parent of per-run scratch directories
pub fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("cadence-stems")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_end_with_expected_names() {
        assert!(default_rules_path().ends_with("cadence/genre_rules.yaml"));
        assert!(default_models_dir().ends_with("cadence/models"));
        assert!(default_scratch_dir().ends_with("cadence-stems"));
    }
}
