// src/config.rs

use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::warn;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file '{}'", path))?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    /// A malformed file is still an error.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            warn!("config file '{}' not found, using defaults", path);
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
review:
  language: en
  include_legal_conclusion: false
  default_observation_match: 0.5
logging:
  level: debug
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.review.language, Language::En);
        assert!(!config.review.include_legal_conclusion);
        assert_eq!(config.review.default_observation_match, 0.5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.review.language, Language::Nl);
        assert!(config.review.include_legal_conclusion);
        assert_eq!(config.review.default_observation_match, 0.0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/nonexistent/review.yaml").unwrap();
        assert_eq!(config.review.language, Language::Nl);
    }
}
