//! Engine configuration
//!
//! Loaded from environment variables (after `.env`) or from a YAML file.
//!
//! | Variable            | Field          | Default |
//! |---------------------|----------------|---------|
//! | `MYCELIA_CATALOG`   | `catalog_path` | none    |
//! | `MYCELIA_STRICT`    | `strict`       | `true`  |
//! | `MYCELIA_MAX_DEPTH` | `max_depth`    | `32`    |
//! | `MYCELIA_EXPORT`    | `export_path`  | none    |

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use mycelia_core::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const ENV_CATALOG: &str = "MYCELIA_CATALOG";
pub const ENV_STRICT: &str = "MYCELIA_STRICT";
pub const ENV_MAX_DEPTH: &str = "MYCELIA_MAX_DEPTH";
pub const ENV_EXPORT: &str = "MYCELIA_EXPORT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Abort a load on the first malformed or unlinkable entry
    pub strict: bool,
    /// Bound on nested references while rendering
    pub max_depth: usize,
    /// Catalog loaded at startup (text or snapshot)
    pub catalog_path: Option<PathBuf>,
    /// Default destination of `export`
    pub export_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict: true,
            max_depth: DEFAULT_MAX_DEPTH,
            catalog_path: None,
            export_path: None,
        }
    }
}

impl EngineConfig {
    /// Read `MYCELIA_*` variables. A `.env` file is loaded first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup(ENV_CATALOG).filter(|v| !v.is_empty()) {
            config.catalog_path = Some(PathBuf::from(path));
        }
        if let Some(v) = lookup(ENV_STRICT) {
            config.strict = parse_bool(&v).with_context(|| format!("Invalid {}", ENV_STRICT))?;
        }
        if let Some(v) = lookup(ENV_MAX_DEPTH) {
            config.max_depth = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: '{}'", ENV_MAX_DEPTH, v))?;
        }
        if let Some(path) = lookup(ENV_EXPORT).filter(|v| !v.is_empty()) {
            config.export_path = Some(PathBuf::from(path));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        info!("Loading engine configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            bail!("max_depth must be at least 1");
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("expected a boolean, got '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.strict);
        assert_eq!(config.max_depth, 32);
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_CATALOG, "styles.catalog"),
            (ENV_STRICT, "off"),
            (ENV_MAX_DEPTH, "8"),
            (ENV_EXPORT, "out/styles.mycl"),
        ]))
        .unwrap();
        assert!(!config.strict);
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.catalog_path, Some(PathBuf::from("styles.catalog")));
        assert_eq!(config.export_path, Some(PathBuf::from("out/styles.mycl")));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_STRICT, "maybe")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_MAX_DEPTH, "deep")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_MAX_DEPTH, "0")])).is_err());
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let config = EngineConfig::from_yaml_str("strict: false\n").unwrap();
        assert!(!config.strict);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "max_depth: 4\ncatalog_path: styles.catalog\n").unwrap();
        let config = EngineConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.max_depth, 4);
        assert!(config.strict);
        assert!(EngineConfig::from_yaml_file(&dir.path().join("missing.yaml")).is_err());
    }
}
