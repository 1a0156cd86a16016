// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::types::{Criterion, CriterionMap, DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_SCORE, MAX_SCORE};
use crate::infra::errors::RedraftError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.venice.ai/api/v1".into(),
            model: "venice-uncensored".into(),
            api_key_env: "VENICE_API_KEY".into(),
            max_retries: 3,
        }
    }
}

impl ProviderConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub max_iterations: u32,
    /// Partial maps are allowed; missing criteria use the default threshold.
    pub min_scores: BTreeMap<Criterion, f32>,
    pub generation_timeout_secs: u64,
    pub evaluation_timeout_secs: u64,
    pub inference_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            min_scores: BTreeMap::new(),
            generation_timeout_secs: 120,
            evaluation_timeout_secs: 60,
            inference_timeout_secs: 30,
        }
    }
}

impl WorkflowConfig {
    pub fn min_scores(&self) -> CriterionMap<f32> {
        CriterionMap::from_fn(|c| {
            self.min_scores
                .get(&c)
                .copied()
                .unwrap_or(DEFAULT_MIN_SCORE)
        })
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_secs(self.evaluation_timeout_secs)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    /// Reject values that would make every run fail or time out.
    pub fn validate(&self) -> Result<(), RedraftError> {
        if self.max_iterations == 0 {
            return Err(RedraftError::Config(
                "workflow.max_iterations must be at least 1".into(),
            ));
        }
        for (criterion, &threshold) in &self.min_scores {
            if !(0.0..=MAX_SCORE).contains(&threshold) {
                return Err(RedraftError::Config(format!(
                    "workflow.min_scores.{} must be between 0 and {MAX_SCORE}, got {threshold}",
                    criterion.key()
                )));
            }
        }
        for (name, secs) in [
            ("generation_timeout_secs", self.generation_timeout_secs),
            ("evaluation_timeout_secs", self.evaluation_timeout_secs),
            ("inference_timeout_secs", self.inference_timeout_secs),
        ] {
            if secs == 0 {
                return Err(RedraftError::Config(format!(
                    "workflow.{name} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token required on `/api/v1` routes when set.
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn db_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(paths::db_path)
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config
            .workflow
            .validate()
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.workflow.max_iterations, 3);
        assert_eq!(c.workflow.generation_timeout_secs, 120);
        assert_eq!(c.api.port, 3001);
        assert!(c.api.token.is_none());
        assert_eq!(c.provider.api_key_env, "VENICE_API_KEY");
    }

    #[test]
    fn test_default_min_scores_are_seven() {
        let c = Config::default();
        let min = c.workflow.min_scores();
        for criterion in Criterion::ALL {
            assert!((min[criterion] - 7.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.workflow.max_iterations, 3);
        assert_eq!(config.provider.max_retries, 3);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[provider]
base_url = "http://localhost:8080/v1"
model = "local-model"
api_key_env = "LOCAL_KEY"
max_retries = 5

[workflow]
max_iterations = 5
generation_timeout_secs = 30
evaluation_timeout_secs = 10
inference_timeout_secs = 5

[workflow.min_scores]
horniness = 6.0
contentPreservationScore = 8.5

[api]
host = "0.0.0.0"
port = 8080
token = "secret"

[store]
path = "/tmp/redraft-test.db"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider.base_url, "http://localhost:8080/v1");
        assert_eq!(config.provider.max_retries, 5);
        assert_eq!(config.workflow.max_iterations, 5);
        assert_eq!(config.workflow.evaluation_timeout(), Duration::from_secs(10));
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.token.as_deref(), Some("secret"));
        assert_eq!(
            config.store.db_path(),
            PathBuf::from("/tmp/redraft-test.db")
        );

        let min = config.workflow.min_scores();
        assert!((min[Criterion::Intensity] - 6.0).abs() < f32::EPSILON);
        assert!((min[Criterion::ContentPreservation] - 8.5).abs() < f32::EPSILON);
        // Unspecified criteria keep the default
        assert!((min[Criterion::AttributeInclusion] - 7.0).abs() < f32::EPSILON);
        assert!((min[Criterion::StructurePreservation] - 7.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unknown_criterion_rejected() {
        let toml_str = r#"
[workflow.min_scores]
readability = 6.0
"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nport = 9999\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api.port, 9999);
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.workflow.max_iterations, 3);
    }

    // ─── Validation ─────────────────────────────────────────────

    #[test]
    fn test_defaults_validate() {
        assert!(WorkflowConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_max_iterations_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[workflow]\nmax_iterations = 0\n").unwrap();
        let err = Config::load_from(&path).unwrap_err().to_string();
        assert!(err.contains("max_iterations"));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[workflow.min_scores]\nkinkInclusion = 11.0\n").unwrap();
        let err = Config::load_from(&path).unwrap_err().to_string();
        assert!(err.contains("min_scores.kinkInclusion"));

        std::fs::write(&path, "[workflow.min_scores]\nhorniness = -1.0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[workflow]\ninference_timeout_secs = 0\n").unwrap();
        let err = Config::load_from(&path).unwrap_err().to_string();
        assert!(err.contains("inference_timeout_secs"));
    }

    #[test]
    fn test_boundary_values_accepted() {
        let config: Config = toml::from_str(
            "[workflow]\nmax_iterations = 1\n[workflow.min_scores]\nhorniness = 0.0\nkinkInclusion = 10.0\n",
        )
        .unwrap();
        assert!(config.workflow.validate().is_ok());
    }
}
