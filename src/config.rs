use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Demographics, MissingValuePolicy};
use crate::pipeline::acquisition::AcquisitionOptions;

/// Application-level constants
pub const APP_NAME: &str = "labscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Env var naming a config file.
pub const CONFIG_ENV: &str = "LABSCAN_CONFIG";
/// Env var overriding `model_dir`.
pub const MODEL_DIR_ENV: &str = "LABSCAN_MODEL_DIR";

const CONFIG_FILE: &str = "config.json";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "labscan=debug"
    } else {
        "labscan=info"
    }
}

/// Get the application data directory (~/.labscan/).
/// Falls back to the working directory when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!(".{APP_NAME}"))
}

/// Default location of the classifier artifacts.
pub fn models_dir() -> PathBuf {
    app_data_dir().join("models")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabscanConfig {
    /// Directory holding `label_encoder.json` and the classifier.
    pub model_dir: PathBuf,
    /// JSON list of `{name, value_pattern}`; the built-in blood panel when unset.
    pub registry_path: Option<PathBuf>,
    pub missing_value_policy: MissingValuePolicy,
    pub acquisition_timeout_secs: u64,
    pub render_dpi: u32,
    pub ocr_fallback_min_chars: usize,
    pub tessdata_dir: Option<PathBuf>,
    pub ocr_languages: String,
    /// Applied where a request leaves age or gender out.
    pub default_demographics: Demographics,
}

impl Default for LabscanConfig {
    fn default() -> Self {
        let acquisition = AcquisitionOptions::default();
        Self {
            model_dir: models_dir(),
            registry_path: None,
            missing_value_policy: MissingValuePolicy::default(),
            acquisition_timeout_secs: DEFAULT_TIMEOUT_SECS,
            render_dpi: acquisition.render_dpi,
            ocr_fallback_min_chars: acquisition.ocr_fallback_min_chars,
            tessdata_dir: None,
            ocr_languages: "eng".to_string(),
            default_demographics: Demographics::default(),
        }
    }
}

impl LabscanConfig {
    /// Resolve configuration: explicit path, then `LABSCAN_CONFIG`, then
    /// `~/.labscan/config.json`, then built-in defaults. `LABSCAN_MODEL_DIR`
    /// overrides the model directory in every case.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve_with(explicit, &app_data_dir().join(CONFIG_FILE), |key| {
            std::env::var(key).ok()
        })
    }

    fn resolve_with<F>(
        explicit: Option<&Path>,
        user_file: &Path,
        env: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = env(CONFIG_ENV).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load(&path)?,
            None if user_file.exists() => Self::load(user_file)?,
            None => {
                tracing::debug!("No config file found, using defaults");
                Self::default()
            }
        };

        if let Some(dir) = env(MODEL_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            tracing::debug!(model_dir = %dir, "Model directory overridden from environment");
            config.model_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.acquisition_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "acquisition_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if !(72..=600).contains(&self.render_dpi) {
            return Err(ConfigError::Invalid {
                field: "render_dpi",
                reason: format!("{} is outside 72..=600", self.render_dpi),
            });
        }
        if self.ocr_languages.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "ocr_languages",
                reason: "must name at least one language".into(),
            });
        }
        Ok(())
    }

    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition_timeout_secs)
    }

    pub fn acquisition_options(&self) -> AcquisitionOptions {
        AcquisitionOptions {
            render_dpi: self.render_dpi,
            ocr_fallback_min_chars: self.ocr_fallback_min_chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_is_hidden_dot_dir() {
        assert!(app_data_dir().ends_with(".labscan"));
        assert!(models_dir().starts_with(app_data_dir()));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = LabscanConfig::default();
        assert_eq!(config.missing_value_policy, MissingValuePolicy::Placeholder);
        assert_eq!(config.acquisition_timeout(), Duration::from_secs(60));
        assert_eq!(config.render_dpi, 300);
        assert_eq!(config.ocr_fallback_min_chars, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"missing_value_policy": "skip", "default_demographics": {"age": 40, "gender": "F"}}"#,
        )
        .unwrap();

        let config = LabscanConfig::load(&path).unwrap();
        assert_eq!(config.missing_value_policy, MissingValuePolicy::Skip);
        assert_eq!(config.default_demographics.age, Some(40));
        assert_eq!(config.default_demographics.gender, Some(Gender::Female));
        assert_eq!(config.render_dpi, 300);
    }

    #[test]
    fn explicit_path_wins_over_env_and_user_file() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.json");
        let via_env = dir.path().join("env.json");
        let user = dir.path().join("user.json");
        std::fs::write(&explicit, r#"{"render_dpi": 200}"#).unwrap();
        std::fs::write(&via_env, r#"{"render_dpi": 150}"#).unwrap();
        std::fs::write(&user, r#"{"render_dpi": 100}"#).unwrap();
        let env = env_of(&[(CONFIG_ENV, via_env.to_str().unwrap())]);

        let config = LabscanConfig::resolve_with(Some(&explicit), &user, &env).unwrap();
        assert_eq!(config.render_dpi, 200);

        let config = LabscanConfig::resolve_with(None, &user, &env).unwrap();
        assert_eq!(config.render_dpi, 150);

        let config = LabscanConfig::resolve_with(None, &user, env_of(&[])).unwrap();
        assert_eq!(config.render_dpi, 100);
    }

    #[test]
    fn falls_back_to_defaults_without_any_file() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            LabscanConfig::resolve_with(None, &dir.path().join("absent.json"), env_of(&[]))
                .unwrap();
        assert_eq!(config, LabscanConfig::default());
    }

    #[test]
    fn model_dir_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_of(&[(MODEL_DIR_ENV, "/opt/labscan/models")]);
        let config =
            LabscanConfig::resolve_with(None, &dir.path().join("absent.json"), env).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/opt/labscan/models"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            LabscanConfig::load(&path).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"missing_value_policy": "guess"}"#).unwrap();
        assert!(LabscanConfig::load(&path).is_err());
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let config = LabscanConfig {
            acquisition_timeout_secs: 0,
            ..LabscanConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Invalid { field: "acquisition_timeout_secs", .. }
        ));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
