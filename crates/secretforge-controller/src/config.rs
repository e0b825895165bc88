use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconciler::ReconcilerSettings;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[source] config::ConfigError),

    #[error("config deserialize error: {0}")]
    Deserialize(#[source] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.retry_delay_secs == 0 {
            return Err(ConfigError::Invalid(
                "controller.retry_delay_secs must be > 0".into(),
            ));
        }
        if self.controller.workers == 0 {
            return Err(ConfigError::Invalid("controller.workers must be > 0".into()));
        }
        if self.controller.default_target_type.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "controller.default_target_type must not be empty".into(),
            ));
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {}, got {}",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Fixed delay before a failed reconciliation is retried.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Concurrent reconciliations.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_target_type")]
    pub default_target_type: String,
}

impl ControllerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            retry_delay: self.retry_delay(),
            default_target_type: self.default_target_type.clone(),
        }
    }
}

fn default_retry_delay_secs() -> u64 {
    5
}
fn default_workers() -> usize {
    2
}
fn default_target_type() -> String {
    secretforge_core::DEFAULT_SECRET_TYPE.into()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_retry_delay_secs(),
            workers: default_workers(),
            default_target_type: default_target_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TemplateConfig {
    /// Fail rendering on undefined references instead of printing nothing.
    #[serde(default)]
    pub strict_undefined: bool,
}

impl TemplateConfig {
    pub fn options(&self) -> secretforge_engine::TemplateOptions {
        secretforge_engine::TemplateOptions {
            strict_undefined: self.strict_undefined,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::{AppConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub const DEFAULT_CONFIG_FILE: &str = "secretforge.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // e.g. SECRETFORGE__CONTROLLER__WORKERS=4
        builder = builder.add_source(
            Environment::with_prefix("SECRETFORGE")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder.build().map_err(ConfigError::Build)?;
        let merged: AppConfig = cfg.try_deserialize().map_err(ConfigError::Deserialize)?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, ConfigError> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}
