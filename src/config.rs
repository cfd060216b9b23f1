use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::resolve::DEFAULT_CHECKSUM_EXTENSION;

pub const DEFAULT_CONFIG_FILE: &str = "irods-submit.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub script_dir: Option<String>,
    #[serde(default)]
    pub checksum_extension: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub scheduler: Option<SchedulerEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SchedulerEntry {
    #[serde(default)]
    pub memory_mb: Option<u32>,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub log: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub memory_mb: u32,
    pub partition: Option<String>,
    pub log: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            memory_mb: 4000,
            partition: None,
            log: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub script_dir: String,
    pub checksum_extension: String,
    pub version: String,
    pub scheduler: SchedulerConfig,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist; the default file is optional.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SubmitError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SubmitError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SubmitError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        let scheduler = config.scheduler.unwrap_or_default();
        let defaults = SchedulerConfig::default();

        ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            script_dir: config.script_dir.unwrap_or_else(default_script_dir),
            checksum_extension: config
                .checksum_extension
                .map(|ext| ext.trim_start_matches('.').to_string())
                .unwrap_or_else(|| DEFAULT_CHECKSUM_EXTENSION.to_string()),
            version: config.version.unwrap_or_else(default_version),
            scheduler: SchedulerConfig {
                memory_mb: scheduler.memory_mb.unwrap_or(defaults.memory_mb),
                partition: scheduler.partition.or(defaults.partition),
                log: scheduler.log.unwrap_or(defaults.log),
            },
        }
    }
}

pub fn default_script_dir() -> String {
    "shfiles".to_string()
}

pub fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default());
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.script_dir, "shfiles");
        assert_eq!(resolved.checksum_extension, "md5");
        assert_eq!(resolved.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(resolved.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn partial_scheduler_section() {
        let config: Config = serde_json::from_str(
            r#"{"checksum_extension": ".md5sum", "scheduler": {"partition": "long"}}"#,
        )
        .unwrap();
        let resolved = ConfigLoader::resolve_config(config);
        assert_eq!(resolved.checksum_extension, "md5sum");
        assert_eq!(resolved.scheduler.partition.as_deref(), Some("long"));
        assert_eq!(resolved.scheduler.memory_mb, 4000);
    }
}
