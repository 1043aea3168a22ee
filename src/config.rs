use crate::constants;
use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub mongodb_uri: String,
    pub database: String,
    pub collection: String,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongodb_uri: constants::DEFAULT_MONGODB_URI.to_string(),
            database: constants::DEFAULT_DATABASE.to_string(),
            collection: constants::DEFAULT_COLLECTION.to_string(),
            input_path: PathBuf::from(constants::DEFAULT_INPUT_PATH),
            output_dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            log_dir: PathBuf::from(constants::DEFAULT_LOG_DIR),
        }
    }
}

impl Config {
    /// Defaults, then the TOML file (if any), then the process environment.
    ///
    /// An explicitly named file must exist; the default `config.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(constants::DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        debug!("Loaded config file {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides fields from environment-style lookups; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MONGODB_URI") {
            self.mongodb_uri = v;
        }
        if let Some(v) = get("QUESTIONS_DB") {
            self.database = v;
        }
        if let Some(v) = get("QUESTIONS_COLLECTION") {
            self.collection = v;
        }
        if let Some(v) = get("POSTS_XML_PATH") {
            self.input_path = PathBuf::from(v);
        }
        if let Some(v) = get("REPORT_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("LOG_DIR") {
            self.log_dir = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(PipelineError::Config("database name is empty".to_string()));
        }
        if self.collection.trim().is_empty() {
            return Err(PipelineError::Config("collection name is empty".to_string()));
        }
        Ok(())
    }
}
