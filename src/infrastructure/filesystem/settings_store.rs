use crate::domain::entities::repository_config::RepositoryConfig;
use crate::domain::value_objects::backend_kind::BackendKind;
use crate::domain::value_objects::git_url::{GitUrl, GitUrlError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::Validate;

/// Settings file related errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings file not found at path: {0}")]
    SettingsFileNotFound(String),

    #[error("Settings validation failed: {0}")]
    ValidationFailed(String),

    #[error("Git URL error: {0}")]
    GitUrlError(#[from] GitUrlError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// `repository` block of the settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct RepositorySettings {
    #[validate(length(min = 1, message = "Repository URL cannot be empty"))]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255))]
    pub branch: Option<String>,

    #[serde(default)]
    pub shallow_clone: bool,

    #[serde(default)]
    pub no_checkout: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursive_submodule_update: Option<bool>,
}

impl From<RepositorySettings> for RepositoryConfig {
    fn from(settings: RepositorySettings) -> Self {
        let mut config = RepositoryConfig::new(settings.url)
            .with_shallow_clone(settings.shallow_clone)
            .with_no_checkout(settings.no_checkout);
        if let Some(username) = settings.username {
            config = config.with_username(username);
        }
        if let Some(password) = settings.password {
            config = config.with_password(password);
        }
        if let Some(branch) = settings.branch {
            config = config.with_branch(branch);
        }
        if let Some(recursive) = settings.recursive_submodule_update {
            config = config.with_recursive_submodule_update(recursive);
        }
        config
    }
}

/// Poller settings file
///
/// ```yaml
/// backend: library
/// working_dir: /var/lib/gitpoller/checkout
/// repository:
///   url: https://github.com/gocd/gocd
///   branch: master
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PollerSettings {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Sub-paths a poll is restricted to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    #[validate(nested)]
    pub repository: RepositorySettings,
}

impl PollerSettings {
    /// Check field constraints and that the URL is one git could use
    pub fn validate_settings(&self) -> Result<(), SettingsError> {
        self.validate()
            .map_err(|e| SettingsError::ValidationFailed(e.to_string()))?;
        GitUrl::new(&self.repository.url)?;
        Ok(())
    }

    pub fn repository_config(&self) -> RepositoryConfig {
        self.repository.clone().into()
    }
}

/// Reads and writes [`PollerSettings`] as YAML
#[derive(Debug, Default)]
pub struct SettingsStore;

impl SettingsStore {
    pub fn new() -> Self {
        Self
    }

    /// Read and validate a settings file
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<PollerSettings, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::SettingsFileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)?;
        let settings = self.parse(&content)?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn parse(&self, content: &str) -> Result<PollerSettings, SettingsError> {
        let settings: PollerSettings = serde_yaml::from_str(content)?;
        settings.validate_settings()?;
        Ok(settings)
    }

    /// Write `settings`, creating parent directories. The password is never
    /// written.
    pub fn write<P: AsRef<Path>>(&self, path: P, settings: &PollerSettings) -> Result<(), SettingsError> {
        settings.validate_settings()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_yaml::to_string(settings)?)?;
        Ok(())
    }
}
