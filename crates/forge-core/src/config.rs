//! Configuration management for Forge

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Configuration file names searched in the working directory
pub const CONFIG_FILE_NAMES: &[&str] =
    &["forge.config.yaml", "forge.config.yml", "forge.config.json"];

/// Config file name inside `$FORGE_HOME`
pub const HOME_CONFIG_FILE: &str = "config.yaml";

pub const FORGE_HOME_ENV: &str = "FORGE_HOME";

/// API key variables, highest priority first
pub const API_KEY_ENVS: &[&str] = &["FORGE_API_KEY", "OPENAI_API_KEY"];

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Forge directory: `$FORGE_HOME`, else `~/.forge`
pub fn forge_home() -> PathBuf {
    if let Ok(home) = std::env::var(FORGE_HOME_ENV) {
        if !home.trim().is_empty() {
            return PathBuf::from(home);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".forge")
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub provider: ProviderSettings,
    pub sandbox: SandboxSettings,
    pub quota: QuotaSettings,
}

/// Text-generation provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            max_tokens: 8000,
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

/// Which sandbox runtime to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeChoice {
    /// Native when available, simulated otherwise
    #[default]
    Auto,
    Native,
    Simulated,
}

impl RuntimeChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeChoice::Auto => "auto",
            RuntimeChoice::Native => "native",
            RuntimeChoice::Simulated => "simulated",
        }
    }
}

impl std::str::FromStr for RuntimeChoice {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(RuntimeChoice::Auto),
            "native" => Ok(RuntimeChoice::Native),
            "simulated" => Ok(RuntimeChoice::Simulated),
            other => Err(ForgeError::InvalidConfig(format!(
                "unknown runtime '{}', expected auto, native or simulated",
                other
            ))),
        }
    }
}

impl std::fmt::Display for RuntimeChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sandbox runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    pub runtime: RuntimeChoice,
    pub ready_timeout_secs: u64,
    pub simulated_ready_timeout_ms: u64,
    pub log_capacity: usize,
    pub install_command: String,
    pub dev_command: String,
    /// Root for scratch project directories; system temp dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            runtime: RuntimeChoice::Auto,
            ready_timeout_secs: 30,
            simulated_ready_timeout_ms: 3000,
            log_capacity: 20,
            install_command: "npm install".to_string(),
            dev_command: "npm run dev".to_string(),
            workdir: None,
        }
    }
}

/// Daily prompt allowance settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSettings {
    pub daily_limit: u32,
    pub enabled: bool,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            daily_limit: 5,
            enabled: true,
        }
    }
}

/// Validation result
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_error(mut self, error: ValidationError) -> Self {
        self.valid = false;
        self.errors.push(error);
        self
    }

    pub fn with_warning(mut self, warning: ValidationWarning) -> Self {
        self.warnings.push(warning);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Loads, caches, validates and saves configuration files
pub struct ConfigManager {
    cache: HashMap<PathBuf, CachedConfig>,
}

struct CachedConfig {
    config: ForgeConfig,
    modified_time: SystemTime,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Find a configuration file in a directory
    pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Load configuration from a file, reusing the cached parse while the
    /// file's mtime is unchanged
    pub fn load(&mut self, config_path: &Path) -> Result<ForgeConfig> {
        let metadata = std::fs::metadata(config_path)?;
        let modified_time = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        if let Some(cached) = self.cache.get(config_path) {
            if cached.modified_time == modified_time {
                return Ok(cached.config.clone());
            }
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: ForgeConfig = if is_json(config_path) {
            serde_json::from_str(&content)?
        } else if content.trim().is_empty() {
            ForgeConfig::default()
        } else {
            serde_yaml::from_str(&content)?
        };

        self.cache.insert(
            config_path.to_path_buf(),
            CachedConfig {
                config: config.clone(),
                modified_time,
            },
        );

        Ok(config)
    }

    /// Load configuration from a directory (searches for config files)
    pub fn load_from_directory(&mut self, dir: &Path) -> Result<(ForgeConfig, PathBuf)> {
        let config_path = Self::find_config_file(dir)
            .ok_or_else(|| ForgeError::ConfigNotFound(dir.display().to_string()))?;

        let config = self.load(&config_path)?;
        Ok((config, config_path))
    }

    /// Effective configuration for a working directory: the project file,
    /// else the one in `home`, else defaults. Environment overrides are
    /// applied last.
    pub fn resolve(&mut self, dir: &Path, home: &Path) -> Result<(ForgeConfig, Option<PathBuf>)> {
        let (mut config, source) = match Self::find_config_file(dir) {
            Some(path) => (self.load(&path)?, Some(path)),
            None => {
                let home_config = home.join(HOME_CONFIG_FILE);
                if home_config.exists() {
                    (self.load(&home_config)?, Some(home_config))
                } else {
                    (ForgeConfig::default(), None)
                }
            }
        };

        apply_env_overrides(&mut config);
        Ok((config, source))
    }

    /// Validate a configuration
    pub fn validate(&self, config: &ForgeConfig) -> ValidationResult {
        let mut result = ValidationResult::ok();

        let url = config.provider.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            result = result.with_error(ValidationError {
                field: "provider.api_url".to_string(),
                message: format!("'{}' is not an http(s) URL", url),
                code: "INVALID_URL".to_string(),
            });
        }

        if config.provider.model.trim().is_empty() {
            result = result.with_error(ValidationError {
                field: "provider.model".to_string(),
                message: "Model name must not be empty".to_string(),
                code: "EMPTY_MODEL".to_string(),
            });
        }

        if config.provider.timeout_secs == 0 {
            result = result.with_error(ValidationError {
                field: "provider.timeout_secs".to_string(),
                message: "Provider timeout must be greater than zero".to_string(),
                code: "ZERO_TIMEOUT".to_string(),
            });
        }

        if config.provider.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            result = result.with_warning(ValidationWarning {
                field: "provider.api_key".to_string(),
                message: "No API key configured; generation requests will fail".to_string(),
                suggestion: Some(format!("Set {} or provider.api_key", API_KEY_ENVS[0])),
            });
        }

        if config.sandbox.ready_timeout_secs == 0 {
            result = result.with_error(ValidationError {
                field: "sandbox.ready_timeout_secs".to_string(),
                message: "Ready timeout must be greater than zero".to_string(),
                code: "ZERO_TIMEOUT".to_string(),
            });
        }

        if config.sandbox.simulated_ready_timeout_ms == 0 {
            result = result.with_error(ValidationError {
                field: "sandbox.simulated_ready_timeout_ms".to_string(),
                message: "Simulated ready timeout must be greater than zero".to_string(),
                code: "ZERO_TIMEOUT".to_string(),
            });
        }

        if config.sandbox.log_capacity == 0 {
            result = result.with_error(ValidationError {
                field: "sandbox.log_capacity".to_string(),
                message: "Log capacity must be at least 1".to_string(),
                code: "ZERO_CAPACITY".to_string(),
            });
        }

        for (field, command) in [
            ("sandbox.install_command", &config.sandbox.install_command),
            ("sandbox.dev_command", &config.sandbox.dev_command),
        ] {
            if command.trim().is_empty() {
                result = result.with_error(ValidationError {
                    field: field.to_string(),
                    message: "Command must not be empty".to_string(),
                    code: "EMPTY_COMMAND".to_string(),
                });
            }
        }

        if config.quota.enabled && config.quota.daily_limit == 0 {
            result = result.with_warning(ValidationWarning {
                field: "quota.daily_limit".to_string(),
                message: "Daily limit is zero; every generation will be refused".to_string(),
                suggestion: Some("Raise the limit or set quota.enabled to false".to_string()),
            });
        }

        result
    }

    /// Save configuration to a file
    pub fn save(&self, config: &ForgeConfig, config_path: &Path) -> Result<()> {
        let content = if is_json(config_path) {
            serde_json::to_string_pretty(config)?
        } else {
            serde_yaml::to_string(config)?
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(config_path, content)?;

        Ok(())
    }

    /// Clear the cache
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}

/// Pull the API key from the environment when set
pub fn apply_env_overrides(config: &mut ForgeConfig) {
    for var in API_KEY_ENVS {
        if let Ok(key) = std::env::var(var) {
            if !key.trim().is_empty() {
                config.provider.api_key = Some(key);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ForgeConfig::default();
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.provider.max_tokens, 8000);
        assert_eq!(config.sandbox.runtime, RuntimeChoice::Auto);
        assert_eq!(config.sandbox.log_capacity, 20);
        assert_eq!(config.quota.daily_limit, 5);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("forge.config.yaml");
        std::fs::write(
            &path,
            "sandbox:\n  runtime: simulated\n  log_capacity: 50\nquota:\n  daily_limit: 10\n",
        )?;

        let mut manager = ConfigManager::new();
        let (config, found) = manager.load_from_directory(dir.path())?;
        assert_eq!(found, path);
        assert_eq!(config.sandbox.runtime, RuntimeChoice::Simulated);
        assert_eq!(config.sandbox.log_capacity, 50);
        assert_eq!(config.sandbox.dev_command, "npm run dev");
        assert_eq!(config.quota.daily_limit, 10);
        assert!(config.quota.enabled);
        Ok(())
    }

    #[test]
    fn test_json_config_and_missing_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut manager = ConfigManager::new();
        assert!(matches!(
            manager.load_from_directory(dir.path()),
            Err(ForgeError::ConfigNotFound(_))
        ));

        std::fs::write(
            dir.path().join("forge.config.json"),
            r#"{"provider": {"model": "gpt-4o-mini"}}"#,
        )?;
        let (config, _) = manager.load_from_directory(dir.path())?;
        assert_eq!(config.provider.model, "gpt-4o-mini");
        Ok(())
    }

    #[test]
    fn test_resolve_falls_back_to_home() -> Result<()> {
        let project = tempfile::tempdir()?;
        let home = tempfile::tempdir()?;

        let mut manager = ConfigManager::new();
        let (config, source) = manager.resolve(project.path(), home.path())?;
        assert!(source.is_none());
        assert_eq!(config.sandbox, SandboxSettings::default());

        std::fs::write(home.path().join(HOME_CONFIG_FILE), "quota:\n  enabled: false\n")?;
        let (config, source) = manager.resolve(project.path(), home.path())?;
        assert_eq!(source, Some(home.path().join(HOME_CONFIG_FILE)));
        assert!(!config.quota.enabled);
        Ok(())
    }

    #[test]
    fn test_save_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/config.yaml");
        let mut config = ForgeConfig::default();
        config.sandbox.ready_timeout_secs = 45;

        let mut manager = ConfigManager::new();
        manager.save(&config, &path)?;
        assert_eq!(manager.load(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_validate() {
        let manager = ConfigManager::new();
        let mut config = ForgeConfig::default();
        config.provider.api_key = Some("sk-test".to_string());
        let result = manager.validate(&config);
        assert!(result.valid);
        assert!(result.warnings.is_empty());

        config.provider.api_key = None;
        config.provider.api_url = "ftp://example.com".to_string();
        config.sandbox.log_capacity = 0;
        config.sandbox.dev_command = "  ".to_string();
        let result = manager.validate(&config);
        assert!(!result.valid);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["provider.api_url", "sandbox.log_capacity", "sandbox.dev_command"]
        );
        assert_eq!(result.warnings[0].field, "provider.api_key");
    }

    #[test]
    fn test_runtime_choice_parse() {
        assert_eq!("Native".parse::<RuntimeChoice>().unwrap(), RuntimeChoice::Native);
        assert!("docker".parse::<RuntimeChoice>().is_err());
    }
}
