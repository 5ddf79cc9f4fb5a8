use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    APP_NAME, CONFIG_PLACEHOLDER, DEFAULT_CLOUD_MODEL, DEFAULT_CLOUD_PROVIDER, DEFAULT_LOG_LEVEL,
    DEFAULT_REFRESH_DELAY_MS, DEFAULT_RESTART_DELAY_MS, DEFAULT_TEMPERATURE, ENV_PREFIX,
};
use crate::download::DownloadSettings;
use crate::models::{ConnectionParams, ModelDescriptor, ModelKind};
use crate::registry::CloudModel;
use crate::runtime::RuntimeSettings;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// On-device engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Cloud providers and their default models
    #[serde(default = "default_clouds")]
    pub cloud: Vec<CloudConfig>,

    /// Chat session tuning
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            cloud: default_clouds(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// On-device engine settings. Unfilled values keep the `<` placeholder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Runtime license
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Developer id token used to authorize against the runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_token: Option<String>,
    /// API key embedded in the use case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Use-case descriptor deployed before the first download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_case: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_case_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// A cloud provider and the model used for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    pub name: String,
    pub model: String,
    /// Whether the model accepts image attachments
    #[serde(default)]
    pub vision: bool,
    /// Seeded into the credential store at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub temperature: f32,
    /// Pause before re-enumerating models after a change
    pub refresh_delay_ms: u64,
    /// Pause between a full reset and the next startup
    pub restart_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            refresh_delay_ms: DEFAULT_REFRESH_DELAY_MS,
            restart_delay_ms: DEFAULT_RESTART_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter directive, overridden by RUST_LOG
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

fn default_clouds() -> Vec<CloudConfig> {
    vec![CloudConfig {
        name: DEFAULT_CLOUD_PROVIDER.to_string(),
        model: DEFAULT_CLOUD_MODEL.to_string(),
        vision: true,
        api_key: None,
    }]
}

/// A value still holding the placeholder marker counts as absent
fn filled(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.contains(CONFIG_PLACEHOLDER))
        .map(str::to_string)
}

impl Config {
    pub fn license(&self) -> Option<String> {
        filled(&self.engine.license)
    }

    pub fn developer_token(&self) -> Option<String> {
        filled(&self.engine.developer_token)
    }

    pub fn api_key(&self) -> Option<String> {
        filled(&self.engine.api_key)
    }

    pub fn connection(&self) -> ConnectionParams {
        ConnectionParams {
            port: self.engine.port,
            client_id: filled(&self.engine.client_id),
        }
    }

    pub fn cloud_models(&self) -> Vec<CloudModel> {
        self.cloud
            .iter()
            .filter(|cloud| !cloud.name.is_empty() && !cloud.model.is_empty())
            .map(|cloud| {
                let kind = if cloud.vision {
                    ModelKind::Vlm
                } else {
                    ModelKind::Llm
                };
                CloudModel {
                    provider: cloud.name.clone(),
                    model: ModelDescriptor::new(cloud.model.clone(), kind),
                }
            })
            .collect()
    }

    /// Cloud providers with a usable API key
    pub fn cloud_credentials(&self) -> Vec<(String, String)> {
        self.cloud
            .iter()
            .filter_map(|cloud| filled(&cloud.api_key).map(|key| (cloud.name.clone(), key)))
            .collect()
    }

    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            api_key: self.api_key(),
            use_case: self.engine.use_case.clone(),
            use_case_version: filled(&self.engine.use_case_version),
            connection: self.connection(),
            clouds: self.cloud_models(),
            refresh_delay: Duration::from_millis(self.session.refresh_delay_ms),
        }
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            license: self.license(),
            developer_token: self.developer_token(),
            restart_delay: Duration::from_millis(self.session.restart_delay_ms),
        }
    }

    /// Names of required engine values that are missing or still placeholders
    pub fn missing_values(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.license().is_none() {
            missing.push("engine.license");
        }
        if self.developer_token().is_none() {
            missing.push("engine.developer_token");
        }
        if self.api_key().is_none() {
            missing.push("engine.api_key");
        }
        if self.engine.use_case.is_none() {
            missing.push("engine.use_case");
        }
        missing
    }
}

/// Layer the config sources, later ones winning
fn build_figment(files: &[PathBuf]) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    for file in files {
        if file.exists() {
            figment = figment.merge(Toml::file(file));
        }
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load configuration from multiple sources
///
/// Global `config.toml`, then `.parley/config.toml` in the working directory,
/// then `explicit` if given, then `PARLEY_` environment variables.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut files = vec![
        get_config_dir()?.join("config.toml"),
        PathBuf::from(".parley/config.toml"),
    ];
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        files.push(path.to_path_buf());
    }

    build_figment(&files)
        .extract()
        .context("Failed to load configuration")
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    } else {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        let config_dir = PathBuf::from(home).join(".config").join(APP_NAME);
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }
}

/// Where the deployed use case is persisted
pub fn use_case_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("use_case.json"))
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Template written by `init`, with placeholders for the engine secrets
fn template_config() -> Config {
    let mut config = Config::default();
    config.engine = EngineConfig {
        license: Some("<runtime license>".to_string()),
        developer_token: Some("<developer id token>".to_string()),
        api_key: Some("<use case api key>".to_string()),
        use_case: None,
        use_case_version: Some("1".to_string()),
        port: None,
        client_id: None,
    };
    if let Some(cloud) = config.cloud.first_mut() {
        cloud.api_key = Some("<cloud api key>".to_string());
    }
    config
}

/// Create a default configuration file if it doesn't exist. Returns the path
/// when a file was written.
pub fn init_config(path: Option<PathBuf>) -> Result<Option<PathBuf>> {
    let config_file = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };
    if config_file.exists() {
        return Ok(None);
    }
    save_config(&template_config(), Some(config_file.clone()))?;
    Ok(Some(config_file))
}
