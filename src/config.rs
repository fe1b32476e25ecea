use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::project::DEFAULT_PROJECT_FILES;

/// Default target when nothing else is configured
pub const DEFAULT_TARGET: &str = "gemini-2.5-flash@gemini";

/// Default maximum model calls per request
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default cap on captured command output
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 30_000;

/// Configuration for the executeCommand tool
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BashConfig {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_output_bytes: Option<usize>,
}

impl BashConfig {
    pub fn max_output_bytes(&self) -> usize {
        self.max_output_bytes.unwrap_or(DEFAULT_MAX_OUTPUT_BYTES)
    }
}

/// Agent loop settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl AgentConfig {
    pub fn max_iterations(&self) -> usize {
        self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }
}

/// Project tracking settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProjectConfig {
    /// File names that mark their parent directory as the active project
    #[serde(default)]
    pub project_files: Option<Vec<String>>,
}

impl ProjectConfig {
    pub fn project_files(&self) -> Vec<String> {
        match &self.project_files {
            Some(files) => files.clone(),
            None => DEFAULT_PROJECT_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A parsed target: model@backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub model: String,
    pub backend: String,
}

impl Target {
    /// Parse a target string like "gpt-4o@chatgpt" into model and backend
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.rsplitn(2, '@').collect();
        if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            Some(Target {
                model: parts[1].to_string(),
                backend: parts[0].to_string(),
            })
        } else {
            None
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.model, self.backend)
    }
}

/// Configuration for a single backend (OpenAI-compatible API)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl BackendConfig {
    /// Resolve the API key from config or environment.
    /// Backends without auth (Ollama) get a placeholder the server ignores.
    pub fn resolve_api_key(&self) -> SecretString {
        if let Some(key) = &self.api_key {
            return SecretString::from(key.clone());
        }

        if let Some(env_var) = &self.api_key_env {
            if let Ok(key) = std::env::var(env_var) {
                return SecretString::from(key);
            }
        }

        SecretString::from("ollama".to_string())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub bash: BashConfig,
    #[serde(default)]
    pub project: ProjectConfig,
}

impl Config {
    /// Create config with built-in backends for the known providers
    pub fn with_builtin_backends() -> Self {
        let mut backends = HashMap::new();

        backends.insert(
            "gemini".to_string(),
            BackendConfig {
                base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
                api_key_env: Some("GOOGLE_API_KEY".to_string()),
                api_key: None,
            },
        );

        backends.insert(
            "chatgpt".to_string(),
            BackendConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key_env: Some("OPENAI_API_KEY".to_string()),
                api_key: None,
            },
        );

        backends.insert(
            "ollama".to_string(),
            BackendConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key_env: None,
                api_key: None,
            },
        );

        Config {
            backends,
            ..Config::default()
        }
    }

    /// Load configuration from default paths.
    /// Priority: local (.sitesmith/config.local.toml) > project (.sitesmith/config.toml)
    /// > user (~/.sitesmith/config.toml) > built-ins
    pub fn load() -> Result<Self> {
        let mut config = Self::with_builtin_backends();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".sitesmith").join("config.toml");
            if user_config.exists() {
                config.merge(Self::load_from(&user_config)?);
            }
        }

        let project_config = Path::new(".sitesmith").join("config.toml");
        if project_config.exists() {
            config.merge(Self::load_from(&project_config)?);
        }

        let local_config = Path::new(".sitesmith").join("config.local.toml");
        if local_config.exists() {
            config.merge(Self::load_from(&local_config)?);
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.agent.max_iterations == Some(0) {
            bail!("agent.max_iterations must be at least 1");
        }
        Ok(config)
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Config) {
        for (name, backend) in other.backends {
            self.backends.insert(name, backend);
        }

        if other.target.is_some() {
            self.target = other.target;
        }

        if other.agent.max_iterations.is_some() {
            self.agent.max_iterations = other.agent.max_iterations;
        }
        if other.agent.temperature.is_some() {
            self.agent.temperature = other.agent.temperature;
        }
        if other.project.project_files.is_some() {
            self.project.project_files = other.project.project_files;
        }

        if other.bash.timeout_ms.is_some() {
            self.bash.timeout_ms = other.bash.timeout_ms;
        }
        if other.bash.max_output_bytes.is_some() {
            self.bash.max_output_bytes = other.bash.max_output_bytes;
        }
    }

    /// The configured target, falling back to the built-in default
    pub fn default_target(&self) -> Option<Target> {
        Target::parse(self.target.as_deref().unwrap_or(DEFAULT_TARGET))
    }

    pub fn backend(&self, name: &str) -> Option<&BackendConfig> {
        self.backends.get(name)
    }
}
