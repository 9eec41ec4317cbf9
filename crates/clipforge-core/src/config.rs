//! Process-wide configuration — providers, credentials and dispatch policy.
//!
//! Loaded once at startup from a YAML file and then shared read-only.
//! Every string value supports `${ENV_VAR}` and `${ENV_VAR:-default}`
//! expansion, so credentials can stay in the environment:
//!
//! ```yaml
//! providers:
//!   openai:
//!     api: openai
//!     base_url: "https://api.openai.com/v1"
//!     api_key: "${OPENAI_API_KEY:-}"
//!     model: "gpt-4o-mini"
//!
//! agents:
//!   video:
//!     provider: together
//!     timeout_secs: 120
//!
//! social:
//!   tiktok:
//!     base_url: "https://open.tiktokapis.com/v2"
//!     access_token: "${TIKTOK_ACCESS_TOKEN:-}"
//!
//! dispatch:
//!   timeout_secs: 30
//!   max_retries: 1
//!
//! defaults:
//!   duration_secs: 30
//!   aspect_ratio: "9:16"
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{AgentType, Platform};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CLIPFORGE_CONFIG";
/// Config file looked up in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "clipforge.yaml";

/// Wire shape spoken by a provider endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderApi {
    /// OpenAI-compatible chat completions
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Generic media generation job (`POST {base}/{capability}`)
    Media,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api: ProviderApi,
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// Per-agent overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPlatformConfig {
    pub base_url: String,
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    250
}

/// Values merged under request parameters when the caller omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefaults {
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_voice")]
    pub voice: String,
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            aspect_ratio: default_aspect_ratio(),
            voice: default_voice(),
        }
    }
}

fn default_duration_secs() -> f64 {
    30.0
}

fn default_aspect_ratio() -> String {
    "9:16".to_string()
}

fn default_voice() -> String {
    "narrator".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,
    #[serde(default = "default_social")]
    pub social: BTreeMap<String, SocialPlatformConfig>,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub defaults: ParameterDefaults,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            agents: BTreeMap::new(),
            social: default_social(),
            dispatch: DispatchConfig::default(),
            defaults: ParameterDefaults::default(),
        }
        .resolved()
    }
}

impl AppConfig {
    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| format!("Failed to parse config YAML: {}", e))?;
        Ok(config.resolved())
    }

    /// Load a configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;
        Self::from_yaml(&content)
    }

    /// Resolve the config source: explicit path, then `$CLIPFORGE_CONFIG`,
    /// then `./clipforge.yaml`, then built-in defaults.
    pub fn load(path: Option<&str>) -> Result<Self, String> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.trim().is_empty() {
                return Self::from_file(&path);
            }
        }
        if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_file(DEFAULT_CONFIG_FILE);
        }
        tracing::info!("[Config] No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Name of the provider backing an agent kind.
    pub fn provider_name_for(&self, agent_type: AgentType) -> String {
        self.agents
            .get(agent_type.as_str())
            .and_then(|a| a.provider.clone())
            .unwrap_or_else(|| default_provider_for(agent_type).to_string())
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Model override for an agent, falling back to the provider's model.
    pub fn model_for(&self, agent_type: AgentType) -> Option<String> {
        self.agents
            .get(agent_type.as_str())
            .and_then(|a| a.model.clone())
            .or_else(|| {
                self.provider(&self.provider_name_for(agent_type))
                    .and_then(|p| p.model.clone())
            })
    }

    pub fn timeout_for(&self, agent_type: AgentType) -> Duration {
        let secs = self
            .agents
            .get(agent_type.as_str())
            .and_then(|a| a.timeout_secs)
            .unwrap_or(self.dispatch.timeout_secs);
        Duration::from_secs(secs)
    }

    pub fn social_for(&self, platform: Platform) -> Option<&SocialPlatformConfig> {
        self.social.get(platform.as_str())
    }

    /// Expand environment references in every string value.
    fn resolved(mut self) -> Self {
        for provider in self.providers.values_mut() {
            provider.base_url = resolve_env_vars(&provider.base_url);
            provider.api_key = resolve_env_vars(&provider.api_key);
            provider.model = provider.model.as_deref().map(resolve_env_vars);
        }
        for agent in self.agents.values_mut() {
            agent.provider = agent.provider.as_deref().map(resolve_env_vars);
            agent.model = agent.model.as_deref().map(resolve_env_vars);
        }
        for platform in self.social.values_mut() {
            platform.base_url = resolve_env_vars(&platform.base_url);
            platform.access_token = resolve_env_vars(&platform.access_token);
        }
        self.defaults.aspect_ratio = resolve_env_vars(&self.defaults.aspect_ratio);
        self.defaults.voice = resolve_env_vars(&self.defaults.voice);
        self
    }
}

fn default_provider_for(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Content | AgentType::Optimization | AgentType::Analytics => "openai",
        AgentType::Safety => "anthropic",
        AgentType::Video | AgentType::Editing => "together",
        AgentType::Image => "flux",
        AgentType::Music | AgentType::Voice => "huggingface",
        AgentType::Social => "social",
    }
}

fn provider_entry(api: ProviderApi, base_url: &str, key_var: &str, model: Option<&str>) -> ProviderConfig {
    ProviderConfig {
        api,
        base_url: base_url.to_string(),
        api_key: format!("${{{}:-}}", key_var),
        model: model.map(|m| m.to_string()),
    }
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    let mut providers = BTreeMap::new();
    providers.insert(
        "openai".to_string(),
        provider_entry(
            ProviderApi::Openai,
            "${OPENAI_BASE_URL:-https://api.openai.com/v1}",
            "OPENAI_API_KEY",
            Some("gpt-4o-mini"),
        ),
    );
    providers.insert(
        "anthropic".to_string(),
        provider_entry(
            ProviderApi::Anthropic,
            "${ANTHROPIC_BASE_URL:-https://api.anthropic.com}",
            "ANTHROPIC_API_KEY",
            Some("claude-3-5-haiku-latest"),
        ),
    );
    providers.insert(
        "together".to_string(),
        provider_entry(
            ProviderApi::Media,
            "https://api.together.xyz/v1",
            "TOGETHER_API_KEY",
            None,
        ),
    );
    providers.insert(
        "flux".to_string(),
        provider_entry(ProviderApi::Media, "https://api.bfl.ml/v1", "FLUX_API_KEY", None),
    );
    providers.insert(
        "huggingface".to_string(),
        provider_entry(
            ProviderApi::Media,
            "https://api-inference.huggingface.co",
            "HUGGINGFACE_API_KEY",
            None,
        ),
    );
    providers
}

fn default_social() -> BTreeMap<String, SocialPlatformConfig> {
    [
        (Platform::TikTok, "https://open.tiktokapis.com/v2", "TIKTOK_ACCESS_TOKEN"),
        (Platform::Instagram, "https://graph.facebook.com/v19.0", "INSTAGRAM_ACCESS_TOKEN"),
        (Platform::YouTube, "https://www.googleapis.com/youtube/v3", "YOUTUBE_ACCESS_TOKEN"),
        (Platform::Twitter, "https://api.twitter.com/2", "TWITTER_BEARER_TOKEN"),
        (Platform::Facebook, "https://graph.facebook.com/v19.0", "META_ACCESS_TOKEN"),
    ]
    .into_iter()
    .map(|(platform, base_url, token_var)| {
        (
            platform.as_str().to_string(),
            SocialPlatformConfig {
                base_url: base_url.to_string(),
                access_token: format!("${{{}:-}}", token_var),
            },
        )
    })
    .collect()
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}` syntax.
pub fn resolve_env_vars(input: &str) -> String {
    let re = match regex::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return input.to_string(),
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var_expr = &caps[1];
        // Support default value syntax: ${VAR:-default}
        if let Some(idx) = var_expr.find(":-") {
            let var_name = &var_expr[..idx];
            let default_val = &var_expr[idx + 2..];
            std::env::var(var_name).unwrap_or_else(|_| default_val.to_string())
        } else {
            std::env::var(var_expr).unwrap_or_else(|_| format!("${{{}}}", var_expr))
        }
    })
    .to_string()
}

/// Load .env and .env.local files for environment variables.
///
/// Existing environment variables take priority over file values.
pub fn load_dotenv() {
    // .env.local first (higher priority), then .env
    for filename in &[".env.local", ".env"] {
        let path = std::path::Path::new(filename);
        if !path.exists() {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(eq_idx) = line.find('=') {
                let key = line[..eq_idx].trim();
                let mut value = line[eq_idx + 1..].trim().to_string();
                if value.len() >= 2
                    && ((value.starts_with('"') && value.ends_with('"'))
                        || (value.starts_with('\'') && value.ends_with('\'')))
                {
                    value = value[1..value.len() - 1].to_string();
                }
                if std::env::var(key).is_err() {
                    std::env::set_var(key, &value);
                }
            }
        }
        tracing::info!("[Config] Loaded environment from '{}'", filename);
    }
}
