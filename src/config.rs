use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "x-ai/grok-4.1-fast";

/// Settings for the chat-completion gateway, read from the environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub reasoning: bool,
    pub web_search: bool,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            reasoning: true,
            web_search: true,
            timeout: Duration::from_secs(120),
            max_retries: 0,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or malformed values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let api_key = lookup("OPENROUTER_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY"))
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Self {
            api_key,
            base_url: lookup("LLM_BASE_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.base_url),
            model: lookup("LLM_MODEL")
                .filter(|model| !model.trim().is_empty())
                .unwrap_or(defaults.model),
            reasoning: lookup("LLM_REASONING")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.reasoning),
            web_search: lookup("LLM_WEB_SEARCH")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.web_search),
            timeout: lookup("LLM_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: lookup("LLM_MAX_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_base_delay: lookup("LLM_RETRY_BASE_MS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub feasibility_debounce: Duration,
    /// Workspaces untouched this long are evicted.
    pub workspace_idle_ttl: Duration,
    pub workspace_sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            feasibility_debounce: Duration::from_millis(1500),
            workspace_idle_ttl: Duration::from_secs(60 * 60),
            workspace_sweep_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            bind_addr: lookup("BIND_ADDR")
                .filter(|addr| !addr.trim().is_empty())
                .unwrap_or(defaults.bind_addr),
            feasibility_debounce: lookup("FEASIBILITY_DEBOUNCE_MS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.feasibility_debounce),
            workspace_idle_ttl: lookup("WORKSPACE_IDLE_TTL_SECS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.workspace_idle_ttl),
            workspace_sweep_interval: lookup("WORKSPACE_SWEEP_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.workspace_sweep_interval),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
