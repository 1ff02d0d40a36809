//! 进程配置：一次性从环境变量构建，显式传入选择器与驱动。
//!
//! Process configuration for the relay.
//!
//! Configuration is read exactly once at startup into a [`RelayConfig`] and then
//! passed explicitly to the provider selector on every invocation. Drivers never
//! consult the environment themselves.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `LLM_PROVIDER` | `gemini` |
//! | `OPENAI_API_KEY` / `GEMINI_API_KEY` | unset |
//! | `OPENAI_MODEL` / `GEMINI_MODEL` | `gpt-4o-mini` / `gemini-1.5-flash` |
//! | `OPENAI_BASE_URL` / `GEMINI_BASE_URL` | public API origins |
//! | `RELAY_BIND_ADDR` | `0.0.0.0:8080` |
//! | `RELAY_IDLE_TIMEOUT_SECS` | unset (no idle timeout) |
//! | `RELAY_PROXY_URL` | unset |
//! | `RELAY_HTTP_POOL_MAX_IDLE_PER_HOST` | `32` |

use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_PROVIDER: &str = "gemini";

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 32;

/// Configuration errors.
///
/// `MissingCredential` and `UnknownProvider` are invocation-scoped and end up as a
/// terminal fragment; `InvalidValue` is only raised while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{env_var} not set")]
    MissingCredential {
        provider: String,
        env_var: String,
    },

    #[error("Invalid LLM_PROVIDER: {0}")]
    UnknownProvider(String),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Per-provider connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Credential; `None` when the variable is unset or empty.
    pub api_key: Option<String>,
    /// Name of the variable the credential comes from, used in error messages.
    pub api_key_var: String,
    pub model: String,
    /// Scheme + host (+ optional port), without a trailing slash.
    pub base_url: String,
}

impl ProviderSettings {
    pub fn new(
        api_key_var: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: None,
            api_key_var: api_key_var.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The credential, or the `MissingCredential` error naming its variable.
    pub fn require_api_key(&self, provider: &str) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingCredential {
                provider: provider.to_string(),
                env_var: self.api_key_var.clone(),
            })
    }
}

/// Outbound HTTP client tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub proxy_url: Option<String>,
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            proxy_url: None,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
        }
    }
}

/// Everything the relay needs to know about its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Raw provider selection. Empty means "use the default provider".
    pub provider: String,
    pub openai: ProviderSettings,
    pub gemini: ProviderSettings,
    pub bind_addr: SocketAddr,
    /// Maximum silence between upstream reads. `None` waits indefinitely.
    pub idle_timeout: Option<Duration>,
    pub http: HttpSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            openai: ProviderSettings::new("OPENAI_API_KEY", OPENAI_DEFAULT_MODEL, OPENAI_DEFAULT_BASE_URL),
            gemini: ProviderSettings::new("GEMINI_API_KEY", GEMINI_DEFAULT_MODEL, GEMINI_DEFAULT_BASE_URL),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            idle_timeout: None,
            http: HttpSettings::default(),
        }
    }
}

impl RelayConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider_settings = |key_var: &str, model_var: &str, url_var: &str, model: &str, url: &str| {
            let mut settings = ProviderSettings::new(
                key_var,
                get(model_var).unwrap_or_else(|| model.to_string()),
                get(url_var).unwrap_or_else(|| url.to_string()),
            );
            settings.api_key = get(key_var);
            settings
        };

        let bind_addr = parse_value::<SocketAddr>(
            "RELAY_BIND_ADDR",
            get("RELAY_BIND_ADDR").as_deref().unwrap_or(DEFAULT_BIND_ADDR),
        )?;

        let idle_timeout = get("RELAY_IDLE_TIMEOUT_SECS")
            .map(|raw| parse_value::<u64>("RELAY_IDLE_TIMEOUT_SECS", &raw))
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let pool_max_idle_per_host = get("RELAY_HTTP_POOL_MAX_IDLE_PER_HOST")
            .map(|raw| parse_value::<usize>("RELAY_HTTP_POOL_MAX_IDLE_PER_HOST", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_POOL_MAX_IDLE_PER_HOST);

        Ok(Self {
            provider: get("LLM_PROVIDER").unwrap_or_default(),
            openai: provider_settings(
                "OPENAI_API_KEY",
                "OPENAI_MODEL",
                "OPENAI_BASE_URL",
                OPENAI_DEFAULT_MODEL,
                OPENAI_DEFAULT_BASE_URL,
            ),
            gemini: provider_settings(
                "GEMINI_API_KEY",
                "GEMINI_MODEL",
                "GEMINI_BASE_URL",
                GEMINI_DEFAULT_MODEL,
                GEMINI_DEFAULT_BASE_URL,
            ),
            bind_addr,
            idle_timeout,
            http: HttpSettings {
                proxy_url: get("RELAY_PROXY_URL"),
                pool_max_idle_per_host,
            },
        })
    }

    /// Provider name as it will be resolved, with the default applied.
    pub fn effective_provider(&self) -> &str {
        if self.provider.trim().is_empty() {
            DEFAULT_PROVIDER
        } else {
            self.provider.trim()
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let cfg = RelayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.provider, "");
        assert_eq!(cfg.effective_provider(), "gemini");
        assert_eq!(cfg.openai.model, "gpt-4o-mini");
        assert_eq!(cfg.gemini.model, "gemini-1.5-flash");
        assert_eq!(cfg.openai.base_url, "https://api.openai.com");
        assert!(cfg.openai.api_key.is_none());
        assert!(cfg.gemini.api_key.is_none());
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert!(cfg.idle_timeout.is_none());
        assert_eq!(cfg.http.pool_max_idle_per_host, 32);
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let cfg = RelayConfig::from_lookup(lookup(&[
            ("LLM_PROVIDER", "  "),
            ("OPENAI_API_KEY", ""),
        ]))
        .unwrap();
        assert_eq!(cfg.effective_provider(), "gemini");
        assert!(cfg.openai.api_key.is_none());
    }

    #[test]
    fn test_overrides_are_applied() {
        let cfg = RelayConfig::from_lookup(lookup(&[
            ("LLM_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://127.0.0.1:9999/"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("RELAY_BIND_ADDR", "127.0.0.1:3000"),
            ("RELAY_IDLE_TIMEOUT_SECS", "45"),
        ]))
        .unwrap();
        assert_eq!(cfg.effective_provider(), "openai");
        assert_eq!(cfg.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.openai.base_url, "http://127.0.0.1:9999");
        assert_eq!(cfg.gemini.model, "gemini-2.0-flash");
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(cfg.idle_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_zero_idle_timeout_disables_it() {
        let cfg = RelayConfig::from_lookup(lookup(&[("RELAY_IDLE_TIMEOUT_SECS", "0")])).unwrap();
        assert!(cfg.idle_timeout.is_none());
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let err = RelayConfig::from_lookup(lookup(&[("RELAY_BIND_ADDR", "not-an-addr")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "RELAY_BIND_ADDR"));

        let err = RelayConfig::from_lookup(lookup(&[("RELAY_IDLE_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "RELAY_IDLE_TIMEOUT_SECS"));
    }

    #[test]
    fn test_missing_credential_names_the_variable() {
        let cfg = RelayConfig::default();
        let err = cfg.openai.require_api_key("openai").unwrap_err();
        assert_eq!(err.to_string(), "OPENAI_API_KEY not set");
    }
}
