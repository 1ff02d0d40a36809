//! Provider selection.
//!
//! Maps the configured provider name onto exactly one driver. The empty name
//! selects [`ProviderKind::DEFAULT`].

use std::fmt;
use std::str::FromStr;

use crate::config::{ConfigError, ProviderSettings, RelayConfig};

use super::{GeminiDriver, OpenAiDriver, ProviderDriver};

/// Known upstream providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub const DEFAULT: ProviderKind = ProviderKind::Gemini;

    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// This provider's section of `config`.
    pub fn settings<'a>(&self, config: &'a RelayConfig) -> &'a ProviderSettings {
        match self {
            ProviderKind::OpenAi => &config.openai,
            ProviderKind::Gemini => &config.gemini,
        }
    }

    /// Resolve a configured name. Empty or whitespace-only selects the default.
    pub fn resolve(name: &str) -> Result<Self, ConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Self::DEFAULT);
        }
        name.parse()
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Factory function to create the driver for a provider.
pub fn create_driver(kind: ProviderKind, config: &RelayConfig) -> Box<dyn ProviderDriver> {
    let settings = kind.settings(config).clone();
    match kind {
        ProviderKind::OpenAi => Box::new(OpenAiDriver::new(settings)),
        ProviderKind::Gemini => Box::new(GeminiDriver::new(settings)),
    }
}

/// Select the driver for `name`, or report the name as unknown.
pub fn select(name: &str, config: &RelayConfig) -> Result<Box<dyn ProviderDriver>, ConfigError> {
    let kind = ProviderKind::resolve(name)?;
    Ok(create_driver(kind, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_selects_default() {
        let cfg = RelayConfig::default();
        assert_eq!(select("", &cfg).unwrap().provider_id(), "gemini");
        assert_eq!(select("   ", &cfg).unwrap().provider_id(), "gemini");
        assert_eq!(ProviderKind::resolve("").unwrap(), ProviderKind::DEFAULT);
    }

    #[test]
    fn test_known_names() {
        let cfg = RelayConfig::default();
        assert_eq!(select("openai", &cfg).unwrap().provider_id(), "openai");
        assert_eq!(select("Gemini", &cfg).unwrap().provider_id(), "gemini");
        assert_eq!(select(" OPENAI ", &cfg).unwrap().display_name(), "OpenAI");
    }

    #[test]
    fn test_unknown_name_is_reported() {
        let cfg = RelayConfig::default();
        let err = select("claude", &cfg).unwrap_err();
        assert_eq!(err, ConfigError::UnknownProvider("claude".into()));
        assert_eq!(err.to_string(), "Invalid LLM_PROVIDER: claude");
    }

    #[test]
    fn test_driver_uses_configured_model() {
        let mut cfg = RelayConfig::default();
        cfg.gemini.model = "gemini-2.0-flash".into();
        assert_eq!(select("gemini", &cfg).unwrap().model(), "gemini-2.0-flash");
    }
}
