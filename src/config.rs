use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a number, got '{value}'")]
    NotANumber { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` runs the studio in demo mode.
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub port: u16,
    pub generation_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_api_base: DEFAULT_API_BASE.to_string(),
            gemini_model: DEFAULT_MODEL.to_string(),
            port: 8080,
            generation_timeout: Duration::from_secs(120),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_api_base: get("GEMINI_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_api_base),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            generation_timeout: Duration::from_secs(
                parse_or("GENERATION_TIMEOUT_SECS", get("GENERATION_TIMEOUT_SECS"), defaults.generation_timeout.as_secs())?,
            ),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"), defaults.max_upload_bytes)?,
        })
    }

    /// Key prefix safe to print.
    pub fn masked_key(&self) -> String {
        match &self.gemini_api_key {
            Some(key) => format!("{}...", key.chars().take(6).collect::<String>()),
            None => "none (demo mode)".to_string(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.parse().map_err(|_| ConfigError::NotANumber { name, value: v }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = from(&[]).unwrap();
        assert_eq!(config.gemini_api_key, None);
        assert_eq!(config.gemini_api_base, DEFAULT_API_BASE);
        assert_eq!(config.gemini_model, DEFAULT_MODEL);
        assert_eq!(config.port, 8080);
        assert_eq!(config.generation_timeout, Duration::from_secs(120));
        assert_eq!(config.masked_key(), "none (demo mode)");
    }

    #[test]
    fn overrides_are_read() {
        let config = from(&[
            ("GEMINI_API_KEY", "AIzaSyExample"),
            ("GEMINI_API_BASE", "http://localhost:9000/v1beta/"),
            ("PORT", "3000"),
            ("GENERATION_TIMEOUT_SECS", "30"),
            ("MAX_UPLOAD_BYTES", "1024"),
        ]).unwrap();
        assert_eq!(config.gemini_api_base, "http://localhost:9000/v1beta");
        assert_eq!(config.port, 3000);
        assert_eq!(config.generation_timeout, Duration::from_secs(30));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.masked_key(), "AIzaSy...");
    }

    #[test]
    fn blank_key_means_demo_mode() {
        assert_eq!(from(&[("GEMINI_API_KEY", "  ")]).unwrap().gemini_api_key, None);
    }

    #[test]
    fn malformed_numbers_are_errors() {
        assert_eq!(
            from(&[("PORT", "eighty")]).unwrap_err(),
            ConfigError::NotANumber { name: "PORT", value: "eighty".into() }
        );
    }
}
