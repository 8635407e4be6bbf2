//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `MEDMART_API_BASE_URL` - Storefront API root (default: `http://localhost:3000/api/v1`)
//! - `MEDMART_API_TOKEN` - Static bearer token sent with every request
//! - `MEDMART_MOCK_MODE` - Serve the catalog from built-in fixtures (default: false)
//! - `MEDMART_MOCK_FAILURE_RATE` - Probability in `[0, 1]` that a mock call fails (default: 0)
//! - `MEDMART_PAGE_SIZE` - Products per page (default: 20)
//! - `MEDMART_HTTP_TIMEOUT_SECS` - Request timeout in seconds (default: 10)
//! - `MEDMART_STATE_FILE` - Local state file (default: `.medmart-state.json`)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::api::DEFAULT_PAGE_SIZE;

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATE_FILE: &str = ".medmart-state.json";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Remote API configuration
    pub api: ApiConfig,
    /// Offline catalog configuration
    pub mock: MockConfig,
    /// Products requested per page
    pub page_size: u32,
    /// File backing the local key-value store
    pub state_file: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Remote storefront API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// API root; endpoint paths are resolved against it
    pub base_url: String,
    /// Static bearer token, if any
    pub token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Offline catalog configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MockConfig {
    /// Serve the catalog from fixtures instead of the remote API
    pub enabled: bool,
    /// Probability that a mock call fails
    pub failure_rate: f64,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            mock: MockConfig::default(),
            page_size: DEFAULT_PAGE_SIZE,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            sentry_dsn: None,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value or the
    /// API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`StorefrontConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let base_url = env.or_default("MEDMART_API_BASE_URL", DEFAULT_API_BASE_URL);
        Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("MEDMART_API_BASE_URL".to_string(), e.to_string())
        })?;
        let token = env.validated_secret("MEDMART_API_TOKEN")?;
        let timeout_secs: u64 = env.parsed_or("MEDMART_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        let enabled = env.bool_or("MEDMART_MOCK_MODE", false)?;
        let failure_rate: f64 = env.parsed_or("MEDMART_MOCK_FAILURE_RATE", 0.0)?;
        if !(0.0..=1.0).contains(&failure_rate) {
            return Err(ConfigError::InvalidEnvVar(
                "MEDMART_MOCK_FAILURE_RATE".to_string(),
                format!("must be between 0 and 1 (got {failure_rate})"),
            ));
        }

        let page_size: u32 = env.parsed_or("MEDMART_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "MEDMART_PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            api: ApiConfig {
                base_url,
                token,
                timeout: Duration::from_secs(timeout_secs),
            },
            mock: MockConfig {
                enabled,
                failure_rate,
            },
            page_size,
            state_file: PathBuf::from(env.or_default("MEDMART_STATE_FILE", DEFAULT_STATE_FILE)),
            sentry_dsn: env.optional("SENTRY_DSN"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Parse a boolean flag (`1/true/yes/on` or `0/false/no/off`).
    fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(raw) = self.optional(key) else {
            return Ok(default);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected a boolean, got {other:?}"),
            )),
        }
    }

    /// Load and validate an optional secret.
    fn validated_secret(&self, key: &str) -> Result<Option<SecretString>, ConfigError> {
        self.optional(key)
            .map(|value| {
                validate_secret_strength(&value, key)?;
                Ok(SecretString::from(value))
            })
            .transpose()
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:3000/api/v1");
        assert!(config.api.token.is_none());
        assert_eq!(config.api.timeout, Duration::from_secs(10));
        assert!(!config.mock.enabled);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.state_file, PathBuf::from(".medmart-state.json"));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("MEDMART_API_BASE_URL", "https://api.medmart.test/v2"),
            ("MEDMART_MOCK_MODE", "Yes"),
            ("MEDMART_MOCK_FAILURE_RATE", "0.25"),
            ("MEDMART_PAGE_SIZE", "5"),
            ("MEDMART_HTTP_TIMEOUT_SECS", "3"),
            ("MEDMART_STATE_FILE", "/tmp/state.json"),
        ])
        .unwrap();
        assert_eq!(config.api.base_url, "https://api.medmart.test/v2");
        assert!(config.mock.enabled);
        assert!((config.mock.failure_rate - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.page_size, 5);
        assert_eq!(config.api.timeout, Duration::from_secs(3));
        assert_eq!(config.state_file, PathBuf::from("/tmp/state.json"));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = load(&[("MEDMART_PAGE_SIZE", "  "), ("SENTRY_DSN", "")]).unwrap();
        assert_eq!(config.page_size, 20);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("MEDMART_API_BASE_URL", "not a url")]),
            Err(ConfigError::InvalidEnvVar(..))
        ));
        assert!(matches!(
            load(&[("MEDMART_MOCK_MODE", "maybe")]),
            Err(ConfigError::InvalidEnvVar(..))
        ));
        assert!(matches!(
            load(&[("MEDMART_MOCK_FAILURE_RATE", "1.5")]),
            Err(ConfigError::InvalidEnvVar(..))
        ));
        assert!(matches!(
            load(&[("MEDMART_PAGE_SIZE", "0")]),
            Err(ConfigError::InvalidEnvVar(..))
        ));
    }

    #[test]
    fn test_placeholder_token_rejected() {
        let result = load(&[("MEDMART_API_TOKEN", "your-api-token-here")]);
        assert!(matches!(result, Err(ConfigError::InsecureSecret(..))));

        let result = load(&[("MEDMART_API_TOKEN", "aaaaaaaaaaaaaaaaaaaaaaaa")]);
        assert!(matches!(result, Err(ConfigError::InsecureSecret(..))));
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_api_config_debug_redacts_token() {
        let config = ApiConfig {
            token: Some(SecretString::from("eyJhbGciOiJIUzI1NiJ9.s3cr3t")),
            ..ApiConfig::default()
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("localhost"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("s3cr3t"));
    }
}
