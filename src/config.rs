//! Configuration types for the profile engine.
//!
//! Mirrors `EdgarConfig`'s shape from the upstream client library — one
//! struct per concern, a `Default` impl carrying the documented defaults,
//! plain constructors — but covers every recognized key from spec §6 rather
//! than just the HTTP client. `EngineConfig::from_env` is the production
//! entry point: it reads `.env` (via `dotenvy`) plus process environment
//! variables, and fails closed if `edgar.contact` is missing.

use crate::error::{EngineError, EngineResult};
use std::env;
use std::time::Duration;

/// Base URLs for the EDGAR service endpoints the client talks to.
#[derive(Debug, Clone)]
pub struct EdgarUrls {
    pub archives: String,
    pub data: String,
    pub files: String,
}

impl Default for EdgarUrls {
    fn default() -> Self {
        Self {
            archives: "https://www.sec.gov/Archives/edgar".to_string(),
            data: "https://data.sec.gov".to_string(),
            files: "https://www.sec.gov/files".to_string(),
        }
    }
}

/// EDGAR client settings (§6 `edgar.*`).
#[derive(Debug, Clone)]
pub struct EdgarSettings {
    /// Caller-identifying contact string sent as the `User-Agent` header.
    /// Required; `EngineConfig::from_env` fails if this is empty.
    pub contact: String,
    pub rate_per_second: u32,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub base_urls: EdgarUrls,
}

impl Default for EdgarSettings {
    fn default() -> Self {
        Self {
            contact: String::new(),
            rate_per_second: 10,
            max_retries: 3,
            request_timeout: Duration::from_secs(30),
            base_urls: EdgarUrls::default(),
        }
    }
}

/// Filing cache settings (§6 `cache.*`).
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_bytes: u64,
    pub dir: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_bytes: 2 * 1024 * 1024 * 1024,
            dir: "./cache/filings".to_string(),
        }
    }
}

/// Profile aggregator settings (§6 `aggregator.*`).
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub task_workers: usize,
    pub ticker_concurrency: usize,
    pub task_timeout: Duration,
    pub lookback_years: u32,
    pub progress_interval: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            task_workers: 8,
            ticker_concurrency: 4,
            task_timeout: Duration::from_secs(60),
            lookback_years: 5,
            progress_interval: Duration::from_secs(15),
        }
    }
}

/// Per-form-parser detail caps (§6 `parsers.*`).
#[derive(Debug, Clone)]
pub struct ParserSettings {
    pub form4_max: usize,
    pub def14a_max: usize,
    pub sc13_max: usize,
    pub reports_per_form: usize,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            form4_max: 100,
            def14a_max: 10,
            sc13_max: 50,
            reports_per_form: 2,
        }
    }
}

/// Relationship extractor thresholds (§6 `relationship.*`).
#[derive(Debug, Clone)]
pub struct RelationshipSettings {
    pub fuzzy_threshold: f64,
    pub min_confidence: f64,
}

impl Default for RelationshipSettings {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.82,
            min_confidence: 0.50,
        }
    }
}

/// Optional local-LLM analyzer settings (§6 `ai.*`). Disabled by default;
/// when disabled, `ai_analysis` is simply absent from a profile (§9).
#[derive(Debug, Clone, Default)]
pub struct AiSettings {
    pub enabled: bool,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

/// Persistent store settings (§6 `store.*`).
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub dir: String,
    pub profiles_collection: String,
    pub company_relationships_collection: String,
    pub financial_relationships_collection: String,
    pub key_person_interlocks_collection: String,
    pub failures_collection: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            dir: "./data".to_string(),
            profiles_collection: "unified_profiles".to_string(),
            company_relationships_collection: "company_relationships".to_string(),
            financial_relationships_collection: "financial_relationships".to_string(),
            key_person_interlocks_collection: "key_person_interlocks".to_string(),
            failures_collection: "failures".to_string(),
        }
    }
}

/// Aggregate configuration for the whole engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub edgar: EdgarSettings,
    pub cache: CacheSettings,
    pub aggregator: AggregatorSettings,
    pub parsers: ParserSettings,
    pub relationship: RelationshipSettings,
    pub ai: AiSettings,
    pub store: StoreSettings,
}

impl EngineConfig {
    /// Builds configuration from environment variables (loading `.env` first
    /// if present), matching the recognized-keys table in spec §6.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConfigError` if `EDGAR_CONTACT` is unset or empty.
    pub fn from_env() -> EngineResult<Self> {
        let _ = dotenvy::dotenv();

        let contact = env::var("EDGAR_CONTACT").unwrap_or_default();
        if contact.trim().is_empty() {
            return Err(EngineError::ConfigError(
                "edgar.contact is required (set EDGAR_CONTACT)".to_string(),
            ));
        }

        let mut config = EngineConfig {
            edgar: EdgarSettings {
                contact,
                ..EdgarSettings::default()
            },
            ..EngineConfig::default()
        };

        if let Some(v) = env_u32("EDGAR_RATE_PER_SECOND") {
            config.edgar.rate_per_second = v;
        }
        if let Some(v) = env_u32("EDGAR_MAX_RETRIES") {
            config.edgar.max_retries = v;
        }
        if let Some(v) = env_bool("CACHE_ENABLED") {
            config.cache.enabled = v;
        }
        if let Some(v) = env_u64("CACHE_MAX_BYTES") {
            config.cache.max_bytes = v;
        }
        if let Ok(v) = env::var("CACHE_DIR") {
            config.cache.dir = v;
        }
        if let Some(v) = env_usize("AGGREGATOR_TASK_WORKERS") {
            config.aggregator.task_workers = v;
        }
        if let Some(v) = env_usize("AGGREGATOR_TICKER_CONCURRENCY") {
            config.aggregator.ticker_concurrency = v;
        }
        if let Some(v) = env_u32("AGGREGATOR_TASK_TIMEOUT_SEC") {
            config.aggregator.task_timeout = Duration::from_secs(v as u64);
        }
        if let Some(v) = env_u32("AGGREGATOR_LOOKBACK_YEARS") {
            config.aggregator.lookback_years = v;
        }
        if let Some(v) = env_bool("AI_ENABLED") {
            config.ai.enabled = v;
        }
        config.ai.model = env::var("AI_MODEL").ok();
        config.ai.endpoint = env::var("AI_ENDPOINT").ok();
        if let Ok(v) = env::var("STORE_DIR") {
            config.store.dir = v;
        }

        Ok(config)
    }
}

fn env_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|v| match v.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.edgar.rate_per_second, 10);
        assert_eq!(config.edgar.max_retries, 3);
        assert_eq!(config.cache.max_bytes, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.aggregator.task_workers, 8);
        assert_eq!(config.aggregator.ticker_concurrency, 4);
        assert_eq!(config.aggregator.task_timeout, Duration::from_secs(60));
        assert_eq!(config.parsers.form4_max, 100);
        assert_eq!(config.relationship.fuzzy_threshold, 0.82);
        assert_eq!(config.relationship.min_confidence, 0.50);
        assert!(!config.ai.enabled);
    }

    #[test]
    fn from_env_fails_without_contact() {
        // SAFETY: test runs single-threaded with respect to this variable.
        unsafe {
            env::remove_var("EDGAR_CONTACT");
        }
        let result = EngineConfig::from_env();
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }
}
