use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::endpoints::DEFAULT_BASE_URL;
use crate::error::CrawlError;
use crate::fetcher::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "sonuc.json";
pub const DEFAULT_REGISTRY_FILE: &str = "cities.json";

/// What a multi-root operation does when one root fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    FailFast,
    Isolate,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    #[serde(default)]
    pub jitter: Option<f64>,
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
    #[serde(default)]
    pub submission_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_concurrent_requests: Option<usize>,
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub request_delay: Duration,
    pub submission_delay: Duration,
    pub max_concurrent_requests: usize,
    pub failure_policy: FailurePolicy,
    pub registry_path: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            request_delay: Duration::ZERO,
            submission_delay: Duration::from_secs(1),
            max_concurrent_requests: 16,
            failure_policy: FailurePolicy::FailFast,
            registry_path: Utf8PathBuf::from(DEFAULT_REGISTRY_FILE),
            output_dir: Utf8PathBuf::from("."),
        }
    }
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub registry: Option<String>,
    pub output_dir: Option<String>,
    pub failure_policy: Option<FailurePolicy>,
    pub max_concurrent_requests: Option<usize>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CrawlError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CrawlError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CrawlError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CrawlError> {
        let defaults = ResolvedConfig::default();

        let retry = RetryPolicy {
            max_attempts: config.max_attempts.unwrap_or(defaults.retry.max_attempts),
            base_delay: config
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.base_delay),
            max_delay: config
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.max_delay),
            jitter: config.jitter.unwrap_or(defaults.retry.jitter),
        };

        let resolved = ResolvedConfig {
            api_base_url: config
                .api_base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            user_agent: config.user_agent.unwrap_or(defaults.user_agent),
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            retry,
            request_delay: config
                .request_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_delay),
            submission_delay: config
                .submission_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.submission_delay),
            max_concurrent_requests: config
                .max_concurrent_requests
                .unwrap_or(defaults.max_concurrent_requests),
            failure_policy: config.failure_policy.unwrap_or(defaults.failure_policy),
            registry_path: config
                .registry
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.registry_path),
            output_dir: config
                .output_dir
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.output_dir),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

impl ResolvedConfig {
    pub fn apply(mut self, overrides: ConfigOverrides) -> Result<Self, CrawlError> {
        if let Some(registry) = overrides.registry {
            self.registry_path = Utf8PathBuf::from(registry);
        }
        if let Some(output_dir) = overrides.output_dir {
            self.output_dir = Utf8PathBuf::from(output_dir);
        }
        if let Some(policy) = overrides.failure_policy {
            self.failure_policy = policy;
        }
        if let Some(limit) = overrides.max_concurrent_requests {
            self.max_concurrent_requests = limit;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), CrawlError> {
        if self.retry.max_attempts == 0 {
            return Err(CrawlError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(CrawlError::InvalidConfig(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(CrawlError::InvalidConfig(format!(
                "jitter must be between 0 and 1, got {}",
                self.retry.jitter
            )));
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(CrawlError::InvalidConfig(format!(
                "api_base_url must be an absolute http(s) URL: {}",
                self.api_base_url
            )));
        }
        Ok(())
    }
}

pub fn default_user_agent() -> String {
    format!("sonuc-crawler/{}", env!("CARGO_PKG_VERSION"))
}
