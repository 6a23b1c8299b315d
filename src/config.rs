// Client configuration: base URL, timeout, mode and retry policy

use std::time::Duration;

use crate::error::ClientError;

pub const DEFAULT_API_BASE_URL: &str = "https://estabraq.runasp.net/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const LOGIN_ROUTE: &str = "/login";

pub const ENV_BASE_URL: &str = "STOREFRONT_API_BASE_URL";
pub const ENV_MODE: &str = "STOREFRONT_MODE";
pub const ENV_TIMEOUT_MS: &str = "STOREFRONT_TIMEOUT_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Development,
    #[default]
    Production,
}

impl Mode {
    fn parse(value: &str) -> Result<Self, ClientError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(ClientError::ConfigError(format!("unknown mode '{other}'"))),
        }
    }

    // Default for `logging::init_logging` when no filter is set in the environment
    pub fn log_filter(&self) -> &'static str {
        match self {
            Mode::Development => "trip_storefront=debug,info",
            Mode::Production => "info",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub mode: Mode,
    pub login_route: String,
    pub retry_config: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            mode: Mode::default(),
            login_route: LOGIN_ROUTE.to_string(),
            retry_config: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source, starting from the
    /// defaults and applying only the keys that are set and non-empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BASE_URL) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ClientError::ConfigError(format!(
                    "{ENV_BASE_URL} must be an http(s) URL, got '{url}'"
                )));
            }
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(mode) = get(ENV_MODE) {
            config.mode = Mode::parse(&mode)?;
        }
        if let Some(timeout) = get(ENV_TIMEOUT_MS) {
            config.timeout_ms = timeout.trim().parse().map_err(|_| {
                ClientError::ConfigError(format!("{ENV_TIMEOUT_MS} is not a number: '{timeout}'"))
            })?;
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    // Health lives beside the versioned API, not under it
    pub fn health_url(&self) -> String {
        match self.base_url.strip_suffix("/api") {
            Some(root) => format!("{root}/health"),
            None => self.base_url.replacen("/api", "/health", 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    // Exponential backoff for the given zero-based retry attempt
    pub fn backoff(&self, retry_attempt: u32) -> Duration {
        let base_backoff_ms = (self.initial_backoff_ms as f64
            * self.backoff_multiplier.powf(retry_attempt as f64))
        .min(self.max_backoff_ms as f64);

        if self.jitter_factor <= 0.0 {
            return Duration::from_millis(base_backoff_ms as u64);
        }

        // Apply jitter to prevent thundering herd
        let jitter = rand::random::<f64>() * self.jitter_factor * base_backoff_ms;
        let backoff_ms = (base_backoff_ms * (1.0 - self.jitter_factor / 2.0) + jitter)
            .min(self.max_backoff_ms as f64);

        Duration::from_millis(backoff_ms as u64)
    }
}
