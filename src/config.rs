//! Configuration for the flash sale client

use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Environment variable holding the primary API base URL
pub const API_BASE_ENV: &str = "FLASHSALE_API_BASE";

/// Environment variable holding the load-test control base URL
pub const LOADTEST_BASE_ENV: &str = "FLASHSALE_LOADTEST_BASE";

/// Load-test control base used when none is configured
pub const DEFAULT_LOADTEST_BASE: &str = "http://localhost:8081";

/// Storage namespace holding the persisted session
pub const DEFAULT_STORAGE_KEY: &str = "auth-storage";

/// Backend locations. The two bases are configured independently.
#[derive(Debug, Clone)]
pub struct FlashSaleConfig {
    /// Primary API base
    pub api_base: Url,
    /// Load-test control API base
    pub loadtest_base: Url,
}

impl FlashSaleConfig {
    /// Creates a new configuration, validating both URLs.
    pub fn new(api_base: &str, loadtest_base: &str) -> Result<Self> {
        Ok(Self {
            api_base: Url::parse(api_base)?,
            loadtest_base: Url::parse(loadtest_base)?,
        })
    }

    /// Reads both bases from the environment.
    ///
    /// `FLASHSALE_API_BASE` is required, `FLASHSALE_LOADTEST_BASE` falls back
    /// to `http://localhost:8081`.
    pub fn from_env() -> Result<Self> {
        let api_base = std::env::var(API_BASE_ENV).map_err(|_| {
            Error::general(format!("{} environment variable not found", API_BASE_ENV))
        })?;
        let loadtest_base =
            std::env::var(LOADTEST_BASE_ENV).unwrap_or_else(|_| DEFAULT_LOADTEST_BASE.to_string());
        Self::new(&api_base, &loadtest_base)
    }
}

/// Tunables for the client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The storage key of the persisted session
    pub storage_key: String,

    /// Initial product page size
    pub page_size: u32,

    /// Countdown recomputation period
    pub tick_interval: Duration,

    /// Load-test status poll period
    pub poll_interval: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            page_size: 20,
            tick_interval: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(1000),
        }
    }
}

impl ClientOptions {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the storage key of the persisted session
    pub fn with_storage_key(mut self, value: &str) -> Self {
        self.storage_key = value.to_string();
        self
    }

    /// Set the initial product page size
    pub fn with_page_size(mut self, value: u32) -> Self {
        self.page_size = value;
        self
    }

    /// Set the countdown recomputation period
    pub fn with_tick_interval(mut self, value: Duration) -> Self {
        self.tick_interval = value;
        self
    }

    /// Set the load-test status poll period
    pub fn with_poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_url() {
        assert!(FlashSaleConfig::new("not a url", DEFAULT_LOADTEST_BASE).is_err());
        assert!(FlashSaleConfig::new("http://localhost:8080", DEFAULT_LOADTEST_BASE).is_ok());
    }

    #[test]
    fn test_builder_overrides_defaults() {
        let options = ClientOptions::default()
            .with_page_size(50)
            .with_storage_key("other")
            .with_request_timeout(None);
        assert_eq!(options.page_size, 50);
        assert_eq!(options.storage_key, "other");
        assert!(options.request_timeout.is_none());
        assert_eq!(options.tick_interval, Duration::from_secs(1));
    }
}
