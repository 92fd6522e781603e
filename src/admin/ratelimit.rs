//! Rate-limit configuration

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::fetch::{self, ApiClient};
use crate::price::to_number;

const RATELIMIT_PATH: &str = "/api/monitor/ratelimit";

/// Rate-limit windows enforced by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub seckill_window_seconds: u64,
    pub seckill_max: u64,
    pub api_window_seconds: u64,
    pub api_max: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            seckill_window_seconds: 10,
            seckill_max: 3,
            api_window_seconds: 60,
            api_max: 100,
        }
    }
}

impl RateLimitConfig {
    /// Read a loosely typed backend object. Fields that are missing or not
    /// numeric keep their value from `fallback`.
    pub fn from_value(raw: &Value, fallback: &RateLimitConfig) -> Self {
        let field = |name: &str, default: u64| {
            raw.get(name)
                .map(to_number)
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map_or(default, |n| n.trunc() as u64)
        };

        Self {
            seckill_window_seconds: field(
                "seckill_window_seconds",
                fallback.seckill_window_seconds,
            ),
            seckill_max: field("seckill_max", fallback.seckill_max),
            api_window_seconds: field("api_window_seconds", fallback.api_window_seconds),
            api_max: field("api_max", fallback.api_max),
        }
    }
}

/// Client for `/api/monitor/ratelimit`
#[derive(Debug, Clone)]
pub struct RateLimitClient {
    api: ApiClient,
}

impl RateLimitClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Current configuration, defaults filled in
    pub async fn get(&self) -> Result<RateLimitConfig> {
        let response = self.api.get(RATELIMIT_PATH).send().await?;
        if !response.status().is_success() {
            let message = fetch::error_message(response).await;
            return Err(Error::api(message.unwrap_or_else(|| "加载限流配置失败".to_string())));
        }

        let raw = response.json::<Value>().await?;
        Ok(RateLimitConfig::from_value(&raw, &RateLimitConfig::default()))
    }

    /// Replace the configuration and return what the backend echoes back
    pub async fn update(&self, config: &RateLimitConfig) -> Result<RateLimitConfig> {
        let response = self.api.put(RATELIMIT_PATH).json(config)?.send().await?;
        if !response.status().is_success() {
            let message = fetch::error_message(response).await;
            return Err(Error::api(message.unwrap_or_else(|| "更新限流配置失败".to_string())));
        }

        let raw = response.json::<Value>().await?;
        log::info!("Rate limit updated");
        Ok(RateLimitConfig::from_value(&raw, config))
    }
}
