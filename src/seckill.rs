//! Purchase attempts
//!
//! A purchase is gated locally by [`Availability`] and then decided by the
//! backend. The `success` flag in the response body is authoritative, whatever
//! the HTTP status.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::countdown::SaleStatus;
use crate::fetch::ApiClient;

/// Message shown when the purchase call itself failed
pub const RETRY_LATER_MESSAGE: &str = "抢购失败，请稍后重试";

/// Whether the purchase action is available for one product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Allowed,
    NotLoggedIn,
    SoldOut,
    Upcoming,
    Ended,
    /// A purchase of this product is already in flight
    InFlight,
    /// The product is not in the last fetched listing
    Unknown,
}

impl Availability {
    /// Decide from the derived status, session and last fetched stock.
    ///
    /// Blocking reasons are checked in the order: session, stock, status.
    pub fn evaluate(status: SaleStatus, authenticated: bool, stock: i64) -> Self {
        if !authenticated {
            Self::NotLoggedIn
        } else if stock <= 0 {
            Self::SoldOut
        } else {
            match status {
                SaleStatus::Upcoming => Self::Upcoming,
                SaleStatus::Active => Self::Allowed,
                SaleStatus::Ended => Self::Ended,
            }
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Text for the purchase button
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allowed => "立即抢购",
            Self::NotLoggedIn => "请先登录",
            Self::SoldOut => "已售罄",
            Self::Upcoming => "即将开始",
            Self::Ended => "已结束",
            Self::InFlight => "抢购中...",
            Self::Unknown => "商品不存在",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Body of `POST /api/seckill`
#[derive(Debug, Clone, Serialize)]
pub struct SeckillRequest {
    pub goods_id: i64,
}

/// Response of `POST /api/seckill`
#[derive(Debug, Clone, Deserialize)]
pub struct SeckillResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default, deserialize_with = "order_id")]
    pub order_id: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

/// Order ids come back as numbers or strings
fn order_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = <Option<serde_json::Value> as Deserialize>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// What happened to a purchase attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// The backend created an order
    Succeeded { order_id: String },
    /// The backend answered with `success: false`
    Rejected { message: String },
    /// No usable answer was obtained
    TransportFailed,
    /// Not attempted: the action is not available
    Blocked(Availability),
}

impl PurchaseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// The message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            Self::Succeeded { order_id } => format!("抢购成功！订单号: {}", order_id),
            Self::Rejected { message } => format!("抢购失败：{}", message),
            Self::TransportFailed => RETRY_LATER_MESSAGE.to_string(),
            Self::Blocked(availability) => availability.label().to_string(),
        }
    }
}

impl From<SeckillResponse> for PurchaseOutcome {
    fn from(response: SeckillResponse) -> Self {
        if response.success {
            Self::Succeeded {
                order_id: response.order_id.unwrap_or_default(),
            }
        } else {
            Self::Rejected {
                message: response.message.unwrap_or_default(),
            }
        }
    }
}

/// Client for `POST /api/seckill`
#[derive(Debug, Clone)]
pub struct SeckillClient {
    api: ApiClient,
}

impl SeckillClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Make exactly one purchase call for `goods_id`. Never retries.
    pub async fn attempt(&self, goods_id: i64) -> PurchaseOutcome {
        let request = match self.api.post("/api/seckill").json(&SeckillRequest { goods_id }) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("Could not build purchase request: {}", e);
                return PurchaseOutcome::TransportFailed;
            }
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Purchase of {} failed: {}", goods_id, e);
                return PurchaseOutcome::TransportFailed;
            }
        };

        let status = response.status();
        match response.json::<SeckillResponse>().await {
            Ok(body) => {
                log::info!(
                    "Purchase of {} answered {} (success: {})",
                    goods_id,
                    status,
                    body.success
                );
                body.into()
            }
            Err(e) => {
                log::warn!("Unreadable purchase response for {} ({}): {}", goods_id, status, e);
                PurchaseOutcome::TransportFailed
            }
        }
    }
}
