//! Order history of the logged-in user

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio::sync::RwLock;

use crate::clock::lenient_timestamp;
use crate::error::{Error, Result};
use crate::fetch::ApiClient;
use crate::listing::{FetchOutcome, Generation, Pagination};
use crate::price::{lenient_u64, Price};

/// Orders are always fetched twenty at a time
pub const ORDER_PAGE_SIZE: u32 = 20;

/// Message stored when the orders endpoint rejects a fetch
pub const FETCH_ORDERS_ERROR: &str = "Failed to fetch orders";

/// Backend order status code. Opaque: unknown codes are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderStatus(pub i32);

impl OrderStatus {
    pub const PENDING_PAYMENT: OrderStatus = OrderStatus(1);
    pub const PAID: OrderStatus = OrderStatus(2);
    pub const CANCELLED: OrderStatus = OrderStatus(3);

    pub fn code(&self) -> i32 {
        self.0
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "待支付",
            2 => "已支付",
            3 => "已取消",
            _ => "未知",
        }
    }
}

/// One order row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,

    #[serde(default)]
    pub user_id: i64,

    #[serde(default)]
    pub goods_id: i64,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub create_time: Option<DateTime<Utc>>,

    pub status: OrderStatus,

    #[serde(default)]
    pub goods_name: Option<String>,

    #[serde(default)]
    pub original_price: Price,

    #[serde(default)]
    pub seckill_price: Price,

    #[serde(default)]
    pub description: Option<String>,
}

impl Order {
    /// Creation time in local time, or `-` when unknown
    pub fn created_display(&self) -> String {
        self.create_time
            .map(|t| t.with_timezone(&Local).format("%Y/%m/%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// One page of `GET /api/orders`
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPage {
    #[serde(default)]
    pub orders: Vec<Order>,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub page: Option<u64>,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub total: Option<u64>,
}

/// Order history tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderTab {
    #[default]
    All,
    PendingPayment,
    Paid,
    Cancelled,
}

impl OrderTab {
    /// The `status` query value, `None` for all orders
    pub fn status(&self) -> Option<OrderStatus> {
        match self {
            Self::All => None,
            Self::PendingPayment => Some(OrderStatus::PENDING_PAYMENT),
            Self::Paid => Some(OrderStatus::PAID),
            Self::Cancelled => Some(OrderStatus::CANCELLED),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "全部订单",
            Self::PendingPayment => "待支付",
            Self::Paid => "已支付",
            Self::Cancelled => "已取消",
        }
    }
}

impl FromStr for OrderTab {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "pending_payment" | "pending" => Ok(Self::PendingPayment),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::general(format!("unknown order tab: {}", other))),
        }
    }
}

/// Snapshot of the order listing
#[derive(Debug, Clone)]
pub struct OrderListing {
    pub orders: Vec<Order>,
    pub loading: bool,
    pub error: Option<String>,
    pub current_page: u32,
    pub total_orders: u64,
}

impl Default for OrderListing {
    fn default() -> Self {
        Self {
            orders: Vec::new(),
            loading: false,
            error: None,
            current_page: 1,
            total_orders: 0,
        }
    }
}

/// Paginated, status-filtered order history
#[derive(Debug)]
pub struct OrderStore {
    api: ApiClient,
    state: RwLock<OrderListing>,
    generation: Generation,
}

impl OrderStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: RwLock::new(OrderListing::default()),
            generation: Generation::default(),
        }
    }

    /// Fetch `page`, optionally restricted to one status code.
    ///
    /// Same contract as the product store: failures keep the old orders,
    /// superseded responses are dropped.
    pub async fn fetch_orders(
        &self,
        page: u32,
        status: Option<OrderStatus>,
    ) -> Result<FetchOutcome> {
        let generation = self.generation.begin();
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
        }

        let result = self.request(page, status).await;

        let mut state = self.state.write().await;
        if !self.generation.is_current(generation) {
            log::warn!("Dropping stale order listing for page {}", page);
            return result.map(|_| FetchOutcome::Stale);
        }

        state.loading = false;
        match result {
            Ok(body) => {
                state.orders = body.orders;
                state.current_page = body
                    .page
                    .and_then(|p| u32::try_from(p).ok())
                    .unwrap_or(page);
                state.total_orders = body.total.unwrap_or(0);
                Ok(FetchOutcome::Applied)
            }
            Err(e) => {
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn request(&self, page: u32, status: Option<OrderStatus>) -> Result<OrderPage> {
        let mut request = self
            .api
            .get("/api/orders")
            .query("page", page)
            .query("limit", ORDER_PAGE_SIZE);
        if let Some(status) = status {
            request = request.query("status", status.code());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            log::debug!("Order listing rejected with {}", response.status());
            return Err(Error::fetch(FETCH_ORDERS_ERROR));
        }
        Ok(response.json::<OrderPage>().await?)
    }

    /// A copy of the current listing
    pub async fn snapshot(&self) -> OrderListing {
        self.state.read().await.clone()
    }

    /// Page navigation for the current listing
    pub async fn pagination(&self) -> Pagination {
        let state = self.state.read().await;
        Pagination::new(state.current_page, state.total_orders, ORDER_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_labels() {
        assert_eq!(OrderStatus(1).label(), "待支付");
        assert_eq!(OrderStatus(2).label(), "已支付");
        assert_eq!(OrderStatus(3).label(), "已取消");
        assert_eq!(OrderStatus(9).label(), "未知");
    }

    #[test]
    fn test_tab_status_codes() {
        assert_eq!(OrderTab::All.status(), None);
        assert_eq!("pending".parse::<OrderTab>().unwrap().status(), Some(OrderStatus(1)));
        assert_eq!(OrderTab::Cancelled.status().map(|s| s.code()), Some(3));
    }

    #[test]
    fn test_order_row_decodes() {
        let order: Order = serde_json::from_value(json!({
            "id": 5,
            "user_id": 1,
            "goods_id": 42,
            "create_time": "2024-05-01T10:00:00Z",
            "status": 7,
            "goods_name": "Phone",
            "original_price": "100.00",
            "seckill_price": "1.00",
            "description": null
        }))
        .unwrap();
        assert_eq!(order.status, OrderStatus(7));
        assert_eq!(order.seckill_price.format(), "¥1.00");
        assert!(order.create_time.is_some());
    }
}
