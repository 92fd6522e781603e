//! Business dashboard: turnover and per-product sales

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::fetch::ApiClient;
use crate::price::{lenient_f64, lenient_u64, Price};

/// Message for any failure loading the dashboard
pub const LOAD_BUSINESS_ERROR: &str = "加载业务看板失败";

/// `GET /api/business/overview`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessOverview {
    #[serde(default)]
    pub turnover: Price,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_sold: Option<u64>,
}

/// One row of `GET /api/business/sales`
#[derive(Debug, Clone, Deserialize)]
pub struct SalesItem {
    #[serde(default)]
    pub goods_id: i64,

    #[serde(default)]
    pub goods_name: String,

    #[serde(default)]
    pub seckill_price: Price,

    #[serde(default = "nan", deserialize_with = "lenient_f64")]
    pub sold_count: f64,
}

fn nan() -> f64 {
    f64::NAN
}

impl SalesItem {
    /// Sale price times units sold; the placeholder if either is unreadable
    pub fn revenue(&self) -> Price {
        Price::new(self.seckill_price.amount() * self.sold_count)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SalesReport {
    #[serde(default)]
    items: Vec<SalesItem>,
}

/// Overview and sales table together
#[derive(Debug, Clone, Default)]
pub struct BusinessDashboard {
    pub overview: BusinessOverview,
    pub items: Vec<SalesItem>,
}

/// Client for `/api/business`
#[derive(Debug, Clone)]
pub struct BusinessClient {
    api: ApiClient,
}

impl BusinessClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Load both halves of the dashboard. If either endpoint rejects the
    /// request the whole load fails.
    pub async fn load(&self) -> Result<BusinessDashboard> {
        let overview = self.api.get("/api/business/overview").send().await?;
        let sales = self.api.get("/api/business/sales").send().await?;
        if !overview.status().is_success() || !sales.status().is_success() {
            log::debug!(
                "Business dashboard rejected: overview {}, sales {}",
                overview.status(),
                sales.status()
            );
            return Err(Error::api(LOAD_BUSINESS_ERROR));
        }

        let overview = overview.json::<BusinessOverview>().await?;
        let sales = sales.json::<SalesReport>().await?;
        Ok(BusinessDashboard {
            overview,
            items: sales.items,
        })
    }
}
