//! Types for the product listing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::clock::lenient_timestamp;
use crate::countdown::SaleStatus;
use crate::error::Error;
use crate::price::{lenient_u64, Price};

/// One flash-sale item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Stock as of the last fetch
    #[serde(default)]
    pub stock: i64,

    #[serde(default)]
    pub original_price: Price,

    /// Sale price
    #[serde(default)]
    pub seckill_price: Price,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub end_time: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Sale status at `now`. A product without a readable window counts as ended.
    pub fn sale_status(&self, now: DateTime<Utc>) -> SaleStatus {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => SaleStatus::derive(now, start, end),
            _ => SaleStatus::Ended,
        }
    }

    pub fn is_sold_out(&self) -> bool {
        self.stock <= 0
    }

    /// Original minus sale price
    pub fn saving(&self) -> Price {
        Price::saving(self.original_price, self.seckill_price)
    }

    /// Name cut to 32 characters
    pub fn short_name(&self) -> String {
        truncate(&self.name, 32)
    }

    /// Description cut to 50 characters
    pub fn short_description(&self) -> String {
        truncate(self.description.as_deref().unwrap_or_default(), 50)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// One page of `GET /api/products`
#[derive(Debug, Clone, Deserialize)]
pub struct ProductPage {
    #[serde(default)]
    pub products: Vec<Product>,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub page: Option<u64>,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub total: Option<u64>,
}

/// Sort key accepted by the listing endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    CreatedAt,
    Stock,
    #[default]
    StartTime,
    EndTime,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Stock => "stock",
            Self::StartTime => "start_time",
            Self::EndTime => "end_time",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(Self::CreatedAt),
            "stock" => Ok(Self::Stock),
            "start_time" => Ok(Self::StartTime),
            "end_time" => Ok(Self::EndTime),
            other => Err(Error::general(format!("unknown sort key: {}", other))),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(Error::general(format!("unknown sort order: {}", other))),
        }
    }
}

/// Listing tab; each maps to a backend status filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductTab {
    All,
    Upcoming,
    #[default]
    Active,
    Ended,
}

impl ProductTab {
    /// The `status` query value, `None` for all products
    pub fn status_filter(&self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Upcoming => Some("upcoming"),
            Self::Active => Some("active"),
            Self::Ended => Some("ended"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "全部商品",
            Self::Upcoming => "即将开始",
            Self::Active => "正在进行",
            Self::Ended => "已结束",
        }
    }
}

impl FromStr for ProductTab {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "ended" => Ok(Self::Ended),
            other => Err(Error::general(format!("unknown tab: {}", other))),
        }
    }
}

/// Page sizes offered to users
pub const PAGE_SIZE_CHOICES: [u32; 5] = [20, 50, 100, 200, 500];

/// Listing parameters owned by the store and echoed on every fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingParams {
    pub page_size: u32,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub expired_only: bool,
}

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            page_size: 20,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            expired_only: false,
        }
    }
}

impl ListingParams {
    /// Query pairs for `GET /api/products`.
    ///
    /// Without `expired_only` the listing is narrowed to available, unexpired
    /// products unless the `ended` status is requested. With it, only expired
    /// products are requested and the status filter is left out.
    pub fn query(&self, page: u32, status: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![("page", page.to_string()), ("limit", self.page_size.to_string())];

        let status = status.filter(|s| !s.is_empty());
        if let (Some(status), false) = (status, self.expired_only) {
            query.push(("status", status.to_string()));
        }
        query.push(("sort_by", self.sort_by.to_string()));
        query.push(("sort_order", self.sort_order.to_string()));

        if self.expired_only {
            query.push(("expired", "true".to_string()));
        } else if status != Some("ended") {
            query.push(("expired", "false".to_string()));
            query.push(("available", "true".to_string()));
        }
        query
    }
}

/// Snapshot of the product listing
#[derive(Debug, Clone, Default)]
pub struct ProductListing {
    pub products: Vec<Product>,
    pub loading: bool,
    pub error: Option<String>,
    pub current_page: u32,
    pub total_products: u64,
    pub params: ListingParams,
}
