//! Flash Sale Rust Client Library
//!
//! A Rust client for the flash sale (seckill) backend, providing session
//! handling, product and order listings, sale countdowns, purchase attempts
//! and the operator panels.

pub mod admin;
pub mod auth;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod error;
pub mod fetch;
pub mod listing;
pub mod orders;
pub mod persist;
pub mod price;
pub mod products;
pub mod seckill;

use reqwest::Client;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::admin::{BusinessClient, FaultClient, LoadTestClient, LoadTestRun, RateLimitClient};
use crate::auth::SessionStore;
use crate::clock::{Clock, SystemClock};
use crate::config::{ClientOptions, FlashSaleConfig};
use crate::countdown::{CountdownTimer, SaleStatus};
use crate::error::Result;
use crate::fetch::ApiClient;
use crate::orders::OrderStore;
use crate::persist::SessionStorage;
use crate::products::{Product, ProductStore, ProductTab};
use crate::seckill::{Availability, PurchaseOutcome, SeckillClient};

/// The main entry point for the flash sale client
pub struct FlashSale {
    /// Backend base URLs
    pub config: FlashSaleConfig,
    /// Client options
    pub options: ClientOptions,
    /// HTTP client shared by every backend call
    pub http_client: Client,
    /// Session of the current user
    pub session: Arc<SessionStore>,
    /// Product listing
    pub products: Arc<ProductStore>,
    /// Order history
    pub orders: Arc<OrderStore>,
    api: ApiClient,
    loadtest_api: ApiClient,
    seckill: SeckillClient,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<HashSet<i64>>,
}

impl FlashSale {
    /// Create a new client
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use flashsale_rust::{FlashSale, config::FlashSaleConfig, persist::MemoryStorage};
    ///
    /// let config =
    ///     FlashSaleConfig::new("http://localhost:8080", "http://localhost:8081").unwrap();
    /// let client = FlashSale::new(config, Arc::new(MemoryStorage::new())).unwrap();
    /// ```
    pub fn new(config: FlashSaleConfig, storage: Arc<dyn SessionStorage>) -> Result<Self> {
        Self::new_with_options(config, storage, ClientOptions::default())
    }

    /// Create a new client with custom options
    pub fn new_with_options(
        config: FlashSaleConfig,
        storage: Arc<dyn SessionStorage>,
        options: ClientOptions,
    ) -> Result<Self> {
        Self::new_with_clock(config, storage, options, Arc::new(SystemClock))
    }

    /// Create a new client reading the time from `clock`
    pub fn new_with_clock(
        config: FlashSaleConfig,
        storage: Arc<dyn SessionStorage>,
        options: ClientOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let api = ApiClient::new(
            config.api_base.clone(),
            http_client.clone(),
            storage.clone(),
            &options.storage_key,
        );
        let loadtest_api = ApiClient::new(
            config.loadtest_base.clone(),
            http_client.clone(),
            storage.clone(),
            &options.storage_key,
        );

        let session = SessionStore::new(api.clone(), storage, &options.storage_key, clock.clone());
        let products = ProductStore::new(api.clone(), options.page_size);
        let orders = OrderStore::new(api.clone());

        Ok(Self {
            config,
            options,
            http_client,
            session: Arc::new(session),
            products: Arc::new(products),
            orders: Arc::new(orders),
            seckill: SeckillClient::new(api.clone()),
            api,
            loadtest_api,
            clock,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// HTTP wrapper for the primary API
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// HTTP wrapper for the load-test service
    pub fn loadtest_api(&self) -> &ApiClient {
        &self.loadtest_api
    }

    /// The clock used for sale status and token expiry
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Purchase client without local gating
    pub fn seckill(&self) -> &SeckillClient {
        &self.seckill
    }

    pub fn ratelimit(&self) -> RateLimitClient {
        RateLimitClient::new(self.api.clone())
    }

    pub fn business(&self) -> BusinessClient {
        BusinessClient::new(self.api.clone())
    }

    pub fn loadtest(&self) -> LoadTestClient {
        LoadTestClient::new(self.api.clone())
    }

    /// A load-test session polling at the configured interval
    pub fn loadtest_run(&self) -> LoadTestRun {
        LoadTestRun::new(self.loadtest(), self.options.poll_interval)
    }

    /// Fault injection, on the load-test service
    pub fn faults(&self) -> FaultClient {
        FaultClient::new(self.loadtest_api.clone())
    }

    /// Sale status of `product` right now
    pub fn sale_status(&self, product: &Product) -> SaleStatus {
        product.sale_status(self.clock.now())
    }

    /// Whether `product` can be bought right now
    pub async fn availability(&self, product: &Product) -> Availability {
        if self.is_in_flight(product.id) {
            return Availability::InFlight;
        }
        Availability::evaluate(
            self.sale_status(product),
            self.session.is_authenticated().await,
            product.stock,
        )
    }

    /// Start a live countdown for `product`. `None` if its window is unreadable.
    pub fn countdown<F>(&self, product: &Product, on_change: F) -> Option<CountdownTimer>
    where
        F: FnMut(SaleStatus) + Send + 'static,
    {
        let (start, end) = (product.start_time?, product.end_time?);
        Some(CountdownTimer::spawn(
            start,
            end,
            self.clock.clone(),
            self.options.tick_interval,
            on_change,
        ))
    }

    /// Try to buy `goods_id` as listed under `tab`.
    ///
    /// Gated on the last fetched listing. On success the listing is refetched
    /// at the current page and `tab`; stock is never adjusted locally.
    pub async fn purchase(&self, goods_id: i64, tab: ProductTab) -> PurchaseOutcome {
        let availability = match self.products.product_by_id(goods_id).await {
            Some(product) => self.availability(&product).await,
            None => Availability::Unknown,
        };
        if !availability.is_allowed() {
            return PurchaseOutcome::Blocked(availability);
        }

        let outcome = {
            let _guard = match InFlightGuard::acquire(&self.in_flight, goods_id) {
                Some(guard) => guard,
                None => return PurchaseOutcome::Blocked(Availability::InFlight),
            };
            self.seckill.attempt(goods_id).await
        };

        if outcome.is_success() {
            let page = self.products.current_page().await;
            if let Err(e) = self.products.fetch_tab(page, tab).await {
                log::warn!("Refreshing products after purchase failed: {}", e);
            }
        }
        outcome
    }

    fn is_in_flight(&self, goods_id: i64) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&goods_id)
    }
}

/// Marks one product as having a purchase in flight until dropped
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<i64>>,
    goods_id: i64,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<i64>>, goods_id: i64) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(goods_id);
        inserted.then_some(Self { set, goods_id })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.goods_id);
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::FlashSale;
    pub use crate::error::{Error, Result};
    pub use crate::config::{ClientOptions, FlashSaleConfig};
    pub use crate::persist::{FileStorage, MemoryStorage, SessionStorage};
    pub use crate::products::{ProductTab, SortBy, SortOrder};
    pub use crate::orders::{OrderStatus, OrderTab};
    pub use crate::countdown::SaleStatus;
    pub use crate::seckill::{Availability, PurchaseOutcome};
}
