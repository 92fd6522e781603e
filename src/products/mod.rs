//! Product listing store
//!
//! Parameter setters only change local state; [`ProductStore::fetch_products`]
//! is the single place a network round trip happens, so several setters can be
//! batched before one fetch.

mod types;

use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::fetch::ApiClient;
use crate::listing::{FetchOutcome, Generation, Pagination};

pub use types::*;

/// Message stored when the listing endpoint rejects a fetch
pub const FETCH_PRODUCTS_ERROR: &str = "Failed to fetch products";

/// Paginated, sorted, filtered view of the product catalogue
#[derive(Debug)]
pub struct ProductStore {
    api: ApiClient,
    state: RwLock<ProductListing>,
    generation: Generation,
}

impl ProductStore {
    /// Create an empty store with the given initial page size
    pub fn new(api: ApiClient, page_size: u32) -> Self {
        let listing = ProductListing {
            current_page: 1,
            params: ListingParams {
                page_size,
                ..ListingParams::default()
            },
            ..ProductListing::default()
        };

        Self {
            api,
            state: RwLock::new(listing),
            generation: Generation::default(),
        }
    }

    /// Fetch `page` with the current parameters and an optional status filter.
    ///
    /// On failure `error` is set, `loading` cleared and the product list kept.
    /// If another fetch was started while this one was in flight, its result
    /// is dropped and [`FetchOutcome::Stale`] returned.
    pub async fn fetch_products(&self, page: u32, status: Option<&str>) -> Result<FetchOutcome> {
        let generation = self.generation.begin();
        let query = {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
            state.params.query(page, status)
        };

        let result = self.request(query).await;

        let mut state = self.state.write().await;
        if !self.generation.is_current(generation) {
            log::warn!("Dropping stale product listing for page {}", page);
            return result.map(|_| FetchOutcome::Stale);
        }

        state.loading = false;
        match result {
            Ok(body) => {
                state.products = body.products;
                state.current_page = body
                    .page
                    .and_then(|p| u32::try_from(p).ok())
                    .unwrap_or(page);
                state.total_products = body.total.unwrap_or(0);
                Ok(FetchOutcome::Applied)
            }
            Err(e) => {
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Fetch the page shown under `tab`
    pub async fn fetch_tab(&self, page: u32, tab: ProductTab) -> Result<FetchOutcome> {
        self.fetch_products(page, tab.status_filter()).await
    }

    async fn request(&self, query: Vec<(&'static str, String)>) -> Result<ProductPage> {
        let mut request = self.api.get("/api/products");
        for (key, value) in query {
            request = request.query(key, value);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            log::debug!("Product listing rejected with {}", response.status());
            return Err(Error::fetch(FETCH_PRODUCTS_ERROR));
        }
        Ok(response.json::<ProductPage>().await?)
    }

    /// Change the page size. Does not fetch.
    pub async fn set_page_size(&self, page_size: u32) {
        self.state.write().await.params.page_size = page_size;
    }

    /// Change the sort key and direction. Does not fetch.
    pub async fn set_sort(&self, sort_by: SortBy, sort_order: SortOrder) {
        let mut state = self.state.write().await;
        state.params.sort_by = sort_by;
        state.params.sort_order = sort_order;
    }

    /// Toggle the expired-only filter. Does not fetch.
    pub async fn set_expired_only(&self, expired_only: bool) {
        self.state.write().await.params.expired_only = expired_only;
    }

    /// A copy of the current listing
    pub async fn snapshot(&self) -> ProductListing {
        self.state.read().await.clone()
    }

    /// The current page number
    pub async fn current_page(&self) -> u32 {
        self.state.read().await.current_page
    }

    /// Look a product up in the last fetched page
    pub async fn product_by_id(&self, id: i64) -> Option<Product> {
        self.state
            .read()
            .await
            .products
            .iter()
            .find(|product| product.id == id)
            .cloned()
    }

    /// Page navigation for the current listing
    pub async fn pagination(&self) -> Pagination {
        let state = self.state.read().await;
        Pagination::new(state.current_page, state.total_products, state.params.page_size)
    }
}
