mod common;

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use common::{harness, product, query_param_missing};
use flashsale_rust::error::Error;
use flashsale_rust::listing::FetchOutcome;
use flashsale_rust::products::{ProductTab, SortBy, SortOrder, FETCH_PRODUCTS_ERROR};

#[tokio::test]
async fn test_fetch_products_builds_default_query() {
    let h = harness().await;
    let now = h.now();

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "20"))
        .and(query_param("status", "active"))
        .and(query_param("sort_by", "start_time"))
        .and(query_param("sort_order", "asc"))
        .and(query_param("expired", "false"))
        .and(query_param("available", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [product(1, 5, now, -60, 600), product(2, 0, now, -60, 600)],
            "page": 1,
            "total": 57
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h.client.products.fetch_tab(1, ProductTab::Active).await.unwrap();
    assert_eq!(outcome, FetchOutcome::Applied);

    let listing = h.client.products.snapshot().await;
    assert_eq!(listing.products.len(), 2);
    assert_eq!(listing.total_products, 57);
    assert!(!listing.loading);
    assert_eq!(listing.error, None);

    let pagination = h.client.products.pagination().await;
    assert_eq!(pagination.total_pages, 3);
    assert_eq!(pagination.window, vec![1, 2, 3]);
    assert!(!pagination.has_previous);
    assert!(pagination.has_next);
}

#[tokio::test]
async fn test_setters_do_not_fetch() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("limit", "50"))
        .and(query_param("sort_by", "stock"))
        .and(query_param("sort_order", "desc"))
        .and(query_param("expired", "true"))
        .and(query_param_missing("status"))
        .and(query_param_missing("available"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"products": [], "page": 1, "total": 0})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    h.client.products.set_page_size(50).await;
    h.client.products.set_sort(SortBy::Stock, SortOrder::Desc).await;
    h.client.products.set_expired_only(true).await;
    assert!(h.server.received_requests().await.unwrap().is_empty());

    h.client.products.fetch_tab(1, ProductTab::Active).await.unwrap();
}

#[tokio::test]
async fn test_failed_fetch_keeps_products() {
    let h = harness().await;
    let now = h.now();

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [product(1, 5, now, -60, 600)],
            "page": 1,
            "total": 1
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    h.client.products.fetch_products(1, None).await.unwrap();
    let err = h.client.products.fetch_products(2, None).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(_)));

    let listing = h.client.products.snapshot().await;
    assert_eq!(listing.products.len(), 1);
    assert_eq!(listing.current_page, 1);
    assert_eq!(listing.error.as_deref(), Some(FETCH_PRODUCTS_ERROR));
    assert!(!listing.loading);
}

#[tokio::test]
async fn test_stale_response_is_dropped() {
    let h = harness().await;
    let now = h.now();

    // slow response to the older request
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "products": [product(1, 5, now, -60, 600)],
                    "page": 1,
                    "total": 40
                }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [product(21, 5, now, -60, 600)],
            "page": 2,
            "total": 40
        })))
        .mount(&h.server)
        .await;

    let (first, second) = tokio::join!(
        h.client.products.fetch_products(1, None),
        h.client.products.fetch_products(2, None)
    );
    assert_eq!(first.unwrap(), FetchOutcome::Stale);
    assert_eq!(second.unwrap(), FetchOutcome::Applied);

    let listing = h.client.products.snapshot().await;
    assert_eq!(listing.current_page, 2);
    assert_eq!(listing.products[0].id, 21);
}

#[tokio::test]
async fn test_ended_tab_has_no_availability_filter() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("status", "ended"))
        .and(query_param_missing("expired"))
        .and(query_param_missing("available"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"products": [], "total": 0})))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client.products.fetch_tab(3, ProductTab::Ended).await.unwrap();
    // without a page in the response the requested page is kept
    assert_eq!(h.client.products.current_page().await, 3);
}

#[tokio::test]
async fn test_loose_product_fields() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [{
                "id": 9,
                "name": "Broken",
                "stock": 3,
                "original_price": "abc",
                "seckill_price": null,
                "start_time": null,
                "end_time": "2024-05-01 10:00:00"
            }],
            "page": "1",
            "total": "1"
        })))
        .mount(&h.server)
        .await;

    h.client.products.fetch_products(1, None).await.unwrap();
    let product = h.client.products.product_by_id(9).await.unwrap();
    assert_eq!(product.seckill_price.format(), "¥-");
    assert_eq!(product.saving().format(), "¥-");
    assert_eq!(
        h.client.sale_status(&product),
        flashsale_rust::countdown::SaleStatus::Ended
    );
    assert_eq!(h.client.products.snapshot().await.total_products, 1);
}

#[tokio::test]
async fn test_huge_total_does_not_overflow_pagination() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"products": [], "page": 1, "total": 1e20})),
        )
        .mount(&h.server)
        .await;

    h.client.products.fetch_tab(1, ProductTab::Active).await.unwrap();
    assert_eq!(h.client.products.snapshot().await.total_products, u64::MAX);

    let pagination = h.client.products.pagination().await;
    assert_eq!(pagination.total_pages, u32::MAX);
    assert_eq!(pagination.window, vec![1, 2, 3]);
}
