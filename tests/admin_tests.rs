mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{harness, harness_with_options};
use flashsale_rust::admin::{
    business::LOAD_BUSINESS_ERROR, BatchCreateParams, LoadTestParams, RateLimitConfig,
};
use flashsale_rust::config::{ClientOptions, FlashSaleConfig};
use flashsale_rust::error::Error;
use flashsale_rust::persist::MemoryStorage;
use flashsale_rust::FlashSale;

#[tokio::test]
async fn test_ratelimit_get_is_lenient() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/monitor/ratelimit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "seckill_window_seconds": "5",
            "seckill_max": 1
        })))
        .mount(&h.server)
        .await;

    let config = h.client.ratelimit().get().await.unwrap();
    assert_eq!(
        config,
        RateLimitConfig {
            seckill_window_seconds: 5,
            seckill_max: 1,
            ..RateLimitConfig::default()
        }
    );
}

#[tokio::test]
async fn test_ratelimit_update_sends_full_config() {
    let h = harness().await;
    let submitted = RateLimitConfig {
        seckill_window_seconds: 20,
        seckill_max: 5,
        api_window_seconds: 30,
        api_max: 300,
    };

    Mock::given(method("PUT"))
        .and(path("/api/monitor/ratelimit"))
        .and(body_json(json!({
            "seckill_window_seconds": 20,
            "seckill_max": 5,
            "api_window_seconds": 30,
            "api_max": 300
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"api_max": 250})))
        .expect(1)
        .mount(&h.server)
        .await;

    let updated = h.client.ratelimit().update(&submitted).await.unwrap();
    assert_eq!(updated.api_max, 250);
    assert_eq!(updated.seckill_window_seconds, 20);
}

#[tokio::test]
async fn test_business_dashboard() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/business/overview"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"turnover": "1234.5", "total_sold": 42})),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/business/sales"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"goods_id": 1, "goods_name": "Phone", "seckill_price": 9.9, "sold_count": 10},
                {"goods_id": 2, "goods_name": "Laptop", "seckill_price": "bad", "sold_count": 1}
            ]
        })))
        .mount(&h.server)
        .await;

    let dashboard = h.client.business().load().await.unwrap();
    assert_eq!(dashboard.overview.turnover.format(), "¥1234.50");
    assert_eq!(dashboard.overview.total_sold, Some(42));
    assert_eq!(dashboard.items[0].revenue().format(), "¥99.00");
    assert_eq!(dashboard.items[1].revenue().format(), "¥-");
}

#[tokio::test]
async fn test_business_dashboard_fails_as_a_whole() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/business/overview"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"turnover": 1, "total_sold": 1})),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/business/sales"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let err = h.client.business().load().await.unwrap_err();
    assert!(matches!(err, Error::Api(ref msg) if msg == LOAD_BUSINESS_ERROR));
}

#[tokio::test]
async fn test_loadtest_start_accepts_either_id_field() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/loadtest/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "t-1"})))
        .mount(&h.server)
        .await;

    let task_id = h.client.loadtest().start(&LoadTestParams::default()).await.unwrap();
    assert_eq!(task_id, "t-1");

    let requests = h.server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["user_count"], json!(1000));
    assert_eq!(body["concurrency"], json!(200));
    assert!(body.get("goods_ids").is_none());
}

#[tokio::test]
async fn test_loadtest_run_polls_and_stops() {
    let options = ClientOptions::default().with_poll_interval(Duration::from_millis(50));
    let h = harness_with_options(options).await;

    Mock::given(method("POST"))
        .and(path("/api/loadtest/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"taskId": "abc"})))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/loadtest/tasks/abc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"state": "running", "sent": 100})),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/loadtest/tasks/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/loadtest/tasks/abc/results"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"p99_ms": 42})))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut run = h.client.loadtest_run();
    assert_eq!(run.start(&LoadTestParams::default()).await.unwrap(), "abc");
    assert_eq!(run.task_id(), Some("abc"));

    let mut updates = run.subscribe().unwrap();
    tokio::time::timeout(Duration::from_secs(2), updates.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.latest_status().unwrap()["state"], json!("running"));

    let results = run.stop().await.unwrap();
    assert_eq!(results["p99_ms"], json!(42));
    assert_eq!(run.latest_status(), None);
}

#[tokio::test]
async fn test_stop_without_start_is_an_error() {
    let h = harness().await;
    let mut run = h.client.loadtest_run();
    assert!(run.stop().await.is_err());
}

#[tokio::test]
async fn test_batch_create_summary() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/products/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "inserted": 1000,
            "id_start": 101,
            "id_end": 1100
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let created = h
        .client
        .loadtest()
        .batch_create(&BatchCreateParams::starting_at(h.now()))
        .await
        .unwrap();
    assert_eq!(created.message(), "批量新增完成：新增 1000 条，ID范围 101 - 1100");
}

#[tokio::test]
async fn test_fault_injection() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/faults/db/deadlock/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"locked": true, "table": "seckill_goods"})),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/faults/db/deadlock/lock"))
        .and(body_json(json!({"table_name": "orders"})))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({})))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/faults/db/deadlock/unlock"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    let faults = h.client.faults();
    let status = faults.status().await.unwrap();
    assert!(status.locked);
    assert_eq!(status.table.as_deref(), Some("seckill_goods"));

    let err = faults.lock("orders").await.unwrap_err();
    assert_eq!(err.to_string(), "unknown error");

    faults.unlock().await.unwrap();
}

#[tokio::test]
async fn test_lock_rejection_with_plain_body() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/faults/db/deadlock/lock"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/faults/db/deadlock/lock"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"error": "already locked"})))
        .mount(&h.server)
        .await;

    let err = h.client.faults().lock("orders").await.unwrap_err();
    assert!(matches!(err, Error::Api(ref msg) if msg == "unknown error"));
    assert!(!err.is_transport());

    let err = h.client.faults().lock("orders").await.unwrap_err();
    assert!(matches!(err, Error::Api(ref msg) if msg == "already locked"));
}

#[tokio::test]
async fn test_undecodable_body_is_not_a_transport_failure() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/faults/db/deadlock/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&h.server)
        .await;

    let err = h.client.faults().status().await.unwrap_err();
    assert!(matches!(err, Error::Http(_)));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_unreachable_backend_is_a_transport_failure() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let base = format!("http://127.0.0.1:{}", port);
    let config = FlashSaleConfig::new(&base, &base).unwrap();
    let client = FlashSale::new(config, Arc::new(MemoryStorage::new())).unwrap();

    let err = client.faults().status().await.unwrap_err();
    assert!(err.is_transport());
}
