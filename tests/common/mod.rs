#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use flashsale_rust::clock::{Clock, ManualClock};
use flashsale_rust::config::{ClientOptions, FlashSaleConfig};
use flashsale_rust::persist::MemoryStorage;
use flashsale_rust::FlashSale;

pub struct Harness {
    pub server: MockServer,
    pub storage: Arc<MemoryStorage>,
    pub clock: ManualClock,
    pub client: FlashSale,
}

impl Harness {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

pub async fn harness() -> Harness {
    harness_with_options(ClientOptions::default()).await
}

/// Both bases point at the same mock server
pub async fn harness_with_options(options: ClientOptions) -> Harness {
    let server = MockServer::start().await;
    let storage = Arc::new(MemoryStorage::new());
    let clock = ManualClock::new(Utc::now());
    let config = FlashSaleConfig::new(&server.uri(), &server.uri()).unwrap();
    let client =
        FlashSale::new_with_clock(config, storage.clone(), options, Arc::new(clock.clone()))
            .unwrap();

    Harness {
        server,
        storage,
        clock,
        client,
    }
}

/// An HS256 token expiring `secs` after `now`
pub fn token_expiring_in(now: DateTime<Utc>, secs: i64) -> String {
    let claims = json!({
        "sub": "1",
        "exp": (now + ChronoDuration::seconds(secs)).timestamp(),
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret")).unwrap()
}

/// Mount a login endpoint and log in as `alice`; returns the token
pub async fn login(h: &Harness) -> String {
    let token = token_expiring_in(h.now(), 3600);
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": 1, "username": "alice"},
            "token": token,
            "expires_in": 3600
        })))
        .mount(&h.server)
        .await;

    h.client.session.login("alice", "secret").await.unwrap();
    token
}

/// A product row whose window is given relative to `now` in seconds
pub fn product(id: i64, stock: i64, now: DateTime<Utc>, start_secs: i64, end_secs: i64) -> Value {
    json!({
        "id": id,
        "name": format!("Product {}", id),
        "description": "flash sale item",
        "stock": stock,
        "original_price": "19.90",
        "seckill_price": 9.9,
        "start_time": (now + ChronoDuration::seconds(start_secs)).to_rfc3339(),
        "end_time": (now + ChronoDuration::seconds(end_secs)).to_rfc3339(),
        "created_at": now.to_rfc3339(),
        "updated_at": now.to_rfc3339()
    })
}

/// Matches requests that do not carry query parameter `key`
pub struct MissingQueryParam(&'static str);

impl Match for MissingQueryParam {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(k, _)| k == self.0)
    }
}

pub fn query_param_missing(key: &'static str) -> MissingQueryParam {
    MissingQueryParam(key)
}
