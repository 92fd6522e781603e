//! Fault injection: table lock on the load-test service

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::fetch::{self, ApiClient};

/// Table locked when none is given
pub const DEFAULT_FAULT_TABLE: &str = "seckill_goods";

/// State of the injected table lock
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeadlockStatus {
    pub locked: bool,
    pub table: Option<String>,
}

impl DeadlockStatus {
    fn from_value(raw: &Value) -> Self {
        let table = match raw.get("table") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Self {
            locked: raw.get("locked").map_or(false, truthy),
            table,
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Serialize)]
struct LockRequest<'a> {
    table_name: &'a str,
}

/// Client for `/faults/db/deadlock`. Talks to the load-test base.
#[derive(Debug, Clone)]
pub struct FaultClient {
    api: ApiClient,
}

impl FaultClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn status(&self) -> Result<DeadlockStatus> {
        let response = self.api.get("/faults/db/deadlock/status").send().await?;
        let raw = response.json::<Value>().await?;
        Ok(DeadlockStatus::from_value(&raw))
    }

    /// Lock `table_name` until [`FaultClient::unlock`]
    pub async fn lock(&self, table_name: &str) -> Result<()> {
        let response = self
            .api
            .post("/faults/db/deadlock/lock")
            .json(&LockRequest { table_name })?
            .send()
            .await?;

        if !response.status().is_success() {
            let message = fetch::error_message(response).await;
            return Err(Error::api(message.as_deref().unwrap_or("unknown error")));
        }

        log::info!("Locked table {}", table_name);
        Ok(())
    }

    /// Release the lock. The response body may be empty.
    pub async fn unlock(&self) -> Result<()> {
        let response = self.api.post("/faults/db/deadlock/unlock").send().await?;
        if !response.status().is_success() {
            return Err(Error::api(format!("unlock rejected with {}", response.status())));
        }
        log::info!("Table lock released");
        Ok(())
    }
}
