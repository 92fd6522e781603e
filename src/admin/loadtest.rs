//! Load-test orchestration and bulk product creation
//!
//! Task status and results are opaque to the client and kept as raw JSON.

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{Error, Result};
use crate::fetch::{self, ApiClient};
use crate::price::to_number;

const TASKS_PATH: &str = "/api/loadtest/tasks";

/// Share of query and purchase operations, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationMix {
    pub query_pct: u32,
    pub seckill_pct: u32,
}

impl Default for OperationMix {
    fn default() -> Self {
        Self {
            query_pct: 50,
            seckill_pct: 50,
        }
    }
}

/// Body of `POST /api/loadtest/tasks`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadTestParams {
    pub user_count: u32,
    pub concurrency: u32,
    pub duration_seconds: u32,
    pub ramp_up_seconds: u32,
    pub operation_mix: OperationMix,
    pub think_time_ms_min: u32,
    pub think_time_ms_max: u32,
    pub qps_target: u32,
    /// Left out of the request when empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub goods_ids: Vec<i64>,
    pub retry_on_fail: u32,
    pub debug: bool,
}

impl Default for LoadTestParams {
    fn default() -> Self {
        Self {
            user_count: 1000,
            concurrency: 200,
            duration_seconds: 60,
            ramp_up_seconds: 10,
            operation_mix: OperationMix::default(),
            think_time_ms_min: 50,
            think_time_ms_max: 150,
            qps_target: 0,
            goods_ids: Vec::new(),
            retry_on_fail: 0,
            debug: false,
        }
    }
}

/// Parse a comma separated id list, skipping blanks and anything that is
/// not a positive integer
pub fn parse_goods_ids(input: &str) -> Vec<i64> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .collect()
}

/// Body of `POST /api/products/batch`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchCreateParams {
    pub count: u32,
    pub stock_per_item: u32,
    pub seckill_price: f64,
    pub original_price: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub name_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BatchCreateParams {
    /// Defaults with a sale window from one minute to one hour after `now`,
    /// truncated to the minute
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        let now = now.duration_trunc(ChronoDuration::minutes(1)).unwrap_or(now);
        Self {
            count: 1000,
            stock_per_item: 10000,
            seckill_price: 9.9,
            original_price: 19.9,
            start_time: now + ChronoDuration::minutes(1),
            end_time: now + ChronoDuration::hours(1),
            name_prefix: "压测商品".to_string(),
            description: Some("用于压测的大批量商品".to_string()),
        }
    }
}

impl Default for BatchCreateParams {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

/// Response of `POST /api/products/batch`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchCreated {
    pub inserted: u64,
    pub id_start: Option<String>,
    pub id_end: Option<String>,
}

impl BatchCreated {
    /// `inserted` wins over `count` unless it is zero or missing
    pub fn from_value(raw: &Value) -> Self {
        let count = |name: &str| {
            raw.get(name)
                .map(to_number)
                .filter(|n| n.is_finite() && *n > 0.0)
                .map(|n| n.trunc() as u64)
        };
        Self {
            inserted: count("inserted").or_else(|| count("count")).unwrap_or(0),
            id_start: scalar_text(raw.get("id_start")),
            id_end: scalar_text(raw.get("id_end")),
        }
    }

    /// Summary line shown after a batch insert
    pub fn message(&self) -> String {
        format!(
            "批量新增完成：新增 {} 条，ID范围 {} - {}",
            self.inserted,
            self.id_start.as_deref().unwrap_or_default(),
            self.id_end.as_deref().unwrap_or_default()
        )
    }
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Client for `/api/loadtest/tasks` and `/api/products/batch`
#[derive(Debug, Clone)]
pub struct LoadTestClient {
    api: ApiClient,
}

impl LoadTestClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Start a load test and return its task id
    pub async fn start(&self, params: &LoadTestParams) -> Result<String> {
        let response = self.api.post(TASKS_PATH).json(params)?.send().await?;
        if !response.status().is_success() {
            let message = fetch::error_message(response).await;
            return Err(Error::api(message.unwrap_or_else(|| "启动压测失败".to_string())));
        }

        let raw = response.json::<Value>().await?;
        let task_id = scalar_text(raw.get("taskId")).or_else(|| scalar_text(raw.get("task_id")));
        let task_id = task_id.ok_or_else(|| Error::api("启动压测失败: no task id"))?;
        log::info!("Started load test {}", task_id);
        Ok(task_id)
    }

    /// Current status of a task
    pub async fn status(&self, task_id: &str) -> Result<Value> {
        self.get_json(&format!("{}/{}", TASKS_PATH, task_id)).await
    }

    /// Stop a task
    pub async fn stop(&self, task_id: &str) -> Result<()> {
        let response = self
            .api
            .delete(&format!("{}/{}", TASKS_PATH, task_id))
            .send()
            .await?;
        if !response.status().is_success() {
            let message = fetch::error_message(response).await;
            return Err(Error::api(message.unwrap_or_else(|| "停止压测失败".to_string())));
        }
        log::info!("Stopped load test {}", task_id);
        Ok(())
    }

    /// Final results of a task
    pub async fn results(&self, task_id: &str) -> Result<Value> {
        self.get_json(&format!("{}/{}/results", TASKS_PATH, task_id)).await
    }

    /// Insert many products in one call
    pub async fn batch_create(&self, params: &BatchCreateParams) -> Result<BatchCreated> {
        let response = self.api.post("/api/products/batch").json(params)?.send().await?;
        if !response.status().is_success() {
            let message = fetch::error_message(response).await;
            return Err(Error::api(message.unwrap_or_else(|| "批量新增失败".to_string())));
        }
        let raw = response.json::<Value>().await?;
        Ok(BatchCreated::from_value(&raw))
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self.api.get(path).send().await?;
        if !response.status().is_success() {
            let message = fetch::error_message(response).await;
            return Err(Error::api(message.unwrap_or_else(|| format!("GET {} failed", path))));
        }
        Ok(response.json::<Value>().await?)
    }
}

/// Polls one task's status at a fixed interval on a background task.
///
/// Failed polls are logged and skipped. Dropping the poller aborts the task,
/// including a poll that is still in flight.
#[derive(Debug)]
pub struct StatusPoller {
    handle: JoinHandle<()>,
    latest: watch::Receiver<Option<Value>>,
}

impl StatusPoller {
    /// First poll happens one `period` from now
    pub fn spawn(client: LoadTestClient, task_id: String, period: Duration) -> Self {
        let (tx, latest) = watch::channel(None);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match client.status(&task_id).await {
                    Ok(status) => {
                        if tx.send(Some(status)).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("Polling load test {} failed: {}", task_id, e),
                }
            }
        });

        Self { handle, latest }
    }

    /// The last status received, if any
    pub fn latest(&self) -> Option<Value> {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Value>> {
        self.latest.clone()
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One operator session of the load-test panel: at most one task and one
/// poller at a time
#[derive(Debug)]
pub struct LoadTestRun {
    client: LoadTestClient,
    period: Duration,
    task_id: Option<String>,
    poller: Option<StatusPoller>,
}

impl LoadTestRun {
    pub fn new(client: LoadTestClient, period: Duration) -> Self {
        Self {
            client,
            period,
            task_id: None,
            poller: None,
        }
    }

    /// Start a task and poll it, replacing any previous poller
    pub async fn start(&mut self, params: &LoadTestParams) -> Result<String> {
        let task_id = self.client.start(params).await?;
        self.poller = Some(StatusPoller::spawn(
            self.client.clone(),
            task_id.clone(),
            self.period,
        ));
        self.task_id = Some(task_id.clone());
        Ok(task_id)
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// The last polled status
    pub fn latest_status(&self) -> Option<Value> {
        self.poller.as_ref().and_then(StatusPoller::latest)
    }

    /// Receiver for status updates of the running task
    pub fn subscribe(&self) -> Option<watch::Receiver<Option<Value>>> {
        self.poller.as_ref().map(StatusPoller::subscribe)
    }

    /// Stop the task, stop polling and fetch the results
    pub async fn stop(&mut self) -> Result<Value> {
        let task_id = self
            .task_id
            .clone()
            .ok_or_else(|| Error::general("no load test has been started"))?;

        let stopped = self.client.stop(&task_id).await;
        self.poller = None;
        stopped?;

        self.client.results(&task_id).await
    }
}
