//! HTTP client wrapper shared by every backend call
//!
//! [`ApiClient`] resolves paths against one configured base URL and reads the
//! bearer token from durable storage on every request, independently of the
//! in-memory session. Responses are returned raw: callers check the status.

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, Response,
};
use serde::Serialize;
use std::sync::Arc;
use url::Url;

use crate::error::Result;
use crate::persist::{self, SessionStorage};

/// HTTP client bound to one backend base URL
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    http: Client,
    storage: Arc<dyn SessionStorage>,
    storage_key: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .field("storage_key", &self.storage_key)
            .finish()
    }
}

impl ApiClient {
    /// Create a new client for `base`
    pub fn new(
        base: Url,
        http: Client,
        storage: Arc<dyn SessionStorage>,
        storage_key: &str,
    ) -> Self {
        Self {
            base,
            http,
            storage,
            storage_key: storage_key.to_string(),
        }
    }

    /// The configured base URL
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve `path` (which may carry a query string) against the base
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let base = self.base.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }

    /// The bearer token as currently persisted
    pub async fn token(&self) -> Option<String> {
        persist::read_token(self.storage.as_ref(), &self.storage_key).await
    }

    /// Start a request with an arbitrary method
    pub fn request(&self, method: Method, path: &str) -> ApiRequest<'_> {
        ApiRequest::new(self, method, path)
    }

    /// Create a GET request
    pub fn get(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::GET, path)
    }

    /// Create a POST request
    pub fn post(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::POST, path)
    }

    /// Create a PUT request
    pub fn put(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::PUT, path)
    }

    /// Create a DELETE request
    pub fn delete(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::DELETE, path)
    }
}

/// Helper for building and executing one request
pub struct ApiRequest<'a> {
    client: &'a ApiClient,
    path: String,
    method: Method,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl<'a> ApiRequest<'a> {
    fn new(client: &'a ApiClient, method: Method, path: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Self {
            client,
            path: path.to_string(),
            method,
            headers,
            query: Vec::new(),
            body: None,
        }
    }

    /// Add a header, overriding the defaults. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Append one query parameter. Order is preserved.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Send the request and return the raw response, whatever its status
    pub async fn send(self) -> Result<Response> {
        let mut url = self.client.url_for(&self.path)?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }

        let mut headers = self.headers;
        if let Some(token) = self.client.token().await {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        log::debug!("{} {}", self.method, url);
        let mut req = self.client.http.request(self.method, url).headers(headers);
        if let Some(body) = self.body {
            req = req.body(body);
        }

        Ok(req.send().await?)
    }
}

/// Pull the backend's `error` message out of a rejected response body
pub(crate) async fn error_message(response: Response) -> Option<String> {
    let body = response.json::<serde_json::Value>().await.ok()?;
    body.get("error")
        .and_then(serde_json::Value::as_str)
        .filter(|msg| !msg.is_empty())
        .map(str::to_string)
}
