//! Multi-endpoint LCD client.
//!
//! Every chain lists several equivalent LCD nodes. A query is sent to them in
//! configured order and the first node that answers with an acceptable,
//! decodable body wins. Failed nodes are collected so callers can report
//! exactly which node failed and why.
//!
//! Responses can additionally be vetted by a `Predicate` before the body is
//! trusted. `height_after` uses this to reject nodes that are behind a block
//! height already observed in the same logical (paginated) fetch.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::types::{NodeError, QueryError};

/// Header carrying the block height the serving node answered at.
pub const HEIGHT_HEADER: &str = "grpc-metadata-x-cosmos-block-height";

/// Acceptance check run against the response headers of every attempt.
pub type Predicate = Box<dyn Fn(&HeaderMap) -> Result<(), String> + Send + Sync>;

pub fn accept_all() -> Predicate {
    Box::new(|_| Ok(()))
}

/// Reject responses served from a block lower than `floor`.
/// Responses without a height header are accepted.
pub fn height_after(floor: u64) -> Predicate {
    Box::new(move |headers| match parse_height(headers) {
        Some(height) if height < floor => Err(format!(
            "node is at height {} but height {} was already seen",
            height, floor
        )),
        _ => Ok(()),
    })
}

pub fn parse_height(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(HEIGHT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// A decoded response plus the height it was served at, if reported.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub height: Option<u64>,
}

/// Error body returned by the LCD gateway and by wasm smart queries.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

enum Attempt {
    /// The API answered that the looked-up object does not exist.
    NotFound(String),
    Failed(String),
}

#[derive(Clone)]
pub struct LcdClient {
    chain: String,
    endpoints: Vec<String>,
    http: reqwest::Client,
}

impl LcdClient {
    pub fn new(chain: &str, endpoints: Vec<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(chain = chain, error = %e, "failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });

        Self {
            chain: chain.to_string(),
            endpoints,
            http,
        }
    }

    /// GET `path` from the first endpoint that succeeds.
    ///
    /// Every failure moves on to the next endpoint; if none succeeds the
    /// error lists one failure per endpoint, in configured order.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        predicate: &Predicate,
    ) -> Result<Fetched<T>, QueryError> {
        self.fetch(path, predicate, false)
            .await?
            .ok_or_else(|| QueryError::api(format!("{} not found", path)))
    }

    /// Like `get`, for lookups of a single object that may not exist.
    ///
    /// An HTTP 404 or a "not found" API message is an answer, not a node
    /// failure: the query stops and returns `None`, since another replica
    /// will not know the object either.
    pub async fn lookup<T: DeserializeOwned>(
        &self,
        path: &str,
        predicate: &Predicate,
    ) -> Result<Option<Fetched<T>>, QueryError> {
        self.fetch(path, predicate, true).await
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        predicate: &Predicate,
        not_found_is_absence: bool,
    ) -> Result<Option<Fetched<T>>, QueryError> {
        let mut errors = Vec::with_capacity(self.endpoints.len());

        for (index, endpoint) in self.endpoints.iter().enumerate() {
            let url = format!("{}{}", endpoint, path);
            let started = Instant::now();

            match self.attempt::<T>(&url, predicate, not_found_is_absence).await {
                Ok(fetched) => {
                    debug!(
                        chain = %self.chain,
                        url = %url,
                        height = ?fetched.height,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        failed_before = errors.len(),
                        "LCD query succeeded"
                    );
                    return Ok(Some(fetched));
                }
                Err(Attempt::NotFound(message)) => {
                    debug!(chain = %self.chain, url = %url, message = %message, "LCD object not found");
                    return Ok(None);
                }
                Err(Attempt::Failed(error)) => {
                    warn!(
                        chain = %self.chain,
                        url = %url,
                        node = index + 1,
                        total = self.endpoints.len(),
                        error = %error,
                        "LCD query failed"
                    );
                    errors.push(NodeError {
                        endpoint: endpoint.clone(),
                        error,
                    });
                }
            }
        }

        Err(QueryError::Nodes(errors))
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        url: &str,
        predicate: &Predicate,
        not_found_is_absence: bool,
    ) -> Result<Fetched<T>, Attempt> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Attempt::Failed(format!("request failed: {}", e)))?;

        let status = resp.status();
        let height = parse_height(resp.headers());
        predicate(resp.headers()).map_err(Attempt::Failed)?;

        let body = resp
            .text()
            .await
            .map_err(|e| Attempt::Failed(format!("failed to read body: {}", e)))?;
        let message = api_error_message(&body);

        if not_found_is_absence
            && (status == StatusCode::NOT_FOUND || message.as_deref().map_or(false, is_not_found))
        {
            return Err(Attempt::NotFound(
                message.unwrap_or_else(|| format!("status {}", status.as_u16())),
            ));
        }

        if let Some(message) = message {
            return Err(Attempt::Failed(format!(
                "API error (status {}): {}",
                status.as_u16(),
                message
            )));
        }

        if !status.is_success() {
            return Err(Attempt::Failed(format!(
                "bad status {}: {}",
                status.as_u16(),
                truncate(&body, 200)
            )));
        }

        let value = serde_json::from_str(&body)
            .map_err(|e| Attempt::Failed(format!("failed to decode response: {}", e)))?;

        Ok(Fetched { value, height })
    }
}

/// Non-empty `message` (or legacy `error`) field of a JSON body.
fn api_error_message(body: &str) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .filter(|m| !m.is_empty())
        .or_else(|| parsed.error.filter(|e| !e.is_empty()))
}

fn is_not_found(message: &str) -> bool {
    message.to_lowercase().contains("not found")
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
