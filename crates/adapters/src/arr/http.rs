// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for arr-family managers.
//!
//! One client serves every configured instance; rate limiter and circuit
//! breaker state are keyed per instance id. The wire shapes differ slightly
//! between the series and movie managers, so responses are read tolerantly
//! from JSON values instead of rigid structs.

use super::{
    validate_base_url, ArrClient, ArrError, CircuitBreaker, HistoryEntry, HistoryEventKind,
    ItemRef, QueueEntry, RetryPolicy, TokenBucket,
};
use crate::secrets::SecretBox;
use async_trait::async_trait;
use chrono::DateTime;
use mendarr_core::{ArrInstance, ArrKind};
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-instance request rate limits.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub rps: f64,
    pub burst: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self { rps: 5.0, burst: 10 }
    }
}

/// Consecutive failures before an instance's breaker opens.
const BREAKER_THRESHOLD: u32 = 5;

/// How long an open breaker waits before admitting a probe.
const BREAKER_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct HttpArrClient {
    client: reqwest::Client,
    limits: RateLimits,
    retry: RetryPolicy,
    allow_private_urls: bool,
    secrets: SecretBox,
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    breakers: Arc<Mutex<HashMap<String, CircuitBreaker>>>,
}

impl HttpArrClient {
    pub fn new(
        limits: RateLimits,
        retry: RetryPolicy,
        allow_private_urls: bool,
        secrets: SecretBox,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            limits,
            retry,
            allow_private_urls,
            secrets,
            buckets: Arc::new(Mutex::new(HashMap::new())),
            breakers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wait for a rate-limit token for this instance.
    async fn acquire_token(&self, instance_id: &str) {
        loop {
            let wait = {
                let mut buckets = self.buckets.lock();
                let bucket = buckets.entry(instance_id.to_string()).or_insert_with(|| {
                    TokenBucket::new(self.limits.rps, self.limits.burst, Instant::now())
                });
                match bucket.try_acquire(Instant::now()) {
                    Ok(()) => None,
                    Err(wait) => Some(wait),
                }
            };
            match wait {
                None => return,
                Some(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    fn breaker_allows(&self, instance_id: &str) -> bool {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(instance_id.to_string())
            .or_insert_with(|| CircuitBreaker::new(BREAKER_THRESHOLD, BREAKER_COOLDOWN))
            .allow(Instant::now())
    }

    fn record_outcome(&self, instance_id: &str, ok: bool) {
        let mut breakers = self.breakers.lock();
        let breaker = breakers
            .entry(instance_id.to_string())
            .or_insert_with(|| CircuitBreaker::new(BREAKER_THRESHOLD, BREAKER_COOLDOWN));
        if ok {
            breaker.record_success();
        } else {
            breaker.record_failure(Instant::now());
        }
    }

    /// Execute one logical API call with rate limiting, bounded retry and
    /// breaker accounting. Returns the parsed JSON body (Null for empty).
    async fn execute(
        &self,
        instance: &ArrInstance,
        method: Method,
        path_and_query: &str,
        body: Option<Value>,
    ) -> Result<Value, ArrError> {
        let base = validate_base_url(&instance.base_url, self.allow_private_urls)?;
        let url = base
            .join(path_and_query)
            .map_err(|e| ArrError::InvalidUrl(e.to_string()))?;
        let api_key = self
            .secrets
            .reveal(&instance.api_key)
            .map_err(|e| ArrError::Credential(e.to_string()))?;
        let instance_id = instance.id.as_str();

        if !self.breaker_allows(instance_id) {
            return Err(ArrError::Unavailable);
        }

        let mut attempt = 0u32;
        loop {
            let delay = self.retry.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.acquire_token(instance_id).await;

            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .header("X-Api-Key", &api_key);
            if let Some(ref body) = body {
                request = request.json(body);
            }

            let outcome = tokio::time::timeout(self.retry.attempt_timeout, request.send()).await;
            let error = match outcome {
                Err(_) => ArrError::Network("attempt timed out".to_string()),
                Ok(Err(e)) => ArrError::Network(e.to_string()),
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() {
                        self.record_outcome(instance_id, true);
                        let bytes = response
                            .bytes()
                            .await
                            .map_err(|e| ArrError::Network(e.to_string()))?;
                        if bytes.is_empty() {
                            return Ok(Value::Null);
                        }
                        return serde_json::from_slice(&bytes)
                            .map_err(|e| ArrError::Decode(e.to_string()));
                    }
                    match status.as_u16() {
                        404 => {
                            self.record_outcome(instance_id, true);
                            return Err(ArrError::NotFound);
                        }
                        code @ 400..=499 => {
                            self.record_outcome(instance_id, true);
                            return Err(ArrError::Rejected { status: code });
                        }
                        code => ArrError::Server { status: code },
                    }
                }
            };

            self.record_outcome(instance_id, false);
            if self.retry.attempts_exhausted(attempt) {
                warn!(
                    instance = instance_id,
                    url = %url,
                    error = %error,
                    attempts = attempt + 1,
                    "manager call failed after retries"
                );
                return Err(error);
            }
            debug!(
                instance = instance_id,
                error = %error,
                attempt = attempt + 1,
                "transient manager failure, retrying"
            );
            attempt += 1;
        }
    }
}

/// Read the first present u64 among candidate keys.
fn u64_field(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| value.get(key).and_then(Value::as_u64))
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| value.get(key).and_then(Value::as_str))
}

/// Queue/history feeds arrive either as a bare array or paged under
/// `records`, depending on manager kind and version.
fn records(value: &Value) -> &[Value] {
    value
        .as_array()
        .or_else(|| value.get("records").and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn parse_date_ms(value: &Value) -> u64 {
    str_field(value, &["date"])
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp_millis().max(0) as u64)
        .unwrap_or(0)
}

fn download_percent(record: &Value) -> Option<u8> {
    let size = record.get("size").and_then(Value::as_f64)?;
    let left = record.get("sizeleft").and_then(Value::as_f64)?;
    if size <= 0.0 {
        return None;
    }
    let done = ((size - left) / size * 100.0).clamp(0.0, 100.0);
    Some(done.round() as u8)
}

fn history_kind(event_type: &str) -> HistoryEventKind {
    match event_type {
        "grabbed" => HistoryEventKind::Grabbed,
        "downloadFolderImported" | "episodeFileImported" | "movieFileImported" => {
            HistoryEventKind::Imported
        }
        "downloadFailed" | "downloadIgnored" | "importFailed" => HistoryEventKind::ImportFailed,
        "movieFileDeleted" | "episodeFileDeleted" => HistoryEventKind::Deleted,
        _ => HistoryEventKind::Other,
    }
}

fn item_id_of(record: &Value, kind: ArrKind) -> Option<u64> {
    match kind {
        ArrKind::Movies => u64_field(record, &["movieId", "id"]),
        ArrKind::Series => u64_field(record, &["seriesId", "id"]),
    }
}

#[async_trait]
impl ArrClient for HttpArrClient {
    async fn lookup_item_by_path(
        &self,
        instance: &ArrInstance,
        path: &Path,
    ) -> Result<ItemRef, ArrError> {
        let wanted = path.to_string_lossy();
        match instance.kind {
            ArrKind::Movies => {
                let movies = self
                    .execute(instance, Method::GET, "api/v3/movie", None)
                    .await?;
                for movie in records(&movies) {
                    let Some(file) = movie.get("movieFile") else {
                        continue;
                    };
                    if str_field(file, &["path"]) == Some(wanted.as_ref()) {
                        return Ok(ItemRef {
                            item_id: u64_field(movie, &["id"])
                                .ok_or_else(|| ArrError::Decode("movie without id".into()))?,
                            file_id: u64_field(file, &["id"])
                                .ok_or_else(|| ArrError::Decode("movie file without id".into()))?,
                            title: str_field(movie, &["title"]).unwrap_or_default().to_string(),
                        });
                    }
                }
                Err(ArrError::NotFound)
            }
            ArrKind::Series => {
                let files = self
                    .execute(instance, Method::GET, "api/v3/episodefile", None)
                    .await?;
                for file in records(&files) {
                    if str_field(file, &["path"]) == Some(wanted.as_ref()) {
                        let title = str_field(file, &["relativePath", "path"])
                            .and_then(|p| Path::new(p).file_name())
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        return Ok(ItemRef {
                            item_id: u64_field(file, &["seriesId"])
                                .ok_or_else(|| ArrError::Decode("file without seriesId".into()))?,
                            file_id: u64_field(file, &["id"])
                                .ok_or_else(|| ArrError::Decode("file without id".into()))?,
                            title,
                        });
                    }
                }
                Err(ArrError::NotFound)
            }
        }
    }

    async fn delete_file(&self, instance: &ArrInstance, file_id: u64) -> Result<(), ArrError> {
        let path = match instance.kind {
            ArrKind::Movies => format!("api/v3/moviefile/{file_id}"),
            ArrKind::Series => format!("api/v3/episodefile/{file_id}"),
        };
        self.execute(instance, Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn search_item(&self, instance: &ArrInstance, item_id: u64) -> Result<(), ArrError> {
        let body = match instance.kind {
            ArrKind::Movies => json!({ "name": "MoviesSearch", "movieIds": [item_id] }),
            ArrKind::Series => json!({ "name": "SeriesSearch", "seriesId": item_id }),
        };
        self.execute(instance, Method::POST, "api/v3/command", Some(body))
            .await?;
        Ok(())
    }

    async fn queue(&self, instance: &ArrInstance) -> Result<Vec<QueueEntry>, ArrError> {
        let value = self
            .execute(instance, Method::GET, "api/v3/queue?pageSize=1000", None)
            .await?;
        Ok(records(&value)
            .iter()
            .filter_map(|record| {
                Some(QueueEntry {
                    item_id: item_id_of(record, instance.kind)?,
                    title: str_field(record, &["title"]).unwrap_or_default().to_string(),
                    percent: download_percent(record),
                })
            })
            .collect())
    }

    async fn history_since(
        &self,
        instance: &ArrInstance,
        since_ms: u64,
    ) -> Result<Vec<HistoryEntry>, ArrError> {
        let since = DateTime::from_timestamp_millis(since_ms as i64)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        let path = format!("api/v3/history/since?date={since}");
        let value = self.execute(instance, Method::GET, &path, None).await?;

        Ok(records(&value)
            .iter()
            .filter_map(|record| {
                let kind = history_kind(str_field(record, &["eventType"]).unwrap_or(""));
                let imported_path = record
                    .get("data")
                    .and_then(|d| str_field(d, &["importedPath", "path"]))
                    .or_else(|| str_field(record, &["importedPath"]))
                    .map(PathBuf::from);
                Some(HistoryEntry {
                    item_id: item_id_of(record, instance.kind)?,
                    kind,
                    imported_path,
                    date_ms: parse_date_ms(record),
                })
            })
            .collect())
    }

    async fn item_file(
        &self,
        instance: &ArrInstance,
        item_id: u64,
    ) -> Result<Option<PathBuf>, ArrError> {
        match instance.kind {
            ArrKind::Movies => {
                let movie = self
                    .execute(instance, Method::GET, &format!("api/v3/movie/{item_id}"), None)
                    .await?;
                Ok(movie
                    .get("movieFile")
                    .and_then(|f| str_field(f, &["path"]))
                    .map(PathBuf::from))
            }
            ArrKind::Series => {
                let files = self
                    .execute(
                        instance,
                        Method::GET,
                        &format!("api/v3/episodefile?seriesId={item_id}"),
                        None,
                    )
                    .await?;
                // Newest file record wins when the series has several
                let newest = records(&files)
                    .iter()
                    .max_by_key(|f| u64_field(f, &["id"]).unwrap_or(0));
                Ok(newest
                    .and_then(|f| str_field(f, &["path"]))
                    .map(PathBuf::from))
            }
        }
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
