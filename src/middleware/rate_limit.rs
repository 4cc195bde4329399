use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::config::Config;

/// The only path subject to the request quota; everything else under /api
/// passes through untouched.
const LIMITED_PATH: &str = "/api/submit";

const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const HEADER_RETRY_AFTER: HeaderName = HeaderName::from_static("retry-after");

/// Per-client request counter for the current fixed window. Once
/// `reset_at_ms` has passed the record is stale and must be replaced,
/// never incremented.
#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    count: u32,
    reset_at_ms: u64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited,
}

/// Fixed-window rate limiter keyed by client identifier.
///
/// State lives for the process only; a restart resets every quota. All
/// time-dependent methods take `now_ms` so tests can drive the clock.
pub struct RateLimiter {
    records: Mutex<HashMap<String, RateLimitRecord>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: &Config) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            max_requests: config.rate_limit_requests,
            window: config.rate_limit_window(),
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn record_hit(&self, client_id: &str) -> Decision {
        self.record_hit_at(client_id, Self::now_ms())
    }

    fn record_hit_at(&self, client_id: &str, now_ms: u64) -> Decision {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());

        match records.get_mut(client_id) {
            Some(record) if now_ms <= record.reset_at_ms => {
                if record.count >= self.max_requests {
                    return Decision::Limited;
                }
                record.count += 1;
                Decision::Allowed
            }
            // First request, or the previous window has expired.
            _ => {
                records.insert(
                    client_id.to_string(),
                    RateLimitRecord {
                        count: 1,
                        reset_at_ms: now_ms + self.window.as_millis() as u64,
                    },
                );
                Decision::Allowed
            }
        }
    }

    pub fn headers(&self, client_id: &str) -> Vec<(HeaderName, String)> {
        self.headers_at(client_id, Self::now_ms())
    }

    fn headers_at(&self, client_id: &str, now_ms: u64) -> Vec<(HeaderName, String)> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());

        let Some(record) = records.get(client_id) else {
            return vec![
                (HEADER_LIMIT, self.max_requests.to_string()),
                (HEADER_REMAINING, self.max_requests.to_string()),
            ];
        };

        let remaining = self.max_requests.saturating_sub(record.count);
        let reset_secs = record.reset_at_ms.saturating_sub(now_ms).div_ceil(1000);

        vec![
            (HEADER_LIMIT, self.max_requests.to_string()),
            (HEADER_REMAINING, remaining.to_string()),
            (HEADER_RESET, reset_secs.to_string()),
        ]
    }

    /// Drop records whose window has already ended. Stale records are
    /// ignored by `record_hit` regardless, so this is housekeeping only.
    pub fn sweep(&self) {
        self.sweep_at(Self::now_ms());
    }

    fn sweep_at(&self, now_ms: u64) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.retain(|_, record| now_ms <= record.reset_at_ms);
    }

    #[cfg(test)]
    fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

/// Derive the client identifier from proxy headers, falling back to a
/// shared "unknown" bucket when nothing identifies the caller.
pub fn client_id(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    headers
        .get("x-real-ip")
        .or_else(|| headers.get("x-client-ip"))
        .and_then(|h| h.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Serialize)]
struct RateLimitedBody {
    error: &'static str,
    message: &'static str,
}

fn rate_limited_response(limiter: &RateLimiter, id: &str) -> Response {
    let headers = limiter.headers(id);
    let reset = headers
        .iter()
        .find(|(name, _)| *name == HEADER_RESET)
        .map(|(_, value)| value.clone());

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitedBody {
            error: "Too Many Requests",
            message: "You have exceeded the rate limit. Please try again later.",
        }),
    )
        .into_response();

    apply_headers(&mut response, headers);
    if let Some(reset) = reset {
        if let Ok(value) = HeaderValue::from_str(&reset) {
            response.headers_mut().insert(HEADER_RETRY_AFTER, value);
        }
    }

    response
}

fn apply_headers(response: &mut Response, headers: Vec<(HeaderName, String)>) {
    for (name, value) in headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(name, value);
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let id = client_id(req.headers());

    if path == LIMITED_PATH
        && req.method() == Method::POST
        && limiter.record_hit(&id) == Decision::Limited
    {
        tracing::warn!(client = %id, "rate limit exceeded on {}", path);
        return rate_limited_response(&limiter, &id);
    }

    let mut response = next.run(req).await;

    if path == LIMITED_PATH {
        apply_headers(&mut response, limiter.headers(&id));
    }

    response
}
