//! HTTP Archive 1.2 traffic capture (spec.md §4.13 `TrafficCapture`,
//! optional). Grounded in the teacher's single-writer isolation pattern
//! (`assay-evidence::bundle::BundleWriter` drains independently of the
//! adapter producing events; `aipo_core::memory::ConversationMemory` uses
//! the same mutex-guarded single-writer idiom within this workspace).
//! Adapters publish `(request, response, timing)` tuples; the writer
//! drains them into a HAR entry list with no further coordination.

use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarContent {
    pub size: i64,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    #[serde(rename = "httpVersion")]
    pub http_version: String,
    pub headers: Vec<HarHeader>,
    #[serde(rename = "bodySize")]
    pub body_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarResponse {
    pub status: u16,
    #[serde(rename = "statusText")]
    pub status_text: String,
    #[serde(rename = "httpVersion")]
    pub http_version: String,
    pub headers: Vec<HarHeader>,
    pub content: HarContent,
    #[serde(rename = "bodySize")]
    pub body_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarTimings {
    pub send: f64,
    pub wait: f64,
    pub receive: f64,
}

/// One captured request/response pair, already in HAR entry shape
/// (spec.md §4.13: "log.entries=[{startedDateTime, time, request, response,
/// timings, cache}]").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarEntry {
    #[serde(rename = "startedDateTime")]
    pub started_date_time: DateTime<Utc>,
    pub time: f64,
    pub request: HarRequest,
    pub response: HarResponse,
    pub timings: HarTimings,
    pub cache: serde_json::Value,
}

impl HarEntry {
    /// Build an entry from a raw exchange, base64-encoding `response_body`
    /// when it isn't valid UTF-8 text (spec.md §4.13: "Binary bodies
    /// base64-encoded with `encoding=base64`").
    pub fn new(
        started_date_time: DateTime<Utc>,
        elapsed_ms: u64,
        method: &str,
        url: &str,
        request_headers: Vec<(String, String)>,
        response_status: u16,
        response_headers: Vec<(String, String)>,
        response_body: &[u8],
        mime_type: &str,
    ) -> Self {
        let (text, encoding) = match std::str::from_utf8(response_body) {
            Ok(s) => (Some(s.to_string()), None),
            Err(_) => (Some(BASE64.encode(response_body)), Some("base64".to_string())),
        };
        let time = elapsed_ms as f64;
        Self {
            started_date_time,
            time,
            request: HarRequest {
                method: method.to_string(),
                url: url.to_string(),
                http_version: "HTTP/1.1".to_string(),
                headers: request_headers.into_iter().map(|(name, value)| HarHeader { name, value }).collect(),
                body_size: -1,
            },
            response: HarResponse {
                status: response_status,
                status_text: String::new(),
                http_version: "HTTP/1.1".to_string(),
                headers: response_headers.into_iter().map(|(name, value)| HarHeader { name, value }).collect(),
                content: HarContent { size: response_body.len() as i64, mime_type: mime_type.to_string(), text, encoding },
                body_size: response_body.len() as i64,
            },
            timings: HarTimings { send: 0.0, wait: time, receive: 0.0 },
            cache: serde_json::json!({}),
        }
    }
}

#[derive(Serialize)]
struct HarCreator {
    name: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct HarLog {
    version: &'static str,
    creator: HarCreator,
    pages: Vec<serde_json::Value>,
    entries: Vec<HarEntry>,
}

#[derive(Serialize)]
struct HarDocument {
    log: HarLog,
}

/// Single-writer sink for captured HTTP exchanges. Producers (adapters)
/// call [`TrafficCapture::record`] without blocking the request path; at
/// capacity the oldest entry is dropped with a `tracing::warn!` (spec.md
/// §5: "producers enqueue without blocking except when queue at capacity
/// (then drop oldest with a warning — never block the request path)").
pub struct TrafficCapture {
    entries: Mutex<Vec<HarEntry>>,
    capacity: usize,
}

impl TrafficCapture {
    pub fn new(capacity: usize) -> Self {
        Self { entries: Mutex::new(Vec::new()), capacity }
    }

    pub fn record(&self, entry: HarEntry) {
        let mut entries = self.entries.lock().expect("traffic capture mutex poisoned");
        if entries.len() >= self.capacity {
            entries.remove(0);
            tracing::warn!(capacity = self.capacity, "traffic capture at capacity, dropping oldest entry");
        }
        entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("traffic capture mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize the captured entries into a `session.har` document
    /// (spec.md §4.13: "log.version=1.2, log.creator, log.pages=[]").
    pub fn finish(self) -> Vec<u8> {
        let entries = self.entries.into_inner().expect("traffic capture mutex poisoned");
        let document = HarDocument {
            log: HarLog {
                version: "1.2",
                creator: HarCreator { name: "aipo", version: env!("CARGO_PKG_VERSION") },
                pages: Vec::new(),
                entries,
            },
        };
        serde_json::to_vec_pretty(&document).expect("HAR document serialization cannot fail")
    }
}
