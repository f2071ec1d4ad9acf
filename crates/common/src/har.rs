//! HTTP Archive capture
//!
//! Transports append one [`HarEntry`] per call. At scenario teardown the
//! entries are written as a single pretty-printed HAR 1.2 document that can
//! be loaded into any HAR viewer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::Result;
use crate::scenario::ScenarioContext;

pub const HAR_VERSION: &str = "1.2";
pub const HTTP_1_1: &str = "HTTP/1.1";
pub const APPLICATION_JSON: &str = "application/json";
pub const HAR_FOLDER: &str = "har";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarNameValue {
    pub name: String,
    pub value: String,
}

impl HarNameValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a (String, String)>) -> Vec<Self> {
        pairs
            .into_iter()
            .map(|(name, value)| Self::new(name.as_str(), value.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPostData {
    pub mime_type: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    pub http_version: String,
    pub headers: Vec<HarNameValue>,
    pub query_string: Vec<HarNameValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<HarPostData>,
    pub headers_size: i64,
    pub body_size: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    pub size: i64,
    pub mime_type: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    pub status: u16,
    pub status_text: String,
    pub http_version: String,
    pub headers: Vec<HarNameValue>,
    pub content: HarContent,
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    pub headers_size: i64,
    pub body_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarCache {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarTimings {
    pub send: u64,
    pub wait: u64,
    pub receive: u64,
}

/// One request/response exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    pub started_date_time: DateTime<Utc>,
    /// Round trip in milliseconds
    pub time: u64,
    pub request: HarRequest,
    pub response: HarResponse,
    pub cache: HarCache,
    pub timings: HarTimings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarCreator {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarLog {
    pub version: String,
    pub creator: HarCreator,
    pub entries: Vec<HarEntry>,
}

/// Top-level HAR document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Har {
    pub log: HarLog,
}

impl Har {
    pub fn new(entries: Vec<HarEntry>) -> Self {
        Self {
            log: HarLog {
                version: HAR_VERSION.to_string(),
                creator: HarCreator {
                    name: "apicheck".to_string(),
                    version: crate::VERSION.to_string(),
                },
                entries,
            },
        }
    }
}

/// What a transport knows about one finished call
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    pub started: Option<DateTime<Utc>>,
    pub method: String,
    /// Full URL including the query string
    pub url: String,
    pub request_headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub request_body: Option<String>,
    pub status: u16,
    pub status_text: String,
    pub response_headers: Vec<(String, String)>,
    pub response_body: String,
    pub elapsed_ms: u64,
}

impl Exchange {
    /// Shape this exchange as a HAR entry
    pub fn into_entry(self) -> HarEntry {
        let mime_type = self
            .response_headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| APPLICATION_JSON.to_string());
        let response_size = self.response_body.len() as i64;
        let request_size = self.request_body.as_ref().map_or(0, |b| b.len() as i64);

        HarEntry {
            started_date_time: self.started.unwrap_or_else(Utc::now),
            time: self.elapsed_ms,
            request: HarRequest {
                method: self.method,
                url: self.url,
                http_version: HTTP_1_1.to_string(),
                headers: HarNameValue::from_pairs(&self.request_headers),
                query_string: HarNameValue::from_pairs(&self.query),
                post_data: self.request_body.map(|text| HarPostData {
                    mime_type: APPLICATION_JSON.to_string(),
                    text,
                }),
                headers_size: -1,
                body_size: request_size,
            },
            response: HarResponse {
                status: self.status,
                status_text: self.status_text,
                http_version: HTTP_1_1.to_string(),
                headers: HarNameValue::from_pairs(&self.response_headers),
                content: HarContent {
                    size: response_size,
                    mime_type,
                    text: self.response_body,
                },
                redirect_url: String::new(),
                headers_size: -1,
                body_size: response_size,
            },
            cache: HarCache::default(),
            timings: HarTimings {
                send: 0,
                wait: self.elapsed_ms,
                receive: 0,
            },
        }
    }
}

/// Ordered HAR entries for the scenario running on this worker
#[derive(Debug, Clone, Default)]
pub struct HarRecorder {
    entries: Vec<HarEntry>,
}

impl HarRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, entry: HarEntry) {
        debug!(
            method = %entry.request.method,
            url = %entry.request.url,
            status = entry.response.status,
            time_ms = entry.time,
            "Recorded HAR entry"
        );
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HarEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the buffered entries to `<root>/har/<stem>.har`.
    ///
    /// Returns `None` without touching the disk when nothing was recorded.
    pub fn flush(&self, context: &ScenarioContext) -> Result<Option<PathBuf>> {
        if self.entries.is_empty() {
            return Ok(None);
        }

        let path = context.file_name_for(HAR_FOLDER, "har");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let har = Har::new(self.entries.clone());
        let json = serde_json::to_string_pretty(&har)?;
        std::fs::write(&path, json)?;

        info!("HAR written to: {}", path.display());
        Ok(Some(path))
    }

    pub fn teardown(&mut self) {
        self.entries.clear();
    }
}
