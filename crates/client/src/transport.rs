//! The send contract shared by every transport
//!
//! All variants apply the same header rules, build URLs the same way and
//! append exactly one HAR entry per call to the scenario session before
//! handing the result back.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use apicheck_common::{ConfigKey, ConfigurationManager, Error, Exchange, Result, ScenarioSession};

use crate::browser::BrowserClient;
use crate::call::{HttpCall, HttpResult};
use crate::direct::DirectClient;
use crate::fluent::FluentClient;

pub const APPLICATION_JSON: &str = "application/json";
pub const API_KEY_HEADER: &str = "api-key";

/// Headers every request starts with
pub const DEFAULT_HEADERS: [(&str, &str); 3] = [
    ("Accept", APPLICATION_JSON),
    ("Content-Type", APPLICATION_JSON),
    ("Accept-Language", "en-US"),
];

/// Sends one call and records it in the scenario HAR.
pub trait HttpTransport: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn send(&self, call: &HttpCall, session: &mut ScenarioSession) -> Result<HttpResult>;
}

/// Connection settings resolved once from configuration
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ClientSettings {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url.trim())?,
            api_key: None,
            timeout,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// `apiBaseURL` and `apiTimeout` are required, `apiKey` is optional.
    pub fn from_config(config: &ConfigurationManager) -> Result<Self> {
        let environment = config.environment()?;
        let base_url = environment.required_string(ConfigKey::ApiBaseUrl)?;
        let seconds = environment.required_integer(ConfigKey::ApiTimeout)?;
        let seconds = u64::try_from(seconds).map_err(|_| {
            Error::Configuration(format!("{} must not be negative", ConfigKey::ApiTimeout))
        })?;

        let mut settings = Self::new(&base_url, Duration::from_secs(seconds))?;
        settings.api_key = environment.string(ConfigKey::ApiKey);
        Ok(settings)
    }

    /// Defaults, then the api key, then `custom`. A custom header replaces a
    /// default of the same name regardless of case.
    pub fn effective_headers(&self, custom: &[(String, String)]) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = DEFAULT_HEADERS
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        if let Some(key) = &self.api_key {
            headers.push((API_KEY_HEADER.to_string(), key.clone()));
        }

        merge_headers(&headers, custom)
    }

    /// Base URL joined with `route` by exactly one `/`, query appended when
    /// there is one.
    pub fn build_url(&self, route: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        let (path, route_query) = match route.split_once('?') {
            Some((path, q)) => (path, Some(q)),
            None => (route, None),
        };

        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.set_query(route_query);

        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        Ok(url)
    }
}

/// Which transport the harness wires in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportKind {
    #[default]
    Direct,
    Browser,
    Fluent,
}

impl TransportKind {
    /// `apiClient` from the base configuration, `direct` when unset
    pub fn from_config(config: &ConfigurationManager) -> Result<Self> {
        config
            .configuration()
            .string(ConfigKey::ApiClient)
            .map(|name| name.parse())
            .transpose()
            .map(Option::unwrap_or_default)
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "java" | "http" => Ok(TransportKind::Direct),
            "browser" | "playwright" => Ok(TransportKind::Browser),
            "fluent" | "restassured" => Ok(TransportKind::Fluent),
            other => Err(Error::Configuration(format!("Unknown API client {}", other))),
        }
    }
}

/// Build the transport for `kind`.
pub fn transport_for(kind: TransportKind, settings: ClientSettings) -> Result<Box<dyn HttpTransport>> {
    tracing::info!("Using {:?} HTTP transport for {}", kind, settings.base_url);
    Ok(match kind {
        TransportKind::Direct => Box::new(DirectClient::new(settings)?),
        TransportKind::Browser => Box::new(BrowserClient::new(settings)?),
        TransportKind::Fluent => Box::new(FluentClient::new(settings)?),
    })
}

/// Everything needed to describe a finished call in the HAR
pub(crate) struct Sent<'a> {
    pub call: &'a HttpCall,
    pub url: &'a Url,
    pub headers: Vec<(String, String)>,
    pub started: DateTime<Utc>,
}

impl Sent<'_> {
    pub fn into_exchange(self, result: &HttpResult, status_text: String) -> Exchange {
        Exchange {
            started: Some(self.started),
            method: self.call.verb.to_string(),
            url: self.url.to_string(),
            request_headers: self.headers,
            query: self
                .url
                .query_pairs()
                .map(|(name, value)| (name.into_owned(), value.into_owned()))
                .collect(),
            request_body: self.call.payload().map(str::to_string),
            status: result.status,
            status_text,
            response_headers: result.headers.clone(),
            response_body: result.body.clone(),
            elapsed_ms: result.elapsed_ms,
        }
    }
}

/// `base` with every `custom` header applied over it. Names match
/// case-insensitively and an override keeps its position in `base`.
pub fn merge_headers(base: &[(String, String)], custom: &[(String, String)]) -> Vec<(String, String)> {
    let mut headers = base.to_vec();
    for (name, value) in custom {
        match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(existing) => *existing = (name.clone(), value.clone()),
            None => headers.push((name.clone(), value.clone())),
        }
    }
    headers
}

pub(crate) fn log_request(session: &mut ScenarioSession, call: &HttpCall, url: &Url) {
    session.logger().debug(format!(
        "Sending {} API Request with Route: {} with Content: {}",
        call.verb,
        url,
        call.payload().unwrap_or("none")
    ));
}

pub(crate) fn log_response(session: &mut ScenarioSession, result: &HttpResult) {
    let logger = session.logger();
    logger.debug(format!("Action Executed in {} ms", result.elapsed_ms));
    logger.debug(format!(
        "Received API Response with Status {} and Content: {}",
        result.status,
        result.pretty_body()
    ));
}
