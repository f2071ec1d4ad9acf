//! Fluent request/assertion client
//!
//! ```text
//! client.given()
//!     .header("X-Trace", "abc")
//!     .query_param("id", "5")
//!     .when(HttpVerb::Get, "/widgets")?
//!     .status_code(200)?
//!     .body_path("$.id", &json!(5))?;
//! ```
//!
//! Every exchange passes through a logging filter that logs it at info and
//! warns on any status other than 200.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Instant;
use url::Url;

use apicheck_common::{display_value, Error, Result, ScenarioLogger, ScenarioSession};

use crate::call::{HttpCall, HttpResult, HttpVerb};
use crate::direct::collect_headers;
use crate::transport::{merge_headers, ClientSettings, HttpTransport, Sent};

/// Base URI and headers shared by every request of a client
#[derive(Debug, Clone)]
pub struct RequestSpec {
    settings: ClientSettings,
    headers: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn new(settings: ClientSettings) -> Self {
        let headers = settings.effective_headers(&[]);
        Self { settings, headers }
    }

    pub fn base_uri(&self) -> &Url {
        &self.settings.base_url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Add or replace a header sent with every request
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers = merge_headers(&self.headers, &[(name.into(), value.into())]);
        self
    }
}

#[derive(Debug)]
pub struct FluentClient {
    spec: RequestSpec,
    client: reqwest::blocking::Client,
}

impl FluentClient {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            spec: RequestSpec::new(settings),
            client,
        })
    }

    pub fn spec(&self) -> &RequestSpec {
        &self.spec
    }

    pub fn with_spec(mut self, spec: RequestSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Start a request from the shared spec
    pub fn given(&self) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }
}

#[derive(Debug)]
pub struct RequestBuilder<'a> {
    client: &'a FluentClient,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<String>,
}

impl<'a> RequestBuilder<'a> {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<'h>(mut self, headers: impl IntoIterator<Item = &'h (String, String)>) -> Self {
        self.headers.extend(headers.into_iter().cloned());
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn query_params<'q>(mut self, params: impl IntoIterator<Item = &'q (String, String)>) -> Self {
        self.query.extend(params.into_iter().cloned());
        self
    }

    /// Blank bodies are dropped
    pub fn body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.body = (!body.trim().is_empty()).then_some(body);
        self
    }

    /// Send the request
    pub fn when(self, verb: HttpVerb, route: &str) -> Result<ValidatableResponse> {
        let spec = &self.client.spec;
        let url = spec.settings.build_url(route, &self.query)?;
        let headers = merge_headers(&spec.headers, &self.headers);

        let mut request = self.client.client.request(verb.into(), url.clone());
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }

        let started = Utc::now();
        let timer = Instant::now();
        let response = request.send()?;
        let status = response.status();
        let response_headers = collect_headers(response.headers());
        let body = response.text()?;

        Ok(ValidatableResponse {
            verb,
            url,
            request_headers: headers,
            request_body: self.body,
            status_line: status.canonical_reason().unwrap_or("Unknown").to_string(),
            started,
            result: HttpResult {
                status: status.as_u16(),
                headers: response_headers,
                body,
                elapsed_ms: timer.elapsed().as_millis() as u64,
            },
        })
    }
}

/// A response with fluent assertions
#[derive(Debug, Clone)]
pub struct ValidatableResponse {
    verb: HttpVerb,
    url: Url,
    request_headers: Vec<(String, String)>,
    request_body: Option<String>,
    status_line: String,
    started: DateTime<Utc>,
    result: HttpResult,
}

impl ValidatableResponse {
    pub fn status_code(&self, expected: u16) -> Result<&Self> {
        if self.result.status != expected {
            return Err(Error::AssertionFailed(format!(
                "Expected status code {} but received {} for URL {}\n{}",
                expected,
                self.result.status,
                self.url,
                self.result.body
            )));
        }
        Ok(self)
    }

    /// The JSON value at `path` equals `expected`
    pub fn body_path(&self, path: &str, expected: &Value) -> Result<&Self> {
        let document = self.result.json()?;
        let actual = document.read(path);
        if actual != Some(expected) {
            return Err(Error::AssertionFailed(format!(
                "JSON path {} doesn't match.\nExpected: {}\n  Actual: {}\n{}",
                path,
                display_value(expected),
                actual.map(display_value).unwrap_or_else(|| "<missing>".to_string()),
                self.result.body
            )));
        }
        Ok(self)
    }

    pub fn header(&self, name: &str, expected: &str) -> Result<&Self> {
        match self.result.header(name) {
            Some(actual) if actual == expected => Ok(self),
            actual => Err(Error::AssertionFailed(format!(
                "Expected header {} to be {} but was {}",
                name,
                expected,
                actual.unwrap_or("<missing>")
            ))),
        }
    }

    /// The logging filter: one info line per exchange, a warning on
    /// anything but 200.
    pub fn log_exchange(&self, logger: &mut ScenarioLogger) {
        if self.result.status != 200 {
            logger.warn(format!(
                "{} {} => {} {}",
                self.verb, self.url, self.result.status, self.status_line
            ));
        }
        logger.info(format!(
            "{} {} \n Request Body => {}\n Response Status => {} {} \n Response Body => {}",
            self.verb,
            self.url,
            self.request_body.as_deref().unwrap_or("none"),
            self.result.status,
            self.status_line,
            self.result.pretty_body()
        ));
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn extract(self) -> HttpResult {
        self.result
    }
}

impl HttpTransport for FluentClient {
    fn name(&self) -> &'static str {
        "fluent"
    }

    fn send(&self, call: &HttpCall, session: &mut ScenarioSession) -> Result<HttpResult> {
        let mut builder = self
            .given()
            .headers(&call.headers)
            .query_params(&call.query);
        if let Some(body) = call.payload() {
            builder = builder.body(body);
        }

        let response = builder.when(call.verb, &call.route)?;
        response.log_exchange(session.logger());

        let sent = Sent {
            call,
            url: &response.url,
            headers: response.request_headers.clone(),
            started: response.started,
        };
        let exchange = sent.into_exchange(&response.result, response.status_line.clone());
        session.record(exchange.into_entry());

        Ok(response.extract())
    }
}
