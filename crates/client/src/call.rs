//! Request and response model shared by every transport

use std::fmt::{self, Display};
use std::str::FromStr;

use apicheck_common::{Error, JsonDocument, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
}

impl HttpVerb {
    pub const ALL: [HttpVerb; 3] = [HttpVerb::Get, HttpVerb::Post, HttpVerb::Put];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
        }
    }
}

impl Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Configuration(format!("Unsupported HTTP verb {}", s)))
    }
}

impl From<HttpVerb> for reqwest::Method {
    fn from(verb: HttpVerb) -> Self {
        match verb {
            HttpVerb::Get => reqwest::Method::GET,
            HttpVerb::Post => reqwest::Method::POST,
            HttpVerb::Put => reqwest::Method::PUT,
        }
    }
}

/// One request as the step definitions describe it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCall {
    pub verb: HttpVerb,
    /// Route relative to the configured base URL
    pub route: String,
    pub body: Option<String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl HttpCall {
    pub fn new(verb: HttpVerb, route: impl Into<String>) -> Self {
        Self {
            verb,
            route: route.into(),
            body: None,
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn get(route: impl Into<String>) -> Self {
        Self::new(HttpVerb::Get, route)
    }

    pub fn post(route: impl Into<String>) -> Self {
        Self::new(HttpVerb::Post, route)
    }

    pub fn put(route: impl Into<String>) -> Self {
        Self::new(HttpVerb::Put, route)
    }

    pub fn with_body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }

    pub fn with_query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// The body to attach, if any. Blank bodies are never sent.
    pub fn payload(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.trim().is_empty())
    }
}

/// What came back. Error statuses are results too, not failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResult {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub elapsed_ms: u64,
}

impl HttpResult {
    /// First header named `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.trim_start().starts_with("application/json"))
    }

    pub fn json(&self) -> Result<JsonDocument> {
        JsonDocument::parse(&self.body)
    }

    /// Body pretty-printed when it is JSON, verbatim otherwise
    pub fn pretty_body(&self) -> String {
        match self.json() {
            Ok(doc) if self.is_json() => doc.to_pretty_json(),
            _ => self.body.clone(),
        }
    }
}
