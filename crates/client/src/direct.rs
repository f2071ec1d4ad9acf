//! Plain HTTP transport on `reqwest::blocking`

use chrono::Utc;
use std::time::Instant;

use apicheck_common::{Result, ScenarioSession};

use crate::call::{HttpCall, HttpResult};
use crate::transport::{log_request, log_response, ClientSettings, HttpTransport, Sent};

#[derive(Debug)]
pub struct DirectClient {
    settings: ClientSettings,
    client: reqwest::blocking::Client,
}

impl DirectClient {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }
}

pub(crate) fn collect_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

impl HttpTransport for DirectClient {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn send(&self, call: &HttpCall, session: &mut ScenarioSession) -> Result<HttpResult> {
        let url = self.settings.build_url(&call.route, &call.query)?;
        let headers = self.settings.effective_headers(&call.headers);
        log_request(session, call, &url);

        let mut request = self.client.request(call.verb.into(), url.clone());
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = call.payload() {
            request = request.body(body.to_string());
        }

        let started = Utc::now();
        let timer = Instant::now();
        let response = request.send()?;
        let status = response.status();
        let response_headers = collect_headers(response.headers());
        let body = response.text()?;
        let elapsed_ms = timer.elapsed().as_millis() as u64;

        let result = HttpResult {
            status: status.as_u16(),
            headers: response_headers,
            body,
            elapsed_ms,
        };
        log_response(session, &result);

        let sent = Sent {
            call,
            url: &url,
            headers,
            started,
        };
        let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();
        session.record(sent.into_exchange(&result, status_text).into_entry());

        Ok(result)
    }
}
