//! Playwright request-context transport
//!
//! Requests go through Playwright's `APIRequestContext` in a Node.js
//! subprocess. The request is handed over as a JSON file and the response
//! comes back as one JSON line on stdout.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;
use tracing::debug;

use apicheck_common::har::HarNameValue;
use apicheck_common::{Error, Result, ScenarioSession};

use crate::call::{HttpCall, HttpResult};
use crate::transport::{log_request, log_response, ClientSettings, HttpTransport, Sent};

const SCRIPT_NAME: &str = "request.js";

/// Node script run once per call. Timing is measured inside the script so
/// that process start-up is not counted.
const REQUEST_SCRIPT: &str = r#"
const fs = require('fs');
const { request } = require(require.resolve('playwright', { paths: [process.cwd()] }));

(async () => {
  const spec = JSON.parse(fs.readFileSync(process.argv[2], 'utf8'));
  const context = await request.newContext({
    baseURL: spec.baseUrl,
    extraHTTPHeaders: Object.fromEntries(spec.headers),
    timeout: spec.timeoutMs,
    ignoreHTTPSErrors: true,
  });

  try {
    const options = { method: spec.method, failOnStatusCode: false };
    if (spec.body !== null) {
      options.data = spec.body;
    }
    const started = Date.now();
    const response = await context.fetch(spec.route, options);
    const body = await response.text();
    const elapsedMs = Date.now() - started;
    console.log(JSON.stringify({
      status: response.status(),
      statusText: response.statusText(),
      headers: response.headersArray(),
      body,
      elapsedMs,
    }));
  } catch (error) {
    console.error(JSON.stringify({ error: error.message, stack: error.stack }));
    process.exit(1);
  } finally {
    await context.dispose();
  }
})();
"#;

/// Request descriptor read by the script
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrowserRequest {
    base_url: String,
    /// Relative to `base_url`, no leading slash, query included
    route: String,
    method: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
    timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrowserResponse {
    status: u16,
    #[serde(default)]
    status_text: String,
    headers: Vec<HarNameValue>,
    body: String,
    elapsed_ms: u64,
}

/// Playwright requires a trailing slash on the base URL
fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// Playwright requires no leading slash on a relative route
fn remove_leading_slash(route: &str) -> &str {
    route.strip_prefix('/').unwrap_or(route)
}

#[derive(Debug)]
pub struct BrowserClient {
    settings: ClientSettings,
    /// Holds the generated script for the lifetime of the client
    script_dir: TempDir,
    /// Directory Node resolves `playwright` from
    working_dir: PathBuf,
}

impl BrowserClient {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        Self::check_playwright_installed()?;
        let working_dir = std::env::current_dir()?;
        Self::with_working_dir(settings, working_dir)
    }

    /// Skips the installation check; `working_dir` must contain (or be
    /// below) a `node_modules` with Playwright.
    pub fn with_working_dir(settings: ClientSettings, working_dir: impl Into<PathBuf>) -> Result<Self> {
        let script_dir = tempfile::tempdir()?;
        std::fs::write(script_dir.path().join(SCRIPT_NAME), REQUEST_SCRIPT)?;

        Ok(Self {
            settings,
            script_dir,
            working_dir: working_dir.into(),
        })
    }

    fn check_playwright_installed() -> Result<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(Error::Transport(
                "Playwright not found. Install with: npm install playwright".to_string(),
            )),
        }
    }

    pub fn script_path(&self) -> PathBuf {
        self.script_dir.path().join(SCRIPT_NAME)
    }

    fn base_url(&self) -> String {
        ensure_trailing_slash(self.settings.base_url.as_str())
    }

    fn describe(&self, call: &HttpCall, headers: &[(String, String)]) -> Result<BrowserRequest> {
        // Resolve against the normalized base so the query is encoded the
        // same way as for the other transports, then make it relative again.
        let url = self.settings.build_url(&call.route, &call.query)?;
        let base = self.base_url();
        let route = url
            .as_str()
            .strip_prefix(base.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| remove_leading_slash(&call.route).to_string());

        Ok(BrowserRequest {
            base_url: base,
            route,
            method: call.verb.to_string(),
            headers: headers.to_vec(),
            body: call.payload().map(str::to_string),
            timeout_ms: self.settings.timeout.as_millis() as u64,
        })
    }

    fn run(&self, request: &BrowserRequest) -> Result<BrowserResponse> {
        let mut descriptor = tempfile::NamedTempFile::new_in(self.script_dir.path())?;
        descriptor.write_all(serde_json::to_string(request)?.as_bytes())?;
        descriptor.flush()?;

        debug!("Running Playwright request script: {}", self.script_path().display());

        let output = Command::new("node")
            .arg(self.script_path())
            .arg(descriptor.path())
            .current_dir(&self.working_dir)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(Error::Transport(format!(
                "Playwright request failed:\nstdout: {}\nstderr: {}",
                stdout, stderr
            )));
        }

        parse_response(&output.stdout)
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

/// The last non-empty stdout line is the response; anything before it is
/// console noise from Playwright.
fn parse_response(stdout: &[u8]) -> Result<BrowserResponse> {
    let stdout = String::from_utf8_lossy(stdout);
    let line = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| Error::Transport("Playwright returned no response".to_string()))?;
    Ok(serde_json::from_str(line)?)
}

impl HttpTransport for BrowserClient {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn send(&self, call: &HttpCall, session: &mut ScenarioSession) -> Result<HttpResult> {
        let headers = self.settings.effective_headers(&call.headers);
        let request = self.describe(call, &headers)?;
        let url = self.settings.build_url(&call.route, &call.query)?;
        session
            .logger()
            .debug(format!("Created API Request Object for URL : {}", request.base_url));
        log_request(session, call, &url);

        let started = Utc::now();
        let response = self.run(&request)?;

        let result = HttpResult {
            status: response.status,
            headers: response
                .headers
                .into_iter()
                .map(|h| (h.name, h.value))
                .collect(),
            body: response.body,
            elapsed_ms: response.elapsed_ms,
        };
        log_response(session, &result);

        let sent = Sent {
            call,
            url: &url,
            headers,
            started,
        };
        session.record(sent.into_exchange(&result, response.status_text).into_entry());

        Ok(result)
    }
}
