//! Request building and response assertions behind the API steps
//!
//! [`ApiSteps`] holds one scenario's request body, custom headers and last
//! response. The cucumber step functions are thin wrappers around it.

use serde_json::Value;
use std::path::Path;
use tracing::debug;

use apicheck_client::{HttpCall, HttpResult, HttpTransport, HttpVerb};
use apicheck_common::{
    display_value, mutation, ConfigurationManager, Error, JsonDocument, MutationRow, Result,
    ScenarioLogger, ScenarioSession, ValueResolver,
};
use apicheck_common::resolver::unquote;

use crate::table::{
    pairs, resolve_table, validate_datatable, values, ARRAY_HEADINGS, ASSERT_HEADINGS,
    HEADER_HEADINGS, QUERY_HEADINGS, TRANSFORM_HEADINGS,
};

/// Per-scenario request state
#[derive(Debug, Default)]
pub struct ApiSteps {
    body: Option<JsonDocument>,
    headers: Vec<(String, String)>,
    response: Option<HttpResult>,
}

impl ApiSteps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self) -> Option<&JsonDocument> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Load `dir/file` and apply the `[field, value, operation]` rows.
    pub fn body_from_file(
        &mut self,
        config: &ConfigurationManager,
        logger: &mut ScenarioLogger,
        dir: &Path,
        file: &str,
        rows: &[Vec<String>],
    ) -> Result<()> {
        validate_datatable(rows, 3, &TRANSFORM_HEADINGS)?;
        let rows = values(&resolve_table(&ValueResolver::new(config), logger, rows)?);

        let path = dir.join(file);
        debug!("Loading request body from {}", path.display());
        let mut document = JsonDocument::parse(&std::fs::read_to_string(&path)?)?;
        transform(&mut document, &rows)?;
        self.body = Some(document);
        Ok(())
    }

    pub fn body_from_json(&mut self, json: &str) -> Result<()> {
        self.body = Some(JsonDocument::parse(json)?);
        Ok(())
    }

    /// Apply rows to the body set by an earlier step.
    pub fn transform_body(
        &mut self,
        config: &ConfigurationManager,
        logger: &mut ScenarioLogger,
        rows: &[Vec<String>],
    ) -> Result<()> {
        validate_datatable(rows, 3, &TRANSFORM_HEADINGS)?;
        let rows = values(&resolve_table(&ValueResolver::new(config), logger, rows)?);

        let document = self.body.as_mut().ok_or_else(|| {
            Error::Configuration("Step can only be applied once a body has been set".to_string())
        })?;
        transform(document, &rows)
    }

    /// Replace the value at `path` with the parsed `json`. Without a body
    /// an empty object is used as the starting point.
    pub fn set_json_at(&mut self, path: &str, json: &str) -> Result<()> {
        let value: Value = serde_json::from_str(json)?;
        self.body
            .get_or_insert_with(JsonDocument::default)
            .set_value(path, value)
    }

    /// Custom headers for the following requests
    pub fn set_headers(&mut self, rows: &[Vec<String>]) -> Result<()> {
        self.headers = pairs(rows, &HEADER_HEADINGS)?;
        Ok(())
    }

    /// Send the current body and headers. `query` rows are
    /// `[key, value]`.
    pub fn send(
        &mut self,
        transport: &dyn HttpTransport,
        session: &mut ScenarioSession,
        verb: HttpVerb,
        route: &str,
        query: &[Vec<String>],
    ) -> Result<&HttpResult> {
        let query = pairs(query, &QUERY_HEADINGS)?;
        let call = HttpCall::new(verb, route)
            .with_body(self.body.as_ref().map(JsonDocument::to_json))
            .with_query(query)
            .with_headers(self.headers.iter().cloned());

        let result = transport.send(&call, session)?;
        Ok(self.response.insert(result))
    }

    pub fn response(&self) -> Result<&HttpResult> {
        self.response.as_ref().ok_or_else(|| {
            Error::Configuration("No HTTP response available, perform a request first".to_string())
        })
    }

    pub fn assert_status(&self, expected: u16) -> Result<()> {
        let response = self.response()?;
        if response.status != expected {
            return Err(Error::AssertionFailed(format!(
                "The HTTP Status Code {} does not match expected {}.  HTTP Response Body: {}",
                response.status, expected, response.body
            )));
        }
        Ok(())
    }

    /// Each `[path, value]` row must match the JSON response. Numbers
    /// compare numerically, everything else by string form.
    pub fn assert_json_paths(
        &self,
        config: &ConfigurationManager,
        logger: &mut ScenarioLogger,
        rows: &[Vec<String>],
    ) -> Result<()> {
        validate_datatable(rows, 2, &ASSERT_HEADINGS)?;
        let rows = values(&resolve_table(&ValueResolver::new(config), logger, rows)?);

        let response = self.response()?;
        if !response.is_json() {
            logger.error(format!("Response was not in JSON format: {}", response.body));
            return Err(Error::Configuration("Response was not in JSON format".to_string()));
        }

        let document = response.json()?;
        for row in &rows {
            let (path, expected) = (&row[0], &row[1]);
            let actual = document
                .read(path)
                .ok_or_else(|| Error::PathNotFound(path.clone()))?;
            if !matches_cell(actual, expected) {
                return Err(Error::AssertionFailed(format!(
                    "JSON Path {} expected <{}> but was <{}>.  HTTP Response Body: {}",
                    path,
                    expected,
                    display_value(actual),
                    response.body
                )));
            }
        }
        Ok(())
    }

    /// Every single-column row must appear in the array at `path`.
    pub fn assert_array_contains(
        &self,
        config: &ConfigurationManager,
        logger: &mut ScenarioLogger,
        path: &str,
        rows: &[Vec<String>],
    ) -> Result<()> {
        validate_datatable(rows, 1, &ARRAY_HEADINGS)?;
        let resolver = ValueResolver::new(config);
        let path = resolver.resolve_str(unquote(path))?;
        let rows = values(&resolve_table(&resolver, logger, rows)?);

        let response = self.response()?;
        let document = response.json()?;
        let items = match document.read(&path) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(Error::InvalidType {
                    path,
                    expected: "a JSON Array".to_string(),
                })
            }
            None => return Err(Error::PathNotFound(path)),
        };

        for row in &rows {
            let expected = &row[0];
            if !items.iter().any(|item| display_value(item) == *expected) {
                return Err(Error::AssertionFailed(format!(
                    "Value {} was not found in array {}.  HTTP Response Body: {}",
                    expected,
                    Value::Array(items.clone()),
                    response.body
                )));
            }
        }
        Ok(())
    }

    pub fn request_body_pretty(&self) -> String {
        self.body
            .as_ref()
            .map(JsonDocument::to_pretty_json)
            .unwrap_or_else(|| "null".to_string())
    }
}

/// Apply `[field, value, operation]` rows in order.
pub fn transform(document: &mut JsonDocument, rows: &[Vec<String>]) -> Result<()> {
    let rows = rows
        .iter()
        .map(|row| MutationRow::from_cells(row))
        .collect::<Result<Vec<_>>>()?;
    mutation::transform(document, &rows)
}

/// Integers compare exactly when both sides are integers, other numbers
/// through `f64`.
fn matches_cell(actual: &Value, expected: &str) -> bool {
    let Value::Number(n) = actual else {
        return display_value(actual) == expected;
    };

    let cell = expected.trim();
    if let (Some(actual), Ok(cell)) = (n.as_i64(), cell.parse::<i64>()) {
        return actual == cell;
    }
    if let (Some(actual), Ok(cell)) = (n.as_u64(), cell.parse::<u64>()) {
        return actual == cell;
    }
    match (n.as_f64(), cell.parse::<f64>()) {
        (Some(actual), Ok(cell)) => actual == cell,
        _ => false,
    }
}
