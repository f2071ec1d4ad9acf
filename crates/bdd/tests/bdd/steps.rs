//! Step definitions for the API features

use cucumber::gherkin::Step;
use cucumber::{given, then, when, Parameter};
use std::str::FromStr;

use apicheck_client::HttpVerb;
use apicheck_common::resolver::unquote;
use apicheck_common::{Error, Result};

use crate::world::{harness, ApiWorld};

/// `{httpVerb}` in step text
#[derive(Debug, Clone, Copy, Parameter)]
#[param(name = "httpVerb", regex = "GET|POST|PUT")]
pub struct Verb(HttpVerb);

impl FromStr for Verb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse().map(Verb)
    }
}

fn table(step: &Step) -> Vec<Vec<String>> {
    step.table
        .as_ref()
        .map(|table| table.rows.clone())
        .unwrap_or_default()
}

fn docstring(step: &Step) -> Result<&str> {
    step.docstring
        .as_deref()
        .ok_or_else(|| Error::Configuration(format!("Step '{}' needs a doc string", step.value)))
}

#[given(expr = "A request body of {string} with JSON Paths")]
async fn request_body_from_file(world: &mut ApiWorld, step: &Step, file: String) -> Result<()> {
    let harness = harness();
    let (steps, session) = world.parts();
    steps.body_from_file(
        &harness.config,
        session.logger(),
        &harness.requests_dir,
        unquote(&file),
        &table(step),
    )
}

#[given("a request body of")]
async fn request_body(world: &mut ApiWorld, step: &Step) -> Result<()> {
    world.steps.body_from_json(docstring(step)?)
}

#[given("I apply JSON Path transformations")]
async fn apply_transformations(world: &mut ApiWorld, step: &Step) -> Result<()> {
    let (steps, session) = world.parts();
    steps.transform_body(&harness().config, session.logger(), &table(step))
}

#[given(expr = "I set JSON at JSON Path {string}")]
async fn set_json_at(world: &mut ApiWorld, step: &Step, path: String) -> Result<()> {
    world.steps.set_json_at(unquote(&path), docstring(step)?)
}

#[given("I add HTTP headers")]
async fn add_headers(world: &mut ApiWorld, step: &Step) -> Result<()> {
    world.steps.set_headers(&table(step))
}

#[when(expr = "I perform a HTTP {httpVerb} for route {string} and query params")]
async fn perform_with_query(world: &mut ApiWorld, step: &Step, verb: Verb, route: String) -> Result<()> {
    let (steps, session) = world.parts();
    steps
        .send(harness().transport.as_ref(), session, verb.0, unquote(&route), &table(step))
        .map(|_| ())
}

#[when(expr = "I perform a HTTP {httpVerb} for route {string}")]
async fn perform(world: &mut ApiWorld, verb: Verb, route: String) -> Result<()> {
    let (steps, session) = world.parts();
    steps
        .send(harness().transport.as_ref(), session, verb.0, unquote(&route), &[])
        .map(|_| ())
}

#[then(expr = "The Http Response code is {int}")]
async fn response_code(world: &mut ApiWorld, code: u16) -> Result<()> {
    world.steps.assert_status(code)
}

#[then("The http response contains JSON Paths")]
async fn response_json_paths(world: &mut ApiWorld, step: &Step) -> Result<()> {
    let (steps, session) = world.parts();
    steps.assert_json_paths(&harness().config, session.logger(), &table(step))
}

#[then(expr = "The http response contains array with JSON Path {string} containing values")]
async fn response_array_contains(world: &mut ApiWorld, step: &Step, path: String) -> Result<()> {
    let (steps, session) = world.parts();
    steps.assert_array_contains(&harness().config, session.logger(), &path, &table(step))
}

#[then("I print the HTTP request to console")]
async fn print_request(world: &mut ApiWorld) {
    let message = format!("API Request: {}", world.steps.request_body_pretty());
    world.session().logger().info(message);
}
