//! In-process echo API for the transport tests and the cucumber features
//!
//! Served by axum on a background thread with its own tokio runtime, so the
//! blocking transports can be driven from plain `#[test]` functions. The
//! bdd crate includes this file by path.

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub struct StubApi {
    /// Base URL including the `/api` prefix
    pub base_url: String,
}

pub fn spawn() -> StubApi {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    listener.set_nonblocking(true).expect("nonblocking listener");

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("stub runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
            axum::serve(listener, router()).await.expect("stub server");
        });
    });

    StubApi {
        base_url: format!("http://{}/api", addr),
    }
}

/// A port nothing listens on
#[allow(dead_code)]
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe");
    let addr = listener.local_addr().expect("probe address");
    drop(listener);
    format!("http://{}", addr)
}

fn router() -> Router {
    let api = Router::new()
        .route("/widgets", any(echo))
        .route("/widgets/:id", any(echo))
        .route("/catalog", get(catalog))
        .route("/missing", get(missing))
        .route("/text", get(text));
    Router::new().nest("/api", api)
}

async fn echo(
    method: Method,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> impl IntoResponse {
    let headers: Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            )
        })
        .collect();
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };

    let status = if method == Method::POST {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(json!({
            "method": method.as_str(),
            "query": query,
            "headers": headers,
            "body": body,
        })),
    )
}

async fn catalog() -> Json<Value> {
    Json(json!({
        "tags": ["red", "blue"],
        "sizes": [1, 2, 10],
        "items": [
            {"id": 1, "code": "A-1"},
            {"id": 2, "code": "B-2"}
        ]
    }))
}

async fn missing() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})))
}

async fn text() -> &'static str {
    "hello"
}
