//! Local HTTP fixture server for exercising real transports.
//!
//! Serves canned status codes, echoes requests back as JSON, and delays
//! responses on demand. Every echoed request is recorded so tests can check
//! what actually reached the wire.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

/// A request as seen by the `/echo` route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoReply {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl EchoReply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub type RequestLog = Arc<RwLock<Vec<EchoReply>>>;

pub fn app() -> Router {
    let log: RequestLog = Arc::new(RwLock::new(Vec::new()));
    Router::new()
        .route("/status/{code}", get(status))
        .route("/echo", any(echo))
        .route("/delay/{ms}", get(delay))
        .route("/requests", get(list_requests))
        .with_state(log)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn echo(
    State(log): State<RequestLog>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<EchoReply> {
    let reply = EchoReply {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    debug!(method = %reply.method, len = body.len(), "echoing request");
    log.write().await.push(reply.clone());
    Json(reply)
}

async fn delay(Path(ms): Path<u64>) -> String {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    format!("delayed {ms}ms")
}

async fn list_requests(State(log): State<RequestLog>) -> Json<Vec<EchoReply>> {
    Json(log.read().await.clone())
}
