//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::mpsc;
use std::time::Duration;

use intercept_core::{ClientResult, HttpClient, Request};

/// Upper bound on how long any test waits for a completion.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(2);

/// Install a test-writer tracing subscriber honouring `RUST_LOG`. Safe to
/// call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Load `request` and block until its completion fires, failing the test if
/// it does not fire within `COMPLETION_TIMEOUT` or fires more than once.
pub fn load_and_wait(client: &HttpClient, request: Request) -> ClientResult {
    let (tx, rx) = mpsc::channel();
    client.load(request, move |result| {
        tx.send(result).unwrap();
    });
    let result = rx
        .recv_timeout(COMPLETION_TIMEOUT)
        .expect("completion did not fire within the timeout");
    assert!(rx.recv().is_err(), "completion fired more than once");
    result
}
