//! Behaviour of `HttpClient` over `InterceptingTransport`.
//!
//! Each test owns its registry and wraps interception in a guard, so a
//! failing assertion still tears the stub and observer down.

mod common;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use intercept_core::{
    ClientError, HttpClient, HttpMethod, InterceptingTransport, Request, Response, ResponseMeta,
    StubRegistry, StubSpec, TransportError,
};

use common::{init_tracing, load_and_wait, COMPLETION_TIMEOUT};

const ANY_URL: &str = "http://any-url.test";

fn any_error() -> TransportError {
    TransportError::Network("any error".to_string())
}

fn make_sut() -> (Arc<StubRegistry>, HttpClient) {
    init_tracing();
    let registry = StubRegistry::shared();
    let client = HttpClient::new(InterceptingTransport::new(Arc::clone(&registry)));
    (registry, client)
}

/// Register an observer that records every request it sees.
fn record_requests(registry: &StubRegistry) -> Arc<Mutex<Vec<Request>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    registry.observe_requests(move |request: &Request| {
        sink.lock().unwrap().push(request.clone());
    });
    seen
}

// ---------------------------------------------------------------------------
// Stub path
// ---------------------------------------------------------------------------

#[test]
fn load_fails_with_configured_error() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    registry.set_stub(StubSpec::failing(any_error()));

    let result = load_and_wait(&client, Request::get(ANY_URL));

    assert_eq!(result, Err(ClientError::Transport(any_error())));
}

#[test]
fn configured_error_wins_over_body_and_response() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    registry.set_stub(StubSpec::new(
        Some(b"AB".to_vec()),
        Some(ResponseMeta::new(200)),
        Some(TransportError::TimedOut),
    ));

    let result = load_and_wait(&client, Request::get(ANY_URL));

    assert_eq!(result, Err(ClientError::Transport(TransportError::TimedOut)));
}

#[test]
fn load_succeeds_with_stubbed_body_and_response() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    let meta = ResponseMeta::new(200).with_header("content-type", "text/plain");
    registry.set_stub(StubSpec::responding(vec![0x41, 0x42], meta.clone()));

    let result = load_and_wait(&client, Request::get(ANY_URL));

    assert_eq!(
        result,
        Ok(Response {
            body: vec![0x41, 0x42],
            meta,
        })
    );
}

#[test]
fn empty_stub_yields_unexpected_values() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    registry.set_stub(StubSpec::default());

    let result = load_and_wait(&client, Request::get(ANY_URL));

    assert_eq!(result, Err(ClientError::UnexpectedValues));
}

#[test]
fn partial_stubs_yield_unexpected_values() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    let partial = [
        StubSpec::new(Some(b"AB".to_vec()), None, None),
        StubSpec::new(None, Some(ResponseMeta::new(200)), None),
        StubSpec::new(Some(b"AB".to_vec()), Some(ResponseMeta::new(42)), None),
    ];

    for stub in partial {
        registry.set_stub(stub.clone());
        let result = load_and_wait(&client, Request::get(ANY_URL));
        assert_eq!(result, Err(ClientError::UnexpectedValues), "stub: {stub:?}");
    }
}

#[test]
fn stub_answers_every_request_until_replaced() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    registry.set_stub(StubSpec::responding("first", ResponseMeta::new(200)));

    for url in ["http://a.test", "https://b.test/path", "ftp://c.test"] {
        let response = load_and_wait(&client, Request::get(url)).unwrap();
        assert_eq!(response.body, b"first");
    }

    registry.set_stub(StubSpec::failing(any_error()));
    let result = load_and_wait(&client, Request::post("http://a.test"));
    assert_eq!(result, Err(ClientError::Transport(any_error())));
}

#[test]
fn stubbed_json_body_decodes() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    registry.set_stub(StubSpec::responding(
        r#"{"title":"Buy milk","completed":false}"#,
        ResponseMeta::new(200),
    ));

    let response = load_and_wait(&client, Request::get(ANY_URL)).unwrap();
    let value: serde_json::Value = response.json().unwrap();

    assert_eq!(value["title"], "Buy milk");
}

// ---------------------------------------------------------------------------
// Observer path
// ---------------------------------------------------------------------------

#[test]
fn observer_receives_the_submitted_request() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    let (tx, rx) = mpsc::channel();
    registry.observe_requests(move |request: &Request| {
        tx.send(request.clone()).unwrap();
    });

    let (done_tx, done_rx) = mpsc::channel();
    client.load(Request::get(ANY_URL), move |result| {
        done_tx.send(result).unwrap();
    });

    let observed = rx.recv_timeout(COMPLETION_TIMEOUT).unwrap();
    assert_eq!(observed.method, HttpMethod::Get);
    assert_eq!(observed.method.as_str(), "GET");
    assert_eq!(observed.url, ANY_URL);
    done_rx.recv_timeout(COMPLETION_TIMEOUT).unwrap();
}

#[test]
fn observer_runs_before_the_completion_fires() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    let events = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&events);
    registry.observe_requests(move |_: &Request| {
        observed.lock().unwrap().push("observed");
    });

    let (done_tx, done_rx) = mpsc::channel();
    let completed = Arc::clone(&events);
    client.load(Request::get(ANY_URL), move |_| {
        completed.lock().unwrap().push("completed");
        done_tx.send(()).unwrap();
    });
    done_rx.recv_timeout(COMPLETION_TIMEOUT).unwrap();

    assert_eq!(*events.lock().unwrap(), vec!["observed", "completed"]);
}

#[test]
fn failing_observer_assertion_reaches_the_completion() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    registry.observe_requests(|request: &Request| {
        assert_eq!(request.url, "http://some-other-url.test");
    });

    let result = load_and_wait(&client, Request::get(ANY_URL));

    match result {
        Err(ClientError::Transport(TransportError::ObserverPanicked(message))) => {
            assert!(message.contains("http://some-other-url.test"), "message: {message}");
        }
        other => panic!("expected the observer's failure, got {other:?}"),
    }
}

#[test]
fn observer_sees_headers_and_body_by_value() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    let seen = record_requests(&registry);
    let request = Request::post(ANY_URL)
        .with_header("authorization", "Bearer token")
        .with_json(&serde_json::json!({ "title": "Buy milk" }))
        .unwrap();

    load_and_wait(&client, request.clone()).unwrap_err();

    assert_eq!(*seen.lock().unwrap(), vec![request]);
}

#[test]
fn observer_is_invoked_once_per_request_and_completes_empty() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    let seen = record_requests(&registry);

    let result = load_and_wait(&client, Request::get(ANY_URL));

    assert_eq!(result, Err(ClientError::UnexpectedValues));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn observer_wins_over_stub_set_afterwards() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    let seen = record_requests(&registry);
    registry.set_stub(StubSpec::failing(any_error()));

    let result = load_and_wait(&client, Request::get(ANY_URL));

    assert_eq!(result, Err(ClientError::UnexpectedValues));
    assert_eq!(*seen.lock().unwrap(), vec![Request::get(ANY_URL)]);
}

#[test]
fn observer_wins_over_stub_set_before() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    registry.set_stub(StubSpec::responding("AB", ResponseMeta::new(200)));
    let seen = record_requests(&registry);

    let result = load_and_wait(&client, Request::get(ANY_URL));

    assert_eq!(result, Err(ClientError::UnexpectedValues));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn reset_switches_from_observer_back_to_stub() {
    let (registry, client) = make_sut();
    let _guard = registry.intercept();
    let seen = record_requests(&registry);
    load_and_wait(&client, Request::get(ANY_URL)).unwrap_err();

    registry.reset();
    registry.set_stub(StubSpec::responding("AB", ResponseMeta::new(200)));
    let response = load_and_wait(&client, Request::get(ANY_URL)).unwrap();

    assert_eq!(response.body, b"AB");
    assert_eq!(seen.lock().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn stopping_twice_leaves_registry_cleared() {
    let (registry, _client) = make_sut();
    registry.start_intercepting();
    registry.set_stub(StubSpec::failing(any_error()));
    let _ = record_requests(&registry);

    registry.stop_intercepting();
    assert!(registry.current_stub().is_none());
    assert!(registry.current_observer().is_none());

    registry.stop_intercepting();
    assert!(!registry.is_intercepting());
    assert!(registry.current_stub().is_none());
    assert!(registry.current_observer().is_none());
}

#[test]
fn stub_does_not_leak_past_teardown() {
    let (registry, client) = make_sut();
    {
        let _guard = registry.intercept();
        registry.set_stub(StubSpec::responding("AB", ResponseMeta::new(200)));
        assert!(load_and_wait(&client, Request::get(ANY_URL)).is_ok());
    }

    let _guard = registry.intercept();
    let result = load_and_wait(&client, Request::get(ANY_URL));

    assert_eq!(result, Err(ClientError::UnexpectedValues));
}

#[test]
fn requests_after_stop_never_see_the_old_observer() {
    let (registry, client) = make_sut();
    let seen = {
        let _guard = registry.intercept();
        record_requests(&registry)
    };

    let result = load_and_wait(&client, Request::get(ANY_URL));

    assert_eq!(result, Err(ClientError::UnexpectedValues));
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn teardown_runs_when_test_body_panics() {
    let (registry, client) = make_sut();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _guard = registry.intercept();
        registry.set_stub(StubSpec::failing(any_error()));
        let result = load_and_wait(&client, Request::get(ANY_URL));
        assert!(result.is_ok(), "deliberately failing assertion");
    }));

    assert!(outcome.is_err());
    assert!(!registry.is_intercepting());
    assert!(registry.current_stub().is_none());
}

#[test]
fn separate_registries_do_not_share_stubs() {
    let (first_registry, first_client) = make_sut();
    let (second_registry, second_client) = make_sut();
    let _first = first_registry.intercept();
    let _second = second_registry.intercept();
    first_registry.set_stub(StubSpec::failing(any_error()));
    second_registry.set_stub(StubSpec::responding("AB", ResponseMeta::new(200)));

    assert!(load_and_wait(&first_client, Request::get(ANY_URL)).is_err());
    assert!(load_and_wait(&second_client, Request::get(ANY_URL)).is_ok());
}
