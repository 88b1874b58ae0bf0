//! HTTP client with a deterministic, network-free interception harness.
//!
//! # Overview
//! `HttpClient` issues requests through a `Transport`. In production that is
//! `UreqTransport`; in tests it is `InterceptingTransport`, which claims
//! every request and answers it from a `StubRegistry` without touching the
//! network. Test code registers a stub (body, response metadata, error) or a
//! request observer on the registry, loads a request, and waits for the
//! completion with a bounded timeout.
//!
//! # Design
//! - The registry is an injected `Arc<StubRegistry>`, not global state, so
//!   each test owns its own stubs and observers.
//! - An observer, when registered, strictly wins over a stub.
//! - Transports report through a single-use `Reporter`; the terminal signal
//!   fires exactly once.
//! - `HttpClient::load` always completes on another thread, with either the
//!   transport's error, a `Response`, or `ClientError::UnexpectedValues`.

pub mod client;
pub mod error;
pub mod http;
pub mod registry;
pub mod transport;
pub mod ureq_transport;

pub use client::{ClientResult, HttpClient};
pub use error::{ClientError, TransportError};
pub use http::{HttpMethod, Request, Response, ResponseMeta};
pub use registry::{InterceptGuard, RequestObserver, Resolution, StubRegistry, StubSpec};
pub use transport::{InterceptingTransport, Reporter, Transport, TransportOutcome};
pub use ureq_transport::{TransportConfig, UreqTransport};
