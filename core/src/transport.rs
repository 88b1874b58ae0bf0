//! The transport seam and the intercepting transport.
//!
//! # Design
//! A transport receives a `Request` and a `Reporter`. It reports whatever it
//! learns about the response piece by piece (body bytes, response metadata,
//! an error) and then finishes. `Reporter::finish` consumes the reporter, so
//! reporting after the terminal signal does not compile; a reporter dropped
//! without `finish` finishes itself, so the terminal signal fires exactly
//! once on every path.
//!
//! `InterceptingTransport` never performs I/O. Every request is resolved
//! through the injected `StubRegistry`: an observer, when registered, gets
//! the request and the reporter finishes empty; otherwise each field of the
//! active stub is reported in order (body, metadata, error). A panicking
//! observer is caught and reported as `TransportError::ObserverPanicked`, so
//! a failed assertion inside it reaches the completion instead of dying with
//! the load thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::http::{Request, ResponseMeta};
use crate::registry::{Resolution, StubRegistry};

/// What a transport delivers upstream once it finishes.
///
/// Payload and error never coexist: reporting an error turns the outcome
/// into `Failure` and discards any payload reported before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    Data {
        body: Option<Vec<u8>>,
        meta: Option<ResponseMeta>,
    },
    Failure(TransportError),
}

impl TransportOutcome {
    pub fn empty() -> Self {
        TransportOutcome::Data { body: None, meta: None }
    }
}

type FinishFn = Box<dyn FnOnce(TransportOutcome) + Send>;

/// Single-use handle a transport reports through.
pub struct Reporter {
    body: Option<Vec<u8>>,
    meta: Option<ResponseMeta>,
    error: Option<TransportError>,
    on_finish: Option<FinishFn>,
}

impl Reporter {
    /// `on_finish` is called exactly once with the accumulated outcome.
    pub fn new(on_finish: impl FnOnce(TransportOutcome) + Send + 'static) -> Self {
        Self {
            body: None,
            meta: None,
            error: None,
            on_finish: Some(Box::new(on_finish)),
        }
    }

    /// Append a chunk of response body.
    pub fn did_load(&mut self, data: &[u8]) {
        trace!(len = data.len(), "body chunk reported");
        self.body.get_or_insert_with(Vec::new).extend_from_slice(data);
    }

    /// Record response metadata. A later call replaces an earlier one.
    pub fn did_receive_response(&mut self, meta: ResponseMeta) {
        trace!(status = meta.status, "response metadata reported");
        self.meta = Some(meta);
    }

    /// Record a failure. Only the first error is kept.
    pub fn did_fail(&mut self, error: TransportError) {
        if let Some(first) = &self.error {
            debug!(
                %first,
                ignored = %error,
                "second error reported; keeping the first"
            );
            return;
        }
        trace!(%error, "error reported");
        self.error = Some(error);
    }

    /// Deliver the terminal signal.
    pub fn finish(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        let Some(on_finish) = self.on_finish.take() else {
            return;
        };
        let outcome = match self.error.take() {
            Some(error) => TransportOutcome::Failure(error),
            None => TransportOutcome::Data {
                body: self.body.take(),
                meta: self.meta.take(),
            },
        };
        trace!(?outcome, "transport finished");
        on_finish(outcome);
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if self.on_finish.is_some() {
            debug!("reporter dropped without finish; finishing now");
            self.fire();
        }
    }
}

/// Turns a request into reported results, real or simulated.
///
/// Implementations must eventually finish (or drop) the reporter. They may
/// block; `HttpClient` always calls `execute` off the caller's thread.
pub trait Transport: Send + Sync {
    fn execute(&self, request: Request, reporter: Reporter);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: Request, reporter: Reporter) {
        (**self).execute(request, reporter)
    }
}

/// Transport that claims every request and answers it from a `StubRegistry`.
#[derive(Debug, Clone)]
pub struct InterceptingTransport {
    registry: Arc<StubRegistry>,
}

impl InterceptingTransport {
    pub fn new(registry: Arc<StubRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<StubRegistry> {
        &self.registry
    }
}

impl Transport for InterceptingTransport {
    fn execute(&self, request: Request, mut reporter: Reporter) {
        match self.registry.resolve() {
            Resolution::Inactive => {
                warn!(
                    method = %request.method,
                    url = %request.url,
                    "request reached the intercepting transport while interception is stopped"
                );
            }
            Resolution::Observe(observer) => {
                debug!(
                    method = %request.method,
                    url = %request.url,
                    "delivering request to observer"
                );
                let observed =
                    panic::catch_unwind(AssertUnwindSafe(|| observer.observe(&request)));
                if let Err(payload) = observed {
                    let message = panic_message(payload.as_ref());
                    warn!(%message, "request observer panicked");
                    reporter.did_fail(TransportError::ObserverPanicked(message));
                }
            }
            Resolution::Stub(stub) => {
                debug!(
                    method = %request.method,
                    url = %request.url,
                    has_body = stub.body.is_some(),
                    has_response = stub.response.is_some(),
                    has_error = stub.error.is_some(),
                    "answering request from stub"
                );
                if let Some(body) = stub.body {
                    reporter.did_load(&body);
                }
                if let Some(meta) = stub.response {
                    reporter.did_receive_response(meta);
                }
                if let Some(error) = stub.error {
                    reporter.did_fail(error);
                }
            }
        }
        reporter.finish();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "observer panicked with a non-string payload".to_string()
    }
}
