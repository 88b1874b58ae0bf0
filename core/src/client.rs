//! HTTP client that delegates to a pluggable transport.
//!
//! # Design
//! `HttpClient` holds only the transport. `load` hands the request to the
//! transport on a freshly spawned thread and converts the transport's
//! terminal outcome into a `ClientResult`, so the completion never runs on
//! the caller's thread. Test code waiting on a completion therefore looks the
//! same whether the client wraps `UreqTransport` or `InterceptingTransport`.
//!
//! Conversion rules:
//! - a reported error becomes `ClientError::Transport` unchanged;
//! - a body plus well-formed metadata becomes `Ok(Response)`;
//! - anything else becomes `ClientError::UnexpectedValues`.

use std::fmt;
use std::sync::Arc;
use std::thread;

use tracing::{debug, debug_span, warn};
use uuid::Uuid;

use crate::error::ClientError;
use crate::http::{Request, Response};
use crate::transport::{Reporter, Transport, TransportOutcome};

/// Outcome of one `HttpClient::load` call.
pub type ClientResult = Result<Response, ClientError>;

/// Entry point for issuing requests through a transport.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
}

impl HttpClient {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn from_shared(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Issue `request` and call `completion` exactly once with the result.
    ///
    /// Returns immediately; `completion` runs on another thread.
    pub fn load<F>(&self, request: Request, completion: F)
    where
        F: FnOnce(ClientResult) + Send + 'static,
    {
        let transport = Arc::clone(&self.transport);
        let load_id = Uuid::new_v4();
        thread::spawn(move || {
            let span = debug_span!(
                "load",
                %load_id,
                method = %request.method,
                url = %request.url
            );
            let _entered = span.enter();
            let reporter = Reporter::new(move |outcome| {
                let result = into_result(outcome);
                match &result {
                    Ok(response) => debug!(
                        status = response.status(),
                        len = response.body.len(),
                        "load succeeded"
                    ),
                    Err(err) => debug!(%err, "load failed"),
                }
                completion(result);
            });
            transport.execute(request, reporter);
        });
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

/// Apply the conversion rules to a terminal transport outcome.
pub fn into_result(outcome: TransportOutcome) -> ClientResult {
    match outcome {
        TransportOutcome::Failure(error) => Err(ClientError::Transport(error)),
        TransportOutcome::Data {
            body: Some(body),
            meta: Some(meta),
        } if meta.is_well_formed() => Ok(Response { body, meta }),
        TransportOutcome::Data { body, meta } => {
            warn!(
                has_body = body.is_some(),
                status = meta.as_ref().map(|m| m.status),
                "transport finished without an error or a usable response"
            );
            Err(ClientError::UnexpectedValues)
        }
    }
}
