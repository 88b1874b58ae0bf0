//! Production transport backed by a blocking `ureq` agent.
//!
//! # Design
//! The agent is built with `http_status_as_error(false)` so 4xx/5xx
//! responses are reported as data and status interpretation stays with the
//! caller. The transport reports the body, then the response metadata, and
//! finishes, in the same order the intercepting transport reports a stub;
//! any `ureq` failure is mapped onto `TransportError` and reported instead.
//! A `user-agent` from `TransportConfig` is sent unless the request carries
//! its own.

use std::fmt;
use std::time::Duration;

use tracing::debug;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, Body, RequestBuilder};

use crate::error::TransportError;
use crate::http::{HttpMethod, Request, ResponseMeta};
use crate::transport::{Reporter, Transport};

/// Settings for `UreqTransport`.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound for the whole request, connect through body. `None`
    /// disables the limit.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            user_agent: format!("intercept-core/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Transport that performs the request over the network.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
    config: TransportConfig,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .build()
            .new_agent();
        Self { agent, config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn send(&self, request: &Request) -> Result<ureq::http::Response<Body>, ureq::Error> {
        let url = request.url.as_str();
        match request.method {
            HttpMethod::Get => self.without_body(self.agent.get(url), request),
            HttpMethod::Head => self.without_body(self.agent.head(url), request),
            HttpMethod::Delete => self.without_body(self.agent.delete(url), request),
            HttpMethod::Post => self.with_body(self.agent.post(url), request),
            HttpMethod::Put => self.with_body(self.agent.put(url), request),
            HttpMethod::Patch => self.with_body(self.agent.patch(url), request),
        }
    }

    fn without_body(
        &self,
        builder: RequestBuilder<WithoutBody>,
        request: &Request,
    ) -> Result<ureq::http::Response<Body>, ureq::Error> {
        self.apply_headers(builder, request).call()
    }

    fn with_body(
        &self,
        builder: RequestBuilder<WithBody>,
        request: &Request,
    ) -> Result<ureq::http::Response<Body>, ureq::Error> {
        let builder = self.apply_headers(builder, request);
        match &request.body {
            Some(body) => builder.send(body.as_slice()),
            None => builder.send_empty(),
        }
    }

    fn apply_headers<B>(
        &self,
        mut builder: RequestBuilder<B>,
        request: &Request,
    ) -> RequestBuilder<B> {
        if request.header("user-agent").is_none() {
            builder = builder.header("user-agent", self.config.user_agent.as_str());
        }
        request.headers.iter().fold(builder, |builder, (name, value)| {
            builder.header(name.as_str(), value.as_str())
        })
    }

    fn fetch(&self, request: &Request) -> Result<(ResponseMeta, Vec<u8>), TransportError> {
        let mut response = self.send(request).map_err(map_error)?;
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let meta = ResponseMeta {
            status: response.status().as_u16(),
            headers,
        };
        let body = response.body_mut().read_to_vec().map_err(map_error)?;
        Ok((meta, body))
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: Request, mut reporter: Reporter) {
        match self.fetch(&request) {
            Ok((meta, body)) => {
                debug!(status = meta.status, len = body.len(), "response received");
                reporter.did_load(&body);
                reporter.did_receive_response(meta);
            }
            Err(error) => {
                debug!(%error, "request failed");
                reporter.did_fail(error);
            }
        }
        reporter.finish();
    }
}

fn map_error(error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::Timeout(_) => TransportError::TimedOut,
        ureq::Error::BadUri(uri) => TransportError::InvalidRequest(uri),
        ureq::Error::Http(err) => TransportError::InvalidRequest(err.to_string()),
        other => TransportError::Network(other.to_string()),
    }
}
