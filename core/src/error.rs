//! Error types for the HTTP client and its transports.
//!
//! # Design
//! `TransportError` is what a transport reports: for the intercepting
//! transport it is the error placed in the active stub (or a panic raised by
//! the request observer), for the ureq transport it is a mapped I/O failure.
//! `ClientError` wraps it verbatim and adds `UnexpectedValues`, which the
//! client synthesizes when a transport finishes without either an error or a
//! usable payload plus metadata.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    TimedOut,

    /// The request could not be sent as described (bad URL, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A registered request observer panicked, usually a failed assertion.
    /// Carries the panic message.
    #[error("request observer panicked: {0}")]
    ObserverPanicked(String),
}

/// Errors delivered to `HttpClient::load` completions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The transport finished without an error but also without a body and
    /// well-formed response metadata.
    #[error("transport finished with unexpected values")]
    UnexpectedValues,

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),
}
