//! Stub and observer registration for the intercepting transport.
//!
//! # Design
//! `StubRegistry` is an ordinary value shared as `Arc<StubRegistry>` and
//! injected into `InterceptingTransport`, so every test owns an isolated
//! registry instead of mutating process-wide state. It holds at most one
//! stub and at most one observer; setting either overwrites, nothing queues.
//!
//! The internal mutex only keeps the shared value memory-safe. It does not
//! serialize test cases: two tests driving requests through the same
//! registry at once is a usage error.
//!
//! Teardown goes through `stop_intercepting`, which always clears both
//! slots. `intercept` wraps start/stop in an `InterceptGuard` so teardown
//! still runs when the test body panics.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::http::{Request, ResponseMeta};

/// A canned outcome for intercepted requests.
///
/// Any combination of fields is allowed, including none at all; whether the
/// combination makes a valid response is decided by the client, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubSpec {
    #[serde(default)]
    pub body: Option<Vec<u8>>,
    #[serde(default)]
    pub response: Option<ResponseMeta>,
    #[serde(default)]
    pub error: Option<TransportError>,
}

impl StubSpec {
    pub fn new(
        body: Option<Vec<u8>>,
        response: Option<ResponseMeta>,
        error: Option<TransportError>,
    ) -> Self {
        Self { body, response, error }
    }

    pub fn failing(error: TransportError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn responding(body: impl Into<Vec<u8>>, response: ResponseMeta) -> Self {
        Self {
            body: Some(body.into()),
            response: Some(response),
            error: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.response.is_none() && self.error.is_none()
    }
}

/// Receives every request the intercepting transport claims while it is
/// registered.
pub trait RequestObserver: Send + Sync {
    fn observe(&self, request: &Request);
}

impl<F> RequestObserver for F
where
    F: Fn(&Request) + Send + Sync,
{
    fn observe(&self, request: &Request) {
        self(request)
    }
}

/// What the intercepting transport should do with the next request.
#[derive(Clone)]
pub enum Resolution {
    /// Interception is not active.
    Inactive,
    /// Hand the request to the observer; any stub is ignored.
    Observe(Arc<dyn RequestObserver>),
    /// Report the stub's fields. An unset stub resolves to the empty one.
    Stub(StubSpec),
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Inactive => f.write_str("Inactive"),
            Resolution::Observe(_) => f.write_str("Observe(..)"),
            Resolution::Stub(spec) => f.debug_tuple("Stub").field(spec).finish(),
        }
    }
}

#[derive(Default)]
struct State {
    intercepting: bool,
    stub: Option<StubSpec>,
    observer: Option<Arc<dyn RequestObserver>>,
}

/// Single source of truth for intercepted requests.
#[derive(Default)]
pub struct StubRegistry {
    state: Mutex<State>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Activate interception.
    ///
    /// Precondition: interception is not already active. Starting twice is
    /// not rejected; it is logged and otherwise has no effect.
    pub fn start_intercepting(&self) {
        let mut state = self.lock("start_intercepting");
        if state.intercepting {
            warn!("start_intercepting called while already intercepting");
        }
        state.intercepting = true;
        debug!("interception started");
    }

    /// Deactivate interception and clear the stub and observer. Safe to call
    /// any number of times.
    pub fn stop_intercepting(&self) {
        let mut state = self.lock("stop_intercepting");
        let had_stub = state.stub.take().is_some();
        let had_observer = state.observer.take().is_some();
        state.intercepting = false;
        debug!(had_stub, had_observer, "interception stopped");
    }

    /// Start intercepting until the returned guard is dropped.
    pub fn intercept(&self) -> InterceptGuard<'_> {
        self.start_intercepting();
        InterceptGuard { registry: self }
    }

    /// Replace the active stub.
    pub fn set_stub(&self, spec: StubSpec) {
        let mut state = self.lock("set_stub");
        if state.observer.is_some() {
            debug!("stub set while an observer is registered; the observer takes precedence");
        }
        state.stub = Some(spec);
    }

    /// Replace the active observer.
    pub fn observe_requests(&self, observer: impl RequestObserver + 'static) {
        self.lock("observe_requests").observer = Some(Arc::new(observer));
    }

    /// Clear stub and observer, leaving interception active.
    pub fn reset(&self) {
        let mut state = self.lock("reset");
        state.stub = None;
        state.observer = None;
    }

    pub fn is_intercepting(&self) -> bool {
        self.lock("is_intercepting").intercepting
    }

    pub fn current_stub(&self) -> Option<StubSpec> {
        self.lock("current_stub").stub.clone()
    }

    pub fn current_observer(&self) -> Option<Arc<dyn RequestObserver>> {
        self.lock("current_observer").observer.clone()
    }

    /// Decide how the next request is handled, reading every slot under one
    /// lock. The observer strictly wins over a stub.
    pub fn resolve(&self) -> Resolution {
        let state = self.lock("resolve");
        if !state.intercepting {
            return Resolution::Inactive;
        }
        if let Some(observer) = &state.observer {
            return Resolution::Observe(Arc::clone(observer));
        }
        Resolution::Stub(state.stub.clone().unwrap_or_default())
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    op,
                    lock_kind = "mutex.lock",
                    result = "poisoned_recovered",
                    "Recovered from poisoned stub registry lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

impl fmt::Debug for StubRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock("debug");
        f.debug_struct("StubRegistry")
            .field("intercepting", &state.intercepting)
            .field("stub", &state.stub)
            .field("observer", &state.observer.is_some())
            .finish()
    }
}

/// Scope guard returned by [`StubRegistry::intercept`]. Stops interception,
/// clearing stub and observer, when dropped.
#[must_use = "interception stops as soon as the guard is dropped"]
pub struct InterceptGuard<'a> {
    registry: &'a StubRegistry,
}

impl InterceptGuard<'_> {
    pub fn registry(&self) -> &StubRegistry {
        self.registry
    }
}

impl Drop for InterceptGuard<'_> {
    fn drop(&mut self) {
        self.registry.stop_intercepting();
    }
}
