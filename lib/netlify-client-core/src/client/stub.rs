//! In-memory [`Transport`] used by the unit tests.

use std::sync::{Arc, Mutex};

use super::request::ResolvedRequest;
use super::transport::{RawResponse, Transport, TransportFailure, TransportFuture};

type Handler =
    dyn Fn(&ResolvedRequest, usize) -> Result<RawResponse, TransportFailure> + Send + Sync;

/// Answers every request with a handler and records what was sent.
///
/// The handler receives the request and its zero-based index.
#[derive(Clone, derive_more::Debug)]
pub(crate) struct StubTransport {
    #[debug(ignore)]
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<ResolvedRequest>>>,
}

impl StubTransport {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&ResolvedRequest, usize) -> Result<RawResponse, TransportFailure>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Arc::new(handler),
            requests: Arc::default(),
        }
    }

    /// Always answers with the same response.
    pub(crate) fn always(response: RawResponse) -> Self {
        Self::new(move |_, _| Ok(response.clone()))
    }

    pub(crate) fn requests(&self) -> Vec<ResolvedRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().expect("lock poisoned").len()
    }
}

impl Transport for StubTransport {
    fn send(&self, request: ResolvedRequest) -> TransportFuture<'_> {
        let index = {
            let mut requests = self.requests.lock().expect("lock poisoned");
            requests.push(request.clone());
            requests.len() - 1
        };
        let outcome = (self.handler)(&request, index);
        Box::pin(async move { outcome })
    }
}
