//! In-process transport for unit tests.
//!
//! Records every `subscribe` / `execute` / `cancel` in order and lets tests
//! push callbacks into the handler of any executed call.

use std::sync::{Arc, Mutex, PoisonError};

use pushrelay_core::SubscriptionQuery;

use super::{SessionHandle, SubscriptionTransport, TransportError};
use crate::session::{HandlerError, SessionCallback, SessionHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Subscribe,
    Execute,
    Cancel,
    Disable,
}

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    queries: Vec<SubscriptionQuery>,
    handlers: Vec<Arc<dyn SessionHandler>>,
    disabled: bool,
}

#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn count(&self, call: Call) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub(crate) fn subscribe_count(&self) -> usize {
        self.count(Call::Subscribe)
    }

    pub(crate) fn execute_count(&self) -> usize {
        self.count(Call::Execute)
    }

    pub(crate) fn cancel_count(&self) -> usize {
        self.count(Call::Cancel)
    }

    pub(crate) fn is_disabled(&self) -> bool {
        self.lock().disabled
    }

    pub(crate) fn last_query(&self) -> Option<SubscriptionQuery> {
        self.lock().queries.last().cloned()
    }

    /// Refuse subsequent executions without recording a `Disable` call.
    pub(crate) fn disable(&self) {
        self.lock().disabled = true;
    }

    /// Deliver `callback` to the most recently executed call, ignoring the
    /// handler's verdict.
    pub(crate) fn emit(&self, callback: SessionCallback) {
        let _ = self.try_emit(callback);
    }

    /// Deliver `callback` to the most recently executed call.
    pub(crate) fn try_emit(&self, callback: SessionCallback) -> Result<(), HandlerError> {
        let handler = self.lock().handlers.last().cloned();
        handler.map_or(Ok(()), |handler| handler.on_callback(callback))
    }

    /// Deliver `callback` to the `index`-th executed call.
    pub(crate) fn emit_to(&self, index: usize, callback: SessionCallback) {
        let handler = self.lock().handlers.get(index).cloned();
        if let Some(handler) = handler {
            let _ = handler.on_callback(callback);
        }
    }
}

impl SubscriptionTransport for MockTransport {
    fn subscribe(&self, query: &SubscriptionQuery) -> Box<dyn SessionHandle> {
        let mut inner = self.lock();
        inner.calls.push(Call::Subscribe);
        inner.queries.push(query.clone());
        Box::new(MockHandle {
            transport: self.clone(),
        })
    }

    fn disable_subscriptions(&self) {
        let mut inner = self.lock();
        inner.calls.push(Call::Disable);
        inner.disabled = true;
    }
}

struct MockHandle {
    transport: MockTransport,
}

impl SessionHandle for MockHandle {
    fn execute(&mut self, handler: Arc<dyn SessionHandler>) {
        let disabled = {
            let mut inner = self.transport.lock();
            inner.calls.push(Call::Execute);
            if !inner.disabled {
                inner.handlers.push(Arc::clone(&handler));
            }
            inner.disabled
        };
        if disabled {
            let _ = handler.on_callback(SessionCallback::Failure(
                TransportError::SubscriptionsDisabled,
            ));
        }
    }

    fn cancel(&mut self) {
        self.transport.lock().calls.push(Call::Cancel);
    }
}
