//! A single subscription session bound to one transport handle.

use std::sync::{Arc, Mutex, PoisonError};

use pushrelay_core::SubscriptionQuery;
use tracing::{debug, info, warn};

use super::callback::{HandlerError, SessionCallback, SessionHandler};
use super::state::SessionState;
use crate::transport::{SessionHandle, SubscriptionTransport};

/// Shared, lock-protected session state.
#[derive(Debug, Clone, Default)]
struct SharedState(Arc<Mutex<SessionState>>);

impl SharedState {
    fn get(&self) -> SessionState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, state: SessionState) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn apply(&self, callback: &SessionCallback) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(callback)
    }

    fn cancel(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).cancel()
    }

    fn fail(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).fail()
    }
}

/// Sits between the transport and the caller's handler.
///
/// The state lock is released before the handler runs, so a handler that is
/// already executing is never blocked by a concurrent `cancel`. A handler
/// error fails the session and is handed back to the transport, which then
/// releases the connection.
struct StateGate {
    state: SharedState,
    inner: Arc<dyn SessionHandler>,
}

impl SessionHandler for StateGate {
    fn on_callback(&self, callback: SessionCallback) -> Result<(), HandlerError> {
        if !self.state.apply(&callback) {
            debug!(
                callback = callback.kind(),
                state = %self.state.get(),
                "Dropping callback for finished session"
            );
            return Ok(());
        }
        let kind = callback.kind();
        self.inner.on_callback(callback).inspect_err(|e| {
            if self.state.fail() {
                warn!(callback = kind, error = %e, "Session failed in handler");
            }
        })
    }
}

/// One live subscription.
///
/// Created by [`SubscriptionSession::start`], which subscribes and executes
/// immediately. Call [`cancel`](Self::cancel) to release the connection.
pub struct SubscriptionSession {
    state: SharedState,
    handle: Box<dyn SessionHandle>,
}

impl SubscriptionSession {
    /// Subscribe to `query` on `transport` and start delivering callbacks to
    /// `handler`.
    ///
    /// Transport errors are not returned here. They arrive asynchronously as
    /// [`SessionCallback::Failure`].
    pub fn start(
        transport: &dyn SubscriptionTransport,
        query: &SubscriptionQuery,
        handler: Arc<dyn SessionHandler>,
    ) -> Self {
        let state = SharedState::default();
        let mut handle = transport.subscribe(query);

        // The transport may report synchronously from `execute`, so the
        // session has to be `Connecting` before it is called.
        state.set(SessionState::Connecting);
        let gate = StateGate {
            state: state.clone(),
            inner: handler,
        };
        handle.execute(Arc::new(gate));
        debug!(operation = ?query.operation_name, "Subscription session started");

        Self { state, handle }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Whether the session still holds or is acquiring a connection.
    pub fn is_active(&self) -> bool {
        self.state.get().is_live()
    }

    /// Cancel the session and release its connection.
    ///
    /// A no-op on a session that already reached a terminal state. Returns
    /// whether a live connection was released.
    pub fn cancel(&mut self) -> bool {
        if !self.state.cancel() {
            return false;
        }
        self.handle.cancel();
        info!("Subscription session cancelled");
        true
    }
}

impl std::fmt::Debug for SubscriptionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionSession")
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Mutex;

    use pushrelay_core::{NotificationRecord, SubscriptionEvent};

    use super::*;
    use crate::transport::TransportError;
    use crate::transport::mock::MockTransport;

    fn recording_handler() -> (Arc<dyn SessionHandler>, Arc<Mutex<Vec<SessionCallback>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: Arc<dyn SessionHandler> = Arc::new(move |cb: SessionCallback| {
            sink.lock().unwrap().push(cb);
        });
        (handler, seen)
    }

    fn event(message: &str) -> SessionCallback {
        SessionCallback::Event(SubscriptionEvent::from(vec![NotificationRecord::new(message)]))
    }

    #[test]
    fn start_subscribes_and_executes_once() {
        let transport = MockTransport::default();
        let (handler, _) = recording_handler();

        let session = SubscriptionSession::start(&transport, &SubscriptionQuery::default(), handler);

        assert_eq!(transport.subscribe_count(), 1);
        assert_eq!(transport.execute_count(), 1);
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.is_active());
    }

    #[test]
    fn start_binds_the_given_query() {
        let transport = MockTransport::default();
        let (handler, _) = recording_handler();
        let query = SubscriptionQuery::new("subscription { alerts { message } }");

        let _session = SubscriptionSession::start(&transport, &query, handler);

        assert_eq!(transport.last_query(), Some(query));
    }

    #[test]
    fn callbacks_reach_handler_and_drive_state() {
        let transport = MockTransport::default();
        let (handler, seen) = recording_handler();
        let session = SubscriptionSession::start(&transport, &SubscriptionQuery::default(), handler);

        transport.emit(SessionCallback::Connected);
        assert_eq!(session.state(), SessionState::Connected);

        transport.emit(event("hello"));
        assert_eq!(session.state(), SessionState::Receiving);

        transport.emit(SessionCallback::Completed);
        assert_eq!(session.state(), SessionState::Terminated);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1], event("hello"));
    }

    #[test]
    fn cancel_releases_handle_once() {
        let transport = MockTransport::default();
        let (handler, _) = recording_handler();
        let mut session =
            SubscriptionSession::start(&transport, &SubscriptionQuery::default(), handler);
        transport.emit(SessionCallback::Connected);

        assert!(session.cancel());
        assert_eq!(session.state(), SessionState::Cancelled);
        assert_eq!(transport.cancel_count(), 1);

        // Second cancel is a no-op
        assert!(!session.cancel());
        assert_eq!(transport.cancel_count(), 1);
    }

    #[test]
    fn no_callbacks_after_cancel() {
        let transport = MockTransport::default();
        let (handler, seen) = recording_handler();
        let mut session =
            SubscriptionSession::start(&transport, &SubscriptionQuery::default(), handler);
        transport.emit(SessionCallback::Connected);
        session.cancel();

        transport.emit(event("late"));
        transport.emit(SessionCallback::Terminated);

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![SessionCallback::Connected]);
    }

    #[test]
    fn cancel_after_termination_is_noop() {
        let transport = MockTransport::default();
        let (handler, _) = recording_handler();
        let mut session =
            SubscriptionSession::start(&transport, &SubscriptionQuery::default(), handler);
        transport.emit(SessionCallback::Terminated);

        assert!(!session.cancel());
        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(transport.cancel_count(), 0);
    }

    #[test]
    fn failure_is_forwarded_and_terminal() {
        let transport = MockTransport::default();
        let (handler, seen) = recording_handler();
        let mut session =
            SubscriptionSession::start(&transport, &SubscriptionQuery::default(), handler);

        transport.emit(SessionCallback::Failure(TransportError::Connection(
            "refused".into(),
        )));
        transport.emit(event("ignored"));

        assert_eq!(session.state(), SessionState::Failed);
        assert!(!session.cancel());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], SessionCallback::Failure(_)));
    }

    #[test]
    fn synchronous_failure_from_execute_is_observed() {
        let transport = MockTransport::default();
        transport.disable();
        let (handler, seen) = recording_handler();

        let session = SubscriptionSession::start(&transport, &SubscriptionQuery::default(), handler);

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SessionCallback::Failure(TransportError::SubscriptionsDisabled)]
        );
    }

    #[test]
    fn handler_error_fails_session_and_drops_later_callbacks() {
        let transport = MockTransport::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let handler: Arc<dyn SessionHandler> = Arc::new(RejectEvents(record));
        let mut session =
            SubscriptionSession::start(&transport, &SubscriptionQuery::default(), handler);
        transport.emit(SessionCallback::Connected);

        let err = transport.try_emit(event("rejected")).unwrap_err();
        assert_eq!(err, HandlerError("no room".to_string()));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(!session.is_active());

        assert!(transport.try_emit(event("after")).is_ok());
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert!(!session.cancel());
        assert_eq!(transport.cancel_count(), 0);
    }

    struct RejectEvents(Arc<Mutex<Vec<SessionCallback>>>);

    impl SessionHandler for RejectEvents {
        fn on_callback(&self, callback: SessionCallback) -> Result<(), HandlerError> {
            let is_event = matches!(callback, SessionCallback::Event(_));
            self.0.lock().unwrap().push(callback);
            if is_event {
                Err(HandlerError("no room".to_string()))
            } else {
                Ok(())
            }
        }
    }
}
