//! The subscription-to-notification relay.
//!
//! Owns at most one [`SubscriptionSession`]. Every event the session delivers
//! is reduced to its newest record and presented synchronously, inside the
//! transport's callback, with no queue in between. A presentation failure is
//! returned to the transport and ends that session.

use std::sync::Arc;

use pushrelay_core::{DisplayRequest, RelayConfig, SubscriptionEvent, SubscriptionQuery, reduce};
use tracing::{debug, error, info, instrument, warn};

use crate::error::RelayError;
use crate::session::{
    HandlerError, SessionCallback, SessionHandler, SessionState, SubscriptionSession,
};
use crate::sink::{NotificationPresenter, NotificationSink, PresentationError};
use crate::transport::{GraphqlWsTransport, SubscriptionTransport, TransportConfig};

/// Host lifecycle transitions the relay reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created,
    Resumed,
    Paused,
    Destroyed,
}

/// Reduce-then-present pipeline run for every delivered event.
#[derive(Debug, Clone)]
struct Pipeline {
    presenter: NotificationPresenter,
}

impl Pipeline {
    fn deliver(&self, event: &SubscriptionEvent) -> Result<Option<DisplayRequest>, PresentationError> {
        let Some(record) = reduce(event) else {
            debug!("Empty subscription event; nothing to present");
            return Ok(None);
        };
        self.presenter.present(&record).map(Some)
    }
}

impl SessionHandler for Pipeline {
    fn on_callback(&self, callback: SessionCallback) -> Result<(), HandlerError> {
        match callback {
            SessionCallback::Connected => info!("Subscription connected"),
            SessionCallback::Event(event) => {
                debug!(records = event.len(), "Subscription event");
                // A failed presentation ends the current session.
                self.deliver(&event).map_err(|e| {
                    error!(error = %e, "Notification presentation failed");
                    HandlerError(e.to_string())
                })?;
            }
            SessionCallback::Failure(e) => warn!(error = %e, "Subscription failed"),
            SessionCallback::Terminated => info!("Subscription terminated"),
            SessionCallback::Completed => info!("Subscription completed"),
        }
        Ok(())
    }
}

/// Relays one GraphQL subscription to a notification sink.
pub struct Relay {
    transport: Arc<dyn SubscriptionTransport>,
    query: SubscriptionQuery,
    pipeline: Arc<Pipeline>,
    session: Option<SubscriptionSession>,
}

impl Relay {
    pub fn new(
        transport: Arc<dyn SubscriptionTransport>,
        query: SubscriptionQuery,
        presenter: NotificationPresenter,
    ) -> Self {
        Self {
            transport,
            query,
            pipeline: Arc::new(Pipeline { presenter }),
            session: None,
        }
    }

    /// Validate `config` and build a relay on a [`GraphqlWsTransport`].
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Core`] for an invalid configuration and
    /// [`RelayError::Transport`] when the transport cannot be built.
    pub fn from_config(
        config: &RelayConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, RelayError> {
        config.validate()?;
        let transport = GraphqlWsTransport::new(TransportConfig::from_relay_config(config))?;
        Ok(Self::new(
            Arc::new(transport),
            config.subscription_query(),
            NotificationPresenter::from_config(sink, config),
        ))
    }

    /// State of the current session, `None` when there is none.
    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(SubscriptionSession::state)
    }

    /// Whether a session currently holds or is acquiring a connection.
    pub fn is_active(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(SubscriptionSession::is_active)
    }

    /// Subscribe, superseding any live session.
    ///
    /// The previous session is cancelled before the new one executes, so two
    /// sessions never deliver at the same time. Transport errors arrive later
    /// through the session and are only logged.
    #[instrument(skip(self))]
    pub fn start(&mut self) {
        if let Some(mut previous) = self.session.take() {
            if previous.cancel() {
                info!("Superseding live subscription session");
            }
        }
        let handler: Arc<dyn SessionHandler> = Arc::clone(&self.pipeline) as Arc<dyn SessionHandler>;
        self.session = Some(SubscriptionSession::start(
            self.transport.as_ref(),
            &self.query,
            handler,
        ));
    }

    /// Cancel the current session, if any. Never fails.
    #[instrument(skip(self))]
    pub fn cancel(&mut self) {
        match self.session.take() {
            Some(mut session) => {
                if !session.cancel() {
                    debug!(state = %session.state(), "Session already finished");
                }
            }
            None => debug!("No session to cancel"),
        }
    }

    /// Cancel and disable the transport's subscriptions for good.
    ///
    /// Idempotent; a later [`start`](Self::start) reports
    /// `SubscriptionsDisabled` through the session.
    #[instrument(skip(self))]
    pub fn teardown(&mut self) {
        self.cancel();
        self.transport.disable_subscriptions();
        info!("Relay torn down");
    }

    /// Reduce `event` and present the selected record.
    ///
    /// This is what every delivered event goes through. Returns the display
    /// request that was shown, or `None` for an empty event.
    ///
    /// # Errors
    ///
    /// Returns [`PresentationError`] when the sink rejects the request.
    pub fn deliver(&self, event: &SubscriptionEvent) -> Result<Option<DisplayRequest>, PresentationError> {
        self.pipeline.deliver(event)
    }

    /// Apply a host lifecycle transition.
    pub fn on_lifecycle(&mut self, event: LifecycleEvent) {
        debug!(?event, "Lifecycle event");
        match event {
            LifecycleEvent::Created | LifecycleEvent::Resumed => self.start(),
            LifecycleEvent::Paused => self.cancel(),
            LifecycleEvent::Destroyed => self.teardown(),
        }
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("query", &self.query.operation_name)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
