//! GraphQL subscription client over `graphql-ws`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use pushrelay_core::{RelayConfig, SubscriptionQuery};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, instrument, trace, warn};

use super::hook::{RequestHook, StaticHeaders};
use super::protocol::{ClientMessage, SUBPROTOCOL, ServerMessage, describe_error_payload};
use super::{SessionHandle, SubscriptionTransport, TransportError};
use crate::session::{SessionCallback, SessionHandler};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Configuration for [`GraphqlWsTransport`].
#[derive(Clone)]
pub struct TransportConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub endpoint: String,

    /// Field under `data` holding the notification list.
    pub root_field: String,

    /// Payload of `connection_init`.
    pub connection_params: Value,

    /// Time allowed from dialing until `connection_ack`.
    pub connect_timeout: Duration,

    /// Applied to every upgrade request.
    pub hook: Arc<dyn RequestHook>,
}

impl TransportConfig {
    /// Create a transport config with required fields and defaults.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            root_field: pushrelay_core::models::DEFAULT_ROOT_FIELD.to_string(),
            connection_params: Value::Object(serde_json::Map::new()),
            connect_timeout: Duration::from_secs(10),
            hook: Arc::new(StaticHeaders::default()),
        }
    }

    pub fn from_relay_config(config: &RelayConfig) -> Self {
        Self {
            endpoint: config.websocket_endpoint.clone(),
            root_field: config.root_field.clone(),
            connection_params: config.connection_params.clone(),
            connect_timeout: config.connect_timeout(),
            hook: Arc::new(StaticHeaders::new(config.headers.clone())),
        }
    }

    /// Replace the request-mutation hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn RequestHook>) -> Self {
        self.hook = hook;
        self
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn upgrade_request(&self) -> Result<Request, TransportError> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connection(format!("Invalid endpoint: {e}")))?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));
        self.hook.apply(&mut request)?;
        Ok(request)
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("endpoint", &self.endpoint)
            .field("root_field", &self.root_field)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

/// State shared between the transport and every call it created.
struct Shared {
    config: TransportConfig,
    runtime: Handle,
    enabled: AtomicBool,
    /// Flipped once by `disable_subscriptions`; every session task watches it.
    shutdown: watch::Sender<bool>,
}

/// Subscription transport speaking `graphql-ws` over a WebSocket.
///
/// Each executed call runs on its own tokio task, spawned onto the runtime
/// that was current when the transport was built.
#[derive(Clone)]
pub struct GraphqlWsTransport {
    shared: Arc<Shared>,
}

impl GraphqlWsTransport {
    /// Build a transport on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Runtime` when called outside a tokio runtime.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let runtime = Handle::try_current()
            .map_err(|e| TransportError::Runtime(format!("No tokio runtime available: {e}")))?;

        // Install ring as the default crypto provider for wss:// (no-op if already installed).
        let _ = rustls::crypto::ring::default_provider().install_default();

        debug!(endpoint = %config.endpoint, "GraphQL WebSocket transport initialized");
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                runtime,
                enabled: AtomicBool::new(true),
                shutdown,
            }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for GraphqlWsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlWsTransport")
            .field("config", &self.shared.config)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl SubscriptionTransport for GraphqlWsTransport {
    fn subscribe(&self, query: &SubscriptionQuery) -> Box<dyn SessionHandle> {
        let (cancel, _) = watch::channel(false);
        Box::new(GraphqlWsCall {
            shared: Arc::clone(&self.shared),
            query: query.clone(),
            operation_id: uuid::Uuid::new_v4().to_string(),
            cancel,
            task: None,
        })
    }

    fn disable_subscriptions(&self) {
        if self.shared.enabled.swap(false, Ordering::SeqCst) {
            self.shared.shutdown.send_replace(true);
            info!("Subscriptions disabled");
        }
    }
}

/// A single `graphql-ws` subscription call.
pub struct GraphqlWsCall {
    shared: Arc<Shared>,
    query: SubscriptionQuery,
    operation_id: String,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle for GraphqlWsCall {
    fn execute(&mut self, handler: Arc<dyn SessionHandler>) {
        if self.task.is_some() {
            warn!(operation_id = %self.operation_id, "Subscription call already executed");
            return;
        }
        if !self.shared.enabled.load(Ordering::SeqCst) {
            let _ = handler.on_callback(SessionCallback::Failure(
                TransportError::SubscriptionsDisabled,
            ));
            return;
        }

        let stop = StopSignal {
            cancel: self.cancel.subscribe(),
            shutdown: self.shared.shutdown.subscribe(),
        };
        let ctx = CallContext {
            shared: Arc::clone(&self.shared),
            query: self.query.clone(),
            operation_id: self.operation_id.clone(),
        };
        self.task = Some(
            self.shared
                .runtime
                .spawn(run_call(ctx, handler, stop)),
        );
    }

    fn cancel(&mut self) {
        self.cancel.send_replace(true);
    }
}

impl Drop for GraphqlWsCall {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}

struct CallContext {
    shared: Arc<Shared>,
    query: SubscriptionQuery,
    operation_id: String,
}

/// Cancellation of one call, or of the whole transport.
struct StopSignal {
    cancel: watch::Receiver<bool>,
    shutdown: watch::Receiver<bool>,
}

impl StopSignal {
    /// Resolves once either signal is raised (or its sender is gone).
    async fn stopped(&mut self) {
        tokio::select! {
            _ = self.cancel.wait_for(|stop| *stop) => {}
            _ = self.shutdown.wait_for(|stop| *stop) => {}
        }
    }

    fn is_stopped(&self) -> bool {
        *self.cancel.borrow() || *self.shutdown.borrow()
    }
}

/// How a connection ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Cancelled,
    Completed,
    Closed,
    /// The handler failed; the session is already finished on its side.
    Rejected,
}

#[instrument(skip_all, fields(operation_id = %ctx.operation_id, endpoint = %ctx.shared.config.endpoint))]
async fn run_call(ctx: CallContext, handler: Arc<dyn SessionHandler>, mut stop: StopSignal) {
    let result = drive(&ctx, handler.as_ref(), &mut stop).await;

    if stop.is_stopped() {
        debug!("Subscription call stopped");
        return;
    }
    let last = match result {
        Ok(Exit::Cancelled | Exit::Rejected) => return,
        Ok(Exit::Completed) => SessionCallback::Completed,
        Ok(Exit::Closed) => SessionCallback::Terminated,
        Err(e) => SessionCallback::Failure(e),
    };
    let _ = handler.on_callback(last);
}

async fn drive(
    ctx: &CallContext,
    handler: &dyn SessionHandler,
    stop: &mut StopSignal,
) -> Result<Exit, TransportError> {
    let config = &ctx.shared.config;

    let (mut sink, mut source) = tokio::select! {
        biased;
        () = stop.stopped() => return Ok(Exit::Cancelled),
        handshake = tokio::time::timeout(config.connect_timeout, handshake(config)) => {
            match handshake {
                Ok(result) => result?,
                Err(_) => return Err(TransportError::Timeout),
            }
        }
    };
    if let Err(e) = handler.on_callback(SessionCallback::Connected) {
        debug!(error = %e, "Handler rejected connection");
        close_gracefully(&mut sink, None).await;
        return Ok(Exit::Rejected);
    }

    send(
        &mut sink,
        &ClientMessage::Start {
            id: &ctx.operation_id,
            payload: &ctx.query,
        },
    )
    .await?;

    loop {
        let frame = tokio::select! {
            biased;
            () = stop.stopped() => {
                close_gracefully(&mut sink, Some(ctx.operation_id.as_str())).await;
                return Ok(Exit::Cancelled);
            }
            frame = source.next() => frame,
        };

        let text = match frame {
            None | Some(Ok(Message::Close(_))) => return Ok(Exit::Closed),
            Some(Err(e)) => return Err(TransportError::Connection(e.to_string())),
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(_)) => continue,
        };

        trace!(frame = %text.as_str(), "Server frame");
        let message = match ServerMessage::parse(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable server frame");
                continue;
            }
        };

        match message {
            ServerMessage::Data { id, payload } if id == ctx.operation_id => {
                if let Some(summary) = payload.error_summary() {
                    warn!(errors = %summary, "Subscription result carried errors");
                }
                let event = match payload.into_event(&config.root_field) {
                    Ok(event) => event,
                    Err(TransportError::Protocol(e)) => {
                        warn!(error = %e, "Skipping undecodable subscription result");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                debug!(records = event.len(), "Subscription event received");
                if let Err(e) = handler.on_callback(SessionCallback::Event(event)) {
                    debug!(error = %e, "Handler rejected event; closing");
                    close_gracefully(&mut sink, Some(ctx.operation_id.as_str())).await;
                    return Ok(Exit::Rejected);
                }
            }
            ServerMessage::Error { id, payload } if id == ctx.operation_id => {
                return Err(TransportError::Server(describe_error_payload(&payload)));
            }
            ServerMessage::Complete { id } if id == ctx.operation_id => {
                let _ = send(&mut sink, &ClientMessage::ConnectionTerminate).await;
                let _ = sink.close().await;
                return Ok(Exit::Completed);
            }
            ServerMessage::ConnectionError { payload } => {
                return Err(TransportError::Server(describe_error_payload(&payload)));
            }
            ServerMessage::KeepAlive => {}
            other => debug!(message = ?other, "Ignoring server message"),
        }
    }
}

/// Dial, send `connection_init` and wait for `connection_ack`.
async fn handshake(config: &TransportConfig) -> Result<(WsSink, WsSource), TransportError> {
    let request = config.upgrade_request()?;
    let (ws, _response) = connect_async(request)
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))?;
    let (mut sink, mut source) = ws.split();

    send(
        &mut sink,
        &ClientMessage::ConnectionInit {
            payload: &config.connection_params,
        },
    )
    .await?;

    loop {
        let text = match source.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => {
                return Err(TransportError::Handshake(
                    "Connection closed before connection_ack".to_string(),
                ));
            }
            Some(Err(e)) => return Err(TransportError::Connection(e.to_string())),
            Some(Ok(_)) => continue,
        };
        trace!(frame = %text.as_str(), "Server frame");
        let message = match ServerMessage::parse(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable server frame");
                continue;
            }
        };
        match message {
            ServerMessage::ConnectionAck { .. } => return Ok((sink, source)),
            ServerMessage::ConnectionError { payload } => {
                return Err(TransportError::Handshake(describe_error_payload(&payload)));
            }
            ServerMessage::KeepAlive | ServerMessage::Unknown => {}
            other => {
                return Err(TransportError::Handshake(format!(
                    "Unexpected message before connection_ack: {other:?}"
                )));
            }
        }
    }
}

async fn send(sink: &mut WsSink, message: &ClientMessage<'_>) -> Result<(), TransportError> {
    sink.send(Message::text(message.to_json()?))
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))
}

/// Best-effort `stop` (once started) + `connection_terminate` + close.
async fn close_gracefully(sink: &mut WsSink, operation_id: Option<&str>) {
    let stopped = match operation_id {
        Some(id) => send(sink, &ClientMessage::Stop { id }).await,
        None => Ok(()),
    };
    if let Err(e) = stopped {
        debug!(error = %e, "Failed to send stop");
        return;
    }
    let _ = send(sink, &ClientMessage::ConnectionTerminate).await;
    let _ = sink.close().await;
}
