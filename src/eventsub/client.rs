//! EventSub WebSocket client.
//!
//! The client never sends on the socket; subscriptions are created over the
//! REST API with a [`SubscriptionRequest`] bound to the current session. The
//! read loop owns the transport so it can move to a new connection when the
//! server sends `session_reconnect`:
//!
//! 1. Open the advertised URL and wait for its welcome
//! 2. Keep dispatching whatever still arrives on the old connection
//! 3. Swap transport and session, then close the old transport
//!
//! If the new connection cannot be opened or never sends its welcome, the
//! client stays on the old connection until that one closes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::message::{EventSubMessage, EventSubMessageType, Welcome};
use super::session::{Quota, Session, SessionSlot, SessionState, SubscriptionRequest};
use crate::config::EventSubConfig;
use crate::dispatch::{CallbackId, CallbackRegistry, CallbackResult, DispatchQueue};
use crate::error::{ChatwireError, Result};
use crate::event::ConnectionEvent;
use crate::framing::MessageBuffer;
use crate::liveness::Watchdog;
use crate::ws::{close_bounded, BoxSink, BoxSource, Fragment, TungsteniteConnector, WsConnector};

/// Builder for configuring and connecting an EventSub client.
pub struct EventSubClientBuilder {
    config: EventSubConfig,
    connector: Arc<dyn WsConnector>,
    registry: CallbackRegistry<EventSubMessage>,
}

impl EventSubClientBuilder {
    pub fn new() -> Self {
        Self {
            config: EventSubConfig::default(),
            connector: Arc::new(TungsteniteConnector),
            registry: CallbackRegistry::new(),
        }
    }

    pub fn config(mut self, config: EventSubConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Liveness window until the first welcome arrives.
    ///
    /// Default: 30 seconds
    pub fn welcome_timeout(mut self, timeout: Duration) -> Self {
        self.config.welcome_timeout = timeout;
        self
    }

    /// Default: 5 seconds
    pub fn keepalive_grace(mut self, grace: Duration) -> Self {
        self.config.keepalive_grace = grace;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.dispatch.queue_capacity = capacity;
        self
    }

    /// Connector used for the initial connection and for reconnects.
    pub fn connector<C: WsConnector>(mut self, connector: Arc<C>) -> Self {
        self.connector = connector as Arc<dyn WsConnector>;
        self
    }

    /// Register a user callback before connecting.
    pub fn callback<F, Fut>(self, filter: Option<Vec<EventSubMessageType>>, callback: F) -> Self
    where
        F: Fn(Arc<EventSubMessage>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        self.registry.add(filter, callback);
        self
    }

    /// Open the configured URL and start the client.
    pub async fn connect(self) -> Result<EventSubClient> {
        let (source, sink) = self.connector.connect(&self.config.url).await?;
        Ok(EventSubClient::start(self, source, sink))
    }

    /// Start the client on an already open transport.
    pub fn connect_with(self, source: BoxSource, sink: BoxSink) -> EventSubClient {
        EventSubClient::start(self, source, sink)
    }
}

impl Default for EventSubClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Shared {
    slot: SessionSlot,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<ConnectionEvent>,
    keepalive_grace: Duration,
}

impl Shared {
    fn set_state(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::info!(from = ?current, to = ?next, "EventSub state changed");
            *current = next;
            true
        });
    }

    /// Make the welcomed session current. The session is visible before
    /// `SessionReady` is published and before the welcome is dispatched.
    fn install(&self, welcome: &Welcome, watchdog: &Watchdog) {
        let session = Arc::new(Session::from_payload(welcome.session()));
        if let Some(keepalive) = session.keepalive_timeout() {
            watchdog.set_timeout(keepalive + self.keepalive_grace);
        }

        let id = session.id().to_string();
        let previous = self.slot.replace(session);
        self.set_state(SessionState::Ready(id.clone()));

        if let Some(previous) = previous {
            if previous.id() != id {
                tracing::info!(old = previous.id(), new = %id, "EventSub session replaced");
                let _ = self
                    .events
                    .send(ConnectionEvent::SessionInvalidated(previous.id().to_string()));
            }
        }
        let _ = self.events.send(ConnectionEvent::SessionReady(id));
    }
}

/// A running EventSub connection.
pub struct EventSubClient {
    shared: Arc<Shared>,
    registry: Arc<CallbackRegistry<EventSubMessage>>,
    cancel: CancellationToken,
    read_task: Option<JoinHandle<Result<()>>>,
}

impl EventSubClient {
    pub fn builder() -> EventSubClientBuilder {
        EventSubClientBuilder::new()
    }

    fn start(builder: EventSubClientBuilder, source: BoxSource, sink: BoxSink) -> Self {
        let EventSubClientBuilder {
            config,
            connector,
            registry,
        } = builder;

        let cancel = CancellationToken::new();
        let (events, _) = broadcast::channel(config.dispatch.event_capacity.max(1));
        let (state, _) = watch::channel(SessionState::Connecting);
        let shared = Arc::new(Shared {
            slot: SessionSlot::new(),
            state,
            events: events.clone(),
            keepalive_grace: config.keepalive_grace,
        });
        shared.set_state(SessionState::AwaitingWelcome);

        let registry = Arc::new(registry);
        let queue = DispatchQueue::spawn(
            registry.clone(),
            config.dispatch.queue_capacity,
            cancel.clone(),
        );
        let watchdog = Watchdog::spawn(config.welcome_timeout, cancel.clone(), move || {
            let _ = events.send(ConnectionEvent::Timeout);
        });

        let reader = Reader {
            source,
            sink,
            buffer: MessageBuffer::new(),
            connector,
            queue,
            watchdog,
            shared: shared.clone(),
            cancel: cancel.clone(),
            welcome_timeout: config.welcome_timeout,
        };
        let read_task = tokio::spawn(reader.run());

        Self {
            shared,
            registry,
            cancel,
            read_task: Some(read_task),
        }
    }

    /// The current session, if a welcome has arrived.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.shared.slot.current()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Wait for the first welcome.
    pub async fn wait_until_ready(&self) -> Result<Arc<Session>> {
        let mut states = self.shared.state.subscribe();
        let closed = {
            let state = states
                .wait_for(|s| matches!(s, SessionState::Ready(_) | SessionState::Closed))
                .await
                .map_err(|_| ChatwireError::ConnectionClosed)?;
            *state == SessionState::Closed
        };
        if closed {
            return Err(ChatwireError::ConnectionClosed);
        }
        self.session().ok_or(ChatwireError::NotReady)
    }

    /// Start a subscription request bound to the current session.
    pub fn subscription_request(
        &self,
        kind: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<SubscriptionRequest> {
        self.shared.slot.request(kind, version)
    }

    /// Reject a request made against a session that has since been
    /// replaced.
    pub fn validate_subscription(&self, request: &SubscriptionRequest) -> Result<()> {
        self.shared.slot.validate(request)
    }

    /// Record quota counters for the current session.
    pub fn update_quota(&self, quota: Quota) -> Result<()> {
        let session = self.session().ok_or(ChatwireError::NotReady)?;
        session.update_quota(quota);
        Ok(())
    }

    pub fn register_callback<F, Fut>(
        &self,
        filter: Option<Vec<EventSubMessageType>>,
        callback: F,
    ) -> CallbackId
    where
        F: Fn(Arc<EventSubMessage>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        self.registry.add(filter, callback)
    }

    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.registry.remove(id)
    }

    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the connection ends and its dispatch queue is drained.
    pub async fn wait_for_shutdown(mut self) -> Result<()> {
        let Some(task) = self.read_task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(e) => Err(ChatwireError::Protocol(format!(
                "EventSub read loop failed: {e}"
            ))),
        }
    }
}

impl Drop for EventSubClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Reader {
    source: BoxSource,
    sink: BoxSink,
    buffer: MessageBuffer,
    connector: Arc<dyn WsConnector>,
    queue: DispatchQueue<EventSubMessage>,
    watchdog: Watchdog,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    welcome_timeout: Duration,
}

impl Reader {
    async fn run(mut self) -> Result<()> {
        let result = match self.read_messages().await {
            Err(ChatwireError::Cancelled) => Ok(()),
            other => other,
        };

        self.buffer.clear();
        self.cancel.cancel();
        if let Err(e) = close_bounded(&mut self.sink).await {
            tracing::debug!("EventSub close failed: {}", e);
        }

        let Reader { queue, shared, .. } = self;
        queue.join().await;

        if let Err(e) = &result {
            tracing::error!("EventSub read loop error: {}", e);
        }
        shared.set_state(SessionState::Closed);
        let _ = shared.events.send(ConnectionEvent::Disconnected);
        result
    }

    async fn read_messages(&mut self) -> Result<()> {
        loop {
            let fragment = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                fragment = self.source.next_fragment() => fragment,
            };
            let Some(fragment) = fragment else {
                tracing::info!("EventSub connection closed by server");
                return Ok(());
            };
            let Some(msg) = decode(&mut self.buffer, fragment?) else {
                continue;
            };
            self.watchdog.feed();

            let reconnect_url = match &msg {
                EventSubMessage::Welcome(welcome) => {
                    self.shared.install(welcome, &self.watchdog);
                    None
                }
                EventSubMessage::Reconnect(reconnect) => {
                    let url = reconnect.session().reconnect_url.clone();
                    if url.is_none() {
                        tracing::warn!("session_reconnect without reconnect_url");
                    }
                    url
                }
                _ => None,
            };

            self.queue.enqueue(Arc::new(msg)).await?;

            if let Some(url) = reconnect_url {
                self.reconnect(&url).await?;
            }
        }
    }

    async fn reconnect(&mut self, url: &str) -> Result<()> {
        let old_id = self
            .shared
            .slot
            .current()
            .map(|s| s.id().to_string())
            .unwrap_or_default();
        self.shared.set_state(SessionState::Reconnecting(old_id));
        tracing::info!(url, "EventSub reconnecting");

        let next = open_welcomed(self.connector.clone(), url.to_string(), self.welcome_timeout);
        tokio::pin!(next);

        // The old connection keeps delivering until the new one is welcomed.
        let mut old_open = true;
        let (source, sink, welcome) = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ChatwireError::Cancelled),
                ready = &mut next => match ready {
                    Ok(ready) => break ready,
                    Err(e) => {
                        tracing::warn!(url, "EventSub reconnect failed, keeping the current connection: {}", e);
                        if let Some(current) = self.shared.slot.current() {
                            self.shared.set_state(SessionState::Ready(current.id().to_string()));
                        }
                        return Ok(());
                    }
                },
                fragment = self.source.next_fragment(), if old_open => match fragment {
                    Some(Ok(fragment)) => {
                        if let Some(msg) = decode(&mut self.buffer, fragment) {
                            self.watchdog.feed();
                            self.queue.enqueue(Arc::new(msg)).await?;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Old EventSub connection failed during reconnect: {}", e);
                        old_open = false;
                    }
                    None => old_open = false,
                },
            }
        };

        self.source = source;
        let mut old_sink = std::mem::replace(&mut self.sink, sink);
        self.buffer.clear();
        self.watchdog.feed();
        self.shared.install(&welcome, &self.watchdog);

        if let Err(e) = close_bounded(&mut old_sink).await {
            tracing::debug!("Closing old EventSub connection failed: {}", e);
        }

        self.queue
            .enqueue(Arc::new(EventSubMessage::Welcome(welcome)))
            .await
    }
}

/// Frame and parse one fragment. Malformed messages are logged and skipped.
fn decode(buffer: &mut MessageBuffer, fragment: Fragment) -> Option<EventSubMessage> {
    let text = match buffer.push(&fragment.data, fragment.end_of_message)? {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Skipping EventSub message: {}", e);
            return None;
        }
    };
    match EventSubMessage::parse(&text) {
        Ok(msg) => {
            tracing::debug!(kind = msg.message_type().as_str(), "Received EventSub message");
            Some(msg)
        }
        Err(e) => {
            tracing::warn!(%text, "Skipping malformed EventSub message: {}", e);
            None
        }
    }
}

/// Open `url` and wait for its welcome.
async fn open_welcomed(
    connector: Arc<dyn WsConnector>,
    url: String,
    timeout: Duration,
) -> Result<(BoxSource, BoxSink, Welcome)> {
    let (mut source, sink) = connector.connect(&url).await?;
    let welcome = tokio::time::timeout(timeout, read_welcome(&mut source))
        .await
        .map_err(|_| ChatwireError::Protocol("timed out waiting for session_welcome".to_string()))??;
    Ok((source, sink, welcome))
}

async fn read_welcome(source: &mut BoxSource) -> Result<Welcome> {
    let mut buffer = MessageBuffer::new();
    loop {
        let fragment = source
            .next_fragment()
            .await
            .ok_or(ChatwireError::ConnectionClosed)??;
        match decode(&mut buffer, fragment) {
            None => continue,
            Some(EventSubMessage::Welcome(welcome)) => return Ok(welcome),
            Some(other) => {
                return Err(ChatwireError::Protocol(format!(
                    "expected session_welcome, got {}",
                    other.message_type().as_str()
                )))
            }
        }
    }
}
