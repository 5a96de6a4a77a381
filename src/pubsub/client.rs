//! PubSub WebSocket client.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::heartbeat::{clamp_jitter, Heartbeat};
use super::message::{make_nonce, PubSubKind, PubSubMessage};
use crate::config::PubSubConfig;
use crate::dispatch::{CallbackId, CallbackRegistry, CallbackResult, DispatchQueue};
use crate::error::{ChatwireError, Result};
use crate::event::ConnectionEvent;
use crate::framing::MessageBuffer;
use crate::ratelimit::RateLimiter;
use crate::writer::{spawn_writer_task, WriterHandle};
use crate::ws::{BoxSink, BoxSource, TungsteniteConnector, WsConnector};

/// PubSub connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Closed,
}

/// Builder for configuring and connecting a PubSub client.
pub struct PubSubClientBuilder {
    config: PubSubConfig,
    connector: Arc<dyn WsConnector>,
    limiter: Option<RateLimiter>,
    rng: Option<StdRng>,
    registry: CallbackRegistry<PubSubMessage>,
}

impl PubSubClientBuilder {
    pub fn new() -> Self {
        Self {
            config: PubSubConfig::default(),
            connector: Arc::new(TungsteniteConnector),
            limiter: None,
            rng: None,
            registry: CallbackRegistry::new(),
        }
    }

    pub fn config(mut self, config: PubSubConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Default: 4 minutes
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    /// Fractional jitter on the ping interval.
    ///
    /// Default: 0.05
    pub fn ping_jitter(mut self, jitter: f64) -> Self {
        let clamped = clamp_jitter(jitter);
        if clamped != jitter {
            tracing::warn!(jitter, clamped, "PubSub ping jitter out of range");
        }
        self.config.ping_jitter = clamped;
        self
    }

    /// Default: 10 seconds
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.config.pong_timeout = timeout;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.dispatch.queue_capacity = capacity;
        self
    }

    pub fn connector<C: WsConnector>(mut self, connector: Arc<C>) -> Self {
        self.connector = connector as Arc<dyn WsConnector>;
        self
    }

    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Random source for ping jitter and nonces.
    pub fn rng(mut self, rng: StdRng) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn callback<F, Fut>(self, filter: Option<Vec<PubSubKind>>, callback: F) -> Self
    where
        F: Fn(Arc<PubSubMessage>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        self.registry.add(filter, callback);
        self
    }

    /// Open the configured URL and start the client.
    pub async fn connect(self) -> Result<PubSubClient> {
        let (source, sink) = self.connector.connect(&self.config.url).await?;
        Ok(PubSubClient::start(self, source, sink))
    }

    /// Start the client on an already open transport.
    pub fn connect_with(self, source: BoxSource, sink: BoxSink) -> PubSubClient {
        PubSubClient::start(self, source, sink)
    }
}

impl Default for PubSubClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running PubSub connection.
pub struct PubSubClient {
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    registry: Arc<CallbackRegistry<PubSubMessage>>,
    writer: WriterHandle,
    rng: Mutex<StdRng>,
    cancel: CancellationToken,
    read_task: Option<JoinHandle<Result<()>>>,
    _writer_task: JoinHandle<Result<()>>,
}

impl PubSubClient {
    pub fn builder() -> PubSubClientBuilder {
        PubSubClientBuilder::new()
    }

    fn start(builder: PubSubClientBuilder, source: BoxSource, sink: BoxSink) -> Self {
        let PubSubClientBuilder {
            config,
            connector: _,
            limiter,
            rng,
            registry,
        } = builder;

        let mut rng = rng.unwrap_or_else(|| StdRng::from_rng(&mut rand::rng()));
        let heartbeat_rng = StdRng::from_rng(&mut rng);

        let cancel = CancellationToken::new();
        let (events, _) = broadcast::channel(config.dispatch.event_capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Connecting);

        let (writer, writer_task) = spawn_writer_task(
            sink,
            config.dispatch.send_capacity,
            limiter,
            cancel.clone(),
        );

        let registry = Arc::new(registry);
        let queue = DispatchQueue::spawn(
            registry.clone(),
            config.dispatch.queue_capacity,
            cancel.clone(),
        );

        let heartbeat = Arc::new(Heartbeat::new(
            config.ping_interval,
            config.ping_jitter,
            config.pong_timeout,
            heartbeat_rng,
        ));
        tokio::spawn(
            heartbeat
                .clone()
                .run(writer.clone(), events.clone(), cancel.clone()),
        );

        state.send_replace(ConnectionState::Ready);
        tracing::info!("PubSub connection ready");

        let read_task = tokio::spawn(read_loop(
            source,
            queue,
            heartbeat,
            state.clone(),
            events.clone(),
            cancel.clone(),
        ));

        Self {
            state,
            events,
            registry,
            writer,
            rng: Mutex::new(rng),
            cancel,
            read_task: Some(read_task),
            _writer_task: writer_task,
        }
    }

    /// Subscribe to topics. Returns the nonce the server will echo in its
    /// RESPONSE.
    pub async fn listen<I, S>(&self, topics: I, auth_token: Option<&str>) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nonce = self.nonce();
        let msg = PubSubMessage::listen(topics, auth_token, nonce.clone());
        self.send_message(&msg).await?;
        Ok(nonce)
    }

    /// Unsubscribe from topics. Returns the request nonce.
    pub async fn unlisten<I, S>(&self, topics: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nonce = self.nonce();
        let msg = PubSubMessage::unlisten(topics, nonce.clone());
        self.send_message(&msg).await?;
        Ok(nonce)
    }

    pub async fn send_message(&self, msg: &PubSubMessage) -> Result<()> {
        self.send(msg.to_json()?).await
    }

    /// Send a raw text frame, rate-limited when a limiter is configured.
    pub async fn send(&self, unit: impl Into<String>) -> Result<()> {
        self.writer.send(unit).await
    }

    fn nonce(&self) -> String {
        make_nonce(&mut *self.rng.lock())
    }

    pub fn register_callback<F, Fut>(&self, filter: Option<Vec<PubSubKind>>, callback: F) -> CallbackId
    where
        F: Fn(Arc<PubSubMessage>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        self.registry.add(filter, callback)
    }

    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.registry.remove(id)
    }

    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
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
            Err(e) => Err(ChatwireError::Protocol(format!("PubSub read loop failed: {e}"))),
        }
    }
}

impl Drop for PubSubClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn read_loop(
    mut source: BoxSource,
    queue: DispatchQueue<PubSubMessage>,
    heartbeat: Arc<Heartbeat>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut buffer = MessageBuffer::new();

    let result = loop {
        let fragment = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            fragment = source.next_fragment() => fragment,
        };
        let fragment = match fragment {
            Some(Ok(fragment)) => fragment,
            Some(Err(e)) => break Err(e),
            None => {
                tracing::info!("PubSub connection closed by server");
                break Ok(());
            }
        };

        let text = match buffer.push(&fragment.data, fragment.end_of_message) {
            None => continue,
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                tracing::warn!("Skipping PubSub message: {}", e);
                continue;
            }
        };
        let msg = match PubSubMessage::parse(&text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(%text, "Skipping malformed PubSub message: {}", e);
                continue;
            }
        };
        tracing::debug!(kind = msg.kind().as_str(), "Received PubSub message");

        match msg.kind() {
            PubSubKind::Pong => heartbeat.pong_received(),
            PubSubKind::Reconnect => {
                tracing::info!("PubSub server requested reconnect");
                let _ = events.send(ConnectionEvent::ReconnectRequested);
            }
            _ => {}
        }

        if let Err(e) = queue.enqueue(Arc::new(msg)).await {
            break match e {
                ChatwireError::Cancelled => Ok(()),
                other => Err(other),
            };
        }
    };

    buffer.clear();
    cancel.cancel();
    queue.join().await;

    if let Err(e) = &result {
        tracing::error!("PubSub read loop error: {}", e);
    }
    state.send_replace(ConnectionState::Closed);
    tracing::info!("PubSub connection closed");
    let _ = events.send(ConnectionEvent::Disconnected);
    result
}
