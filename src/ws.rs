//! WebSocket transport seam.
//!
//! The EventSub and PubSub clients read from a [`WsSource`] and write to a
//! [`WsSink`]. Adapters are provided for `tokio_tungstenite` streams and
//! for an in-memory pair used by tests and embedders that bring their own
//! transport.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, WebSocketStream};

use crate::dispatch::BoxFuture;
use crate::error::{ChatwireError, Result};

/// One piece of a WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub data: Bytes,
    /// Set on the last fragment of a message.
    pub end_of_message: bool,
}

impl Fragment {
    /// A whole message in one fragment.
    pub fn complete(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            end_of_message: true,
        }
    }

    /// A non-final fragment.
    pub fn partial(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            end_of_message: false,
        }
    }
}

/// Receiving half of a WebSocket transport.
pub trait WsSource: Send + 'static {
    /// Next fragment, or `None` once the peer closed.
    fn next_fragment(&mut self) -> BoxFuture<'_, Option<Result<Fragment>>>;
}

/// Sending half of a WebSocket transport.
pub trait WsSink: Send + 'static {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, Result<()>>;

    /// Start the closing handshake.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

pub type BoxSource = Box<dyn WsSource>;
pub type BoxSink = Box<dyn WsSink>;

/// Longest wait for a transport to finish closing.
pub(crate) const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Close `sink`, giving up once [`CLOSE_TIMEOUT`] passes.
pub(crate) async fn close_bounded(sink: &mut BoxSink) -> Result<()> {
    tokio::time::timeout(CLOSE_TIMEOUT, sink.close())
        .await
        .map_err(|_| ChatwireError::Protocol("timed out closing WebSocket".to_string()))?
}

/// Opens WebSocket transports by URL.
pub trait WsConnector: Send + Sync + 'static {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<(BoxSource, BoxSink)>>;
}

/// Receiving half of a `tokio_tungstenite` stream.
pub struct TungsteniteSource<S> {
    inner: SplitStream<WebSocketStream<S>>,
}

/// Sending half of a `tokio_tungstenite` stream.
pub struct TungsteniteSink<S> {
    inner: SplitSink<WebSocketStream<S>, WsMessage>,
}

/// Split a connected stream into boxed halves.
pub fn split_stream<S>(ws: WebSocketStream<S>) -> (BoxSource, BoxSink)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, source) = ws.split();
    (
        Box::new(TungsteniteSource { inner: source }),
        Box::new(TungsteniteSink { inner: sink }),
    )
}

impl<S> WsSource for TungsteniteSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn next_fragment(&mut self) -> BoxFuture<'_, Option<Result<Fragment>>> {
        Box::pin(async move {
            loop {
                // tungstenite reassembles continuation frames itself.
                match self.inner.next().await? {
                    Ok(WsMessage::Text(text)) => {
                        return Some(Ok(Fragment::complete(Bytes::copy_from_slice(
                            text.as_bytes(),
                        ))))
                    }
                    Ok(WsMessage::Binary(data)) => return Some(Ok(Fragment::complete(data))),
                    Ok(WsMessage::Close(frame)) => {
                        tracing::debug!(?frame, "WebSocket closed by peer");
                        return None;
                    }
                    Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => continue,
                    Err(e) => return Some(Err(e.into())),
                }
            }
        })
    }
}

impl<S> WsSink for TungsteniteSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn send_text(&mut self, text: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.inner.send(WsMessage::Text(text.into())).await?;
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.inner.close().await?;
            Ok(())
        })
    }
}

/// Connector backed by `tokio_tungstenite::connect_async`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl WsConnector for TungsteniteConnector {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<(BoxSource, BoxSink)>> {
        Box::pin(async move {
            let (ws, _response) = connect_async(url).await?;
            tracing::info!(url, "WebSocket connected");
            Ok(split_stream(ws))
        })
    }
}

/// Receiving half of an in-memory transport.
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Fragment>,
}

/// Sending half of an in-memory transport.
pub struct MemorySink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

/// The far end of an in-memory transport, playing the server.
pub struct MemoryPeer {
    tx: mpsc::UnboundedSender<Fragment>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Create a connected in-memory transport.
pub fn memory_pair() -> (MemoryPeer, BoxSource, BoxSink) {
    let (to_client, from_peer) = mpsc::unbounded_channel();
    let (to_peer, from_client) = mpsc::unbounded_channel();
    (
        MemoryPeer {
            tx: to_client,
            rx: from_client,
        },
        Box::new(MemorySource { rx: from_peer }),
        Box::new(MemorySink { tx: Some(to_peer) }),
    )
}

impl MemoryPeer {
    /// Send a whole text message. Returns `false` if the client is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send_fragment(Fragment::complete(text.into()))
    }

    pub fn send_fragment(&self, fragment: Fragment) -> bool {
        self.tx.send(fragment).is_ok()
    }

    /// Next message sent by the client, or `None` once it closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Message already sent by the client, if any.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

impl WsSource for MemorySource {
    fn next_fragment(&mut self) -> BoxFuture<'_, Option<Result<Fragment>>> {
        Box::pin(async move { self.rx.recv().await.map(Ok) })
    }
}

impl WsSink for MemorySink {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, Result<()>> {
        let sent = match &self.tx {
            Some(tx) => tx.send(text).map_err(|_| ChatwireError::ConnectionClosed),
            None => Err(ChatwireError::ConnectionClosed),
        };
        Box::pin(async move { sent })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        self.tx = None;
        Box::pin(async { Ok(()) })
    }
}

/// Connector handing out pre-registered in-memory transports in order.
#[derive(Default)]
pub struct MemoryConnector {
    pending: Mutex<VecDeque<(BoxSource, BoxSink)>>,
    urls: Mutex<Vec<String>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transport for the next `connect` call and return its peer.
    pub fn add_endpoint(&self) -> MemoryPeer {
        let (peer, source, sink) = memory_pair();
        self.pending.lock().push_back((source, sink));
        peer
    }

    /// URLs passed to `connect`, in call order.
    pub fn connected_urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

impl WsConnector for MemoryConnector {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<(BoxSource, BoxSink)>> {
        self.urls.lock().push(url.to_string());
        let next = self.pending.lock().pop_front();
        Box::pin(async move {
            next.ok_or_else(|| {
                ChatwireError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("no endpoint registered for {url}"),
                ))
            })
        })
    }
}
