//! Chat client builder and runtime loop.
//!
//! The [`IrcClientBuilder`] configures callbacks and limits, then takes an
//! already established byte stream (plain TCP or TLS, opened by the
//! caller). The [`IrcClient`] manages the lifecycle:
//! 1. Read bytes and frame them into lines
//! 2. Parse each line, feed the watchdog and answer PINGs
//! 3. Queue the message for in-order dispatch
//! 4. Track login, channel, room state and membership from system callbacks
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chatwire::irc::{Command, IrcClient, Message};
//! use tokio::net::TcpStream;
//!
//! # async fn run() -> chatwire::Result<()> {
//! let stream = TcpStream::connect("irc.chat.twitch.tv:6667").await?;
//! let client = IrcClient::builder()
//!     .track_users(true)
//!     .callback(Some(vec![Command::Privmsg]), |msg: Arc<Message>| async move {
//!         println!("{}: {}", msg.nick(), msg.last_param());
//!         Ok(())
//!     })
//!     .connect(stream);
//!
//! client.authenticate(None, None).await?;
//! client.join_channel("somechannel").await?;
//! client.wait_for_shutdown().await
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::membership::{MembershipBatcher, Presence};
use super::message::{Command, Message};
use super::typed::{RoomState, TypedMessage};
use crate::config::IrcConfig;
use crate::dispatch::{CallbackId, CallbackRegistry, CallbackResult, DispatchQueue};
use crate::error::{ChatwireError, Result};
use crate::event::ConnectionEvent;
use crate::framing::LineBuffer;
use crate::liveness::Watchdog;
use crate::ratelimit::RateLimiter;
use crate::writer::{spawn_writer_task, LineSink, WriterHandle};

/// Read buffer size for the chat transport.
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Password sent for anonymous logins. The server ignores it.
const ANONYMOUS_PASS: &str = "SCHMOOPIIE";

/// Top-level chat connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Transport attached, no credentials sent yet.
    Connecting,
    /// Credentials and capability requests sent. Also the state after
    /// leaving the last channel.
    Authenticating,
    /// Confirmed member of the named channel.
    Joined(String),
}

/// Random read-only login nick, `justinfan` followed by four digits.
pub fn anonymous_nick<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("justinfan{:04}", rng.random_range(0..10_000u32))
}

/// Reply for a server PING, carrying the same parameters.
pub fn pong_for(ping: &Message) -> String {
    let mut pong = String::from("PONG");
    if let Some((last, middle)) = ping.params().split_last() {
        for param in middle {
            pong.push(' ');
            pong.push_str(param);
        }
        pong.push_str(" :");
        pong.push_str(last);
    }
    pong
}

fn channel_key(channel: &str) -> String {
    channel.trim_start_matches('#').to_ascii_lowercase()
}

/// Facts learned from the server, updated by system callbacks.
struct ChatSession {
    nick: RwLock<String>,
    state: watch::Sender<ConnectionState>,
    room_state: RwLock<Option<RoomState>>,
    presence: Presence,
    /// Present when membership tracking is enabled.
    batcher: Option<Arc<MembershipBatcher>>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl ChatSession {
    fn is_self(&self, user: &str) -> bool {
        user.eq_ignore_ascii_case(&self.nick.read())
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::info!(from = ?current, to = ?next, "Chat state changed");
            *current = next;
            true
        });
    }

    fn apply(&self, msg: &Message) {
        match TypedMessage::from(msg.clone()) {
            TypedMessage::RoomState(room) => {
                let channel = room.channel_name().to_string();
                *self.room_state.write() = Some(room);
                self.set_state(ConnectionState::Joined(channel));
            }
            TypedMessage::Join(join) => {
                if self.is_self(join.username()) {
                    self.set_state(ConnectionState::Joined(join.channel_name().to_string()));
                }
                if let Some(batcher) = &self.batcher {
                    self.presence.insert(join.username());
                    batcher.record_join(join.username());
                }
            }
            TypedMessage::Part(part) => {
                if self.is_self(part.username()) {
                    self.presence.clear();
                    *self.room_state.write() = None;
                    self.set_state(ConnectionState::Authenticating);
                } else if let Some(batcher) = &self.batcher {
                    self.presence.remove(part.username());
                    batcher.record_part(part.username());
                }
            }
            TypedMessage::NamReply(names) => {
                if self.batcher.is_some() {
                    self.presence.extend(names.users());
                }
            }
            TypedMessage::Other(other) if *other.command() == Command::Reconnect => {
                tracing::info!("Server requested reconnect");
                let _ = self.events.send(ConnectionEvent::ReconnectRequested);
            }
            _ => {}
        }
    }
}

/// Builder for configuring and connecting a chat client.
pub struct IrcClientBuilder {
    config: IrcConfig,
    limiter: Option<RateLimiter>,
    rng: Option<StdRng>,
    registry: CallbackRegistry<Message>,
}

impl IrcClientBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: IrcConfig::default(),
            limiter: None,
            rng: None,
            registry: CallbackRegistry::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: IrcConfig) -> Self {
        self.config = config;
        self
    }

    /// Silence window before a `Timeout` event.
    ///
    /// Default: 6 minutes
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Default: 64 KiB
    pub fn max_line_length(mut self, max: usize) -> Self {
        self.config.max_line_length = max;
        self
    }

    /// Track channel membership and emit `MembershipChanged` batches.
    pub fn track_users(mut self, enabled: bool) -> Self {
        self.config.track_users = enabled;
        self
    }

    /// Default: 2 seconds
    pub fn membership_quiet_period(mut self, period: Duration) -> Self {
        self.config.membership_quiet_period = period;
        self
    }

    /// Default: 10 seconds
    pub fn membership_max_delay(mut self, delay: Duration) -> Self {
        self.config.membership_max_delay = delay;
        self
    }

    /// Capabilities requested after login. An empty list skips `CAP REQ`.
    pub fn capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.capabilities = caps.into_iter().map(Into::into).collect();
        self
    }

    /// Default: 1024
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.dispatch.queue_capacity = capacity;
        self
    }

    /// Gate user sends through a (possibly shared) rate limiter.
    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Random source for anonymous nicks.
    pub fn rng(mut self, rng: StdRng) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Register a user callback before connecting.
    pub fn callback<F, Fut>(self, filter: Option<Vec<Command>>, callback: F) -> Self
    where
        F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        self.registry.add(filter, callback);
        self
    }

    /// Attach to an established stream and start the connection tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect<S>(self, stream: S) -> IrcClient
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        IrcClient::start(self, stream)
    }
}

impl Default for IrcClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running chat connection.
pub struct IrcClient {
    session: Arc<ChatSession>,
    registry: Arc<CallbackRegistry<Message>>,
    writer: WriterHandle,
    capabilities: Vec<String>,
    rng: Mutex<StdRng>,
    cancel: CancellationToken,
    read_task: Option<JoinHandle<Result<()>>>,
    _writer_task: JoinHandle<Result<()>>,
}

impl IrcClient {
    /// Create a new client builder.
    pub fn builder() -> IrcClientBuilder {
        IrcClientBuilder::new()
    }

    fn start<S>(builder: IrcClientBuilder, stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let IrcClientBuilder {
            config,
            limiter,
            rng,
            registry,
        } = builder;

        let cancel = CancellationToken::new();
        let (events, _) = broadcast::channel(config.dispatch.event_capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Connecting);

        let batcher = config.track_users.then(|| {
            Arc::new(MembershipBatcher::new(
                config.membership_quiet_period,
                config.membership_max_delay,
            ))
        });
        if let Some(batcher) = &batcher {
            tokio::spawn(batcher.clone().run(events.clone(), cancel.clone()));
        }

        let session = Arc::new(ChatSession {
            nick: RwLock::new(String::new()),
            state,
            room_state: RwLock::new(None),
            presence: Presence::new(),
            batcher,
            events: events.clone(),
        });

        let registry = Arc::new(registry);
        {
            let session = session.clone();
            registry.add_system(
                Some(vec![
                    Command::RoomState,
                    Command::Join,
                    Command::Part,
                    Command::RplNamReply,
                    Command::Reconnect,
                ]),
                move |msg: Arc<Message>| {
                    let session = session.clone();
                    async move {
                        session.apply(&msg);
                        Ok(())
                    }
                },
            );
        }

        let (reader, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(
            LineSink::new(write_half),
            config.dispatch.send_capacity,
            limiter,
            cancel.clone(),
        );

        let queue = DispatchQueue::spawn(
            registry.clone(),
            config.dispatch.queue_capacity,
            cancel.clone(),
        );

        let watchdog = Watchdog::spawn(config.timeout, cancel.clone(), move || {
            let _ = events.send(ConnectionEvent::Timeout);
        });

        let read_task = tokio::spawn(read_loop(
            reader,
            LineBuffer::with_max_line_length(config.max_line_length),
            queue,
            writer.clone(),
            watchdog,
            session.clone(),
            cancel.clone(),
        ));

        let rng = rng.unwrap_or_else(|| StdRng::from_rng(&mut rand::rng()));

        IrcClient {
            session,
            registry,
            writer,
            capabilities: config.capabilities,
            rng: Mutex::new(rng),
            cancel,
            read_task: Some(read_task),
            _writer_task: writer_task,
        }
    }

    /// Log in and request capabilities.
    ///
    /// Without a user an anonymous `justinfanNNNN` nick is generated.
    pub async fn authenticate(&self, user: Option<&str>, pass: Option<&str>) -> Result<()> {
        let nick = match user {
            Some(user) => user.to_ascii_lowercase(),
            None => anonymous_nick(&mut *self.rng.lock()),
        };
        *self.session.nick.write() = nick.clone();
        self.session.set_state(ConnectionState::Authenticating);

        self.writer
            .send(format!("PASS {}", pass.unwrap_or(ANONYMOUS_PASS)))
            .await?;
        self.writer.send(format!("NICK {nick}")).await?;
        if !self.capabilities.is_empty() {
            self.writer
                .send(format!("CAP REQ :{}", self.capabilities.join(" ")))
                .await?;
        }
        tracing::info!(%nick, "Sent chat login");
        Ok(())
    }

    pub async fn join_channel(&self, channel: &str) -> Result<()> {
        self.send(format!("JOIN #{}", channel_key(channel))).await
    }

    pub async fn part_channel(&self, channel: &str) -> Result<()> {
        self.send(format!("PART #{}", channel_key(channel))).await
    }

    /// Send a chat message to a channel.
    pub async fn privmsg(&self, channel: &str, text: &str) -> Result<()> {
        self.send(format!("PRIVMSG #{} :{}", channel_key(channel), text))
            .await
    }

    /// Send a raw line, rate-limited when a limiter is configured.
    ///
    /// The line must not contain CR or LF.
    pub async fn send(&self, line: impl Into<String>) -> Result<()> {
        let line = line.into();
        if line.contains(['\r', '\n']) {
            return Err(ChatwireError::Protocol(
                "chat line must not contain CR or LF".to_string(),
            ));
        }
        self.writer.send(line).await
    }

    /// Register a user callback.
    pub fn register_callback<F, Fut>(&self, filter: Option<Vec<Command>>, callback: F) -> CallbackId
    where
        F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        self.registry.add(filter, callback)
    }

    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.registry.remove(id)
    }

    /// Subscribe to connection events.
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.session.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state.borrow().clone()
    }

    /// Watch state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.session.state.subscribe()
    }

    /// The login nick, empty before [`authenticate`](Self::authenticate).
    pub fn nick(&self) -> String {
        self.session.nick.read().clone()
    }

    /// Last room state received for the joined channel.
    pub fn room_state(&self) -> Option<RoomState> {
        self.session.room_state.read().clone()
    }

    /// Read-only view of the channel's members. Empty unless membership
    /// tracking is enabled.
    pub fn presence(&self) -> Presence {
        self.session.presence.clone()
    }

    pub fn users(&self) -> Vec<String> {
        self.session.presence.snapshot()
    }

    /// Stop all connection tasks. Queued dispatches still complete.
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
            Err(e) => Err(ChatwireError::Protocol(format!("chat read loop failed: {e}"))),
        }
    }
}

impl Drop for IrcClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Main read loop - frames lines, answers PINGs and queues dispatches.
async fn read_loop<R>(
    mut reader: R,
    mut lines: LineBuffer,
    queue: DispatchQueue<Message>,
    writer: WriterHandle,
    watchdog: Watchdog,
    session: Arc<ChatSession>,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    let result = 'read: loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => break 'read Ok(()),
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::info!("Chat connection closed by server");
                    break 'read Ok(());
                }
                Ok(n) => n,
                Err(e) => break 'read Err(ChatwireError::Io(e)),
            },
        };

        for line in lines.push(&buf[..n]) {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Skipping chat line: {}", e);
                    continue;
                }
            };
            let msg = match Message::parse(&line) {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(%line, "Skipping malformed chat line: {}", e);
                    continue;
                }
            };

            watchdog.feed();
            tracing::debug!(command = %msg.command(), "Received chat line");

            if *msg.command() == Command::Ping {
                if let Err(e) = writer.send_unlimited(pong_for(&msg)).await {
                    break 'read ended(e);
                }
            }

            if let Err(e) = queue.enqueue(Arc::new(msg)).await {
                break 'read ended(e);
            }
        }
    };

    // Unterminated data is never emitted.
    lines.clear();
    cancel.cancel();
    queue.join().await;

    if let Err(e) = &result {
        tracing::error!("Chat read loop error: {}", e);
    }
    session.set_state(ConnectionState::Disconnected);
    let _ = session.events.send(ConnectionEvent::Disconnected);
    result
}

/// Cancellation is a normal way for the loop to end.
fn ended(e: ChatwireError) -> Result<()> {
    match e {
        ChatwireError::Cancelled => Ok(()),
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};

    struct Server {
        lines: tokio::io::Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Server {
        async fn send(&mut self, line: &str) {
            self.writer
                .write_all(format!("{line}\r\n").as_bytes())
                .await
                .unwrap();
        }

        async fn expect(&mut self) -> String {
            let line = self.lines.next_line().await.unwrap().unwrap();
            line.trim_end_matches('\r').to_string()
        }
    }

    fn connect(builder: IrcClientBuilder) -> (IrcClient, Server) {
        let (client_io, server_io) = duplex(64 * 1024);
        let client = builder.connect(client_io);
        let (read, writer) = tokio::io::split(server_io);
        let server = Server {
            lines: BufReader::new(read).lines(),
            writer,
        };
        (client, server)
    }

    #[test]
    fn test_pong_mirrors_ping_params() {
        let ping = Message::parse("PING :tmi.twitch.tv").unwrap();
        assert_eq!(pong_for(&ping), "PONG :tmi.twitch.tv");

        let ping = Message::parse("PING a :b c").unwrap();
        assert_eq!(pong_for(&ping), "PONG a :b c");

        let ping = Message::parse("PING").unwrap();
        assert_eq!(pong_for(&ping), "PONG");
    }

    #[test]
    fn test_anonymous_nick_format() {
        let mut rng = StdRng::seed_from_u64(7);
        let nick = anonymous_nick(&mut rng);
        assert!(nick.starts_with("justinfan"));
        assert_eq!(nick.len(), "justinfan".len() + 4);
        assert!(nick["justinfan".len()..].chars().all(|c| c.is_ascii_digit()));

        let mut again = StdRng::seed_from_u64(7);
        assert_eq!(anonymous_nick(&mut again), nick);
    }

    #[test]
    fn test_builder_configuration() {
        let builder = IrcClient::builder()
            .timeout(Duration::from_secs(30))
            .max_line_length(1024)
            .track_users(true)
            .membership_quiet_period(Duration::from_millis(500))
            .capabilities(["twitch.tv/tags"])
            .queue_capacity(16);

        assert_eq!(builder.config.timeout, Duration::from_secs(30));
        assert_eq!(builder.config.max_line_length, 1024);
        assert!(builder.config.track_users);
        assert_eq!(builder.config.capabilities, vec!["twitch.tv/tags"]);
        assert_eq!(builder.config.dispatch.queue_capacity, 16);
    }

    #[tokio::test]
    async fn test_ping_answered_with_pong() {
        let (client, mut server) = connect(IrcClient::builder());

        server.send("PING :tmi.twitch.tv").await;

        assert_eq!(server.expect().await, "PONG :tmi.twitch.tv");
        drop(client);
    }

    #[tokio::test]
    async fn test_authenticate_anonymous() {
        let (client, mut server) =
            connect(IrcClient::builder().rng(StdRng::seed_from_u64(42)));

        client.authenticate(None, None).await.unwrap();

        assert_eq!(server.expect().await, "PASS SCHMOOPIIE");
        let nick_line = server.expect().await;
        assert!(nick_line.starts_with("NICK justinfan"));
        assert_eq!(
            server.expect().await,
            "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership"
        );
        assert_eq!(format!("NICK {}", client.nick()), nick_line);
        assert_eq!(client.state(), ConnectionState::Authenticating);
    }

    #[tokio::test]
    async fn test_join_marks_joined_and_tracks_room_state() {
        let (client, mut server) = connect(IrcClient::builder());
        client
            .authenticate(Some("Me"), Some("oauth:abc"))
            .await
            .unwrap();
        client.join_channel("#Chan").await.unwrap();
        for _ in 0..4 {
            server.expect().await;
        }

        let mut states = client.state_changes();
        server.send(":me!me@me.tmi.twitch.tv JOIN #chan").await;
        server
            .send("@emote-only=0;followers-only=10;r9k=0;room-id=99;slow=3;subs-only=1 :tmi.twitch.tv ROOMSTATE #chan")
            .await;

        states
            .wait_for(|s| *s == ConnectionState::Joined("chan".to_string()))
            .await
            .unwrap();

        // Room state lands after the JOIN; wait for the dispatch.
        let mut room = None;
        for _ in 0..100 {
            room = client.room_state();
            if room.is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let room = room.unwrap();
        assert_eq!(room.room_id(), "99");
        assert_eq!(room.followers_only(), 10);
        assert_eq!(room.slow(), 3);
        assert!(room.subs_only());
    }

    #[tokio::test]
    async fn test_user_callback_runs_after_system_state() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let builder = IrcClient::builder().track_users(true);
        let (client, mut server) = connect(builder);

        let presence = client.presence();
        client.register_callback(Some(vec![Command::Join]), move |msg: Arc<Message>| {
            let seen = presence.contains(msg.nick());
            let tx = tx.clone();
            async move {
                let _ = tx.send(seen);
                Ok(())
            }
        });

        server.send(":newuser!newuser@newuser.tmi.twitch.tv JOIN #chan").await;

        assert_eq!(rx.recv().await, Some(true));
        assert_eq!(client.users(), vec!["newuser"]);
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let builder = IrcClient::builder().callback(None, move |msg: Arc<Message>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(msg.raw().to_string());
                Ok(())
            }
        });
        let (_client, mut server) = connect(builder);

        server.send("@unterminated-tags").await;
        server.send("PRIVMSG #c :after").await;

        assert_eq!(rx.recv().await.as_deref(), Some("PRIVMSG #c :after"));
    }

    #[tokio::test]
    async fn test_send_rejects_line_breaks() {
        let (client, _server) = connect(IrcClient::builder());
        assert!(matches!(
            client.send("PRIVMSG #c :a\r\nQUIT").await,
            Err(ChatwireError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_server_close_reports_disconnected() {
        let (client, server) = connect(IrcClient::builder());
        let mut events = client.events();

        drop(server);

        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Disconnected);
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.wait_for_shutdown().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_raises_timeout() {
        let (client, _server) = connect(IrcClient::builder().timeout(Duration::from_secs(5)));
        let mut events = client.events();

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(events.try_recv().unwrap(), ConnectionEvent::Timeout);
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_reconnect_command_emits_event() {
        let (client, mut server) = connect(IrcClient::builder());
        let mut events = client.events();

        server.send(":tmi.twitch.tv RECONNECT").await;

        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::ReconnectRequested
        );
    }
}
