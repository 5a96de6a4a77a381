//! Dedicated writer task for outbound protocol units.
//!
//! Senders never touch the transport directly. They push units into an
//! mpsc channel drained by one writer task, which batches whatever is ready
//! into a single write.
//!
//! ```text
//! send()  ─┐
//! PONG    ─┼─► mpsc::Sender<String> ─► Writer Task ─► UnitSink
//! LISTEN  ─┘
//! ```
//!
//! User sends pass through the optional [`RateLimiter`] first; protocol
//! replies such as PONG use [`WriterHandle::send_unlimited`].

use std::io::IoSlice;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::BoxFuture;
use crate::error::{ChatwireError, Result};
use crate::ratelimit::RateLimiter;
use crate::ws::{BoxSink, CLOSE_TIMEOUT};

/// Maximum units to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

const CRLF: &[u8] = b"\r\n";

/// Destination for batches of outbound units.
pub trait UnitSink: Send + 'static {
    /// Write every unit in order.
    fn write_batch<'a>(&'a mut self, batch: &'a [String]) -> BoxFuture<'a, Result<()>>;

    /// Shut the transport down after the last batch.
    fn shutdown(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Chat sink: each unit becomes one CR LF terminated line.
pub struct LineSink<W> {
    writer: W,
}

impl<W> LineSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W> UnitSink for LineSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn write_batch<'a>(&'a mut self, batch: &'a [String]) -> BoxFuture<'a, Result<()>> {
        Box::pin(write_lines(&mut self.writer, batch))
    }

    fn shutdown(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.writer.shutdown().await?;
            Ok(())
        })
    }
}

impl UnitSink for BoxSink {
    fn write_batch<'a>(&'a mut self, batch: &'a [String]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for unit in batch {
                self.send_text(unit.clone()).await?;
            }
            Ok(())
        })
    }

    fn shutdown(&mut self) -> BoxFuture<'_, Result<()>> {
        self.close()
    }
}

/// Handle for sending units to the writer task.
///
/// This is cheaply cloneable and can be shared across callbacks.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<String>,
    limiter: Option<RateLimiter>,
    cancel: CancellationToken,
}

impl WriterHandle {
    /// Send a unit, taking a rate-limit token first if a limiter is set.
    pub async fn send(&self, unit: impl Into<String>) -> Result<()> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire(&self.cancel).await?;
        }
        self.send_unlimited(unit).await
    }

    /// Send a unit without touching the rate limiter.
    pub async fn send_unlimited(&self, unit: impl Into<String>) -> Result<()> {
        let unit = unit.into();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ChatwireError::Cancelled),
            sent = self.tx.send(unit) => sent.map_err(|_| ChatwireError::ConnectionClosed),
        }
    }

    /// Queue a unit without waiting, bypassing the rate limiter.
    pub fn try_send(&self, unit: impl Into<String>) -> Result<()> {
        self.tx.try_send(unit.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                ChatwireError::Protocol("send queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => ChatwireError::ConnectionClosed,
        })
    }

    pub fn limiter(&self) -> Option<&RateLimiter> {
        self.limiter.as_ref()
    }

    /// Check if the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending units.
///
/// The task stops when every handle is dropped or `cancel` fires. A write
/// failure cancels the connection.
pub fn spawn_writer_task<S>(
    sink: S,
    capacity: usize,
    limiter: Option<RateLimiter>,
    cancel: CancellationToken,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    S: UnitSink,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = WriterHandle {
        tx,
        limiter,
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(writer_loop(rx, sink, cancel));
    (handle, task)
}

/// Main writer loop - receives units and writes them in batches.
async fn writer_loop<S>(
    mut rx: mpsc::Receiver<String>,
    mut sink: S,
    cancel: CancellationToken,
) -> Result<()>
where
    S: UnitSink,
{
    loop {
        let first = tokio::select! {
            biased;
            unit = rx.recv() => match unit {
                Some(unit) => unit,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(unit) => batch.push(unit),
                Err(_) => break,
            }
        }

        tracing::trace!(units = batch.len(), "Writing batch");
        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(units = batch.len(), "Dropping unwritten batch on cancel");
                break;
            }
            written = sink.write_batch(&batch) => written,
        };
        if let Err(e) = written {
            tracing::error!("Write failed: {}", e);
            cancel.cancel();
            return Err(e);
        }
    }

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Transport shutdown failed: {}", e),
        Err(_) => tracing::debug!("Transport shutdown timed out"),
    }
    Ok(())
}

/// Write a batch of lines using scatter/gather I/O (write_vectored).
async fn write_lines<W>(writer: &mut W, batch: &[String]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let total_size: usize = batch.iter().map(|u| u.len() + CRLF.len()).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(ChatwireError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data not yet written.
fn build_remaining_slices(batch: &[String], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for unit in batch {
        for part in [unit.as_bytes(), CRLF] {
            let end = offset + part.len();
            if skip_bytes < end && !part.is_empty() {
                let start = skip_bytes.saturating_sub(offset);
                slices.push(IoSlice::new(&part[start..]));
            }
            offset = end;
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    fn units(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_remaining_slices_no_skip() {
        let batch = units(&["PING", "PONG"]);
        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 4);
    }

    #[test]
    fn test_build_remaining_slices_partial_unit() {
        let batch = units(&["PING :x"]);
        let slices = build_remaining_slices(&batch, 5);
        assert_eq!(slices.len(), 2);
        assert_eq!(&*slices[0], b":x");
        assert_eq!(&*slices[1], b"\r\n");
    }

    #[test]
    fn test_build_remaining_slices_inside_terminator() {
        let batch = units(&["AB", "CD"]);
        let slices = build_remaining_slices(&batch, 3);
        assert_eq!(slices.len(), 3);
        assert_eq!(&*slices[0], b"\n");
        assert_eq!(&*slices[1], b"CD");
    }

    #[tokio::test]
    async fn test_write_lines_appends_crlf() {
        let mut buf = Cursor::new(Vec::new());

        write_lines(&mut buf, &units(&["PASS oauth:x", "NICK user"]))
            .await
            .unwrap();

        assert_eq!(buf.into_inner(), b"PASS oauth:x\r\nNICK user\r\n");
    }

    #[tokio::test]
    async fn test_writer_task_batches_in_order() {
        let (client, mut server) = duplex(4096);
        let cancel = CancellationToken::new();
        let (handle, _task) = spawn_writer_task(LineSink::new(client), 64, None, cancel);

        for i in 0..10 {
            handle.send(format!("PRIVMSG #c :{i}")).await.unwrap();
        }

        let expected: String = (0..10).map(|i| format!("PRIVMSG #c :{i}\r\n")).collect();
        let mut buf = vec![0u8; expected.len()];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_waits_for_rate_limit_but_unlimited_does_not() {
        let (client, mut server) = duplex(4096);
        let cancel = CancellationToken::new();
        let limiter = RateLimiter::new(1, Duration::from_secs(30));
        let (handle, _task) =
            spawn_writer_task(LineSink::new(client), 64, Some(limiter.clone()), cancel);

        handle.send("PRIVMSG #c :one").await.unwrap();

        let blocked = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.send("PRIVMSG #c :two").await })
        };
        tokio::task::yield_now().await;

        handle.send_unlimited("PONG :tmi.twitch.tv").await.unwrap();

        let mut buf = vec![0u8; "PRIVMSG #c :one\r\nPONG :tmi.twitch.tv\r\n".len()];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, b"PRIVMSG #c :one\r\nPONG :tmi.twitch.tv\r\n");
        assert!(!blocked.is_finished());

        blocked.await.unwrap().unwrap();
        assert_eq!(limiter.available(), 0);
    }

    #[tokio::test]
    async fn test_send_after_cancel_fails() {
        let (client, _server) = duplex(64);
        let cancel = CancellationToken::new();
        let (handle, task) = spawn_writer_task(LineSink::new(client), 8, None, cancel.clone());

        cancel.cancel();

        assert!(matches!(
            handle.send("late").await,
            Err(ChatwireError::Cancelled)
        ));
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, mut server) = duplex(64);
        let (handle, task) =
            spawn_writer_task(LineSink::new(client), 8, None, CancellationToken::new());

        drop(handle);

        assert!(task.await.unwrap().is_ok());
        let mut buf = Vec::new();
        assert_eq!(server.read_to_end(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_writer_blocked_on_full_transport() {
        // The peer never reads, so the write cannot complete.
        let (client, _server) = duplex(16);
        let cancel = CancellationToken::new();
        let (handle, task) = spawn_writer_task(LineSink::new(client), 8, None, cancel.clone());

        handle.send_unlimited("x".repeat(50)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!task.is_finished());

        cancel.cancel();
        let finished = tokio::time::timeout(Duration::from_secs(2), task).await;
        assert!(finished.unwrap().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_ws_sink_writes_each_unit() {
        let (mut peer, _source, sink) = crate::ws::memory_pair();
        let (handle, _task) = spawn_writer_task(sink, 8, None, CancellationToken::new());

        handle.send(r#"{"type":"PING"}"#).await.unwrap();
        handle.send(r#"{"type":"LISTEN"}"#).await.unwrap();

        assert_eq!(peer.recv().await.as_deref(), Some(r#"{"type":"PING"}"#));
        assert_eq!(peer.recv().await.as_deref(), Some(r#"{"type":"LISTEN"}"#));
    }
}
