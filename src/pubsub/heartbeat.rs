//! PubSub heartbeat.
//!
//! The server expects a PING at least every five minutes. The heartbeat
//! sends one on a jittered interval and waits a bounded time for the PONG.
//! A missed PONG is reported as [`ConnectionEvent::HeartbeatMissed`]; the
//! connection stays open.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

use super::message::PubSubMessage;
use crate::event::ConnectionEvent;
use crate::writer::WriterHandle;

/// Largest accepted jitter fraction.
pub const MAX_JITTER: f64 = 0.5;

/// Clamp a jitter fraction to `0.0..=MAX_JITTER`. NaN becomes zero.
pub fn clamp_jitter(jitter: f64) -> f64 {
    if jitter.is_nan() {
        return 0.0;
    }
    jitter.abs().min(MAX_JITTER)
}

/// `base` scaled by a random factor in `1 ± jitter`.
pub fn jittered<R: Rng + ?Sized>(base: Duration, jitter: f64, rng: &mut R) -> Duration {
    let jitter = clamp_jitter(jitter);
    let factor = 1.0 + rng.random_range(-jitter..=jitter);
    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(base)
}

pub struct Heartbeat {
    interval: Duration,
    jitter: f64,
    pong_timeout: Duration,
    pong: Notify,
    rng: Mutex<StdRng>,
}

impl Heartbeat {
    pub fn new(interval: Duration, jitter: f64, pong_timeout: Duration, rng: StdRng) -> Self {
        Self {
            interval,
            jitter,
            pong_timeout,
            pong: Notify::new(),
            rng: Mutex::new(rng),
        }
    }

    /// Called by the read loop for every PONG.
    pub fn pong_received(&self) {
        // Only an outstanding PING cares; unsolicited PONGs are not stored.
        self.pong.notify_waiters();
    }

    pub fn next_interval(&self) -> Duration {
        jittered(self.interval, self.jitter, &mut *self.rng.lock())
    }

    /// Run until `cancel` fires or the writer goes away.
    pub async fn run(
        self: Arc<Self>,
        writer: WriterHandle,
        events: broadcast::Sender<ConnectionEvent>,
        cancel: CancellationToken,
    ) {
        let ping = match PubSubMessage::ping().to_json() {
            Ok(ping) => ping,
            Err(e) => {
                tracing::error!("Cannot encode PING: {}", e);
                return;
            }
        };

        loop {
            let wait = self.next_interval();
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(wait) => {}
            }

            let pong = self.pong.notified();
            tokio::pin!(pong);
            pong.as_mut().enable();

            if let Err(e) = writer.send_unlimited(ping.clone()).await {
                tracing::debug!("Heartbeat stopped: {}", e);
                return;
            }
            tracing::debug!("Sent PubSub PING");

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = &mut pong => tracing::debug!("Received PubSub PONG"),
                _ = tokio::time::sleep(self.pong_timeout) => {
                    tracing::warn!(timeout = ?self.pong_timeout, "PubSub PONG missed");
                    let _ = events.send(ConnectionEvent::HeartbeatMissed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::spawn_writer_task;
    use crate::ws::memory_pair;
    use rand::SeedableRng;
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_secs(240);
    const PONG_TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn test_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let d = jittered(INTERVAL, 0.05, &mut rng);
            assert!(d >= Duration::from_secs(228), "{d:?}");
            assert!(d <= Duration::from_secs(252), "{d:?}");
        }
        assert_eq!(jittered(INTERVAL, 0.0, &mut rng), INTERVAL);
    }

    #[test]
    fn test_out_of_range_jitter_is_clamped() {
        assert_eq!(clamp_jitter(f64::NAN), 0.0);
        assert_eq!(clamp_jitter(-0.1), 0.1);
        assert_eq!(clamp_jitter(3.0), MAX_JITTER);

        let mut rng = StdRng::seed_from_u64(5);
        for jitter in [1.0, 2.5, f64::INFINITY, f64::NAN] {
            for _ in 0..100 {
                let d = jittered(INTERVAL, jitter, &mut rng);
                assert!(d >= INTERVAL / 2 && d <= INTERVAL * 3 / 2, "{jitter}: {d:?}");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_pong_reported_and_pings_continue() {
        let (mut peer, _source, sink) = memory_pair();
        let cancel = CancellationToken::new();
        let (writer, _task) = spawn_writer_task(sink, 8, None, cancel.clone());
        let (events, mut rx) = broadcast::channel(8);
        let heartbeat = Arc::new(Heartbeat::new(
            INTERVAL,
            0.05,
            PONG_TIMEOUT,
            StdRng::seed_from_u64(9),
        ));
        tokio::spawn(heartbeat.run(writer, events, cancel.clone()));

        let start = Instant::now();
        assert_eq!(peer.recv().await.as_deref(), Some(r#"{"type":"PING"}"#));
        let first = start.elapsed();
        assert!(first >= Duration::from_secs(228) && first <= Duration::from_secs(252));

        assert_eq!(rx.recv().await.unwrap(), ConnectionEvent::HeartbeatMissed);
        assert!(start.elapsed() >= first + PONG_TIMEOUT);

        // Still running: another PING follows.
        assert_eq!(peer.recv().await.as_deref(), Some(r#"{"type":"PING"}"#));
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_clears_the_wait() {
        let (mut peer, _source, sink) = memory_pair();
        let cancel = CancellationToken::new();
        let (writer, _task) = spawn_writer_task(sink, 8, None, cancel.clone());
        let (events, mut rx) = broadcast::channel(8);
        let heartbeat = Arc::new(Heartbeat::new(
            INTERVAL,
            0.05,
            PONG_TIMEOUT,
            StdRng::seed_from_u64(9),
        ));
        tokio::spawn(heartbeat.clone().run(writer, events, cancel.clone()));

        peer.recv().await.unwrap();
        heartbeat.pong_received();

        tokio::time::sleep(PONG_TIMEOUT * 2).await;
        assert!(rx.try_recv().is_err());
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_pong_does_not_count() {
        let (mut peer, _source, sink) = memory_pair();
        let cancel = CancellationToken::new();
        let (writer, _task) = spawn_writer_task(sink, 8, None, cancel.clone());
        let (events, mut rx) = broadcast::channel(8);
        let heartbeat = Arc::new(Heartbeat::new(
            INTERVAL,
            0.0,
            PONG_TIMEOUT,
            StdRng::seed_from_u64(9),
        ));
        tokio::spawn(heartbeat.clone().run(writer, events, cancel.clone()));

        // Arrives before any PING is outstanding.
        heartbeat.pong_received();

        peer.recv().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), ConnectionEvent::HeartbeatMissed);
        cancel.cancel();
    }
}
