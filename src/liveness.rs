//! Silence detection.
//!
//! A [`Watchdog`] is a single-shot timer reset by every parsed unit. When
//! the window elapses without a [`feed`](Watchdog::feed) it calls its
//! timeout hook once and then stays quiet until fed again. What to do about
//! the silence is left to the owner.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

struct State {
    last_fed: Instant,
    timeout: Duration,
    armed: bool,
}

impl State {
    fn deadline(&self) -> Option<Instant> {
        self.armed.then(|| self.last_fed + self.timeout)
    }
}

struct Shared {
    state: Mutex<State>,
    wake: Notify,
}

/// Handle to a running watchdog. Clones share the same timer.
#[derive(Clone)]
pub struct Watchdog {
    shared: Arc<Shared>,
}

impl Watchdog {
    /// Spawn an armed watchdog. `on_timeout` runs on the watchdog task each
    /// time the window elapses unfed.
    pub fn spawn<F>(timeout: Duration, cancel: CancellationToken, on_timeout: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                last_fed: Instant::now(),
                timeout,
                armed: true,
            }),
            wake: Notify::new(),
        });

        tokio::spawn(watch_loop(shared.clone(), cancel, on_timeout));

        Self { shared }
    }

    /// Record activity and re-arm.
    pub fn feed(&self) {
        let was_armed = {
            let mut state = self.shared.state.lock();
            state.last_fed = Instant::now();
            std::mem::replace(&mut state.armed, true)
        };
        // An armed timer only moves later; the loop re-reads it on wake.
        if !was_armed {
            self.shared.wake.notify_one();
        }
    }

    /// Change the window. Takes effect relative to the last feed.
    pub fn set_timeout(&self, timeout: Duration) {
        self.shared.state.lock().timeout = timeout;
        self.shared.wake.notify_one();
    }

    pub fn timeout(&self) -> Duration {
        self.shared.state.lock().timeout
    }

    /// `false` after a timeout fired and before the next feed.
    pub fn is_armed(&self) -> bool {
        self.shared.state.lock().armed
    }
}

async fn watch_loop<F>(shared: Arc<Shared>, cancel: CancellationToken, on_timeout: F)
where
    F: Fn() + Send + Sync + 'static,
{
    loop {
        let deadline = shared.state.lock().deadline();

        match deadline {
            Some(deadline) => {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = shared.wake.notified() => {}
                    () = sleep_until(deadline) => {
                        let fired = {
                            let mut state = shared.state.lock();
                            match state.deadline() {
                                Some(current) if current <= Instant::now() => {
                                    state.armed = false;
                                    true
                                }
                                _ => false,
                            }
                        };
                        if fired {
                            tracing::warn!("Liveness window elapsed without traffic");
                            on_timeout();
                        }
                    }
                }
            }
            None => {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = shared.wake.notified() => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_watchdog(timeout: Duration) -> (Watchdog, Arc<AtomicUsize>, CancellationToken) {
        let fired = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let counter = fired.clone();
        let watchdog = Watchdog::spawn(timeout, cancel.clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (watchdog, fired, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_when_silent() {
        let (watchdog, fired, _cancel) = counting_watchdog(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!watchdog.is_armed());

        // Single-shot: no repeat while unfed.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feeding_postpones_timeout() {
        let (watchdog, fired, _cancel) = counting_watchdog(Duration::from_secs(5));

        for _ in 0..10 {
            tokio::time::sleep(Duration::from_secs(3)).await;
            watchdog.feed();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_rearms_after_timeout() {
        let (watchdog, fired, _cancel) = counting_watchdog(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(6)).await;
        watchdog.feed();
        assert!(watchdog.is_armed());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_timeout_shortens_window() {
        let (watchdog, fired, _cancel) = counting_watchdog(Duration::from_secs(600));

        tokio::time::sleep(Duration::from_secs(1)).await;
        watchdog.set_timeout(Duration::from_secs(10));
        assert_eq!(watchdog.timeout(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_watchdog() {
        let (_watchdog, fired, cancel) = counting_watchdog(Duration::from_secs(5));

        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
