//! Per-session liveness monitor (spec §4.2). Grounded on the Go original's
//! `xml.HeartbeatMonitor`: a last-seen timestamp updated from the read loop,
//! and a ticker task that fires the close callback exactly once on timeout.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Tracks the time of the most recently recorded heartbeat. `record` is
/// non-blocking and safe to call concurrently with the monitor ticker.
pub struct HeartbeatMonitor {
    last_seen: tokio::sync::Mutex<Instant>,
    timeout: Duration,
    check_interval: Duration,
}

impl HeartbeatMonitor {
    pub fn new(timeout: Duration, check_interval: Duration) -> Self {
        Self {
            last_seen: tokio::sync::Mutex::new(Instant::now()),
            timeout,
            check_interval,
        }
    }

    /// Records an inbound heartbeat. Non-blocking.
    pub async fn record_heartbeat(&self) {
        *self.last_seen.lock().await = Instant::now();
    }

    /// Runs the monitor loop until timeout or until `stop` is notified.
    /// Invokes `on_timeout` exactly once, then returns.
    pub async fn run(&self, stop: Arc<Notify>, on_timeout: impl FnOnce()) {
        let mut ticker = tokio::time::interval(self.check_interval);
        loop {
            tokio::select! {
                _ = stop.notified() => return,
                _ = ticker.tick() => {
                    let last_seen = *self.last_seen.lock().await;
                    if last_seen.elapsed() > self.timeout {
                        on_timeout();
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn fires_timeout_callback_exactly_once_after_silence() {
        let monitor = Arc::new(HeartbeatMonitor::new(
            Duration::from_millis(100),
            Duration::from_millis(20),
        ));
        let stop = Arc::new(Notify::new());
        let fired = Arc::new(AtomicBool::new(false));

        let fired_clone = fired.clone();
        let monitor_clone = monitor.clone();
        let stop_clone = stop.clone();
        let handle = tokio::spawn(async move {
            monitor_clone
                .run(stop_clone, move || {
                    fired_clone.store(true, Ordering::SeqCst);
                })
                .await;
        });

        tokio::time::advance(Duration::from_millis(250)).await;
        handle.await.unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn recorded_heartbeat_resets_timeout() {
        let monitor = Arc::new(HeartbeatMonitor::new(
            Duration::from_millis(100),
            Duration::from_millis(20),
        ));
        let stop = Arc::new(Notify::new());
        let fired = Arc::new(AtomicBool::new(false));

        let fired_clone = fired.clone();
        let monitor_clone = monitor.clone();
        let stop_clone = stop.clone();
        let handle = tokio::spawn(async move {
            monitor_clone
                .run(stop_clone, move || {
                    fired_clone.store(true, Ordering::SeqCst);
                })
                .await;
        });

        tokio::time::advance(Duration::from_millis(60)).await;
        monitor.record_heartbeat().await;
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(!fired.load(Ordering::SeqCst));

        stop.notify_one();
        handle.await.unwrap();
    }
}
