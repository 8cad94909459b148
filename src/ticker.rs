use std::time::Duration;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Periodic callback driver for the session clock.
///
/// The first tick fires one full period after `start`, never immediately.
pub struct Ticker {
    period: Duration,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawns the tick loop. Calling this while already running keeps the
    /// existing loop and its callback.
    pub fn start<F>(&mut self, mut on_tick: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        if self.handle.is_some() {
            return Ok(());
        }

        let runtime = Handle::try_current().context("no tokio runtime to drive the session clock")?;
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let period = self.period;

        let handle = runtime.spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => on_tick(),
                }
            }
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Stops the loop. Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counting_ticker() -> (Ticker, Arc<AtomicU32>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        (
            Ticker::new(Duration::from_secs(1)),
            count,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let (mut ticker, count, on_tick) = counting_ticker();
        ticker.start(on_tick).unwrap();

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let (mut ticker, count, on_tick) = counting_ticker();
        ticker.start(on_tick).unwrap();
        time::sleep(Duration::from_millis(1500)).await;

        ticker.stop();
        ticker.stop();
        assert!(!ticker.is_running());

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_start_keeps_single_loop() {
        let (mut ticker, count, on_tick) = counting_ticker();
        ticker.start(on_tick).unwrap();
        let extra = count.clone();
        ticker
            .start(move || {
                extra.fetch_add(100, Ordering::SeqCst);
            })
            .unwrap();

        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn start_outside_runtime_fails() {
        let (mut ticker, _count, on_tick) = counting_ticker();
        assert!(ticker.start(on_tick).is_err());
        assert!(!ticker.is_running());
    }
}
