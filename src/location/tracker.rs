use anyhow::{bail, Context, Result};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::{PositionEvent, PositionStream, SubscriptionHandle};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Owns at most one live position subscription and the task pumping it.
#[derive(Default)]
pub struct LocationTracker {
    handle: Option<JoinHandle<()>>,
    subscription: Option<SubscriptionHandle>,
}

impl LocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a subscription is attached and not yet ended.
    pub fn is_active(&self) -> bool {
        self.subscription
            .as_ref()
            .map(SubscriptionHandle::is_active)
            .unwrap_or(false)
    }

    /// Starts pumping `stream` into `on_event`, one event at a time in
    /// arrival order.
    pub fn attach<F>(&mut self, stream: PositionStream, on_event: F) -> Result<()>
    where
        F: FnMut(PositionEvent) + Send + 'static,
    {
        if self.handle.is_some() {
            bail!("location subscription already active");
        }

        let runtime = Handle::try_current().context("no tokio runtime to drive position updates")?;

        let subscription = stream.handle();
        let handle = runtime.spawn(pump_positions(stream, subscription.clone(), on_event));

        self.handle = Some(handle);
        self.subscription = Some(subscription);
        log_debug!("position pump attached");
        Ok(())
    }

    /// Ends the subscription before returning; the pump task is aborted
    /// afterwards. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }

        if let Some(handle) = self.handle.take() {
            handle.abort();
            log_debug!("position pump released");
        }
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        self.release();
    }
}

async fn pump_positions<F>(mut stream: PositionStream, subscription: SubscriptionHandle, mut on_event: F)
where
    F: FnMut(PositionEvent),
{
    loop {
        tokio::select! {
            biased;
            _ = subscription.ended() => {
                log_debug!("position pump shutting down");
                break;
            }
            event = stream.next() => match event {
                Some(event) => on_event(event),
                None => {
                    log_warn!("position source closed the stream; no further fixes this session");
                    break;
                }
            },
        }
    }
    log_info!("position pump stopped");
}
