use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::LocationError;

use super::{PositionEvent, PositionFix, PositionSink, PositionSource, PositionStream};

/// Push-based source for wiring a platform GPS callback into the recorder.
///
/// The platform bridge calls [`push_fix`](Self::push_fix) /
/// [`push_error`](Self::push_error) from whatever thread the sensor uses;
/// every live subscription receives the event.
pub struct ChannelPositionSource {
    authorized: AtomicBool,
    subscribe_failure: Mutex<Option<String>>,
    subscribers: Mutex<Vec<PositionSink>>,
    subscribe_calls: AtomicUsize,
}

impl Default for ChannelPositionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelPositionSource {
    pub fn new() -> Self {
        Self {
            authorized: AtomicBool::new(true),
            subscribe_failure: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            subscribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }

    /// Makes subsequent `subscribe` calls fail with `reason`; `None` clears it.
    pub fn set_subscribe_failure(&self, reason: Option<String>) {
        *lock(&self.subscribe_failure) = reason;
    }

    /// Returns how many subscriptions received the fix.
    pub fn push_fix(&self, fix: PositionFix) -> usize {
        self.broadcast(Ok(fix))
    }

    pub fn push_error(&self, error: LocationError) -> usize {
        self.broadcast(Err(error))
    }

    /// Subscriptions that have not been unsubscribed or dropped.
    pub fn active_subscriptions(&self) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|sink| !sink.is_closed());
        subscribers.len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    fn broadcast(&self, event: PositionEvent) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|sink| sink.send(event.clone()).is_ok());
        subscribers.len()
    }
}

impl PositionSource for ChannelPositionSource {
    fn authorize(&self) -> impl Future<Output = Result<(), LocationError>> + Send {
        let granted = self.authorized.load(Ordering::SeqCst);
        async move {
            if granted {
                Ok(())
            } else {
                Err(LocationError::AuthorizationDenied)
            }
        }
    }

    fn subscribe(&self) -> Result<PositionStream, LocationError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = lock(&self.subscribe_failure).clone() {
            return Err(LocationError::Unavailable(reason));
        }

        let (sink, stream) = PositionStream::channel();
        lock(&self.subscribers).push(sink);
        Ok(stream)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fans_out_to_live_subscribers() {
        let source = ChannelPositionSource::new();
        let mut a = source.subscribe().unwrap();
        let b = source.subscribe().unwrap();
        assert_eq!(source.active_subscriptions(), 2);

        drop(b);
        assert_eq!(source.push_fix(PositionFix::now(1.0, 1.0, 4.0)), 1);
        assert_eq!(source.active_subscriptions(), 1);

        let event = a.next().await.unwrap().unwrap();
        assert_eq!(event.latitude, 1.0);
        assert_eq!(source.subscribe_calls(), 2);
    }

    #[test]
    fn unsubscribed_stream_stops_counting_before_it_is_dropped() {
        let source = ChannelPositionSource::new();
        let stream = source.subscribe().unwrap();
        stream.handle().unsubscribe();

        assert_eq!(source.active_subscriptions(), 0);
        assert_eq!(source.push_fix(PositionFix::now(1.0, 1.0, 4.0)), 0);
        drop(stream);
    }

    #[tokio::test]
    async fn denies_authorization_when_configured() {
        let source = ChannelPositionSource::new();
        source.set_authorized(false);
        assert_eq!(source.authorize().await, Err(LocationError::AuthorizationDenied));
    }

    #[test]
    fn subscribe_failure_is_reported() {
        let source = ChannelPositionSource::new();
        source.set_subscribe_failure(Some("gps off".into()));
        assert!(matches!(source.subscribe(), Err(LocationError::Unavailable(_))));
        assert_eq!(source.active_subscriptions(), 0);
    }
}
