use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::LocationError;

use super::PositionFix;

/// One item delivered by a position subscription: a fix or a sensor error.
pub type PositionEvent = Result<PositionFix, LocationError>;

/// Platform location backend.
///
/// Implementations decide their own sampling policy; consumers assume only
/// that events arrive asynchronously and irregularly.
pub trait PositionSource: Send + Sync + 'static {
    /// Resolves once location access has been granted, or fails with
    /// [`LocationError::AuthorizationDenied`].
    fn authorize(&self) -> impl Future<Output = Result<(), LocationError>> + Send;

    /// Opens a new subscription. It ends when the returned stream is dropped
    /// or its [`SubscriptionHandle`] is unsubscribed.
    fn subscribe(&self) -> Result<PositionStream, LocationError>;
}

/// Unsubscribes a [`PositionStream`] without owning it.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    token: CancellationToken,
}

impl SubscriptionHandle {
    /// Ends the subscription immediately. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Completes once the subscription has ended.
    pub async fn ended(&self) {
        self.token.cancelled().await
    }
}

/// Source-side half of a subscription.
#[derive(Debug, Clone)]
pub struct PositionSink {
    sender: mpsc::UnboundedSender<PositionEvent>,
    token: CancellationToken,
}

impl PositionSink {
    /// Hands the event back if the subscriber is gone.
    pub fn send(&self, event: PositionEvent) -> Result<(), PositionEvent> {
        if self.is_closed() {
            return Err(event);
        }
        self.sender.send(event).map_err(|err| err.0)
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.sender.is_closed()
    }

    /// Completes once the subscriber unsubscribes or drops its stream.
    pub async fn closed(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = self.sender.closed() => {}
        }
    }
}

/// Receiving half of a position subscription.
#[derive(Debug)]
pub struct PositionStream {
    receiver: mpsc::UnboundedReceiver<PositionEvent>,
    token: CancellationToken,
}

impl PositionStream {
    /// Creates a connected sink/stream pair for source implementations.
    pub fn channel() -> (PositionSink, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        (
            PositionSink {
                sender,
                token: token.clone(),
            },
            Self { receiver, token },
        )
    }

    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            token: self.token.clone(),
        }
    }

    /// Next event in arrival order; `None` once the source has hung up or
    /// the subscription was ended.
    pub async fn next(&mut self) -> Option<PositionEvent> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            event = self.receiver.recv() => event,
        }
    }
}

impl Drop for PositionStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
