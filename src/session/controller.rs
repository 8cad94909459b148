use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{watch, Mutex as AsyncMutex};
use uuid::Uuid;

use crate::{
    error::{LocationError, SessionError},
    location::{LocationTracker, PositionEvent, PositionSource},
    settings::RecorderSettings,
    ticker::Ticker,
};

use super::{ActivitySummary, ActivityType, RecordingState, SessionModel};

/// Handle returned by [`SessionController::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SessionModel) + Send + Sync + 'static>;

struct SessionInner {
    model: SessionModel,
    /// Bumped whenever sensor/clock resources are acquired or released.
    /// Events tagged with an older generation are ignored.
    generation: u64,
    tracker: LocationTracker,
    ticker: Ticker,
    last_error: Option<String>,
    /// Snapshots waiting for `on_change` listeners, in mutation order.
    outbox: VecDeque<SessionModel>,
    updates: watch::Sender<SessionModel>,
}

impl SessionInner {
    fn publish(&mut self) {
        self.updates.send_replace(self.model.clone());
        self.outbox.push_back(self.model.clone());
    }

    fn release_resources(&mut self) {
        if self.tracker.is_active() || self.ticker.is_running() {
            debug!("Releasing location subscription and session clock");
        }
        self.tracker.release();
        self.ticker.stop();
        self.generation = self.generation.wrapping_add(1);
    }
}

struct Shared {
    state: Mutex<SessionInner>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
    /// Held by whichever thread is currently draining the outbox.
    delivery: Mutex<()>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SessionInner> {
        lock(&self.state)
    }

    /// Hands queued snapshots to listeners with no state lock held.
    ///
    /// Only one caller drains at a time. A caller that finds the drain busy
    /// (including a listener calling back into the controller) leaves its
    /// snapshot queued for the active drainer, so listeners see snapshots in
    /// mutation order.
    fn deliver(&self) {
        loop {
            let gate = match self.delivery.try_lock() {
                Ok(gate) => gate,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };

            loop {
                let batch: Vec<SessionModel> = self.state().outbox.drain(..).collect();
                if batch.is_empty() {
                    break;
                }
                let listeners: Vec<Listener> = lock(&self.listeners)
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect();
                for model in &batch {
                    for listener in &listeners {
                        listener(model);
                    }
                }
            }

            drop(gate);
            if self.state().outbox.is_empty() {
                return;
            }
        }
    }
}

/// Drives one recording: owns the model, the position subscription and the
/// one-second clock.
///
/// Every mutation happens under a single lock, so operations, clock ticks and
/// position fixes are applied one at a time. Listeners registered with
/// [`on_change`](Self::on_change) are called after that lock is released and
/// receive snapshots in mutation order; they may call back into the
/// controller.
pub struct SessionController<S: PositionSource> {
    source: Arc<S>,
    shared: Arc<Shared>,
    start_gate: Arc<AsyncMutex<()>>,
    settings: RecorderSettings,
}

impl<S: PositionSource> Clone for SessionController<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            shared: Arc::clone(&self.shared),
            start_gate: Arc::clone(&self.start_gate),
            settings: self.settings.clone(),
        }
    }
}

impl<S: PositionSource> SessionController<S> {
    pub fn new(source: Arc<S>, settings: RecorderSettings) -> Self {
        let model = SessionModel::default();
        let (updates, _) = watch::channel(model.clone());

        Self {
            source,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionInner {
                    model,
                    generation: 0,
                    tracker: LocationTracker::new(),
                    ticker: Ticker::new(settings.tick_interval()),
                    last_error: None,
                    outbox: VecDeque::new(),
                    updates,
                }),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                delivery: Mutex::new(()),
            }),
            start_gate: Arc::new(AsyncMutex::new(())),
            settings,
        }
    }

    pub fn get_model(&self) -> SessionModel {
        self.lock().model.clone()
    }

    /// Latest-state channel; the receiver always holds the newest model.
    pub fn subscribe(&self) -> watch::Receiver<SessionModel> {
        self.lock().updates.subscribe()
    }

    pub fn on_change<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&SessionModel) + Send + Sync + 'static,
    {
        let id = ListenerId(self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.listeners).push((id, Arc::new(callback)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.shared.listeners);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Most recent sensor problem swallowed during this session, if any.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Metrics of a completed session; `None` in every other state.
    pub fn get_summary(&self) -> Option<ActivitySummary> {
        self.lock().model.summary()
    }

    pub fn has_minimum_data(&self) -> bool {
        self.lock()
            .model
            .meets_threshold(self.settings.min_fixes, self.settings.min_distance_meters)
    }

    /// Begins a new recording once location access is authorized.
    ///
    /// A failing sensor subscription does not stop the session: it records
    /// time without fixes.
    pub async fn start(&self) -> Result<(), SessionError> {
        let _gate = self.start_gate.lock().await;

        {
            let inner = self.lock();
            if inner.model.state != RecordingState::Idle {
                return Err(SessionError::NotIdle(inner.model.state));
            }
        }

        if let Err(err) = self.source.authorize().await {
            warn!("Location authorization failed: {err}");
            return Err(SessionError::AuthorizationDenied(match err {
                LocationError::AuthorizationDenied => err,
                other => LocationError::Unavailable(other.to_string()),
            }));
        }

        {
            let mut inner = self.lock();
            if inner.model.state != RecordingState::Idle {
                return Err(SessionError::NotIdle(inner.model.state));
            }

            let session_id = Uuid::new_v4().to_string();
            inner.model.begin(session_id.clone(), Utc::now());
            inner.last_error = None;
            self.acquire_resources(&mut inner);

            info!(
                "Recording started: session {} ({})",
                session_id,
                inner.model.activity_type.as_str()
            );
            inner.publish();
        }

        self.shared.deliver();
        Ok(())
    }

    pub fn pause(&self) -> bool {
        self.apply("paused", |model| model.pause())
    }

    pub fn resume(&self) -> bool {
        self.apply("resumed", |model| model.resume())
    }

    /// Stops the sensor and clock, then marks the session completed. The
    /// subscription is gone by the time this returns.
    pub fn finish(&self) -> bool {
        {
            let mut inner = self.lock();
            if !inner.model.state.is_active() {
                return false;
            }

            inner.release_resources();
            inner.model.complete();

            info!(
                "Recording finished: {}s, {:.1}m, {} fixes",
                inner.model.elapsed_seconds,
                inner.model.total_distance_meters,
                inner.model.positions.len()
            );
            inner.publish();
        }

        self.shared.deliver();
        true
    }

    /// Reopens a completed session as paused, with sensor and clock running
    /// again.
    pub fn resume_from_completed(&self) -> bool {
        {
            let mut inner = self.lock();
            if !inner.model.reopen() {
                return false;
            }

            self.acquire_resources(&mut inner);

            info!("Completed session reopened");
            inner.publish();
        }

        self.shared.deliver();
        true
    }

    /// Drops the session from any state and returns to idle.
    pub fn discard(&self) -> bool {
        {
            let mut inner = self.lock();
            let previous = inner.model.state;

            inner.release_resources();
            inner.model.reset();
            inner.last_error = None;

            info!("Session discarded (was {})", previous.as_str());
            inner.publish();
        }

        self.shared.deliver();
        true
    }

    pub fn reset_to_idle(&self) -> bool {
        self.apply("reset to idle", |model| {
            if model.state != RecordingState::Completed {
                return false;
            }
            model.reset();
            true
        })
    }

    pub fn set_activity_type(&self, activity_type: ActivityType) -> bool {
        self.apply("activity type changed", |model| model.set_activity_type(activity_type))
    }

    fn apply<F>(&self, label: &str, transition: F) -> bool
    where
        F: FnOnce(&mut SessionModel) -> bool,
    {
        {
            let mut inner = self.lock();
            if !transition(&mut inner.model) {
                debug!("Ignoring '{label}' transition while {}", inner.model.state.as_str());
                return false;
            }

            info!("Session {label}: now {}", inner.model.state.as_str());
            inner.publish();
        }

        self.shared.deliver();
        true
    }

    /// Subscribes to the source and starts the clock for a new generation.
    /// Failures are logged and leave the session running without them.
    fn acquire_resources(&self, inner: &mut SessionInner) {
        inner.release_resources();
        let generation = inner.generation;

        match self.source.subscribe() {
            Ok(stream) => {
                let shared = Arc::downgrade(&self.shared);
                let attached = inner.tracker.attach(stream, move |event| {
                    if let Some(shared) = shared.upgrade() {
                        handle_position_event(&shared, generation, event);
                    }
                });
                if let Err(err) = attached {
                    error!("Failed to attach position updates: {err:#}");
                    inner.last_error = Some(err.to_string());
                }
            }
            Err(err) => {
                error!("Location subscription failed; recording without fixes: {err}");
                inner.last_error = Some(err.to_string());
            }
        }

        let shared = Arc::downgrade(&self.shared);
        let started = inner.ticker.start(move || {
            if let Some(shared) = shared.upgrade() {
                handle_tick(&shared, generation);
            }
        });
        if let Err(err) = started {
            error!("Failed to start session clock: {err:#}");
            inner.last_error = Some(err.to_string());
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.shared.state()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn handle_tick(shared: &Shared, generation: u64) {
    {
        let mut inner = shared.state();
        if inner.generation != generation || !inner.model.record_tick() {
            return;
        }
        inner.publish();
    }
    shared.deliver();
}

fn handle_position_event(shared: &Shared, generation: u64, event: PositionEvent) {
    {
        let mut inner = shared.state();
        if inner.generation != generation {
            return;
        }

        match event.and_then(|fix| fix.validate().map(|_| fix)) {
            Ok(fix) => {
                if !inner.model.record_fix(fix) {
                    return;
                }
                debug!(
                    "Fix #{} accepted, total {:.1}m",
                    inner.model.positions.len(),
                    inner.model.total_distance_meters
                );
                inner.publish();
            }
            Err(err) => {
                warn!("Position update ignored: {err}");
                inner.last_error = Some(err.to_string());
                return;
            }
        }
    }
    shared.deliver();
}
