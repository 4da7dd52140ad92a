use std::sync::Arc;

use parking_lot::Mutex;
use run_tracker_lib::geo_path::GeoPath;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::{NotificationState, SessionState};

pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// A broadcast channel that remembers its last value.
///
/// New subscribers get the latest value first, then every later publish in order.
/// Publishing and subscribing share a lock, so a subscriber never misses or
/// duplicates the value published around the moment it joined.
pub struct ReplayChannel<T> {
    inner: Arc<ReplayInner<T>>,
}

struct ReplayInner<T> {
    latest: Mutex<Option<T>>,
    sender: broadcast::Sender<T>,
}

impl<T> Clone for ReplayChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> ReplayChannel<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(ReplayInner {
                latest: Mutex::new(None),
                sender,
            }),
        }
    }

    pub fn with_initial(capacity: usize, value: T) -> Self {
        let channel = Self::new(capacity);
        channel.publish(value);
        channel
    }

    pub fn publish(&self, value: T) {
        let mut latest = self.inner.latest.lock();
        *latest = Some(value.clone());
        // No receivers is fine, the value is still cached for replay.
        let _ = self.inner.sender.send(value);
    }

    pub fn latest(&self) -> Option<T> {
        self.inner.latest.lock().clone()
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let latest = self.inner.latest.lock();
        Subscription {
            replay: latest.clone(),
            receiver: self.inner.sender.subscribe(),
        }
    }
}

pub struct Subscription<T> {
    replay: Option<T>,
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Waits for the next value. `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<T> {
        if let Some(value) = self.replay.take() {
            return Some(value);
        }

        loop {
            match self.receiver.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscriber fell behind, {} updates skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// The next value if one is already waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        if let Some(value) = self.replay.take() {
            return Some(value);
        }

        loop {
            match self.receiver.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscriber fell behind, {} updates skipped", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Everything the session exposes to observers.
#[derive(Clone)]
pub struct StateBus {
    state: ReplayChannel<SessionState>,
    tracking: ReplayChannel<bool>,
    path: ReplayChannel<Arc<GeoPath>>,
    elapsed_millis: ReplayChannel<i64>,
    elapsed_seconds: ReplayChannel<i64>,
    notification: ReplayChannel<Option<NotificationState>>,
}

/// A consistent-enough view of the latest published values.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub state: SessionState,
    pub tracking: bool,
    pub path: Arc<GeoPath>,
    pub elapsed_millis: i64,
    pub elapsed_seconds: i64,
    pub notification: Option<NotificationState>,
}

impl StateBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: ReplayChannel::with_initial(capacity, SessionState::Idle),
            tracking: ReplayChannel::with_initial(capacity, false),
            path: ReplayChannel::with_initial(capacity, Arc::new(GeoPath::new())),
            elapsed_millis: ReplayChannel::with_initial(capacity, 0),
            elapsed_seconds: ReplayChannel::with_initial(capacity, 0),
            notification: ReplayChannel::with_initial(capacity, None),
        }
    }

    pub fn state(&self) -> &ReplayChannel<SessionState> {
        &self.state
    }

    pub fn tracking(&self) -> &ReplayChannel<bool> {
        &self.tracking
    }

    pub fn path(&self) -> &ReplayChannel<Arc<GeoPath>> {
        &self.path
    }

    pub fn elapsed_millis(&self) -> &ReplayChannel<i64> {
        &self.elapsed_millis
    }

    pub fn elapsed_seconds(&self) -> &ReplayChannel<i64> {
        &self.elapsed_seconds
    }

    pub fn notification(&self) -> &ReplayChannel<Option<NotificationState>> {
        &self.notification
    }

    /// The tracking flag always follows the state, so both go out together.
    pub(crate) fn publish_state(&self, state: SessionState) {
        self.state.publish(state);
        self.tracking.publish(state == SessionState::Tracking);
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            state: self.state.latest().unwrap_or(SessionState::Idle),
            tracking: self.tracking.latest().unwrap_or(false),
            path: self.path.latest().unwrap_or_default(),
            elapsed_millis: self.elapsed_millis.latest().unwrap_or(0),
            elapsed_seconds: self.elapsed_seconds.latest().unwrap_or(0),
            notification: self.notification.latest().flatten(),
        }
    }
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
