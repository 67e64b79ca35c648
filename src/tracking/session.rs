//! Tracking session lifecycle
//!
//! `Idle -> Requesting -> Active | Error`, and `stop()` returns to `Idle` from
//! anywhere. While active, a producer task owns the source, polls it at the
//! capture rate and publishes one `faceTracking` event per fresh sample.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::features;
use super::{FaceTrackingSource, PermissionProvider, SensorKind};
use crate::bridge::{BridgeEvent, EventBus};
use crate::error::TrackingError;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Requesting,
    Active,
    Error(String),
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Requesting => write!(f, "requesting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

struct Producer {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Box<dyn FaceTrackingSource>>,
}

struct SessionInner {
    /// Present whenever no producer task holds the source
    source: Option<Box<dyn FaceTrackingSource>>,
    producer: Option<Producer>,
}

/// Capture-side tracking lifecycle
pub struct TrackingSession {
    inner: tokio::sync::Mutex<SessionInner>,
    state: Mutex<SessionState>,
    permissions: Arc<dyn PermissionProvider>,
    events: Arc<EventBus>,
    frame_interval: Duration,
}

impl TrackingSession {
    pub fn new(
        source: Box<dyn FaceTrackingSource>,
        permissions: Arc<dyn PermissionProvider>,
        events: Arc<EventBus>,
        capture_fps: u32,
    ) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(SessionInner {
                source: Some(source),
                producer: None,
            }),
            state: Mutex::new(SessionState::Idle),
            permissions,
            events,
            frame_interval: Duration::from_secs_f64(1.0 / capture_fps.max(1) as f64),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// Whether frames are actively being produced
    pub fn status(&self) -> bool {
        *self.state.lock() == SessionState::Active
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock();
        if *state != next {
            tracing::info!("Tracking session: {} -> {}", *state, next);
            *state = next;
        }
    }

    fn fail(&self, error: TrackingError) -> TrackingError {
        tracing::warn!("Face tracking failed to start: {}", error);
        self.set_state(SessionState::Error(error.to_string()));
        error
    }

    /// Whether the capture backend can run on this host
    pub async fn is_available(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.producer.is_some() {
            return true;
        }
        let Some(source) = inner.source.take() else {
            return false;
        };
        match check_availability(source).await {
            Some((source, available)) => {
                inner.source = Some(source);
                available
            }
            None => false,
        }
    }

    /// Start tracking. Starting an active session is a successful no-op.
    pub async fn start(&self) -> Result<(), TrackingError> {
        let mut inner = self.inner.lock().await;
        if inner.producer.is_some() && self.status() {
            return Ok(());
        }

        self.set_state(SessionState::Requesting);

        let checked = match inner.source.take() {
            Some(source) => check_availability(source).await,
            None => None,
        };
        let Some((mut source, available)) = checked else {
            return Err(self.fail(TrackingError::DeviceUnsupported(
                "tracking source is no longer available".to_string(),
            )));
        };

        if !available {
            let name = source.name();
            inner.source = Some(source);
            return Err(self.fail(TrackingError::DeviceUnsupported(format!(
                "{} face tracking is not available on this device",
                name
            ))));
        }

        if source.requires_permission() && !self.permissions.request(SensorKind::Camera) {
            inner.source = Some(source);
            return Err(self.fail(TrackingError::PermissionDenied(
                "camera access was refused".to_string(),
            )));
        }

        if let Err(e) = source.start() {
            source.stop();
            inner.source = Some(source);
            return Err(self.fail(e));
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_producer(
            source,
            Arc::clone(&self.events),
            self.frame_interval,
            shutdown_rx,
        ));

        inner.producer = Some(Producer {
            shutdown: shutdown_tx,
            handle,
        });
        self.set_state(SessionState::Active);
        Ok(())
    }

    /// Stop tracking. Always ends in `Idle`.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;

        if let Some(producer) = inner.producer.take() {
            let _ = producer.shutdown.send(());
            match producer.handle.await {
                Ok(source) => inner.source = Some(source),
                Err(e) => tracing::error!("Tracking producer task failed: {}", e),
            }
        }

        self.set_state(SessionState::Idle);
    }
}

/// Poll the source at the capture rate and publish extracted frames
async fn run_producer(
    mut source: Box<dyn FaceTrackingSource>,
    events: Arc<EventBus>,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) -> Box<dyn FaceTrackingSource> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        "{} producer started ({:.0} Hz)",
        source.name(),
        1.0 / interval.as_secs_f64()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match source.poll_sample() {
                    Ok(Some(sample)) => {
                        let frame = features::extract(&sample);
                        events.publish(&BridgeEvent::FaceTracking(frame));
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("{} receive error: {}", source.name(), e),
                }
            }
            _ = &mut shutdown => break,
        }
    }

    source.stop();
    tracing::info!("{} producer stopped", source.name());
    source
}


/// Run the source's availability check on the blocking pool. Checks may
/// spawn interpreters or bind sockets, which must not stall a runtime worker.
/// `None` means the check panicked and the source was lost.
async fn check_availability(
    source: Box<dyn FaceTrackingSource>,
) -> Option<(Box<dyn FaceTrackingSource>, bool)> {
    let check = tokio::task::spawn_blocking(move || {
        let available = source.is_available();
        (source, available)
    });
    match check.await {
        Ok(result) => Some(result),
        Err(e) => {
            tracing::error!("Tracking availability check failed: {}", e);
            None
        }
    }
}
