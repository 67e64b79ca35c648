//! Latest-wins event channel
//!
//! The capture side publishes at its own cadence; each subscriber only ever
//! sees the newest message. Frames that arrive while a subscriber is busy are
//! overwritten, never queued, so a slow consumer cannot build up latency.

use parking_lot::Mutex;
use tokio::sync::watch;

use super::protocol::BridgeEvent;
use crate::tracking::FacialFeatureFrame;

type Payload = Option<String>;

/// Publish/subscribe hub for boundary events
#[derive(Debug)]
pub struct EventBus {
    sender: Mutex<Option<watch::Sender<Payload>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            sender: Mutex::new(Some(tx)),
        }
    }

    /// Publish a typed event
    pub fn publish(&self, event: &BridgeEvent) {
        if let Some(text) = event.encode() {
            self.publish_raw(text);
        }
    }

    /// Publish an already-encoded message. Validation happens on the
    /// receiving side.
    pub fn publish_raw(&self, text: String) {
        if let Some(tx) = self.sender.lock().as_ref() {
            tx.send_replace(Some(text));
        }
    }

    /// Register a new subscriber. It starts from the next published message.
    pub fn subscribe(&self) -> Subscription {
        let rx = match self.sender.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                // Closed bus: hand out a receiver whose sender is already gone
                let (_, rx) = watch::channel(None);
                rx
            }
        };
        tracing::debug!("Event subscriber registered");
        Subscription { rx }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .lock()
            .as_ref()
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Tear the bus down; subscribers drain and then see end-of-stream
    pub fn close(&self) {
        if self.sender.lock().take().is_some() {
            tracing::debug!("Event bus closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }
}

/// A registered listener on an [`EventBus`]
#[derive(Debug)]
pub struct Subscription {
    rx: watch::Receiver<Payload>,
}

impl Subscription {
    /// Wait for the next valid event. Malformed or unknown messages are
    /// skipped silently. Returns `None` once the bus is closed.
    pub async fn next_event(&mut self) -> Option<BridgeEvent> {
        loop {
            self.rx.changed().await.ok()?;
            let payload = self.rx.borrow_and_update().clone();
            if let Some(event) = payload.as_deref().and_then(BridgeEvent::decode) {
                return Some(event);
            }
        }
    }

    /// Next face tracking frame
    pub async fn next_frame(&mut self) -> Option<FacialFeatureFrame> {
        self.next_event().await.map(|event| match event {
            BridgeEvent::FaceTracking(frame) => frame,
        })
    }

    /// Non-blocking variant: the newest unseen valid event, if any
    pub fn try_next_event(&mut self) -> Option<BridgeEvent> {
        match self.rx.has_changed() {
            Ok(true) => {
                let payload = self.rx.borrow_and_update().clone();
                payload.as_deref().and_then(BridgeEvent::decode)
            }
            _ => None,
        }
    }

    /// Explicit teardown; equivalent to dropping the subscription
    pub fn unsubscribe(self) {
        tracing::debug!("Event subscriber removed");
    }
}
