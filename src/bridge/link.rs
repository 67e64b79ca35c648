//! The boundary link itself: one command queue plus one event bus.
//!
//! [`link_pair`] hands out the two ends. The render side keeps the
//! [`BoundaryLink`]; the capture side serves the [`HostEnd`].

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::events::{EventBus, Subscription};

/// A raw command in flight, with the slot its answer goes into
#[derive(Debug)]
pub struct LinkRequest {
    pub message: Value,
    pub reply: oneshot::Sender<Value>,
}

/// Render-side end of the link
#[derive(Debug, Clone)]
pub struct BoundaryLink {
    commands: mpsc::Sender<LinkRequest>,
    events: Arc<EventBus>,
}

impl BoundaryLink {
    /// Queue a raw command. Fails if the capture side has gone away.
    pub async fn send(&self, request: LinkRequest) -> Result<(), LinkRequest> {
        self.commands.send(request).await.map_err(|e| e.0)
    }

    /// Register for capture-side events
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Capture-side end of the link
#[derive(Debug)]
pub struct HostEnd {
    pub requests: mpsc::Receiver<LinkRequest>,
    pub events: Arc<EventBus>,
}

/// Create a connected pair of link ends
pub fn link_pair(queue_depth: usize) -> (BoundaryLink, HostEnd) {
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    let events = Arc::new(EventBus::new());

    (
        BoundaryLink {
            commands: tx,
            events: Arc::clone(&events),
        },
        HostEnd {
            requests: rx,
            events,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_request_reaches_host() {
        let (link, mut host) = link_pair(4);
        let (reply_tx, reply_rx) = oneshot::channel();
        link.send(LinkRequest {
            message: json!({ "name": "GetFaceTrackingStatus" }),
            reply: reply_tx,
        })
        .await
        .unwrap();

        let req = host.requests.recv().await.unwrap();
        assert_eq!(req.message["name"], "GetFaceTrackingStatus");
        req.reply.send(json!({ "data": { "isTracking": false } })).unwrap();
        assert_eq!(reply_rx.await.unwrap()["data"]["isTracking"], false);
    }

    #[tokio::test]
    async fn test_send_fails_after_host_drop() {
        let (link, host) = link_pair(1);
        drop(host);
        assert!(link.is_closed());
        let (reply_tx, _reply_rx) = oneshot::channel();
        let result = link
            .send(LinkRequest {
                message: json!({}),
                reply: reply_tx,
            })
            .await;
        assert!(result.is_err());
    }
}
