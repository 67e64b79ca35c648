//! Render-side command client
//!
//! Every call is fallible and bounded by a timeout: a stalled capture side
//! surfaces as [`BridgeError::Timeout`] instead of hanging the caller.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::oneshot;

use super::events::Subscription;
use super::link::{BoundaryLink, LinkRequest};
use super::protocol::{
    decode_reply, AvailabilityResponse, Command, StartResponse, StatusResponse, StopResponse,
};
use crate::error::BridgeError;

/// Typed access to the tracking command surface
#[derive(Debug, Clone)]
pub struct TrackingClient {
    link: Option<BoundaryLink>,
    timeout: Duration,
}

impl TrackingClient {
    pub fn new(link: BoundaryLink, timeout: Duration) -> Self {
        Self {
            link: Some(link),
            timeout,
        }
    }

    /// A client with no link at all; every call fails with `NoChannel`
    pub fn detached() -> Self {
        Self {
            link: None,
            timeout: Duration::from_secs(1),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.link.is_some()
    }

    /// Subscribe to capture-side events, if a link exists
    pub fn subscribe(&self) -> Option<Subscription> {
        self.link.as_ref().map(|l| l.subscribe())
    }

    /// Send one command and validate its reply
    pub async fn call<T: DeserializeOwned>(&self, command: Command) -> Result<T, BridgeError> {
        let link = self.link.as_ref().ok_or(BridgeError::NoChannel)?;

        let message = serde_json::to_value(command.to_request()).map_err(|e| {
            BridgeError::DataFormat {
                command: command.name().to_string(),
                message: e.to_string(),
            }
        })?;

        let round_trip = async {
            let (reply_tx, reply_rx) = oneshot::channel();
            link.send(LinkRequest {
                message,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BridgeError::TransportUnavailable("link closed".to_string()))?;

            let reply = reply_rx.await.map_err(|_| {
                BridgeError::TransportUnavailable("capture side dropped the request".to_string())
            })?;
            Ok::<Value, BridgeError>(reply)
        };

        let reply = tokio::time::timeout(self.timeout, round_trip)
            .await
            .map_err(|_| BridgeError::Timeout {
                command: command.name().to_string(),
                millis: self.timeout.as_millis() as u64,
            })??;

        tracing::trace!("{} -> {}", command, reply);
        decode_reply(command, reply)
    }

    /// Start tracking. A `{success: false}` answer becomes `Rejected`.
    pub async fn start_face_tracking(&self) -> Result<(), BridgeError> {
        let response: StartResponse = self.call(Command::StartFaceTracking).await?;
        if response.success {
            Ok(())
        } else {
            Err(BridgeError::Rejected {
                command: Command::StartFaceTracking.name().to_string(),
                message: response
                    .error
                    .unwrap_or_else(|| "Face tracking failed to start".to_string()),
            })
        }
    }

    pub async fn stop_face_tracking(&self) -> Result<(), BridgeError> {
        let _: StopResponse = self.call(Command::StopFaceTracking).await?;
        Ok(())
    }

    pub async fn is_face_tracking_available(&self) -> Result<bool, BridgeError> {
        let response: AvailabilityResponse = self.call(Command::IsFaceTrackingAvailable).await?;
        Ok(response.available)
    }

    pub async fn face_tracking_status(&self) -> Result<bool, BridgeError> {
        let response: StatusResponse = self.call(Command::GetFaceTrackingStatus).await?;
        Ok(response.is_tracking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::link::link_pair;
    use serde_json::json;

    /// Answer every request on the host end with a fixed reply
    fn canned_host(reply: Value) -> TrackingClient {
        let (link, mut host) = link_pair(4);
        tokio::spawn(async move {
            while let Some(req) = host.requests.recv().await {
                let _ = req.reply.send(reply.clone());
            }
        });
        TrackingClient::new(link, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_detached_client_reports_no_channel() {
        let client = TrackingClient::detached();
        assert_eq!(client.face_tracking_status().await, Err(BridgeError::NoChannel));
        assert!(client.subscribe().is_none());
    }

    #[tokio::test]
    async fn test_status_round_trip() {
        let client = canned_host(json!({ "data": { "isTracking": true } }));
        assert_eq!(client.face_tracking_status().await, Ok(true));
    }

    #[tokio::test]
    async fn test_stalled_host_times_out() {
        let (link, _host) = link_pair(4);
        let client = TrackingClient::new(link, Duration::from_millis(50));
        let err = client.is_face_tracking_available().await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_closed_link_is_transport_unavailable() {
        let (link, host) = link_pair(4);
        drop(host);
        let client = TrackingClient::new(link, Duration::from_millis(200));
        let err = client.stop_face_tracking().await.unwrap_err();
        assert!(matches!(err, BridgeError::TransportUnavailable(_)));
    }

    #[tokio::test]
    async fn test_dropped_reply_is_transport_unavailable() {
        let (link, mut host) = link_pair(4);
        tokio::spawn(async move {
            while let Some(req) = host.requests.recv().await {
                drop(req);
            }
        });
        let client = TrackingClient::new(link, Duration::from_millis(200));
        let err = client.face_tracking_status().await.unwrap_err();
        assert!(matches!(err, BridgeError::TransportUnavailable(_)));
    }

    #[tokio::test]
    async fn test_start_failure_is_rejected_with_message() {
        let client = canned_host(json!({ "data": { "success": false, "error": "No camera" } }));
        match client.start_face_tracking().await {
            Err(BridgeError::Rejected { message, .. }) => assert_eq!(message, "No camera"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_failure_without_message() {
        let client = canned_host(json!({ "data": { "success": false } }));
        let err = client.start_face_tracking().await.unwrap_err();
        assert!(matches!(err, BridgeError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_bad_payload_is_data_format() {
        let client = canned_host(json!({ "data": { "isTracking": "maybe" } }));
        let err = client.face_tracking_status().await.unwrap_err();
        assert!(matches!(err, BridgeError::DataFormat { .. }));
        assert!(!err.is_transport());
    }
}
