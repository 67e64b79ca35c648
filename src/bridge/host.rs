//! Capture-side command host
//!
//! Serves raw requests from the link against a [`TrackingSession`]. Requests
//! are validated against the command table before anything is dispatched.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::link::{HostEnd, LinkRequest};
use super::protocol::{
    AvailabilityResponse, BridgeMessage, Command, CommandReply, StartResponse, StatusResponse,
    StopResponse,
};
use crate::tracking::TrackingSession;

/// Dispatches validated commands to the tracking session
pub struct CommandHost {
    session: Arc<TrackingSession>,
}

impl CommandHost {
    pub fn new(session: Arc<TrackingSession>) -> Self {
        Self { session }
    }

    /// Answer one raw request
    pub async fn handle(&self, message: Value) -> CommandReply {
        let request = match serde_json::from_value::<BridgeMessage>(message) {
            Ok(BridgeMessage::Command(request)) => request,
            Ok(BridgeMessage::Event(_)) => {
                return CommandReply::error("Events are not accepted as commands");
            }
            Err(e) => return CommandReply::error(format!("Malformed request: {}", e)),
        };

        let command = match Command::from_request(&request) {
            Ok(command) => command,
            Err(message) => {
                tracing::warn!("Rejected bridge request: {}", message);
                return CommandReply::error(message);
            }
        };

        tracing::debug!("Bridge command: {}", command);
        self.dispatch(command).await
    }

    async fn dispatch(&self, command: Command) -> CommandReply {
        match command {
            Command::StartFaceTracking => {
                let response = match self.session.start().await {
                    Ok(()) => StartResponse {
                        success: true,
                        error: None,
                    },
                    Err(e) => StartResponse {
                        success: false,
                        error: Some(e.to_string()),
                    },
                };
                CommandReply::data(&response)
            }
            Command::StopFaceTracking => {
                self.session.stop().await;
                CommandReply::data(&StopResponse {})
            }
            Command::IsFaceTrackingAvailable => CommandReply::data(&AvailabilityResponse {
                available: self.session.is_available().await,
            }),
            Command::GetFaceTrackingStatus => CommandReply::data(&StatusResponse {
                is_tracking: self.session.status(),
            }),
        }
    }

    /// Serve requests until every render-side link handle is dropped
    pub async fn serve(self, mut requests: mpsc::Receiver<LinkRequest>) {
        while let Some(LinkRequest { message, reply }) = requests.recv().await {
            let answer = self.handle(message).await;
            if reply.send(answer.to_value()).is_err() {
                tracing::debug!("Bridge caller went away before the reply");
            }
        }
        tracing::info!("Bridge command host stopped");
    }
}

/// Spawn the host on the capture side of a link
pub fn spawn_host(host_end: HostEnd, session: Arc<TrackingSession>) -> JoinHandle<()> {
    let HostEnd { requests, .. } = host_end;
    tokio::spawn(CommandHost::new(session).serve(requests))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::link::link_pair;
    use crate::bridge::EventBus;
    use crate::tracking::session::tests::FakeSource;
    use crate::tracking::StaticPermissions;
    use serde_json::json;

    fn host_with(source: FakeSource) -> (CommandHost, Arc<TrackingSession>) {
        let session = Arc::new(TrackingSession::new(
            Box::new(source),
            Arc::new(StaticPermissions { granted: true }),
            Arc::new(EventBus::new()),
            60,
        ));
        (CommandHost::new(Arc::clone(&session)), session)
    }

    #[tokio::test]
    async fn test_start_and_status() {
        let (host, session) = host_with(FakeSource::new());

        let reply = host.handle(json!({ "name": "StartFaceTracking", "args": [] })).await;
        assert_eq!(reply.to_value(), json!({ "data": { "success": true, "error": null } }));

        let reply = host.handle(json!({ "name": "GetFaceTrackingStatus" })).await;
        assert_eq!(reply.to_value(), json!({ "data": { "isTracking": true } }));

        let reply = host.handle(json!({ "name": "StopFaceTracking", "args": [] })).await;
        assert_eq!(reply.to_value(), json!({ "data": {} }));
        assert!(!session.status());
    }

    #[tokio::test]
    async fn test_unsupported_device_start() {
        let mut source = FakeSource::new();
        source.available = false;
        let (host, _session) = host_with(source);

        let reply = host.handle(json!({ "name": "StartFaceTracking" })).await.to_value();
        assert_eq!(reply["data"]["success"], false);
        assert!(reply["data"]["error"].is_string());

        let reply = host.handle(json!({ "name": "IsFaceTrackingAvailable" })).await;
        assert_eq!(reply.to_value(), json!({ "data": { "available": false } }));
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let (host, _session) = host_with(FakeSource::new());

        let reply = host.handle(json!({ "name": "FormatDisk" })).await;
        assert!(matches!(reply, CommandReply::Error { .. }));

        let reply = host.handle(json!({ "name": "StopFaceTracking", "args": ["now"] })).await;
        assert!(matches!(reply, CommandReply::Error { .. }));

        let reply = host.handle(json!(42)).await;
        assert!(matches!(reply, CommandReply::Error { .. }));
    }

    #[tokio::test]
    async fn test_spawned_host_serves_link() {
        let (link, host_end) = link_pair(4);
        let (_, session) = host_with(FakeSource::new());
        let handle = spawn_host(host_end, session);

        let client = crate::bridge::TrackingClient::new(link, std::time::Duration::from_secs(1));
        assert_eq!(client.is_face_tracking_available().await, Ok(true));
        client.start_face_tracking().await.unwrap();
        assert_eq!(client.face_tracking_status().await, Ok(true));
        client.stop_face_tracking().await.unwrap();
        assert_eq!(client.face_tracking_status().await, Ok(false));

        drop(client);
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
