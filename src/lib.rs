//! facelink - facial tracking to 2D avatar pipeline
//!
//! Drives a parametric 2D avatar from face tracking input:
//! - Capture side: MediaPipe (camera) or VMC (sensor) trackers, feature
//!   extraction and a tracking session publishing frames
//! - Boundary: typed command channel plus a latest-wins event stream
//! - Render side: smoothing, parameter application, viewport pan/zoom and
//!   tap-to-motion dispatch

pub mod avatar;
pub mod bridge;
pub mod config;
pub mod control;
pub mod error;
pub mod render;
pub mod settings;
pub mod tracking;
pub mod viewport;

pub use config::Config;
pub use error::{FacelinkError, Result};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use avatar::{AssetLoader, ModelSlot};
use bridge::{link_pair, spawn_host, TrackingClient};
use control::TrackingToggle;
use render::{spawn_render_loop, RenderHandle, RenderLoop, RenderStats};
use tracking::{FaceTrackingSource, PermissionProvider, TrackingSession};

/// Depth of the command queue between the two sides
const COMMAND_QUEUE_DEPTH: usize = 32;

/// Both halves of the pipeline, wired together over one link
pub struct Pipeline {
    pub session: Arc<TrackingSession>,
    pub slot: Arc<ModelSlot>,
    pub render: RenderHandle,
    pub toggle: TrackingToggle,
    host: JoinHandle<()>,
}

impl Pipeline {
    /// Wire capture and render sides. Must run inside a tokio runtime.
    ///
    /// A model that fails to load is logged and the pipeline runs without
    /// one; a later `LoadModel` input can still supply it.
    pub fn launch(
        config: &Config,
        source: Box<dyn FaceTrackingSource>,
        permissions: Arc<dyn PermissionProvider>,
        loader: Arc<dyn AssetLoader>,
    ) -> Self {
        let (link, host_end) = link_pair(COMMAND_QUEUE_DEPTH);

        let session = Arc::new(TrackingSession::new(
            source,
            permissions,
            Arc::clone(&host_end.events),
            config.tracking.capture_fps,
        ));
        let host = spawn_host(host_end, Arc::clone(&session));

        // Run the device check once up front so the first command is cheap
        let warmup = Arc::clone(&session);
        tokio::spawn(async move {
            if !warmup.is_available().await {
                tracing::warn!("Face tracking source is not available on this host");
            }
        });

        let slot = Arc::new(ModelSlot::new());
        match loader.load(&config.avatar.model) {
            Ok(model) => {
                slot.swap(Some(model));
            }
            Err(e) => tracing::error!("{}", e),
        }

        let client = TrackingClient::new(
            link,
            Duration::from_millis(config.bridge.command_timeout_ms),
        );
        let render = spawn_render_loop(
            RenderLoop::new(config, Arc::clone(&slot), loader),
            client.subscribe(),
        );
        let toggle = TrackingToggle::new(client, Some(render.sender()));

        Self {
            session,
            slot,
            render,
            toggle,
            host,
        }
    }

    /// Stop tracking and wind down both sides
    pub async fn shutdown(self) -> std::result::Result<RenderStats, FacelinkError> {
        let Self {
            session,
            render,
            mut toggle,
            host,
            ..
        } = self;

        toggle.stop().await;
        session.stop().await;
        drop(toggle);

        if let Err(e) = host.await {
            tracing::error!("Command host task failed: {}", e);
        }
        Ok(render.shutdown().await?)
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
