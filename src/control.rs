//! Tracking toggle shown in the UI shell
//!
//! Turns every command outcome into toggle state plus an optional
//! dismissible notice. Nothing here panics or propagates: without a link the
//! toggle is simply disabled.

use tokio::sync::mpsc;

use crate::bridge::TrackingClient;
use crate::error::BridgeError;
use crate::render::RenderInput;

/// Snapshot of what the toggle should display
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToggleView {
    /// Capture backend usable on this device
    pub available: bool,
    /// Control can be pressed
    pub enabled: bool,
    /// Frames are flowing
    pub tracking: bool,
    /// Transient failure message, until dismissed
    pub notice: Option<String>,
}

/// UI-side controller for starting and stopping tracking
#[derive(Debug)]
pub struct TrackingToggle {
    client: TrackingClient,
    render: Option<mpsc::Sender<RenderInput>>,
    view: ToggleView,
}

impl TrackingToggle {
    pub fn new(client: TrackingClient, render: Option<mpsc::Sender<RenderInput>>) -> Self {
        Self {
            client,
            render,
            view: ToggleView::default(),
        }
    }

    pub fn view(&self) -> &ToggleView {
        &self.view
    }

    pub fn dismiss_notice(&mut self) {
        self.view.notice = None;
    }

    fn report(&mut self, error: &BridgeError) {
        match error {
            // Running outside the host shell: stay inert, no banner
            BridgeError::NoChannel => {}
            _ => {
                tracing::warn!("{}", error);
                self.view.notice = Some(error.to_string());
            }
        }
    }

    /// Re-query availability and status
    pub async fn refresh(&mut self) -> &ToggleView {
        match self.client.is_face_tracking_available().await {
            Ok(available) => self.view.available = available,
            Err(e) => {
                self.view.available = false;
                self.report(&e);
            }
        }

        self.view.tracking = if self.view.available {
            match self.client.face_tracking_status().await {
                Ok(tracking) => tracking,
                Err(e) => {
                    self.report(&e);
                    false
                }
            }
        } else {
            false
        };

        self.view.enabled = self.view.available;
        &self.view
    }

    /// Start tracking
    pub async fn start(&mut self) -> bool {
        if !self.view.enabled {
            return false;
        }
        let was_tracking = self.view.tracking;
        match self.client.start_face_tracking().await {
            Ok(()) => {
                self.view.tracking = true;
                self.view.notice = None;
                // Starting an active session is a no-op; keep the smoothed pose
                if !was_tracking {
                    if let Some(render) = &self.render {
                        if render.send(RenderInput::TrackingRestarted).await.is_err() {
                            tracing::warn!("Render loop closed; smoother reset skipped");
                        }
                    }
                }
                true
            }
            Err(e) => {
                self.view.tracking = false;
                self.report(&e);
                false
            }
        }
    }

    /// Stop tracking
    pub async fn stop(&mut self) {
        if let Err(e) = self.client.stop_face_tracking().await {
            self.report(&e);
        }
        self.view.tracking = false;
    }

    /// Flip between started and stopped
    pub async fn toggle(&mut self) -> bool {
        if self.view.tracking {
            self.stop().await;
        } else {
            self.start().await;
        }
        self.view.tracking
    }
}
