//! Render-side consumer loop
//!
//! One task owns every piece of render state: the smoother, the viewport, the
//! motion dispatcher and the view of the model slot. Tracking events and UI
//! input are both marshalled onto it, so nothing here is written concurrently.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::avatar::{
    AssetLoader, AvatarModel, ModelDescriptor, ModelSlot, MotionDispatcher, ParameterSink,
    ParameterSmoother,
};
use crate::bridge::{BridgeEvent, Subscription};
use crate::config::Config;
use crate::error::RenderError;
use crate::tracking::FacialFeatureFrame;
use crate::viewport::{ViewportController, ViewportTransform};

/// Input marshalled onto the render loop
#[derive(Debug)]
pub enum RenderInput {
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp { x: f32, y: f32 },
    PointerLeave,
    Wheel { delta: f32 },
    PinchStart { distance: f32 },
    PinchMove { distance: f32 },
    PinchEnd,
    Resize { width: f32, height: f32 },
    SetTransform(ViewportTransform),
    ResetTransform,
    SetSmoothingFactor(f32),
    /// Replace the model with an already-loaded one
    SwapModel(Arc<dyn AvatarModel>),
    /// Resolve and load a model, then swap it in
    LoadModel(ModelDescriptor),
    /// The capture side was (re)started; start from the neutral pose
    TrackingRestarted,
}

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    pub frames_applied: u64,
    pub taps: u64,
    pub motions_played: u64,
    pub model_swaps: u64,
}

/// All render-domain state
pub struct RenderLoop {
    smoother: ParameterSmoother,
    sink: ParameterSink,
    viewport: ViewportController,
    baseline: ViewportTransform,
    motions: MotionDispatcher,
    slot: Arc<ModelSlot>,
    loader: Arc<dyn AssetLoader>,
    seen_version: u64,
    stats: RenderStats,
}

impl RenderLoop {
    pub fn new(config: &Config, slot: Arc<ModelSlot>, loader: Arc<dyn AssetLoader>) -> Self {
        let seen_version = slot.version();
        Self {
            smoother: ParameterSmoother::new(&config.smoothing),
            sink: ParameterSink::new(),
            viewport: ViewportController::new(&config.viewport),
            baseline: config.viewport.baseline,
            motions: MotionDispatcher::new(config.motions.clone()),
            slot,
            loader,
            seen_version,
            stats: RenderStats::default(),
        }
    }

    pub fn smoother(&self) -> &ParameterSmoother {
        &self.smoother
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Take a snapshot of the slot, resetting smoothing if the model changed
    fn current_model(&mut self) -> Option<Arc<dyn AvatarModel>> {
        let (version, model) = self.slot.snapshot();
        if version != self.seen_version {
            self.seen_version = version;
            self.smoother.reset();
            self.stats.model_swaps += 1;
            if let Some(model) = &model {
                model.set_placement(self.viewport.apply_to_target());
            }
        }
        model
    }

    fn push_placement(&mut self) {
        if let Some(model) = self.current_model() {
            model.set_placement(self.viewport.apply_to_target());
        }
    }

    /// Smooth one frame and write it to the current model
    pub fn apply_frame(&mut self, frame: &FacialFeatureFrame) {
        let model = self.current_model();
        self.smoother.update(frame);
        let report = self
            .sink
            .apply(model.as_deref(), self.smoother.state(), self.smoother.brows());
        if report.written > 0 {
            self.stats.frames_applied += 1;
        }
    }

    pub fn handle_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::FaceTracking(frame) => self.apply_frame(&frame),
        }
    }

    pub fn handle_input(&mut self, input: RenderInput) {
        match input {
            RenderInput::PointerDown { x, y } => {
                self.viewport.pointer_down(x, y);
            }
            RenderInput::PointerMove { x, y } => {
                if self.viewport.pointer_move(x, y) {
                    self.push_placement();
                }
            }
            RenderInput::PointerUp { x, y } => {
                match self.viewport.pointer_up(x, y) {
                    Some(tap) => {
                        self.stats.taps += 1;
                        self.dispatch_tap(tap.x, tap.y);
                    }
                    None => self.push_placement(),
                }
            }
            RenderInput::PointerLeave => self.viewport.pointer_leave(),
            RenderInput::Wheel { delta } => {
                self.viewport.wheel(delta);
                self.push_placement();
            }
            RenderInput::PinchStart { distance } => self.viewport.pinch_start(distance),
            RenderInput::PinchMove { distance } => {
                self.viewport.pinch_move(distance);
                self.push_placement();
            }
            RenderInput::PinchEnd => self.viewport.pinch_end(),
            RenderInput::Resize { width, height } => {
                self.viewport.resize(width, height);
                self.push_placement();
            }
            RenderInput::SetTransform(t) => {
                if self
                    .viewport
                    .set_transform(t.scale, t.rotation_degrees, t.offset_x, t.offset_y)
                {
                    self.push_placement();
                }
            }
            RenderInput::ResetTransform => {
                let baseline = self.baseline;
                self.viewport.reset_to_default(&baseline);
                self.push_placement();
            }
            RenderInput::SetSmoothingFactor(factor) => self.smoother.set_factor(factor),
            RenderInput::SwapModel(model) => {
                self.slot.swap(Some(model));
                self.push_placement();
            }
            RenderInput::LoadModel(descriptor) => match self.loader.load(&descriptor) {
                Ok(model) => {
                    self.slot.swap(Some(model));
                    self.push_placement();
                }
                Err(e) => tracing::warn!("{}", e),
            },
            RenderInput::TrackingRestarted => {
                tracing::debug!("Tracking restarted, resetting smoothing");
                self.smoother.reset();
            }
        }
    }

    fn dispatch_tap(&mut self, x: f32, y: f32) {
        let Some(model) = self.current_model() else {
            return;
        };
        let hits = model.hit_test(x, y);
        tracing::debug!("Tap at ({:.0}, {:.0}) hit {:?}", x, y, hits);
        if self.motions.dispatch(model.as_ref(), &hits).is_some() {
            self.stats.motions_played += 1;
        }
    }

    /// Run until the input queue closes
    pub async fn run(
        mut self,
        mut events: Option<Subscription>,
        mut inputs: mpsc::Receiver<RenderInput>,
    ) -> RenderStats {
        tracing::info!("Render loop started");
        loop {
            tokio::select! {
                event = next_event(&mut events) => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        tracing::info!("Tracking event stream ended");
                        events = None;
                    }
                },
                input = inputs.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },
            }
        }
        if let Some(events) = events {
            events.unsubscribe();
        }
        tracing::info!(
            "Render loop stopped ({} frames, {} taps)",
            self.stats.frames_applied,
            self.stats.taps
        );
        self.stats
    }
}

async fn next_event(events: &mut Option<Subscription>) -> Option<BridgeEvent> {
    match events {
        Some(sub) => sub.next_event().await,
        None => std::future::pending().await,
    }
}

/// Handle for feeding a spawned render loop
#[derive(Debug)]
pub struct RenderHandle {
    inputs: mpsc::Sender<RenderInput>,
    task: JoinHandle<RenderStats>,
}

impl RenderHandle {
    pub fn sender(&self) -> mpsc::Sender<RenderInput> {
        self.inputs.clone()
    }

    pub async fn send(&self, input: RenderInput) -> Result<(), RenderError> {
        self.inputs
            .send(input)
            .await
            .map_err(|_| RenderError::LoopClosed)
    }

    /// Close the input queue and wait for the loop to finish
    pub async fn shutdown(self) -> Result<RenderStats, RenderError> {
        let Self { inputs, task } = self;
        drop(inputs);
        task.await.map_err(|_| RenderError::LoopClosed)
    }
}

/// Spawn the render loop on its own task
pub fn spawn_render_loop(render: RenderLoop, events: Option<Subscription>) -> RenderHandle {
    let (tx, rx) = mpsc::channel(256);
    RenderHandle {
        inputs: tx,
        task: tokio::spawn(render.run(events, rx)),
    }
}
