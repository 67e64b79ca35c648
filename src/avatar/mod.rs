//! Avatar module
//!
//! Render-side half of the pipeline: smoothing, parameter application,
//! the swappable model handle, asset loading and tap motions.

pub mod assets;
pub mod model;
pub mod motion;
pub mod sink;
pub mod smoothing;
pub mod state;

pub use assets::{AssetLoader, ManifestLoader, RigModel};
pub use model::{AvatarModel, ModelDescriptor, ModelSlot};
pub use motion::MotionDispatcher;
pub use sink::{ParameterSink, SinkReport};
pub use smoothing::ParameterSmoother;
pub use state::SmoothedParameterState;
