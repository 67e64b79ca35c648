//! Capture/render boundary: a request/response command channel plus a
//! latest-wins event stream.

pub mod client;
pub mod events;
pub mod host;
pub mod link;
pub mod protocol;

pub use client::TrackingClient;
pub use events::{EventBus, Subscription};
pub use host::{spawn_host, CommandHost};
pub use link::{link_pair, BoundaryLink, HostEnd, LinkRequest};
pub use protocol::{BridgeEvent, BridgeMessage, Command, CommandReply, CommandRequest};
