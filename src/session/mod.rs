pub mod actor;
pub mod events;
pub mod registry;
pub mod state;
pub mod streamer;

pub use actor::Session;
pub use events::{Outbound, SessionEvent};
pub use registry::{Liveness, SessionHandle, SessionRegistry};
pub use state::SessionState;
pub use streamer::AmbientStreamer;
