pub mod backoff;
pub mod constants;
pub mod link;
pub mod types;

pub use backoff::Backoff;
pub use link::{Connector, LinkHandle, Transport, TungsteniteConnector, UpstreamLink};
pub use types::{LinkEvent, UpstreamEvent, is_clean_close};
