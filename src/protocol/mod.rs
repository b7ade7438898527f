pub mod client;
pub mod frame;
pub mod gateway;

pub use client::{AmbientCommand, LevelsRequest, ServerMessage, parse_command};
pub use frame::Frame;
pub use gateway::GatewayFrame;
