//! # switchboard-core
//!
//! Shared vocabulary for the Switchboard realtime hub:
//!
//! - **Branded IDs**: [`ConnectionId`] as a newtype for type safety
//! - **Wire model**: requests, responses, events and the scrubbed error body
//!   exchanged over the WebSocket
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod model;

pub use ids::ConnectionId;
pub use model::{
    Broadcast, ErrorInfo, WebSocketEvent, WebSocketMessage, WebSocketRequest, WebSocketResponse,
};
