//! WebSocket connections, the hub, heartbeat and session lifecycle.

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod hub;
pub mod session;
