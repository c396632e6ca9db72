//! # switchboard-server
//!
//! Axum HTTP + `WebSocket` realtime hub.
//!
//! - `WebSocket` gateway: authentication, connection lifecycle, heartbeat
//! - Request router: action dispatch with strict per-connection sequencing
//! - Hub: single-owner actor holding every live connection, scoped event
//!   fan-out with per-event user exclusion
//! - HTTP endpoints: health check, Prometheus metrics
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod errors;
pub mod health;
pub mod membership;
pub mod metrics;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod websocket;
