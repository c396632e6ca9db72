//! # switchboard-client
//!
//! Client handle for the Switchboard hub.
//!
//! - [`WebSocketClient::connect`] / [`close`](WebSocketClient::close) /
//!   [`listen`](WebSocketClient::listen): restartable lifecycle
//! - Request helpers assign strictly increasing sequence numbers
//! - Inbound frames are sorted into a response stream and an event stream

#![deny(unsafe_code)]

pub mod client;
pub mod errors;

pub use client::WebSocketClient;
pub use errors::ClientError;
