//! # signaro-server
//!
//! Axum HTTP + `WebSocket` transport for the signaling relay.
//!
//! - `WebSocket` endpoint: connect classification, per-connection reader and
//!   writer tasks, heartbeat, routing through [`signaro_core::MessageRouter`]
//! - HTTP endpoints: `/health` and Prometheus `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::RelayServer;
pub use shutdown::ShutdownCoordinator;
