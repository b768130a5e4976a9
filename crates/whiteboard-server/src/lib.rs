//! Whiteboard Session Server
//!
//! A multi-tenant collaborative-whiteboard session server. Each session holds
//! a Z-ordered list of vector elements, a roster of live WebSocket
//! subscribers, and a durable on-disk copy of the element list. Edits arrive
//! over WebSocket frames or the HTTP API, are serialized per session,
//! persisted, and fanned out to every connected subscriber.
//!
//! # Features
//!
//! - **Two input surfaces**: HTTP API and WebSocket, reconciled into one
//!   session state
//! - **Durable**: every mutation is committed to LMDB before it is
//!   acknowledged or broadcast
//! - **Isolated fan-out**: per-subscriber bounded queues; a slow peer is
//!   dropped, never waited on
//! - **Last-writer-wins**: a relay, not a CRDT
//!
//! # Example
//!
//! ```no_run
//! use whiteboard_server::{Config, server::WhiteboardServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new(3000, "./data");
//!     WhiteboardServer::new(config)?.run().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod store;
pub mod validate;

pub use config::Config;
pub use error::{ApiError, StoreError, ValidationError};
pub use registry::SessionRegistry;
pub use store::ElementStore;
