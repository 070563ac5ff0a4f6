//! Tether: client engine for streaming remote agent runs.
//!
//! Submits a natural-language request to an agent-execution service, consumes
//! the run's event stream into a structured transcript, and exposes that
//! transcript through consistent snapshots while supporting mid-flight
//! cancellation, steering, and recovery from connection loss.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether::config::ServiceConfig;
//! use tether::engine::RunController;
//! use tether::store::InMemoryStore;
//! use tether::transport::HttpTransport;
//!
//! # async fn example() -> tether::error::Result<()> {
//! let transport = Arc::new(HttpTransport::new(ServiceConfig::from_env()?)?);
//! let store = Arc::new(InMemoryStore::new());
//! let engine = RunController::new(
//!     transport.clone(),
//!     transport.clone(),
//!     transport,
//!     store,
//! );
//! engine.submit("summarize the quarterly report").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod prelude;
pub mod serializer;
pub mod store;
pub mod transport;
pub mod types;
pub mod wire;
