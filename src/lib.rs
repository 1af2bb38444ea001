//! Offline-resilient data core for a restaurant directory.
//!
//! The facade is the single entry point for reads and writes: reads are
//! network-first with a structured-store fallback where one exists, writes
//! made while offline land in a durable ordered queue and replay on
//! reconnect. The interceptor pre-caches the application shell and answers
//! requests from local data when the network is away.

pub mod config;
pub mod connectivity;
pub mod error;
pub mod facade;
pub mod interceptor;
pub mod queue;
pub mod remote;
pub mod store;
pub mod types;

pub use config::Config;
pub use connectivity::Connectivity;
pub use error::{DataError, Result};
pub use facade::{DataFacade, SubmitOutcome};
pub use remote::{HttpRemote, RemoteSource};
pub use store::Store;
