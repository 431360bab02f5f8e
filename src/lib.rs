pub mod aggregate;
pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod memory;
pub mod models;
pub mod normalize;
pub mod periods;
pub mod service;
pub mod store;
pub mod upsert;

pub use error::TrackerError;
pub use memory::MemoryStore;
pub use service::{BatchOutcome, BatchSummary, Tracker};
pub use store::{Store, StoreTx};
