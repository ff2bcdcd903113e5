//! Session state with a networked primary and an in-process fallback.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hostgate::session::{
//!     DEFAULT_SWEEP_INTERVAL, MemoryBackend, RedisBackend, SessionStore, spawn_sweeper,
//! };
//!
//! let fallback = Arc::new(MemoryBackend::new());
//! let store = SessionStore::new(RedisBackend::open("redis://127.0.0.1/")?, fallback.clone());
//! let sweeper = spawn_sweeper(fallback, DEFAULT_SWEEP_INTERVAL, shutdown.clone());
//! ```

mod backend;
mod cache;
mod memory;
mod record;
mod store;
mod sweeper;

pub use backend::{BackendError, SessionBackend};
pub use cache::RedisBackend;
pub use memory::MemoryBackend;
pub use record::SessionRecord;
pub use store::SessionStore;
pub use sweeper::{DEFAULT_SWEEP_INTERVAL, run_sweeper, spawn_sweeper};
