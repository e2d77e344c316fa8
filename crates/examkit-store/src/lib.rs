//! examkit-store — Collaborator-trait implementations.
//!
//! Implements `ExamRepository`, `AttemptStore`, and `ActivitySink` for an
//! in-memory backend (testing and single-process deployments) and for the
//! surrounding REST backend over HTTP.

pub mod config;
pub mod http;
pub mod memory;

pub use config::{create_store, load_config, ExamkitConfig, StoreConfig, StoreHandles};
pub use http::HttpStore;
pub use memory::MemoryStore;
