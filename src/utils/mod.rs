//! # Utility Modules
//!
//! Supporting utilities for logging, observability, persistence, and timing.
//!
//! ## Components
//! - **Logging**: Structured logging configuration via `tracing`
//! - **Metrics**: Thread-safe per-server counters and snapshots
//! - **Notify**: Fire-and-forget event publishing toward frontends
//! - **Time**: Timestamp utilities for moderation records
//! - **Userdata**: Per-UID persisted records (memory and JSON-file backends)

pub mod logging;
pub mod metrics;
pub mod notify;
pub mod time;
pub mod userdata;

// Re-export public types for embedders
pub use notify::{FrontendEvent, FrontendEventKind, Notifier};
pub use userdata::{JsonFileUserData, MemoryUserData, UserDataStore};
