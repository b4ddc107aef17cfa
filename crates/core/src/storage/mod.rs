//! Result storage using Apache OpenDAL.
//!
//! In store mode every successful extraction is written once to an
//! S3-compatible bucket and served from a public base URL. A local
//! filesystem provider exists for development and tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Apache OpenDAL                              │
//! │                   (Unified Storage API)                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ op.write_with("<millis>-converted.json", json)                   │
//! │     .content_type("application/json")                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is ever read back, listed or deleted.

mod config;
mod error;
mod service;

pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use service::{StorageService, StoredArtifact};
