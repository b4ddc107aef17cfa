//! Shared configuration and error types for docrelay.
//!
//! This crate provides the pieces every other crate agrees on:
//! - Application configuration, loaded once at startup
//! - The closed error taxonomy and its HTTP status mapping

pub mod config;
pub mod error;

pub use config::{
    AppConfig, ExtractionConfig, RelayConfig, RelayMode, ServerConfig, StorageBackend,
    StorageSettings,
};
pub use error::{AppError, AppResult};
